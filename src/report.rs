//! JSON audit report for a finished batch.
//!
//! Carries logins, statuses, attempt counts and error details. Passwords and
//! secret material are never part of it.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BatchError;
use crate::orchestrator::BatchOutcome;
use crate::state_machine::{JobStatus, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAudit {
    pub position: usize,
    pub login: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Structured record produced at batch completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub max_attempts: u32,
    pub attempt_delay_secs: u64,
    pub job_delay_secs: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_positions: Vec<usize>,
    pub jobs: Vec<JobAudit>,
}

impl AuditReport {
    pub fn from_outcome(outcome: &BatchOutcome, policy: RetryPolicy, job_delay_secs: u64) -> Self {
        let jobs = outcome
            .results
            .iter()
            .map(|(position, result)| JobAudit {
                position: *position,
                login: result.login.clone(),
                status: result.status,
                attempts: result.attempts,
                last_error: result.last_error.clone(),
            })
            .collect();

        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            duration_ms: (outcome.finished_at - outcome.started_at).num_milliseconds(),
            max_attempts: policy.max_attempts,
            attempt_delay_secs: policy.attempt_delay.as_secs(),
            job_delay_secs,
            succeeded: outcome.ledger.succeeded().len(),
            failed: outcome.ledger.failed().len(),
            skipped_positions: outcome.skipped.clone(),
            jobs,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), BatchError> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
