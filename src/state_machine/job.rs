use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::state::State;

/// Batch-wide retry settings. Delay stays constant between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts per job, including the first one.
    pub max_attempts: u32,
    /// Fixed wait between two attempts of the same job.
    pub attempt_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_delay: Duration::from_secs(5),
        }
    }
}

/// Terminal classification of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Mutable progress of one job through the retry state machine.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub login: String,
    pub state: State,
    pub state_history: Vec<State>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub policy: RetryPolicy,
}

impl JobRun {
    pub fn new(login: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            login: login.into(),
            state: State::Pending,
            state_history: Vec::new(),
            attempts: 0,
            last_error: None,
            policy,
        }
    }

    /// `Some` once the run reached `Succeeded` or `Exhausted`.
    pub fn status(&self) -> Option<JobStatus> {
        match self.state {
            State::Succeeded => Some(JobStatus::Succeeded),
            State::Exhausted => Some(JobStatus::Failed),
            State::Pending | State::Attempting => None,
        }
    }
}

/// Final record for one valid job. Exactly one per job ends up in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub login: String,
    /// New password on success, the original one otherwise.
    pub credential: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}
