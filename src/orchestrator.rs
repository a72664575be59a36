use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::BatchError;
use crate::jobs::{JobRecord, JobSource};
use crate::ledger::Ledger;
use crate::operation::ChangeOperation;
use crate::pacing::Delay;
use crate::scheduler::RetryScheduler;
use crate::secrets::SecretResolver;
use crate::state_machine::{JobResult, JobStatus, RetryPolicy};
use crate::ui::BatchProgress;

/// Everything a finished batch produced. The ledger is flushed by the caller.
#[derive(Debug)]
pub struct BatchOutcome {
    pub ledger: Ledger,
    pub results: Vec<(usize, JobResult)>,
    /// Positions of entries rejected as malformed.
    pub skipped: Vec<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives every job of a batch, one at a time, in input order.
pub struct BatchRunner<O, D> {
    scheduler: RetryScheduler,
    resolver: SecretResolver,
    operation: O,
    delay: D,
    job_delay: Duration,
}

impl<O, D> BatchRunner<O, D>
where
    O: ChangeOperation,
    D: Delay,
{
    pub fn new(
        policy: RetryPolicy,
        job_delay: Duration,
        resolver: SecretResolver,
        operation: O,
        delay: D,
    ) -> Self {
        Self {
            scheduler: RetryScheduler::new(policy),
            resolver,
            operation,
            delay,
            job_delay,
        }
    }

    /// Processes the whole source. Per-job errors never escape: each valid
    /// record ends up in exactly one ledger list.
    pub async fn run(&self, source: &JobSource, progress: &BatchProgress) -> BatchOutcome {
        let started_at = Utc::now();
        let total = source.len();
        let last_valid = source
            .entries()
            .filter_map(Result::ok)
            .map(|r| r.position)
            .last();

        info!(total, "starting batch");

        let mut ledger = Ledger::new();
        let mut results = Vec::new();
        let mut skipped = Vec::new();

        for entry in source.entries() {
            let job = match entry {
                Ok(job) => job,
                Err(BatchError::MalformedLine { position, content }) => {
                    warn!(position, total, "skipping malformed job entry");
                    progress.skipped(position, total, &content);
                    skipped.push(position);
                    continue;
                }
                Err(other) => {
                    warn!(error = %other, "skipping unreadable job entry");
                    continue;
                }
            };

            progress.job_started(job.position, total, &job.login);
            let result = self.process(&job, total, progress).await;
            ledger.record(&result);

            let contacted_remote = result.attempts > 0;
            results.push((job.position, result));

            if contacted_remote && Some(job.position) != last_valid {
                let delay_secs = self.job_delay.as_secs();
                info!(delay_secs, "pausing before next account");
                progress.pause(delay_secs);
                self.delay.wait(self.job_delay).await;
            }
        }

        let finished_at = Utc::now();
        info!(
            succeeded = ledger.succeeded().len(),
            failed = ledger.failed().len(),
            skipped = skipped.len(),
            "batch finished"
        );

        BatchOutcome {
            ledger,
            results,
            skipped,
            started_at,
            finished_at,
        }
    }

    async fn process(&self, job: &JobRecord, total: usize, progress: &BatchProgress) -> JobResult {
        info!(login = %job.login, position = job.position, total, "processing account");

        // Loaded per job and dropped once the job resolves.
        let secrets = match self.resolver.resolve(&job.login) {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(login = %job.login, error = %e, "cannot process account");
                progress.failed(&job.login, &e.to_string());
                return JobResult {
                    login: job.login.clone(),
                    credential: job.old_password.clone(),
                    status: JobStatus::Failed,
                    attempts: 0,
                    last_error: Some(e.to_string()),
                };
            }
        };

        let run = self
            .scheduler
            .run(&self.operation, &self.delay, job, &secrets, progress)
            .await;

        match run.status() {
            Some(JobStatus::Succeeded) => {
                progress.succeeded(&job.login, run.attempts);
                JobResult {
                    login: job.login.clone(),
                    credential: job.new_password.clone(),
                    status: JobStatus::Succeeded,
                    attempts: run.attempts,
                    last_error: None,
                }
            }
            _ => {
                let reason = format!("all {} attempts failed", run.attempts);
                progress.failed(&job.login, &reason);
                JobResult {
                    login: job.login.clone(),
                    credential: job.old_password.clone(),
                    status: JobStatus::Failed,
                    attempts: run.attempts,
                    last_error: run.last_error,
                }
            }
        }
    }
}

/// Readiness of one job, as reported by [`preflight`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { position: usize, login: String },
    NoSecrets { position: usize, login: String, reason: String },
    Malformed { position: usize },
}

/// Checks every entry of `source` without contacting the remote service.
pub fn preflight(source: &JobSource, resolver: &SecretResolver) -> Vec<Readiness> {
    source
        .entries()
        .map(|entry| match entry {
            Ok(job) => match resolver.resolve(&job.login) {
                Ok(_) => Readiness::Ready {
                    position: job.position,
                    login: job.login,
                },
                Err(e) => Readiness::NoSecrets {
                    position: job.position,
                    login: job.login,
                    reason: e.to_string(),
                },
            },
            Err(BatchError::MalformedLine { position, .. }) => Readiness::Malformed { position },
            Err(_) => Readiness::Malformed { position: 0 },
        })
        .collect()
}
