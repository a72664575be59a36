use tracing::{debug, info, warn};

use crate::jobs::JobRecord;
use crate::operation::ChangeOperation;
use crate::pacing::Delay;
use crate::secrets::SecretBundle;
use crate::state_machine::{JobRun, RetryPolicy, StateMachine, Transition};
use crate::ui::BatchProgress;

/// Runs one job's attempts to a terminal state.
///
/// Attempts are strictly sequential. Between two attempts the scheduler waits
/// the policy's fixed delay; there is no wait after the final attempt.
pub struct RetryScheduler {
    policy: RetryPolicy,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub async fn run<O, D>(
        &self,
        operation: &O,
        delay: &D,
        job: &JobRecord,
        secrets: &SecretBundle,
        progress: &BatchProgress,
    ) -> JobRun
    where
        O: ChangeOperation,
        D: Delay,
    {
        let mut run = JobRun::new(job.login.clone(), self.policy);
        StateMachine::start(&mut run);

        loop {
            let attempt = run.attempts + 1;
            progress.attempt(&job.login, attempt, self.policy.max_attempts);
            info!(
                login = %job.login,
                attempt,
                max_attempts = self.policy.max_attempts,
                "attempting credential change"
            );

            let outcome = operation.attempt(job, secrets).await;
            debug!(login = %job.login, attempt, %outcome, "attempt finished");
            match StateMachine::record(&mut run, outcome) {
                Transition::Retry { attempt, reason } => {
                    let delay_secs = self.policy.attempt_delay.as_secs();
                    warn!(
                        login = %job.login,
                        attempt,
                        %reason,
                        delay_secs,
                        "attempt failed, retrying"
                    );
                    progress.retry(attempt, self.policy.max_attempts, &reason, delay_secs);
                    delay.wait(self.policy.attempt_delay).await;
                }
                Transition::Complete(state) => {
                    info!(login = %run.login, attempts = run.attempts, %state, "job resolved");
                    debug!(history = ?run.state_history, "state transitions");
                    return run;
                }
                Transition::Next(state) => {
                    unreachable!("recording an attempt never yields a plain advance to {state}")
                }
            }
        }
    }
}
