use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::JobRun;
use crate::operation::AttemptOutcome;

/// States of a single job's retry loop.
///
/// Each job flows through: PENDING → ATTEMPTING → {SUCCEEDED, EXHAUSTED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Pending,
    Attempting,
    Succeeded,
    Exhausted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending => write!(f, "PENDING"),
            State::Attempting => write!(f, "ATTEMPTING"),
            State::Succeeded => write!(f, "SUCCEEDED"),
            State::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next state.
    Next(State),
    /// The attempt failed and budget remains; wait and try again.
    Retry { attempt: u32, reason: String },
    /// The job reached a terminal state.
    Complete(State),
}

/// Drives a [`JobRun`] through the retry states.
pub struct StateMachine;

impl StateMachine {
    /// `Pending → Attempting`. Any other state is left untouched.
    pub fn start(run: &mut JobRun) -> Transition {
        match run.state {
            State::Pending => {
                Self::move_to(run, State::Attempting);
                Transition::Next(State::Attempting)
            }
            State::Attempting => Transition::Next(State::Attempting),
            terminal => Transition::Complete(terminal),
        }
    }

    /// Applies the outcome of one attempt.
    ///
    /// - Success completes with `Succeeded`.
    /// - Failure retries while `attempts < max_attempts`, then completes with
    ///   `Exhausted`. Every failure reason counts the same.
    /// - Terminal states ignore further outcomes.
    pub fn record(run: &mut JobRun, outcome: AttemptOutcome) -> Transition {
        match run.state {
            State::Pending => {
                Self::start(run);
                Self::record(run, outcome)
            }
            State::Attempting => {
                run.attempts += 1;
                match outcome {
                    AttemptOutcome::Success => {
                        run.last_error = None;
                        Self::move_to(run, State::Succeeded);
                        Transition::Complete(State::Succeeded)
                    }
                    AttemptOutcome::Failure(reason) => {
                        run.last_error = Some(reason.clone());
                        if run.attempts >= run.policy.max_attempts {
                            Self::move_to(run, State::Exhausted);
                            Transition::Complete(State::Exhausted)
                        } else {
                            Transition::Retry {
                                attempt: run.attempts,
                                reason,
                            }
                        }
                    }
                }
            }
            terminal => Transition::Complete(terminal),
        }
    }

    fn move_to(run: &mut JobRun, next: State) {
        run.state_history.push(run.state);
        run.state = next;
    }
}
