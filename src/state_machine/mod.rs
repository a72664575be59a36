mod job;
mod state;

pub use job::{JobResult, JobRun, JobStatus, RetryPolicy};
pub use state::{State, StateMachine, Transition};
