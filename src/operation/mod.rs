//! The credential change itself, seen from the batch as a black box.
//!
//! [`ChangeOperation`] performs exactly one attempt and reports an
//! [`AttemptOutcome`]. Two adapters ship with the crate: [`CommandOperation`]
//! hands the attempt to an external program, [`HttpOperation`] posts it to a
//! helper service. Both receive the same [`ChangePayload`] JSON document.

pub mod command;
pub mod http;

use std::fmt;

use serde::Serialize;

pub use command::CommandOperation;
pub use http::HttpOperation;

use crate::error::OperationError;
use crate::jobs::JobRecord;
use crate::secrets::SecretBundle;

/// Result of a single change attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => write!(f, "success"),
            AttemptOutcome::Failure(detail) => write!(f, "failure: {detail}"),
        }
    }
}

impl From<Result<(), OperationError>> for AttemptOutcome {
    fn from(result: Result<(), OperationError>) -> Self {
        match result {
            Ok(()) => AttemptOutcome::Success,
            Err(e) => AttemptOutcome::Failure(e.to_string()),
        }
    }
}

/// Performs one attempt of a credential change.
pub trait ChangeOperation {
    async fn attempt(&self, job: &JobRecord, secrets: &SecretBundle) -> AttemptOutcome;
}

/// Document handed to the helper for one attempt.
#[derive(Serialize)]
pub struct ChangePayload<'a> {
    pub login: &'a str,
    pub old_password: &'a str,
    pub new_password: &'a str,
    pub shared_secret: &'a str,
    pub identity_secret: &'a str,
    pub device_id: &'a str,
    pub steamid: u64,
}

impl<'a> ChangePayload<'a> {
    pub fn new(job: &'a JobRecord, secrets: &'a SecretBundle) -> Self {
        Self {
            login: &job.login,
            old_password: &job.old_password,
            new_password: &job.new_password,
            shared_secret: &secrets.shared_secret,
            identity_secret: &secrets.identity_secret,
            device_id: &secrets.device_id,
            steamid: secrets.steam_id,
        }
    }
}

/// The backend chosen from configuration.
pub enum Backend {
    Command(CommandOperation),
    Http(HttpOperation),
}

impl ChangeOperation for Backend {
    async fn attempt(&self, job: &JobRecord, secrets: &SecretBundle) -> AttemptOutcome {
        match self {
            Backend::Command(op) => op.attempt(job, secrets).await,
            Backend::Http(op) => op.attempt(job, secrets).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobRecord {
        crate::jobs::parse_line(1, "alice:oldpw:newpw").unwrap()
    }

    fn secrets() -> SecretBundle {
        SecretBundle {
            shared_secret: "s".into(),
            identity_secret: "i".into(),
            device_id: "d".into(),
            steam_id: 42,
        }
    }

    #[test]
    fn payload_serializes_all_fields() {
        let job = job();
        let secrets = secrets();
        let value = serde_json::to_value(ChangePayload::new(&job, &secrets)).unwrap();
        assert_eq!(value["login"], "alice");
        assert_eq!(value["old_password"], "oldpw");
        assert_eq!(value["new_password"], "newpw");
        assert_eq!(value["shared_secret"], "s");
        assert_eq!(value["identity_secret"], "i");
        assert_eq!(value["device_id"], "d");
        assert_eq!(value["steamid"], 42);
    }

    #[test]
    fn outcome_from_result() {
        assert_eq!(AttemptOutcome::from(Ok(())), AttemptOutcome::Success);
        let failed = AttemptOutcome::from(Err(OperationError::Rejected("bad code".into())));
        assert_eq!(failed, AttemptOutcome::Failure("change rejected: bad code".into()));
        assert_eq!(failed.to_string(), "failure: change rejected: bad code");
    }

    #[tokio::test]
    async fn scripted_operation_replays_then_fails() {
        let op = testing::ScriptedOperation::default().succeed_on("alice", 2);
        let job = job();
        let secrets = secrets();
        assert_ne!(op.attempt(&job, &secrets).await, AttemptOutcome::Success);
        assert_eq!(op.attempt(&job, &secrets).await, AttemptOutcome::Success);
        assert_ne!(op.attempt(&job, &secrets).await, AttemptOutcome::Success);
        assert_eq!(op.calls_for("alice"), 3);
    }
}
