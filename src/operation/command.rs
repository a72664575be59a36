//! Runs each attempt through an external helper program.
//!
//! The [`ChangePayload`] is written as one JSON line to the helper's stdin so
//! that no password or secret ever shows up in the process arguments. Exit
//! status 0 means the change went through; anything else is a failed attempt
//! and the helper's stderr becomes the failure detail.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AttemptOutcome, ChangeOperation, ChangePayload};
use crate::error::OperationError;
use crate::jobs::JobRecord;
use crate::secrets::SecretBundle;

#[derive(Debug, Clone)]
pub struct CommandOperation {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOperation {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self, payload: &ChangePayload<'_>) -> Result<(), OperationError> {
        let mut body = serde_json::to_vec(payload)?;
        body.push(b'\n');

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OperationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A helper may exit without reading its input; the exit status decides.
            match stdin.write_all(&body).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!(program = %self.program, "helper closed stdin early");
                }
                Err(e) => return Err(e.into()),
            }
            // Dropping stdin closes the pipe so the helper sees EOF.
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(OperationError::Timeout { after: self.timeout });
            }
        };

        debug!(program = %self.program, status = %output.status, "helper finished");

        if output.status.success() {
            return Ok(());
        }

        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(OperationError::ExitStatus { code, stderr })
    }
}

impl ChangeOperation for CommandOperation {
    async fn attempt(&self, job: &JobRecord, secrets: &SecretBundle) -> AttemptOutcome {
        self.run(&ChangePayload::new(job, secrets)).await.into()
    }
}
