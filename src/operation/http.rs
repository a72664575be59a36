//! Posts each attempt to a helper service over HTTP.
//!
//! The helper answers with `{"success": bool, "error": "..."}`. A non-2xx
//! status, a transport error or `success: false` all count as a failed
//! attempt.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::{AttemptOutcome, ChangeOperation, ChangePayload};
use crate::error::OperationError;
use crate::jobs::JobRecord;
use crate::secrets::SecretBundle;

#[derive(Debug, Deserialize)]
struct HelperResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpOperation {
    client: Client,
    url: String,
}

impl HttpOperation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OperationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn send(&self, payload: &ChangePayload<'_>) -> Result<(), OperationError> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OperationError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<HelperResponse>().await?;
        if body.success {
            Ok(())
        } else {
            Err(OperationError::Rejected(
                body.error.unwrap_or_else(|| "no reason given".to_string()),
            ))
        }
    }
}

impl ChangeOperation for HttpOperation {
    async fn attempt(&self, job: &JobRecord, secrets: &SecretBundle) -> AttemptOutcome {
        self.send(&ChangePayload::new(job, secrets)).await.into()
    }
}
