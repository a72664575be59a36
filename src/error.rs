use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Malformed job line {position}: {content}")]
    MalformedLine { position: usize, content: String },

    #[error("No secret material for {login} at {}", path.display())]
    MissingSecrets { login: String, path: PathBuf },

    #[error("Login {login:?} cannot name a secret file")]
    UnsafeLogin { login: String },

    #[error("Invalid secret material at {}: {reason}", path.display())]
    InvalidSecrets { path: PathBuf, reason: String },

    #[error("Ledger write failed for {}: {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a single change attempt did not succeed.
///
/// Every variant is retried the same way by the scheduler; the distinction only
/// shows up in logs and in the audit report.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("helper exited with {code}: {stderr}")]
    ExitStatus { code: String, stderr: String },

    #[error("helper timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("helper returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("change rejected: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
