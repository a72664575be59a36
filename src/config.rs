//! Batch configuration loaded from `credrotate.toml`.
//!
//! [`BatchConfig`] holds every batch-wide setting. Missing keys fall back to
//! defaults, `CREDROTATE_SECRETS_DIR` overrides the secrets directory, and
//! command-line flags ([`Overrides`]) win over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BatchError, OperationError};
use crate::operation::{Backend, CommandOperation, HttpOperation};
use crate::secrets::DEFAULT_SECRETS_DIR;
use crate::state_machine::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "credrotate.toml";
pub const SECRETS_DIR_ENV: &str = "CREDROTATE_SECRETS_DIR";

/// How each attempt reaches the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OperationConfig {
    /// Spawn a helper program per attempt.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// POST each attempt to a helper service.
    Http {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl OperationConfig {
    pub fn build(&self) -> Result<Backend, OperationError> {
        Ok(match self {
            OperationConfig::Command {
                program,
                args,
                timeout_secs,
            } => Backend::Command(CommandOperation::new(
                program.clone(),
                args.clone(),
                Duration::from_secs(*timeout_secs),
            )),
            OperationConfig::Http { url, timeout_secs } => Backend::Http(HttpOperation::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        })
    }
}

/// Absolute form of an output path with its parent resolved where it exists,
/// so `./success.txt` and `success.txt` compare equal.
fn destination_key(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .unwrap_or_else(|_| parent.to_path_buf())
            .join(name),
        _ => absolute,
    }
}

/// Top-level configuration loaded from `credrotate.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Job input file, one `login:old:new` entry per line.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    #[serde(default = "default_success_file")]
    pub success_file: PathBuf,

    #[serde(default = "default_failed_file")]
    pub failed_file: PathBuf,

    /// Directory holding `<login>.maFile` documents.
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: PathBuf,

    /// Attempts per job, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts of the same job.
    #[serde(default = "default_attempt_delay_secs")]
    pub attempt_delay_secs: u64,

    /// Pause between two accounts.
    #[serde(default = "default_account_delay_secs")]
    pub account_delay_secs: u64,

    /// Optional JSON audit report destination.
    #[serde(default)]
    pub report: Option<PathBuf>,

    #[serde(default)]
    pub operation: Option<OperationConfig>,
}

fn default_input() -> PathBuf {
    PathBuf::from("logpass.txt")
}

fn default_success_file() -> PathBuf {
    PathBuf::from("success.txt")
}

fn default_failed_file() -> PathBuf {
    PathBuf::from("failed.txt")
}

fn default_secrets_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SECRETS_DIR)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_attempt_delay_secs() -> u64 {
    5
}

fn default_account_delay_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            success_file: default_success_file(),
            failed_file: default_failed_file(),
            secrets_dir: default_secrets_dir(),
            max_attempts: default_max_attempts(),
            attempt_delay_secs: default_attempt_delay_secs(),
            account_delay_secs: default_account_delay_secs(),
            report: None,
            operation: None,
        }
    }
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub success_file: Option<PathBuf>,
    pub failed_file: Option<PathBuf>,
    pub secrets_dir: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub attempt_delay_secs: Option<u64>,
    pub account_delay_secs: Option<u64>,
    pub report: Option<PathBuf>,
}

impl BatchConfig {
    /// Loads `path`, or `credrotate.toml` in the current directory when no
    /// path is given. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, BatchError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = if path.exists() || required {
            let contents = std::fs::read_to_string(&path).map_err(|source| BatchError::Io {
                path: path.clone(),
                source,
            })?;
            Self::from_toml(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file for the secrets directory.
        if let Ok(dir) = std::env::var(SECRETS_DIR_ENV)
            && !dir.is_empty()
        {
            config.secrets_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, BatchError> {
        Ok(toml::from_str::<BatchConfig>(contents)?)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.input {
            self.input = v;
        }
        if let Some(v) = overrides.success_file {
            self.success_file = v;
        }
        if let Some(v) = overrides.failed_file {
            self.failed_file = v;
        }
        if let Some(v) = overrides.secrets_dir {
            self.secrets_dir = v;
        }
        if let Some(v) = overrides.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = overrides.attempt_delay_secs {
            self.attempt_delay_secs = v;
        }
        if let Some(v) = overrides.account_delay_secs {
            self.account_delay_secs = v;
        }
        if overrides.report.is_some() {
            self.report = overrides.report;
        }
    }

    /// Rejects settings the batch cannot run with.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_attempts == 0 {
            return Err(BatchError::Config("max_attempts must be at least 1".into()));
        }
        if destination_key(&self.success_file) == destination_key(&self.failed_file) {
            return Err(BatchError::Config(
                "success_file and failed_file must differ".into(),
            ));
        }
        match &self.operation {
            Some(OperationConfig::Command { program, .. }) if program.trim().is_empty() => Err(
                BatchError::Config("operation.program must not be empty".into()),
            ),
            Some(OperationConfig::Http { url, .. }) if url.trim().is_empty() => Err(
                BatchError::Config("operation.url must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_delay: Duration::from_secs(self.attempt_delay_secs),
        }
    }

    pub fn account_delay(&self) -> Duration {
        Duration::from_secs(self.account_delay_secs)
    }
}
