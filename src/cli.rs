//! Command-line interface built on clap.
//!
//! [`Cli`] carries the global flags (`--config`, `--verbose`) and the
//! [`Command`] to run: `run` processes a batch, `check` only verifies that
//! every job has usable secret material.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

/// Sequential batch password rotation with bounded retries.
#[derive(Debug, Parser)]
#[command(name = "credrotate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./credrotate.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process every job in the input file.
    Run(RunArgs),

    /// Validate the input and secret material without changing anything.
    Check {
        /// Job file with `login:old_password:new_password` lines.
        input: Option<PathBuf>,

        /// Directory holding `<login>.maFile` documents.
        #[arg(long, env = "CREDROTATE_SECRETS_DIR")]
        secrets_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Job file with `login:old_password:new_password` lines.
    pub input: Option<PathBuf>,

    /// Maximum attempts per account.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Pause in seconds between attempts.
    #[arg(long)]
    pub attempt_delay: Option<u64>,

    /// Pause in seconds between accounts.
    #[arg(long)]
    pub account_delay: Option<u64>,

    #[arg(long)]
    pub success_file: Option<PathBuf>,

    #[arg(long)]
    pub failed_file: Option<PathBuf>,

    /// Directory holding `<login>.maFile` documents.
    #[arg(long, env = "CREDROTATE_SECRETS_DIR")]
    pub secrets_dir: Option<PathBuf>,

    /// Write a JSON audit report of the run to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Self {
            input: args.input,
            success_file: args.success_file,
            failed_file: args.failed_file,
            secrets_dir: args.secrets_dir,
            max_attempts: args.max_attempts,
            attempt_delay_secs: args.attempt_delay,
            account_delay_secs: args.account_delay,
            report: args.report,
        }
    }
}
