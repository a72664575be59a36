mod cli;
mod config;
mod error;
mod jobs;
mod ledger;
mod operation;
mod orchestrator;
mod pacing;
mod report;
mod scheduler;
mod secrets;
mod state_machine;
mod ui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::{BatchConfig, Overrides};
use jobs::JobSource;
use orchestrator::{BatchRunner, Readiness, preflight};
use pacing::TokioDelay;
use report::AuditReport;
use secrets::SecretResolver;
use ui::BatchProgress;

fn init_tracing(verbose: bool) {
    let default = if verbose { "credrotate=debug" } else { "credrotate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// Jobs run strictly one after another, so a single-threaded runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config =
        BatchConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Run(args) => {
            config.apply(Overrides::from(args));
            run_batch(config).await
        }
        Command::Check { input, secrets_dir } => {
            config.apply(Overrides {
                input,
                secrets_dir,
                ..Default::default()
            });
            check_batch(&config)
        }
    }
}

async fn run_batch(config: BatchConfig) -> Result<()> {
    config.validate()?;
    let Some(operation) = &config.operation else {
        bail!("no [operation] configured; set one in credrotate.toml");
    };
    let backend = operation.build().context("failed to set up change operation")?;

    let source = JobSource::from_path(&config.input).context("failed to read job input")?;
    info!(input = %config.input.display(), entries = source.len(), "loaded job input");
    if source.is_empty() {
        warn!(input = %config.input.display(), "job input has no entries");
    }
    println!("Accounts found: {}", source.len());

    let policy = config.retry_policy();
    let runner = BatchRunner::new(
        policy,
        config.account_delay(),
        SecretResolver::new(&config.secrets_dir),
        backend,
        TokioDelay,
    );

    let progress = BatchProgress::start(source.len());
    let outcome = runner.run(&source, &progress).await;

    outcome
        .ledger
        .flush(&config.success_file, &config.failed_file)
        .context("failed to write results")?;
    progress.finish(
        &outcome.ledger,
        &config.success_file.display().to_string(),
        &config.failed_file.display().to_string(),
    );

    if let Some(path) = &config.report {
        AuditReport::from_outcome(&outcome, policy, config.account_delay_secs)
            .write(path)
            .context("failed to write audit report")?;
        info!(report = %path.display(), "audit report written");
    }

    Ok(())
}

fn check_batch(config: &BatchConfig) -> Result<()> {
    let source = JobSource::from_path(&config.input).context("failed to read job input")?;
    let resolver = SecretResolver::new(&config.secrets_dir);
    let total = source.len();

    let mut ready = 0;
    for entry in preflight(&source, &resolver) {
        match entry {
            Readiness::Ready { position, login } => {
                ready += 1;
                println!("[{position}/{total}] {login}: ready");
            }
            Readiness::NoSecrets {
                position,
                login,
                reason,
            } => println!("[{position}/{total}] {login}: {reason}"),
            Readiness::Malformed { position } => {
                println!("[{position}/{total}] malformed entry")
            }
        }
    }

    println!("{ready} of {total} entries ready (secrets dir: {})", resolver.dir().display());
    Ok(())
}
