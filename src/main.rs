//! `strato`: maintenance CLI for the versioned cache layer.
//!
//! Consumed by operator scripts and CI/CD post-deploy hooks: `clear` for
//! manual invalidation, `keys` for key-space inspection, `health` as a
//! deployment gate. Exits zero on success, non-zero with a readable message
//! on failure.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use strato::cache::{Maintenance, UnknownNamespace};
use strato::config::{self, CliArgs, Command, LoadError};
use strato::store::{RedisStore, StoreAdapter, StoreError, TimedStore};
use strato::telemetry::{self, TelemetryError};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    UnknownNamespace(#[from] UnknownNamespace),
    #[error("clear completed partially; some keys were left behind")]
    PartialClear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("strato: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CliArgs) -> Result<(), CliError> {
    let settings = config::load(&cli)?;
    telemetry::init(&settings.logging)?;

    let store: Arc<dyn StoreAdapter> = Arc::new(TimedStore::new(
        RedisStore::connect(&settings.store.url).await?,
        settings.store.timeouts,
    ));
    let registry = Arc::new(settings.registry());
    let maintenance = Maintenance::new(store, registry, settings.invalidation.sweep_options());

    match cli.command {
        Command::Clear { namespace } => {
            let outcomes = maintenance.clear(namespace.as_deref()).await?;
            for outcome in &outcomes {
                let suffix = if outcome.complete { "" } else { " (partial)" };
                println!(
                    "{}: {} keys deleted{suffix}",
                    outcome.namespace, outcome.deleted
                );
            }
            if outcomes.iter().any(|outcome| !outcome.complete) {
                return Err(CliError::PartialClear);
            }
        }
        Command::Keys { pattern } => {
            let pattern = pattern.unwrap_or_else(|| "*".to_string());
            for key in maintenance.list_keys(&pattern).await? {
                println!("{key}");
            }
        }
        Command::Health => {
            let report = maintenance.health().await?;
            println!("ok: store round-trip {}ms", report.latency.as_millis());
        }
    }

    Ok(())
}
