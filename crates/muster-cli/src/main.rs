//! `muster` -- command-line front end for the unit ledger.
//!
//! Every invocation opens the configured event store and catalog, runs one
//! command, and exits. Writes go through the troop manager, so a rejected
//! command leaves the log untouched and exits non-zero.
//!
//! # Startup Sequence
//!
//! 1. Parse arguments
//! 2. Load configuration from `muster.yaml` (or `--config`)
//! 3. Initialize logging (tracing, text or JSON, to stderr)
//! 4. Open the event store and the catalog
//! 5. Run the command

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use muster_core::config::StoreConfig;
use muster_core::{
    GameCatalog, LogFormat, MusterConfig, NoCache, SnapshotCache, StoreBackend, TroopManager,
    ViewCache,
};
use muster_store::{EventStore, MemoryEventStore, SqliteEventStore};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

/// Troop manager over whichever store and cache the configuration selects.
pub(crate) type Ledger = TroopManager<Box<dyn EventStore>, Box<dyn ViewCache>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = MusterConfig::load_or_default(&cli.config)?;
    if let Some(db) = &cli.db {
        config.store.path.clone_from(db);
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog.path.clone_from(catalog);
    }

    init_logging(&config, cli.verbose);
    tracing::debug!(
        config = %cli.config.display(),
        backend = ?config.store.backend,
        db = %config.store.path.display(),
        catalog = %config.catalog.path.display(),
        "configuration loaded"
    );

    let mut catalog = GameCatalog::open_or_empty(&config.catalog.path)?;
    let cache: Box<dyn ViewCache> = if config.cache.enabled {
        Box::new(SnapshotCache::new())
    } else {
        Box::new(NoCache)
    };
    let mut ledger = Ledger::with_cache(open_store(&config.store)?, cache)
        .with_resolver(catalog.clone())
        .with_key_catalog(catalog.clone());

    commands::execute(cli.command, &mut ledger, &mut catalog)
}

fn init_logging(config: &MusterConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

fn open_store(config: &StoreConfig) -> Result<Box<dyn EventStore>, CliError> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Box::new(SqliteEventStore::open(&config.path)?)),
        StoreBackend::Memory => {
            tracing::warn!("memory backend selected, events will not outlive this command");
            Ok(Box::new(MemoryEventStore::new()))
        }
    }
}
