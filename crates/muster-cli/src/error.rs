//! Error types for the `muster` binary.
//!
//! [`CliError`] wraps every failure a command can hit so `main` can report
//! it and exit non-zero.

use muster_core::{ConfigError, TroopError};
use muster_store::StoreError;
use muster_types::UnitId;

/// Top-level error for the `muster` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The event store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: StoreError,
    },

    /// A unit operation was rejected.
    #[error("{source}")]
    Troop {
        /// The underlying operation error.
        #[from]
        source: TroopError,
    },

    /// Output could not be rendered.
    #[error("output error: {source}")]
    Output {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The requested unit has no state at the requested year.
    #[error("unit {unit_id} does not exist{}", at_year(*.year))]
    NoView {
        /// The unit asked for.
        unit_id: UnitId,
        /// The cutoff asked for.
        year: Option<i64>,
    },
}

fn at_year(year: Option<i64>) -> String {
    year.map(|y| format!(" in {y}")).unwrap_or_default()
}
