//! Error types for unit operations.
//!
//! Every failing operation returns a [`TroopError`] synchronously and leaves
//! the event log exactly as it was before the call.

use muster_store::StoreError;
use muster_types::UnitId;

/// Errors raised by the troop manager, catalog, and projections.
#[derive(Debug, thiserror::Error)]
pub enum TroopError {
    /// A unit, event, composite, promotion, or catalog key does not exist.
    #[error("{what} not found: {id}")]
    NotFound {
        /// What kind of thing was looked up.
        what: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// A write falls outside the unit's lifespan, or a destroy is not last.
    #[error("invalid year {year} for unit {unit_id}: {message}")]
    InvalidTemporalOrder {
        /// The unit being written.
        unit_id: UnitId,
        /// The rejected year.
        year: i64,
        /// Description of the violated ordering rule.
        message: String,
    },

    /// The write would duplicate existing state.
    #[error("duplicate: {0}")]
    DuplicateState(String),

    /// The write would break a structural invariant of the log.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The event store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TroopError {
    /// Shorthand for a missing unit.
    pub fn unit_not_found(unit_id: UnitId) -> Self {
        Self::NotFound {
            what: "unit",
            id: unit_id.to_string(),
        }
    }
}
