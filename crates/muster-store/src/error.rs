//! Error types for the event store.
//!
//! All errors are propagated via [`StoreError`] which wraps the underlying
//! [`rusqlite`] and [`serde_json`] errors with additional context about
//! which operation failed.

use muster_types::EventId;

/// Errors that can occur in the event store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row carries an `event_type_id` outside the known kind list.
    #[error("event {event_id} has unknown event type id {type_id}")]
    UnknownEventType {
        /// The offending event.
        event_id: EventId,
        /// The unrecognized type id.
        type_id: i64,
    },

    /// A checkpoint was released or rolled back out of nesting order.
    #[error("checkpoint {requested} is not the innermost open checkpoint (depth {open})")]
    CheckpointMismatch {
        /// Depth of the checkpoint passed in.
        requested: usize,
        /// Number of currently open checkpoints.
        open: usize,
    },

    /// Too many checkpoints are open at once.
    #[error("checkpoint nesting depth exhausted")]
    CheckpointOverflow,

    /// A row count reported by the backend does not fit in `usize`.
    #[error("backend reported an invalid row count {count}")]
    InvalidCount {
        /// The count as returned by the backend.
        count: i64,
    },

    /// The store ran out of identifiers.
    #[error("event id space exhausted")]
    IdExhausted,
}
