//! Event storage for the Muster unit ledger.
//!
//! The log is the only persisted state. Every backend implements the
//! [`EventStore`] trait: append-only writes with store-assigned ids, reads
//! filtered by unit, year range, and kind in `(year, event_id)` order, and
//! nested checkpoints so a multi-event write is all-or-nothing.
//!
//! # Backends
//!
//! ```text
//! TroopManager
//!     |
//!     +-- EventStore (trait)
//!         |-- MemoryEventStore   (tests, scratch campaigns)
//!         +-- SqliteEventStore   (durable file, savepoint transactions)
//! ```
//!
//! # Modules
//!
//! - [`event_store`] -- The store trait, queries, and checkpoints
//! - [`memory`] -- In-memory backend
//! - [`sqlite`] -- `SQLite` backend
//! - [`error`] -- Shared error types

pub mod error;
pub mod event_store;
pub mod memory;
pub mod sqlite;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use event_store::{Checkpoint, EventQuery, EventStore};
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
