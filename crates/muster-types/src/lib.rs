//! Shared type definitions for the Muster unit ledger.
//!
//! This crate is the single source of truth for the types that flow between
//! the event store, the troop manager, and the command-line front end.
//!
//! # Modules
//!
//! - [`ids`] -- Integer newtypes for unit and event identifiers
//! - [`enums`] -- The fixed, persisted list of event kinds
//! - [`structs`] -- Events, kind-specific payloads, and materialized unit views

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::EventKind;
pub use ids::{EventId, UnitId};
pub use structs::{
    COMPOSITE_UNIT_TYPE, EnemyUnit, EnemyView, EventPayload, HistoryEntry, UnitEvent, UnitView,
    Victory,
};
