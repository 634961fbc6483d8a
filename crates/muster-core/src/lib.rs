//! Event-sourced unit model for the Muster campaign tracker.
//!
//! Units are never stored directly. The [`TroopManager`] validates each
//! write against the event log, appends the resulting events atomically,
//! and reconstructs point-in-time [`UnitView`](muster_types::UnitView)s by
//! folding events up to a cutoff year.
//!
//! # Architecture
//!
//! ```text
//! CLI / caller
//!     |
//!     +-- TroopManager ------------ writes --> EventStore (muster-store)
//!     |       |
//!     |       +-- ViewBuilder <---- reads ---- EventStore
//!     |       +-- ViewCache      (snapshots, evicted on write)
//!     |       +-- DisplayResolver (catalog keys -> display names)
//!     |       +-- KeyCatalog      (rejects unknown types and promotions)
//!     |
//!     +-- StrengthModel / UnitReport / Roster   (projections over views)
//!     +-- GameCatalog                           (unit types, promotions)
//! ```
//!
//! # Modules
//!
//! - [`manager`] -- Validated writes, queries, and transactions
//! - [`view`] -- The event fold that builds unit views
//! - [`cache`] -- Injectable view cache and its validity rules
//! - [`resolver`] -- Display-name resolution and key validation
//! - [`catalog`] -- JSON game-data catalog
//! - [`strength`] -- Strength aggregation over the hierarchy
//! - [`report`] -- Formation reports and rosters
//! - [`config`] -- YAML configuration
//! - [`error`] -- Error taxonomy

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod manager;
pub mod report;
pub mod resolver;
pub mod strength;
pub mod view;

pub use cache::{CacheStats, CachedView, NoCache, SnapshotCache, ViewCache};
pub use catalog::{GameCatalog, UnitTypeRecord};
pub use config::{ConfigError, LogFormat, MusterConfig, StoreBackend};
pub use error::TroopError;
pub use manager::{DestroyDetails, TroopManager};
pub use report::{Roster, RosterOptions, RosterRow, UnitReport};
pub use resolver::{DisplayResolver, IdentityResolver, KeyCatalog};
pub use strength::StrengthModel;
pub use view::ViewSource;
