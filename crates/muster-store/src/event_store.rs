//! The event store contract shared by every backend.
//!
//! Events are the source of truth for a campaign's unit history. Every
//! state change produces an immutable event; nothing is updated in place.
//! A backend only has to append, filter in `(year, event_id)` order,
//! delete by id, and provide nested checkpoints so multi-event writes are
//! all-or-nothing.

use std::collections::BTreeSet;

use muster_types::{EventId, EventKind, EventPayload, UnitEvent, UnitId};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Filter for event and unit-id queries.
///
/// Every filter is optional; an empty query matches the whole log. Year
/// bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Only events of this unit.
    pub unit_id: Option<UnitId>,
    /// Only events at or after this year.
    pub min_year: Option<i64>,
    /// Only events at or before this year.
    pub max_year: Option<i64>,
    /// Only events of these kinds (empty = any kind).
    pub kinds: Vec<EventKind>,
}

impl EventQuery {
    /// Match every event.
    pub const fn all() -> Self {
        Self {
            unit_id: None,
            min_year: None,
            max_year: None,
            kinds: Vec::new(),
        }
    }

    /// Match the events of one unit.
    pub const fn for_unit(unit_id: UnitId) -> Self {
        Self {
            unit_id: Some(unit_id),
            min_year: None,
            max_year: None,
            kinds: Vec::new(),
        }
    }

    /// Restrict to events at or before `year` (`None` leaves it unbounded).
    #[must_use]
    pub const fn up_to(mut self, year: Option<i64>) -> Self {
        self.max_year = year;
        self
    }

    /// Restrict to events at or after `year`.
    #[must_use]
    pub const fn from_year(mut self, year: i64) -> Self {
        self.min_year = Some(year);
        self
    }

    /// Restrict to the given kinds.
    #[must_use]
    pub fn of_kinds(mut self, kinds: &[EventKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Whether `event` passes every filter of this query.
    pub fn matches(&self, event: &UnitEvent) -> bool {
        self.unit_id.is_none_or(|id| event.unit_id == id)
            && self.min_year.is_none_or(|min| event.year >= min)
            && self.max_year.is_none_or(|max| event.year <= max)
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind()))
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Handle to an open transactional scope.
///
/// Checkpoints nest: the innermost one must be released or rolled back
/// before any outer one.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open checkpoint must be released or rolled back"]
pub struct Checkpoint {
    depth: usize,
}

impl Checkpoint {
    /// Create a handle for the given nesting depth (1 = outermost).
    pub(crate) const fn new(depth: usize) -> Self {
        Self { depth }
    }

    /// Nesting depth of this checkpoint (1 = outermost).
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Durable, ordered, append-only log of unit events.
pub trait EventStore {
    /// Append an event and return its store-assigned id.
    fn append(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: &EventPayload,
    ) -> Result<EventId, StoreError>;

    /// Events matching `query`, ordered by `(year, event_id)`.
    fn events(&self, query: &EventQuery) -> Result<Vec<UnitEvent>, StoreError>;

    /// A single event by id.
    fn event(&self, id: EventId) -> Result<Option<UnitEvent>, StoreError>;

    /// Distinct unit ids among the events matching `query`.
    fn unit_ids(&self, query: &EventQuery) -> Result<BTreeSet<UnitId>, StoreError>;

    /// Delete one event. Returns whether it existed.
    fn delete(&mut self, id: EventId) -> Result<bool, StoreError>;

    /// Smallest and largest year across all events, if any exist.
    fn year_bounds(&self) -> Result<Option<(i64, i64)>, StoreError>;

    /// Largest unit id present in the log.
    fn max_unit_id(&self) -> Result<Option<UnitId>, StoreError>;

    /// Total number of stored events.
    fn len(&self) -> Result<usize, StoreError>;

    /// Whether the log holds no events.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Open a nested transactional scope.
    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError>;

    /// Keep every write made since `checkpoint` and close the scope.
    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Discard every write made since `checkpoint` and close the scope.
    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError>;
}

impl<S: EventStore + ?Sized> EventStore for Box<S> {
    fn append(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: &EventPayload,
    ) -> Result<EventId, StoreError> {
        (**self).append(unit_id, year, payload)
    }

    fn events(&self, query: &EventQuery) -> Result<Vec<UnitEvent>, StoreError> {
        (**self).events(query)
    }

    fn event(&self, id: EventId) -> Result<Option<UnitEvent>, StoreError> {
        (**self).event(id)
    }

    fn unit_ids(&self, query: &EventQuery) -> Result<BTreeSet<UnitId>, StoreError> {
        (**self).unit_ids(query)
    }

    fn delete(&mut self, id: EventId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn year_bounds(&self) -> Result<Option<(i64, i64)>, StoreError> {
        (**self).year_bounds()
    }

    fn max_unit_id(&self) -> Result<Option<UnitId>, StoreError> {
        (**self).max_unit_id()
    }

    fn len(&self) -> Result<usize, StoreError> {
        (**self).len()
    }

    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        (**self).checkpoint()
    }

    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        (**self).release(checkpoint)
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        (**self).rollback_to(checkpoint)
    }
}
