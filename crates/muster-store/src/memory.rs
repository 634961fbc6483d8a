//! In-memory event store.
//!
//! The [`MemoryEventStore`] keeps the whole log in a [`BTreeMap`] keyed by
//! event id. It is the backend used by tests and by the `memory` config
//! setting; nothing survives the process.
//!
//! While a checkpoint is open every append and delete is journaled. Rolling
//! back replays the journal in reverse down to the checkpoint's mark, so a
//! checkpoint costs nothing beyond the writes it covers.

use std::collections::{BTreeMap, BTreeSet};

use muster_types::{EventId, EventPayload, UnitEvent, UnitId};

use crate::error::StoreError;
use crate::event_store::{Checkpoint, EventQuery, EventStore};

/// One journaled write, undone on rollback.
#[derive(Debug, Clone)]
enum Undo {
    Appended(EventId),
    Deleted(UnitEvent),
}

/// Where the journal and id counter stood when a checkpoint was opened.
#[derive(Debug, Clone, Copy)]
struct Mark {
    journal_len: usize,
    next_id: i64,
}

/// Append-only event log held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryEventStore {
    /// All events, keyed by id.
    events: BTreeMap<EventId, UnitEvent>,
    /// Next id to hand out. Ids are never reused, even after deletion.
    next_id: i64,
    /// Open checkpoints, innermost last.
    marks: Vec<Mark>,
    /// Writes made while any checkpoint is open.
    journal: Vec<Undo>,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            next_id: 1,
            marks: Vec::new(),
            journal: Vec::new(),
        }
    }

    fn record(&mut self, undo: Undo) {
        if !self.marks.is_empty() {
            self.journal.push(undo);
        }
    }

    fn check_innermost(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if checkpoint.depth() == self.marks.len() {
            Ok(())
        } else {
            Err(StoreError::CheckpointMismatch {
                requested: checkpoint.depth(),
                open: self.marks.len(),
            })
        }
    }
}

impl EventStore for MemoryEventStore {
    fn append(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: &EventPayload,
    ) -> Result<EventId, StoreError> {
        let id = EventId(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or(StoreError::IdExhausted)?;
        self.events.insert(
            id,
            UnitEvent {
                id,
                unit_id,
                year,
                payload: payload.clone(),
            },
        );
        self.record(Undo::Appended(id));
        tracing::trace!(event_id = %id, unit_id = %unit_id, year, kind = %payload.kind(), "event appended");
        Ok(id)
    }

    fn events(&self, query: &EventQuery) -> Result<Vec<UnitEvent>, StoreError> {
        let mut out: Vec<UnitEvent> = self
            .events
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        out.sort_by_key(UnitEvent::order_key);
        Ok(out)
    }

    fn event(&self, id: EventId) -> Result<Option<UnitEvent>, StoreError> {
        Ok(self.events.get(&id).cloned())
    }

    fn unit_ids(&self, query: &EventQuery) -> Result<BTreeSet<UnitId>, StoreError> {
        Ok(self
            .events
            .values()
            .filter(|e| query.matches(e))
            .map(|e| e.unit_id)
            .collect())
    }

    fn delete(&mut self, id: EventId) -> Result<bool, StoreError> {
        let Some(removed) = self.events.remove(&id) else {
            return Ok(false);
        };
        self.record(Undo::Deleted(removed));
        Ok(true)
    }

    fn year_bounds(&self) -> Result<Option<(i64, i64)>, StoreError> {
        let mut years = self.events.values().map(|e| e.year);
        Ok(years.next().map(|first| {
            years.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)))
        }))
    }

    fn max_unit_id(&self) -> Result<Option<UnitId>, StoreError> {
        Ok(self.events.values().map(|e| e.unit_id).max())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.events.len())
    }

    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        self.marks.push(Mark {
            journal_len: self.journal.len(),
            next_id: self.next_id,
        });
        Ok(Checkpoint::new(self.marks.len()))
    }

    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_innermost(&checkpoint)?;
        self.marks.pop();
        // An enclosing checkpoint may still roll these writes back.
        if self.marks.is_empty() {
            self.journal.clear();
        }
        Ok(())
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_innermost(&checkpoint)?;
        let Some(mark) = self.marks.pop() else {
            return Ok(());
        };
        while self.journal.len() > mark.journal_len {
            match self.journal.pop() {
                Some(Undo::Appended(id)) => {
                    self.events.remove(&id);
                }
                Some(Undo::Deleted(event)) => {
                    self.events.insert(event.id, event);
                }
                None => break,
            }
        }
        self.next_id = mark.next_id;
        Ok(())
    }
}
