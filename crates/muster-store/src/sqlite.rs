//! `SQLite` event store.
//!
//! One table holds the whole log. The kind of each event is stored as an
//! integer `event_type_id` and the kind-specific body as JSON text, so the
//! schema never changes when a payload gains a field.
//!
//! Statements outside an open checkpoint autocommit. Checkpoints map to
//! `SQLite` savepoints, which nest natively.

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use muster_types::{EventId, EventKind, EventPayload, UnitEvent, UnitId};

use crate::error::StoreError;
use crate::event_store::{Checkpoint, EventQuery, EventStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS unit_events (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    event_type_id INTEGER NOT NULL,
    event_payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_unit_events_unit_year
    ON unit_events(unit_id, year, event_id);
";

const SELECT_COLUMNS: &str =
    "SELECT event_id, unit_id, year, event_type_id, event_payload FROM unit_events";

/// A row as read from `unit_events`, before payload decoding.
struct RawEvent {
    event_id: i64,
    unit_id: i64,
    year: i64,
    type_id: i64,
    payload: String,
}

impl RawEvent {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            event_id: row.get(0)?,
            unit_id: row.get(1)?,
            year: row.get(2)?,
            type_id: row.get(3)?,
            payload: row.get(4)?,
        })
    }

    fn decode(self) -> Result<UnitEvent, StoreError> {
        let id = EventId(self.event_id);
        let kind = EventKind::from_type_id(self.type_id).ok_or(StoreError::UnknownEventType {
            event_id: id,
            type_id: self.type_id,
        })?;
        let body: serde_json::Value = serde_json::from_str(&self.payload)?;
        Ok(UnitEvent {
            id,
            unit_id: UnitId(self.unit_id),
            year: self.year,
            payload: EventPayload::from_body(kind, body)?,
        })
    }
}

/// Build the `WHERE` clause and bound arguments for a query.
fn where_clause(query: &EventQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(unit_id) = query.unit_id {
        clauses.push("unit_id = ?".to_owned());
        args.push(Value::Integer(unit_id.into_inner()));
    }
    if let Some(min) = query.min_year {
        clauses.push("year >= ?".to_owned());
        args.push(Value::Integer(min));
    }
    if let Some(max) = query.max_year {
        clauses.push("year <= ?".to_owned());
        args.push(Value::Integer(max));
    }
    if !query.kinds.is_empty() {
        let marks = vec!["?"; query.kinds.len()].join(", ");
        clauses.push(format!("event_type_id IN ({marks})"));
        args.extend(query.kinds.iter().map(|k| Value::Integer(k.type_id())));
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

/// Event store backed by a `SQLite` database file.
#[derive(Debug)]
pub struct SqliteEventStore {
    conn: Connection,
    /// Number of savepoints currently open.
    depth: usize,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened event database");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, depth: 0 })
    }

    fn check_innermost(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if checkpoint.depth() == self.depth {
            Ok(())
        } else {
            Err(StoreError::CheckpointMismatch {
                requested: checkpoint.depth(),
                open: self.depth,
            })
        }
    }
}

impl EventStore for SqliteEventStore {
    fn append(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: &EventPayload,
    ) -> Result<EventId, StoreError> {
        let body = serde_json::to_string(&payload.to_body()?)?;
        self.conn.execute(
            "INSERT INTO unit_events (unit_id, year, event_type_id, event_payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![unit_id.into_inner(), year, payload.kind().type_id(), body],
        )?;
        let id = EventId(self.conn.last_insert_rowid());
        tracing::trace!(event_id = %id, unit_id = %unit_id, year, kind = %payload.kind(), "event appended");
        Ok(id)
    }

    fn events(&self, query: &EventQuery) -> Result<Vec<UnitEvent>, StoreError> {
        let (filter, args) = where_clause(query);
        let sql = format!("{SELECT_COLUMNS}{filter} ORDER BY year, event_id");
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params_from_iter(args.iter()), RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawEvent::decode).collect()
    }

    fn event(&self, id: EventId) -> Result<Option<UnitEvent>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE event_id = ?1"),
                params![id.into_inner()],
                RawEvent::from_row,
            )
            .optional()?;
        raw.map(RawEvent::decode).transpose()
    }

    fn unit_ids(&self, query: &EventQuery) -> Result<BTreeSet<UnitId>, StoreError> {
        let (filter, args) = where_clause(query);
        let sql = format!("SELECT DISTINCT unit_id FROM unit_events{filter}");
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(args.iter()), |row| row.get::<_, i64>(0))?
            .map(|r| r.map(UnitId))
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(ids)
    }

    fn delete(&mut self, id: EventId) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM unit_events WHERE event_id = ?1",
            params![id.into_inner()],
        )?;
        tracing::debug!(event_id = %id, removed, "event delete");
        Ok(removed > 0)
    }

    fn year_bounds(&self) -> Result<Option<(i64, i64)>, StoreError> {
        let (lo, hi) = self.conn.query_row(
            "SELECT MIN(year), MAX(year) FROM unit_events",
            [],
            |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, Option<i64>>(1)?)),
        )?;
        Ok(lo.zip(hi))
    }

    fn max_unit_id(&self) -> Result<Option<UnitId>, StoreError> {
        let max = self.conn.query_row("SELECT MAX(unit_id) FROM unit_events", [], |row| {
            row.get::<_, Option<i64>>(0)
        })?;
        Ok(max.map(UnitId))
    }

    fn len(&self) -> Result<usize, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM unit_events", [], |row| row.get::<_, i64>(0))?;
        row_count(count)
    }

    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        let depth = next_depth(self.depth)?;
        self.conn.execute_batch(&format!("SAVEPOINT muster_{depth}"))?;
        self.depth = depth;
        Ok(Checkpoint::new(depth))
    }

    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_innermost(&checkpoint)?;
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT muster_{}", checkpoint.depth()))?;
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_innermost(&checkpoint)?;
        let depth = checkpoint.depth();
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT muster_{depth}; RELEASE SAVEPOINT muster_{depth};"
        ))?;
        self.depth = self.depth.saturating_sub(1);
        tracing::debug!(depth, "rolled back to checkpoint");
        Ok(())
    }
}

fn row_count(count: i64) -> Result<usize, StoreError> {
    usize::try_from(count).map_err(|_| StoreError::InvalidCount { count })
}

fn next_depth(depth: usize) -> Result<usize, StoreError> {
    depth.checked_add(1).ok_or(StoreError::CheckpointOverflow)
}
