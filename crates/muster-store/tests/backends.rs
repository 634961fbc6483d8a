//! Behavioural tests shared by every event store backend.
//!
//! Each scenario is written once against the [`EventStore`] trait and run
//! against both the in-memory store and a `SQLite` file in a temp directory.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing
)]

use muster_store::{EventQuery, EventStore, MemoryEventStore, SqliteEventStore};
use muster_types::{EnemyUnit, EventId, EventKind, EventPayload, UnitId};

fn create(name: &str, unit_type: &str) -> EventPayload {
    EventPayload::Create {
        name: name.to_owned(),
        unit_type: unit_type.to_owned(),
        location: "Memphis".to_owned(),
    }
}

fn ordering_and_filters(store: &mut dyn EventStore) {
    store.append(UnitId(1), -3000, &create("Guard", "Spearman")).unwrap();
    store
        .append(UnitId(2), -3100, &create("", "Composite Unit"))
        .unwrap();
    store
        .append(UnitId(1), -2900, &EventPayload::Assign { composite_id: UnitId(2) })
        .unwrap();
    store
        .append(UnitId(2), -2900, &EventPayload::AssignTo { unit_id: UnitId(1) })
        .unwrap();
    store
        .append(
            UnitId(1),
            -3000,
            &EventPayload::Promote {
                promotion: "Drill I".to_owned(),
            },
        )
        .unwrap();

    let all = store.events(&EventQuery::all()).unwrap();
    let order: Vec<(i64, i64)> = all.iter().map(|e| (e.year, e.id.into_inner())).collect();
    assert_eq!(
        order,
        vec![(-3100, 2), (-3000, 1), (-3000, 5), (-2900, 3), (-2900, 4)]
    );

    let unit1 = store
        .events(&EventQuery::for_unit(UnitId(1)).up_to(Some(-3000)))
        .unwrap();
    assert_eq!(unit1.len(), 2);
    assert!(unit1.iter().all(|e| e.unit_id == UnitId(1) && e.year <= -3000));

    let assigns = store
        .events(&EventQuery::all().of_kinds(&[EventKind::Assign, EventKind::AssignTo]))
        .unwrap();
    assert_eq!(assigns.len(), 2);

    let composites = store
        .unit_ids(&EventQuery::all().of_kinds(&[EventKind::Create]).up_to(Some(-3050)))
        .unwrap();
    assert_eq!(composites.into_iter().collect::<Vec<_>>(), vec![UnitId(2)]);

    assert_eq!(store.year_bounds().unwrap(), Some((-3100, -2900)));
    assert_eq!(store.max_unit_id().unwrap(), Some(UnitId(2)));
    assert_eq!(store.len().unwrap(), 5);
}

fn payloads_survive_storage(store: &mut dyn EventStore) {
    let victory = EventPayload::Victory {
        enemy: EnemyUnit::new("Babylon", "Archer").named("Ishtar's Bows"),
    };
    let id = store.append(UnitId(3), 100, &victory).unwrap();
    let disband = store
        .append(UnitId(3), 101, &EventPayload::Destroy { enemy: None })
        .unwrap();

    assert_eq!(store.event(id).unwrap().map(|e| e.payload), Some(victory));
    assert_eq!(
        store.event(disband).unwrap().map(|e| e.payload),
        Some(EventPayload::Destroy { enemy: None })
    );
    assert_eq!(store.event(EventId(999)).unwrap(), None);
}

fn nested_checkpoints(store: &mut dyn EventStore) {
    store.append(UnitId(1), 0, &create("Kept", "Warrior")).unwrap();

    let outer = store.checkpoint().unwrap();
    store
        .append(UnitId(1), 1, &EventPayload::Move { location: "Thebes".to_owned() })
        .unwrap();
    let inner = store.checkpoint().unwrap();
    store
        .append(UnitId(1), 2, &EventPayload::Move { location: "Giza".to_owned() })
        .unwrap();
    store.rollback_to(inner).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    store.release(outer).unwrap();
    assert_eq!(store.len().unwrap(), 2);

    let outer = store.checkpoint().unwrap();
    store.delete(EventId(1)).unwrap();
    assert_eq!(store.len().unwrap(), 1);
    store.rollback_to(outer).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    assert!(store.event(EventId(1)).unwrap().is_some());
}

fn delete_reports_existence(store: &mut dyn EventStore) {
    let id = store.append(UnitId(1), 0, &create("Once", "Warrior")).unwrap();
    assert!(store.delete(id).unwrap());
    assert!(!store.delete(id).unwrap());
    assert!(store.is_empty().unwrap());
}

fn sqlite_store(dir: &tempfile::TempDir) -> SqliteEventStore {
    SqliteEventStore::open(&dir.path().join("campaign.db")).unwrap()
}

#[test]
fn memory_ordering_and_filters() {
    ordering_and_filters(&mut MemoryEventStore::new());
}

#[test]
fn sqlite_ordering_and_filters() {
    let dir = tempfile::tempdir().unwrap();
    ordering_and_filters(&mut sqlite_store(&dir));
}

#[test]
fn memory_payloads_survive_storage() {
    payloads_survive_storage(&mut MemoryEventStore::new());
}

#[test]
fn sqlite_payloads_survive_storage() {
    let dir = tempfile::tempdir().unwrap();
    payloads_survive_storage(&mut sqlite_store(&dir));
}

#[test]
fn memory_nested_checkpoints() {
    nested_checkpoints(&mut MemoryEventStore::new());
}

#[test]
fn sqlite_nested_checkpoints() {
    nested_checkpoints(&mut SqliteEventStore::open_in_memory().unwrap());
}

#[test]
fn memory_delete_reports_existence() {
    delete_reports_existence(&mut MemoryEventStore::new());
}

#[test]
fn sqlite_delete_reports_existence() {
    let dir = tempfile::tempdir().unwrap();
    delete_reports_existence(&mut sqlite_store(&dir));
}

#[test]
fn sqlite_log_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = sqlite_store(&dir);
        store.append(UnitId(1), -4000, &create("Settlers", "Settler")).unwrap();
    }
    let store = sqlite_store(&dir);
    let events = store.events(&EventQuery::all()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].year, -4000);
    assert_eq!(events[0].kind(), EventKind::Create);
}
