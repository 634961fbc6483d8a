//! View cache behavior and transactional writes.
//!
//! The cache must never serve a view that differs from a fresh fold of the
//! log, and failed units of work must leave both the log and the cache as
//! they were.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use muster_core::{
    CachedView, IdentityResolver, NoCache, SnapshotCache, TroopError, TroopManager, ViewCache,
};
use muster_store::{EventStore, MemoryEventStore, SqliteEventStore};
use muster_types::{COMPOSITE_UNIT_TYPE, UnitId, UnitView};

/// Snapshot cache that also records every eviction it is asked for.
#[derive(Default)]
struct RecordingCache {
    inner: SnapshotCache,
    evicted: Vec<UnitId>,
    cleared: usize,
}

impl ViewCache for RecordingCache {
    fn lookup(&mut self, unit_id: UnitId, year: Option<i64>) -> Option<CachedView> {
        self.inner.lookup(unit_id, year)
    }

    fn store(&mut self, unit_id: UnitId, entry: CachedView) {
        self.inner.store(unit_id, entry);
    }

    fn invalidate(&mut self, unit_id: UnitId) {
        self.evicted.push(unit_id);
        self.inner.invalidate(unit_id);
    }

    fn clear(&mut self) {
        self.cleared += 1;
        self.inner.clear();
    }
}

/// A view folded straight from the log, bypassing the cache.
fn fresh<S: EventStore, C: ViewCache>(
    m: &TroopManager<S, C>,
    unit_id: UnitId,
    year: Option<i64>,
) -> Option<UnitView> {
    m.build_unit_view_with(unit_id, year, &IdentityResolver)
        .unwrap()
}

fn evicted_since(m: &TroopManager<MemoryEventStore, RecordingCache>, mark: usize) -> Vec<UnitId> {
    let mut ids = m.cache().evicted[mark..].to_vec();
    ids.sort();
    ids.dedup();
    ids
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn second_read_is_a_hit() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();

    m.get_unit_view(a, None).unwrap();
    let after_first = m.cache().stats();
    m.get_unit_view(a, None).unwrap();
    let after_second = m.cache().stats();

    assert_eq!(after_second.hits, after_first.hits + 1);
    assert_eq!(after_second.misses, after_first.misses);
}

#[test]
fn latest_snapshot_serves_years_after_its_last_event() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    m.move_unit(a, -3000, "Lyon").unwrap();

    m.get_unit_view(a, None).unwrap();
    let hits = m.cache().stats().hits;

    // Any cutoff after the last event is answered by the same snapshot.
    let view = m.get_unit_view(a, Some(-2000)).unwrap().unwrap();
    assert_eq!(view.location, "Lyon");
    assert_eq!(m.cache().stats().hits, hits + 1);

    // An earlier cutoff is rebuilt and still correct.
    let early = m.get_unit_view(a, Some(-3500)).unwrap().unwrap();
    assert_eq!(early.location, "Paris");
    assert_eq!(m.cache().stats().hits, hits + 1);
}

#[test]
fn every_write_evicts_the_unit() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    assert_eq!(m.get_unit_view(a, None).unwrap().unwrap().name, "A");
    assert!(m.cache().entry(a).is_some());

    m.rename_unit(a, -3900, "Guard").unwrap();
    assert!(m.cache().entry(a).is_none());
    assert_eq!(m.get_unit_view(a, None).unwrap().unwrap().name, "Guard");
}

#[test]
fn writes_evict_units_linked_by_assignment() {
    let mut m = TroopManager::with_cache(MemoryEventStore::new(), RecordingCache::default());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    let c = m.create_unit(-4000, "C", "Archer", "Paris").unwrap();
    m.assign_unit_to_composite(a, -3900, b).unwrap();

    let mark = m.cache().evicted.len();
    m.rename_unit(a, -3800, "Guard").unwrap();
    assert_eq!(evicted_since(&m, mark), vec![a, b]);

    let mark = m.cache().evicted.len();
    m.rename_unit(b, -3800, "Corps").unwrap();
    assert_eq!(evicted_since(&m, mark), vec![a, b]);

    let mark = m.cache().evicted.len();
    m.move_unit(c, -3800, "Lyon").unwrap();
    assert_eq!(evicted_since(&m, mark), vec![c]);
}

#[test]
fn renaming_a_composite_reaches_its_members_history() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    m.assign_unit_to_composite(a, -3900, b).unwrap();

    let texts = |v: &UnitView| v.history.iter().map(|h| h.text.clone()).collect::<Vec<_>>();
    let before = m.get_unit_view(a, None).unwrap().unwrap();
    assert!(texts(&before).contains(&"assigned to 'B'".to_owned()));

    m.rename_unit(b, -3000, "Corps").unwrap();
    let after = m.get_unit_view(a, None).unwrap().unwrap();
    assert!(texts(&after).contains(&"assigned to 'Corps'".to_owned()));
    assert_eq!(Some(after), fresh(&m, a, None));
}

#[test]
fn cached_reads_always_match_a_fresh_fold() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    let c = m
        .create_unit(-3900, "C", COMPOSITE_UNIT_TYPE, "Lyon")
        .unwrap();
    let years = [None, Some(-4000), Some(-3850), Some(-3500), Some(-3000), Some(-2000)];

    let check = |m: &TroopManager<MemoryEventStore>| {
        for unit in [a, b, c] {
            for year in years {
                // Read twice so the second read can come from the cache.
                let first = m.get_unit_view(unit, year).unwrap();
                let second = m.get_unit_view(unit, year).unwrap();
                let expected = fresh(m, unit, year);
                assert_eq!(first, expected, "unit {unit} year {year:?}");
                assert_eq!(second, expected, "unit {unit} year {year:?}");
            }
        }
    };

    check(&m);
    m.assign_unit_to_composite(a, -3850, b).unwrap();
    check(&m);
    m.rename_unit(b, -3500, "First Corps").unwrap();
    check(&m);
    m.assign_unit_to_composite(a, -3000, c).unwrap();
    check(&m);
    m.rename_unit(a, -2500, "Veterans").unwrap();
    check(&m);
    m.assign_unit_to_composite(b, -2400, c).unwrap();
    check(&m);
    m.destroy_unit(c, -2000, "Rome", "Legion").unwrap();
    check(&m);
}

#[test]
fn disabled_cache_still_answers_correctly() {
    let mut m = TroopManager::with_cache(MemoryEventStore::new(), NoCache);
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    m.move_unit(a, -3000, "Lyon").unwrap();

    assert_eq!(m.get_unit_view(a, None).unwrap(), fresh(&m, a, None));
    assert_eq!(
        m.get_unit_view(a, Some(-3500)).unwrap().map(|v| v.location),
        Some("Paris".to_owned())
    );
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[test]
fn failed_transaction_discards_its_writes_and_clears_the_cache() {
    let mut m = TroopManager::with_cache(MemoryEventStore::new(), RecordingCache::default());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    m.get_unit_view(a, None).unwrap();
    let before = m.store().len().unwrap();

    let result = m.transaction(|m| {
        m.move_unit(a, -3000, "Lyon")?;
        m.promote_unit(a, -2900, "Combat I")?;
        m.promote_unit(a, -2800, "Combat I")
    });

    assert!(matches!(result, Err(TroopError::DuplicateState(_))));
    assert_eq!(m.store().len().unwrap(), before);
    assert!(m.cache().cleared > 0);
    let view = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(view.location, "Paris");
    assert!(view.promotions.is_empty());
}

#[test]
fn inner_failure_can_be_absorbed_by_the_outer_transaction() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let before = m.store().len().unwrap();

    m.transaction(|m| {
        m.move_unit(a, -3000, "Lyon")?;
        let inner = m.transaction(|m| {
            m.move_unit(a, -2900, "Nice")?;
            Err::<(), _>(TroopError::InvariantViolation("abandoned".to_owned()))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .unwrap();

    assert_eq!(m.store().len().unwrap(), before + 1);
    assert_eq!(
        m.get_unit_view(a, None).unwrap().map(|v| v.location),
        Some("Lyon".to_owned())
    );
}

#[test]
fn rejected_destroy_leaves_subordinates_attached() {
    let mut m = TroopManager::new(MemoryEventStore::new());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    m.assign_unit_to_composite(a, -3900, b).unwrap();
    m.move_unit(b, -3000, "Lyon").unwrap();
    let before = m.store().len().unwrap();

    assert!(matches!(
        m.destroy_unit(b, -3500, "Rome", "Legion"),
        Err(TroopError::InvalidTemporalOrder { .. })
    ));
    assert_eq!(m.store().len().unwrap(), before);
    assert_eq!(
        m.get_unit_view(a, None).unwrap().unwrap().composite_unit_id,
        Some(b)
    );
}

#[test]
fn sqlite_rollback_matches_memory_rollback() {
    let mut m = TroopManager::new(SqliteEventStore::open_in_memory().unwrap());
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    let before = m.store().len().unwrap();

    let result = m.transaction(|m| {
        m.assign_unit_to_composite(a, -3900, b)?;
        m.rename_unit(b, -3800, "Corps")?;
        m.unit_history(a, -5000, "too early")
    });

    assert!(matches!(
        result,
        Err(TroopError::InvalidTemporalOrder { year: -5000, .. })
    ));
    assert_eq!(m.store().len().unwrap(), before);
    assert!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units.is_empty());
}

#[test]
fn sqlite_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("campaign.db");

    let (a, b) = {
        let mut m = TroopManager::new(SqliteEventStore::open(&path).unwrap());
        let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
        let b = m
            .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
            .unwrap();
        m.assign_unit_to_composite(a, -3900, b).unwrap();
        m.promote_unit(a, -3800, "Combat I").unwrap();
        (a, b)
    };

    let mut m = TroopManager::new(SqliteEventStore::open(&path).unwrap());
    let unit = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(unit.composite_unit_id, Some(b));
    assert_eq!(unit.promotions, vec!["Combat I".to_owned()]);

    // Ids keep counting from the persisted maximum.
    let c = m.create_unit(-3000, "", "Archer", "Lyon").unwrap();
    assert_eq!(c, UnitId(3));
    assert_eq!(m.get_unit_view(c, None).unwrap().unwrap().name, "Archer-3");
}
