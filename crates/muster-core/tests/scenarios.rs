//! End-to-end scenarios for the troop manager.
//!
//! Covers the temporal view properties, the lifespan rules, composite
//! assignment, destruction cascades, and event deletion against the
//! in-memory store.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use muster_core::{DestroyDetails, TroopError, TroopManager};
use muster_store::{EventStore, MemoryEventStore};
use muster_types::{COMPOSITE_UNIT_TYPE, EnemyUnit, EventKind, UnitId};

fn manager() -> TroopManager<MemoryEventStore> {
    TroopManager::new(MemoryEventStore::new())
}

/// Warrior A and composite B, both raised in Paris in 4000 BC.
fn paris(m: &mut TroopManager<MemoryEventStore>) -> (UnitId, UnitId) {
    let a = m.create_unit(-4000, "A", "Warrior", "Paris").unwrap();
    let b = m
        .create_unit(-4000, "B", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    (a, b)
}

fn event_count(m: &TroopManager<MemoryEventStore>) -> usize {
    m.store().len().unwrap()
}

// ---------------------------------------------------------------------------
// Temporal views
// ---------------------------------------------------------------------------

#[test]
fn later_events_do_not_change_an_earlier_view() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.move_unit(a, -3500, "Lyon").unwrap();

    let before = m.get_unit_view(a, Some(-3500)).unwrap();
    m.move_unit(a, -3000, "Nice").unwrap();
    m.rename_unit(a, -2000, "Old Guard").unwrap();
    let after = m.get_unit_view(a, Some(-3500)).unwrap();

    assert_eq!(before, after);
    assert_eq!(after.map(|v| v.location), Some("Lyon".to_owned()));
}

#[test]
fn repeated_reads_are_identical() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    m.assign_unit_to_composite(a, -3900, b).unwrap();

    for year in [None, Some(-3950), Some(-3900)] {
        let first = m.get_unit_view(b, year).unwrap();
        let second = m.get_unit_view(b, year).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn view_before_creation_is_none() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    assert_eq!(m.get_unit_view(a, Some(-4500)).unwrap(), None);
}

// ---------------------------------------------------------------------------
// Lifespan
// ---------------------------------------------------------------------------

#[test]
fn lifespan_tracks_create_and_destroy() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    assert_eq!(m.get_unit_lifespan(a).unwrap(), (Some(-4000), None));

    m.destroy_unit(a, -2400, "Rome", "Legion").unwrap();
    assert_eq!(m.get_unit_lifespan(a).unwrap(), (Some(-4000), Some(-2400)));
    assert_eq!(m.get_unit_lifespan(UnitId(99)).unwrap(), (None, None));
}

#[test]
fn event_after_destroy_is_rejected() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.destroy_unit(a, -2400, "Rome", "Legion").unwrap();

    let before = event_count(&m);
    assert!(matches!(
        m.move_unit(a, -2300, "Lyon"),
        Err(TroopError::InvalidTemporalOrder { year: -2300, .. })
    ));
    assert_eq!(event_count(&m), before);

    // The destroy year itself is still inside the lifespan.
    m.unit_history(a, -2400, "last stand at the river").unwrap();
}

#[test]
fn destroy_must_be_last_and_only_once() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.move_unit(a, -3000, "Lyon").unwrap();

    assert!(matches!(
        m.disband_unit(a, -3500),
        Err(TroopError::InvalidTemporalOrder { .. })
    ));
    m.disband_unit(a, -3000).unwrap();
    assert!(matches!(
        m.disband_unit(a, -2000),
        Err(TroopError::DuplicateState(_))
    ));

    let view = m.get_unit_view(a, None).unwrap().unwrap();
    assert!(view.is_dead);
    assert_eq!(view.destroyed_by, None);
    assert_eq!(view.history.last().map(|h| h.text.as_str()), Some("destroyed/disbanded"));
}

// ---------------------------------------------------------------------------
// Promotions
// ---------------------------------------------------------------------------

#[test]
fn duplicate_promotion_is_rejected() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.promote_unit(a, -3000, "Combat I").unwrap();

    assert!(matches!(
        m.promote_unit(a, -2000, "Combat I"),
        Err(TroopError::DuplicateState(_))
    ));
    let view = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(view.promotions, vec!["Combat I".to_owned()]);
}

// ---------------------------------------------------------------------------
// Composites
// ---------------------------------------------------------------------------

#[test]
fn assignment_links_both_sides() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    m.assign_unit_to_composite(a, -4000, b).unwrap();

    let unit = m.get_unit_view(a, None).unwrap().unwrap();
    let composite = m.get_unit_view(b, None).unwrap().unwrap();
    assert_eq!(unit.composite_unit_id, Some(b));
    assert_eq!(composite.subordinate_units, vec![a]);
    assert_eq!(composite.headquarters.as_deref(), Some("Paris"));
}

#[test]
fn assigning_to_regular_unit_writes_nothing() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    let c = m.create_unit(-4000, "C", "Archer", "Paris").unwrap();

    let before = event_count(&m);
    assert!(matches!(
        m.assign_unit_to_composite(a, -3900, c),
        Err(TroopError::InvariantViolation(_))
    ));
    assert_eq!(event_count(&m), before);
}

#[test]
fn assigning_to_missing_composite_is_not_found() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    assert!(matches!(
        m.assign_unit_to_composite(a, -3900, UnitId(42)),
        Err(TroopError::NotFound {
            what: "composite unit",
            ..
        })
    ));
}

#[test]
fn reassignment_moves_membership() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    let c = m
        .create_unit(-4000, "C", COMPOSITE_UNIT_TYPE, "Lyon")
        .unwrap();

    m.assign_unit_to_composite(a, -3900, b).unwrap();
    // Warm the cache for both composites before the move.
    assert_eq!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units, vec![a]);
    assert!(m.get_unit_view(c, None).unwrap().unwrap().subordinate_units.is_empty());

    m.assign_unit_to_composite(a, -3800, c).unwrap();
    assert!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units.is_empty());
    assert_eq!(m.get_unit_view(c, None).unwrap().unwrap().subordinate_units, vec![a]);
    assert_eq!(
        m.get_unit_view(b, Some(-3850)).unwrap().unwrap().subordinate_units,
        vec![a]
    );
}

#[test]
fn unassign_detaches_from_previous_composite() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    m.assign_unit_to_composite(a, -3900, b).unwrap();
    assert_eq!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units, vec![a]);

    m.unassign_unit_to_composite(a, -3500).unwrap();
    assert!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units.is_empty());
    let unit = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(unit.composite_unit_id, None);
    assert_eq!(unit.history.last().map(|h| h.text.as_str()), Some("assigned independent"));
}

#[test]
fn assign_with_hq_transfer_takes_composite_headquarters() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    m.transferhq_unit(b, -3950, "Orleans").unwrap();
    m.assign_and_transfer_hq(a, -3900, b).unwrap();

    let unit = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(unit.headquarters.as_deref(), Some("Orleans"));
    assert_eq!(unit.composite_unit_id, Some(b));
}

#[test]
fn hq_transfer_can_carry_subordinates() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    let c = m.create_unit(-4000, "C", "Archer", "Paris").unwrap();
    m.assign_unit_to_composite(a, -3900, b).unwrap();

    m.transfer_hq_with(b, -3800, "Reims", &[a]).unwrap();
    assert_eq!(
        m.get_unit_view(a, None).unwrap().unwrap().headquarters.as_deref(),
        Some("Reims")
    );

    let before = event_count(&m);
    assert!(matches!(
        m.transfer_hq_with(b, -3700, "Metz", &[c]),
        Err(TroopError::InvariantViolation(_))
    ));
    assert_eq!(event_count(&m), before);
}

#[test]
fn destroying_a_composite_releases_its_subordinates() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    let army = m
        .create_unit(-4000, "Army", COMPOSITE_UNIT_TYPE, "Paris")
        .unwrap();
    m.assign_unit_to_composite(a, -3900, b).unwrap();
    m.assign_unit_to_composite(b, -3900, army).unwrap();

    let details = DestroyDetails::by(EnemyUnit::new("Rome", "Legion").named("Legio X"))
        .with_note("ambushed in the forest");
    m.destroy_unit_with(b, -3000, details).unwrap();

    let unit = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(unit.composite_unit_id, None);
    assert!(!unit.is_dead);

    let army_view = m.get_unit_view(army, None).unwrap().unwrap();
    assert!(army_view.subordinate_units.is_empty());

    let dead = m.get_unit_view(b, None).unwrap().unwrap();
    assert!(dead.is_dead);
    let texts: Vec<&str> = dead.history.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(
        &texts[texts.len() - 3..],
        [
            "assigned independent",
            "destroyed by Rome's Legio X (Legion)",
            "ambushed in the forest"
        ]
    );

    // Membership before the destruction is unchanged.
    assert_eq!(
        m.get_unit_view(b, Some(-3001)).unwrap().unwrap().subordinate_units,
        vec![a]
    );
}

#[test]
fn victories_are_recorded_independently_of_death() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.unit_victory(a, -3500, "Babylon", "Archer").unwrap();
    m.unit_victory_with(a, -3400, EnemyUnit::new("Babylon", "Chariot").named("Marduk's Wheels"))
        .unwrap();

    let view = m.get_unit_view(a, None).unwrap().unwrap();
    assert_eq!(view.victories.len(), 2);
    let texts: Vec<&str> = view.history.iter().map(|h| h.text.as_str()).collect();
    assert!(texts.contains(&"destroyed Babylon's Archer unit"));
    assert!(texts.contains(&"destroyed Babylon's Marduk's Wheels (Chariot)"));
}

// ---------------------------------------------------------------------------
// Deletion and listing
// ---------------------------------------------------------------------------

#[test]
fn deleting_sole_create_removes_the_unit() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    let create = m.get_events(a).unwrap()[0].id;

    m.delete_event(create).unwrap();
    assert!(!m.get_unit_list(None, false).unwrap().contains(&a));
    assert_eq!(m.get_unit_view(a, None).unwrap(), None);
}

#[test]
fn deleting_create_with_history_fails() {
    let mut m = manager();
    let (a, _) = paris(&mut m);
    m.rename_unit(a, -3000, "Guard").unwrap();
    let create = m.get_events(a).unwrap()[0].id;

    assert!(matches!(
        m.delete_event(create),
        Err(TroopError::InvariantViolation(_))
    ));
    assert!(m.get_unit_list(None, false).unwrap().contains(&a));
}

#[test]
fn deleting_assign_removes_the_reciprocal() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    m.assign_unit_to_composite(a, -3900, b).unwrap();
    assert_eq!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units, vec![a]);

    let assign = m
        .get_events(a)
        .unwrap()
        .into_iter()
        .find(|e| e.kind() == EventKind::Assign)
        .unwrap();
    m.delete_event(assign.id).unwrap();

    assert!(m.get_events(b).unwrap().iter().all(|e| e.kind() != EventKind::AssignTo));
    assert!(m.get_unit_view(b, None).unwrap().unwrap().subordinate_units.is_empty());
    assert_eq!(m.get_unit_view(a, None).unwrap().unwrap().composite_unit_id, None);
}

#[test]
fn deleting_missing_event_is_not_found() {
    let mut m = manager();
    assert!(matches!(
        m.delete_event(muster_types::EventId(7)),
        Err(TroopError::NotFound { what: "event", .. })
    ));
}

#[test]
fn unit_list_respects_year_and_liveness() {
    let mut m = manager();
    let (a, b) = paris(&mut m);
    let late = m.create_unit(-3000, "Late", "Archer", "Lyon").unwrap();
    m.disband_unit(a, -2500).unwrap();

    let all: Vec<UnitId> = m.get_unit_list(None, false).unwrap().into_iter().collect();
    assert_eq!(all, vec![a, b, late]);

    let early: Vec<UnitId> = m.get_unit_list(Some(-3500), false).unwrap().into_iter().collect();
    assert_eq!(early, vec![a, b]);

    let live: Vec<UnitId> = m.get_unit_list(None, true).unwrap().into_iter().collect();
    assert_eq!(live, vec![b, late]);

    let live_before: Vec<UnitId> = m.get_unit_list(Some(-2600), true).unwrap().into_iter().collect();
    assert_eq!(live_before, vec![a, b, late]);

    assert_eq!(m.get_min_max_years().unwrap(), Some((-4000, -2500)));
}
