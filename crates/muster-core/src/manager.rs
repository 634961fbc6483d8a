//! The troop manager: validated writes and cached reads over the event log.
//!
//! Every mutating operation validates against the current log, then writes
//! its events inside a store checkpoint. If any step fails the checkpoint is
//! rolled back and the cache is cleared, so a failed call leaves no trace.
//! After each successful append the views that could have changed are
//! evicted from the cache: the unit itself, every composite it was ever
//! assigned to, and every unit ever assigned to it.

use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;

use muster_store::{EventQuery, EventStore};
use muster_types::{
    COMPOSITE_UNIT_TYPE, EnemyUnit, EventId, EventKind, EventPayload, UnitEvent, UnitId, UnitView,
};

use crate::cache::{SnapshotCache, ViewCache};
use crate::error::TroopError;
use crate::resolver::{DisplayResolver, IdentityResolver, KeyCatalog};
use crate::view::{ViewBuilder, ViewSource};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Optional details recorded with a destruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyDetails {
    /// The enemy responsible. `None` records a disbanding.
    pub enemy: Option<EnemyUnit>,
    /// A history note written in the same year, after the destroy event.
    pub note: Option<String>,
}

impl DestroyDetails {
    /// Destruction by an enemy unit.
    pub const fn by(enemy: EnemyUnit) -> Self {
        Self {
            enemy: Some(enemy),
            note: None,
        }
    }

    /// Attach a history note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// ---------------------------------------------------------------------------
// TroopManager
// ---------------------------------------------------------------------------

/// Validated, transactional access to a campaign's unit log.
pub struct TroopManager<S: EventStore, C: ViewCache = SnapshotCache> {
    store: S,
    cache: RefCell<C>,
    resolver: Box<dyn DisplayResolver>,
    keys: Option<Box<dyn KeyCatalog>>,
}

impl<S: EventStore> TroopManager<S, SnapshotCache> {
    /// Manage `store` with a fresh [`SnapshotCache`] and identity display names.
    pub fn new(store: S) -> Self {
        Self::with_cache(store, SnapshotCache::new())
    }
}

impl<S: EventStore, C: ViewCache> TroopManager<S, C> {
    /// Manage `store` with the given cache and identity display names.
    pub fn with_cache(store: S, cache: C) -> Self {
        Self {
            store,
            cache: RefCell::new(cache),
            resolver: Box::new(IdentityResolver),
            keys: None,
        }
    }

    /// Replace the display resolver used by [`TroopManager::get_unit_view`].
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl DisplayResolver + 'static) -> Self {
        self.set_resolver(Box::new(resolver));
        self
    }

    /// Replace the display resolver. Cached views are dropped since their
    /// text was rendered with the old one.
    pub fn set_resolver(&mut self, resolver: Box<dyn DisplayResolver>) {
        self.resolver = resolver;
        self.cache.get_mut().clear();
    }

    /// Reject unit types and promotions that `keys` does not define.
    #[must_use]
    pub fn with_key_catalog(mut self, keys: impl KeyCatalog + 'static) -> Self {
        self.keys = Some(Box::new(keys));
        self
    }

    /// Replace the key catalog; `None` accepts any key.
    pub fn set_key_catalog(&mut self, keys: Option<Box<dyn KeyCatalog>>) {
        self.keys = keys;
    }

    /// The underlying event store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The view cache, for inspection.
    pub fn cache(&self) -> Ref<'_, C> {
        self.cache.borrow()
    }

    /// Give back the event store.
    pub fn into_store(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Run `op` as one all-or-nothing unit of work.
    ///
    /// Nested calls nest checkpoints. On error every write made by `op` is
    /// discarded and the view cache is cleared.
    pub fn transaction<T, F>(&mut self, op: F) -> Result<T, TroopError>
    where
        F: FnOnce(&mut Self) -> Result<T, TroopError>,
    {
        let checkpoint = self.store.checkpoint()?;
        let depth = checkpoint.depth();
        match op(self) {
            Ok(value) => {
                self.store.release(checkpoint)?;
                if depth == 1 {
                    tracing::info!("transaction committed");
                }
                Ok(value)
            }
            Err(err) => {
                self.cache.get_mut().clear();
                if let Err(rollback_err) = self.store.rollback_to(checkpoint) {
                    tracing::error!(error = %rollback_err, "rollback failed");
                    return Err(rollback_err.into());
                }
                tracing::warn!(error = %err, depth, "transaction rolled back");
                Err(err)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The view of `unit_id` as of `year` (`None` = latest), served from the
    /// cache when a valid snapshot exists.
    pub fn get_unit_view(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
    ) -> Result<Option<UnitView>, TroopError> {
        let cache: &RefCell<dyn ViewCache + '_> = &self.cache;
        ViewBuilder::new(&self.store, self.resolver.as_ref(), Some(cache)).build(unit_id, year)
    }

    /// Build a view with an explicit resolver, bypassing the cache.
    pub fn build_unit_view_with(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
        resolver: &dyn DisplayResolver,
    ) -> Result<Option<UnitView>, TroopError> {
        ViewBuilder::new(&self.store, resolver, None).build(unit_id, year)
    }

    /// `(created, destroyed)` years of a unit; both `None` if it does not exist.
    pub fn get_unit_lifespan(
        &self,
        unit_id: UnitId,
    ) -> Result<(Option<i64>, Option<i64>), TroopError> {
        let events = self.store.events(
            &EventQuery::for_unit(unit_id).of_kinds(&[EventKind::Create, EventKind::Destroy]),
        )?;
        let created = events
            .iter()
            .find(|e| e.kind() == EventKind::Create)
            .map(|e| e.year);
        let destroyed = events
            .iter()
            .find(|e| e.kind() == EventKind::Destroy)
            .map(|e| e.year);
        Ok((created, destroyed))
    }

    /// Smallest and largest year in the log.
    pub fn get_min_max_years(&self) -> Result<Option<(i64, i64)>, TroopError> {
        Ok(self.store.year_bounds()?)
    }

    /// Units created at or before `year` (`None` = ever). With `live_only`,
    /// units destroyed at or before `year` are left out.
    pub fn get_unit_list(
        &self,
        year: Option<i64>,
        live_only: bool,
    ) -> Result<BTreeSet<UnitId>, TroopError> {
        let created = self
            .store
            .unit_ids(&EventQuery::all().up_to(year).of_kinds(&[EventKind::Create]))?;
        if !live_only {
            return Ok(created);
        }
        let destroyed = self
            .store
            .unit_ids(&EventQuery::all().up_to(year).of_kinds(&[EventKind::Destroy]))?;
        Ok(created.difference(&destroyed).copied().collect())
    }

    /// Every event of a unit in history order.
    pub fn get_events(&self, unit_id: UnitId) -> Result<Vec<UnitEvent>, TroopError> {
        Ok(self.store.events(&EventQuery::for_unit(unit_id))?)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create a unit and return its id (one more than the largest id so far).
    ///
    /// An empty `name` makes views show `"<type>-<id>"`.
    pub fn create_unit(
        &mut self,
        year: i64,
        name: &str,
        unit_type: &str,
        location: &str,
    ) -> Result<UnitId, TroopError> {
        self.require_unit_type(unit_type)?;
        let payload = EventPayload::Create {
            name: name.to_owned(),
            unit_type: unit_type.to_owned(),
            location: location.to_owned(),
        };
        self.transaction(|m| {
            let unit_id = match m.store.max_unit_id()? {
                Some(max) => max.next().ok_or_else(|| {
                    TroopError::InvariantViolation("unit id space exhausted".to_owned())
                })?,
                None => UnitId(1),
            };
            m.append(unit_id, year, &payload)?;
            tracing::info!(unit_id = %unit_id, year, unit_type, "unit created");
            Ok(unit_id)
        })
    }

    /// Record a new name.
    pub fn rename_unit(&mut self, unit_id: UnitId, year: i64, name: &str) -> Result<EventId, TroopError> {
        self.simple_write(unit_id, year, EventPayload::Rename { name: name.to_owned() })
    }

    /// Record a change of unit type.
    pub fn upgrade_unit(
        &mut self,
        unit_id: UnitId,
        year: i64,
        unit_type: &str,
    ) -> Result<EventId, TroopError> {
        self.require_unit_type(unit_type)?;
        self.simple_write(
            unit_id,
            year,
            EventPayload::Upgrade {
                unit_type: unit_type.to_owned(),
            },
        )
    }

    /// Record a move.
    pub fn move_unit(&mut self, unit_id: UnitId, year: i64, location: &str) -> Result<EventId, TroopError> {
        self.simple_write(
            unit_id,
            year,
            EventPayload::Move {
                location: location.to_owned(),
            },
        )
    }

    /// Record a headquarters transfer.
    pub fn transferhq_unit(
        &mut self,
        unit_id: UnitId,
        year: i64,
        location: &str,
    ) -> Result<EventId, TroopError> {
        self.simple_write(
            unit_id,
            year,
            EventPayload::TransferHq {
                location: location.to_owned(),
            },
        )
    }

    /// Transfer the headquarters of a unit and of some of its current
    /// subordinates together.
    pub fn transfer_hq_with(
        &mut self,
        unit_id: UnitId,
        year: i64,
        location: &str,
        followers: &[UnitId],
    ) -> Result<(), TroopError> {
        self.transaction(|m| {
            m.transferhq_unit(unit_id, year, location)?;
            if followers.is_empty() {
                return Ok(());
            }
            let subordinates = m
                .get_unit_view(unit_id, Some(year))?
                .map(|view| view.subordinate_units)
                .unwrap_or_default();
            for follower in followers {
                if !subordinates.contains(follower) {
                    return Err(TroopError::InvariantViolation(format!(
                        "unit {follower} is not a subordinate of unit {unit_id} in {year}"
                    )));
                }
                m.transferhq_unit(*follower, year, location)?;
            }
            Ok(())
        })
    }

    /// Record a freeform history note.
    pub fn unit_history(&mut self, unit_id: UnitId, year: i64, note: &str) -> Result<EventId, TroopError> {
        self.simple_write(unit_id, year, EventPayload::History { note: note.to_owned() })
    }

    /// Record a promotion. Composites cannot be promoted and a unit holds
    /// each promotion at most once.
    pub fn promote_unit(
        &mut self,
        unit_id: UnitId,
        year: i64,
        promotion: &str,
    ) -> Result<EventId, TroopError> {
        if self.keys.as_ref().is_some_and(|keys| !keys.has_promotion(promotion)) {
            return Err(TroopError::NotFound {
                what: "promotion",
                id: promotion.to_owned(),
            });
        }
        self.transaction(|m| {
            m.require_within_lifespan(unit_id, year)?;
            if m
                .get_unit_view(unit_id, Some(year))?
                .is_some_and(|view| view.is_composite())
            {
                return Err(TroopError::InvariantViolation(format!(
                    "composite unit {unit_id} cannot be promoted"
                )));
            }
            let earlier = m
                .store
                .events(&EventQuery::for_unit(unit_id).of_kinds(&[EventKind::Promote]))?;
            let duplicate = earlier.iter().any(|e| {
                matches!(&e.payload, EventPayload::Promote { promotion: p } if p == promotion)
            });
            if duplicate {
                return Err(TroopError::DuplicateState(format!(
                    "unit {unit_id} already has promotion '{promotion}'"
                )));
            }
            m.append(
                unit_id,
                year,
                &EventPayload::Promote {
                    promotion: promotion.to_owned(),
                },
            )
        })
    }

    /// Attach a unit to a composite, recording `assign` on the unit and the
    /// reciprocal `assign_to` on the composite.
    pub fn assign_unit_to_composite(
        &mut self,
        unit_id: UnitId,
        year: i64,
        composite_id: UnitId,
    ) -> Result<EventId, TroopError> {
        if unit_id == composite_id {
            return Err(TroopError::InvariantViolation(format!(
                "unit {unit_id} cannot be assigned to itself"
            )));
        }
        self.transaction(|m| {
            m.require_within_lifespan(unit_id, year)?;
            m.require_within_lifespan(composite_id, year)
                .map_err(|err| match err {
                    TroopError::NotFound { id, .. } => TroopError::NotFound {
                        what: "composite unit",
                        id,
                    },
                    other => other,
                })?;
            let is_composite = m
                .get_unit_view(composite_id, Some(year))?
                .is_some_and(|view| view.is_composite());
            if !is_composite {
                return Err(TroopError::InvariantViolation(format!(
                    "unit {composite_id} is not a composite unit in {year}"
                )));
            }
            let id = m.append(unit_id, year, &EventPayload::Assign { composite_id })?;
            m.append(composite_id, year, &EventPayload::AssignTo { unit_id })?;
            Ok(id)
        })
    }

    /// Assign a unit and move its headquarters to the composite's.
    pub fn assign_and_transfer_hq(
        &mut self,
        unit_id: UnitId,
        year: i64,
        composite_id: UnitId,
    ) -> Result<EventId, TroopError> {
        self.transaction(|m| {
            let id = m.assign_unit_to_composite(unit_id, year, composite_id)?;
            let headquarters = m
                .get_unit_view(composite_id, Some(year))?
                .and_then(|view| view.headquarters.or(Some(view.location)))
                .ok_or_else(|| TroopError::NotFound {
                    what: "composite unit",
                    id: composite_id.to_string(),
                })?;
            m.transferhq_unit(unit_id, year, &headquarters)?;
            Ok(id)
        })
    }

    /// Detach a unit from its composite.
    pub fn unassign_unit_to_composite(
        &mut self,
        unit_id: UnitId,
        year: i64,
    ) -> Result<EventId, TroopError> {
        self.simple_write(unit_id, year, EventPayload::Unassign {})
    }

    /// Destroy a unit at the hands of an unnamed enemy unit.
    pub fn destroy_unit(
        &mut self,
        unit_id: UnitId,
        year: i64,
        enemy_owner: &str,
        enemy_type: &str,
    ) -> Result<EventId, TroopError> {
        self.destroy_unit_with(
            unit_id,
            year,
            DestroyDetails::by(EnemyUnit::new(enemy_owner, enemy_type)),
        )
    }

    /// Disband a unit (a destroy with no enemy).
    pub fn disband_unit(&mut self, unit_id: UnitId, year: i64) -> Result<EventId, TroopError> {
        self.destroy_unit_with(unit_id, year, DestroyDetails::default())
    }

    /// Destroy a unit.
    ///
    /// The destroy must be the unit's last event. In the same transaction the
    /// unit is detached from its composite and, for a composite, every
    /// subordinate attached at `year` is detached. An optional note follows
    /// the destroy event.
    pub fn destroy_unit_with(
        &mut self,
        unit_id: UnitId,
        year: i64,
        details: DestroyDetails,
    ) -> Result<EventId, TroopError> {
        if let Some(enemy) = &details.enemy {
            self.require_unit_type(&enemy.unit_type)?;
        }
        self.transaction(|m| {
            let (created, destroyed) = m.get_unit_lifespan(unit_id)?;
            let Some(created) = created else {
                return Err(TroopError::unit_not_found(unit_id));
            };
            if let Some(destroyed) = destroyed {
                return Err(TroopError::DuplicateState(format!(
                    "unit {unit_id} was already destroyed in {destroyed}"
                )));
            }
            if year < created {
                return Err(TroopError::InvalidTemporalOrder {
                    unit_id,
                    year,
                    message: format!("precedes the unit's creation in {created}"),
                });
            }
            let later = m
                .store
                .events(&EventQuery::for_unit(unit_id).from_year(year.saturating_add(1)))?;
            if let Some(last) = later.last() {
                return Err(TroopError::InvalidTemporalOrder {
                    unit_id,
                    year,
                    message: format!("destruction must be last but an event exists in {}", last.year),
                });
            }

            let view = m
                .get_unit_view(unit_id, Some(year))?
                .ok_or_else(|| TroopError::unit_not_found(unit_id))?;
            if view.composite_unit_id.is_some() {
                m.append(unit_id, year, &EventPayload::Unassign {})?;
            }
            for sub in &view.subordinate_units {
                m.require_within_lifespan(*sub, year)?;
                m.append(*sub, year, &EventPayload::Unassign {})?;
            }

            let id = m.append(unit_id, year, &EventPayload::Destroy { enemy: details.enemy })?;
            if let Some(note) = details.note {
                m.append(unit_id, year, &EventPayload::History { note })?;
            }
            tracing::info!(unit_id = %unit_id, year, "unit destroyed");
            Ok(id)
        })
    }

    /// Record a victory over an unnamed enemy unit.
    pub fn unit_victory(
        &mut self,
        unit_id: UnitId,
        year: i64,
        enemy_owner: &str,
        enemy_type: &str,
    ) -> Result<EventId, TroopError> {
        self.unit_victory_with(unit_id, year, EnemyUnit::new(enemy_owner, enemy_type))
    }

    /// Record a victory.
    pub fn unit_victory_with(
        &mut self,
        unit_id: UnitId,
        year: i64,
        enemy: EnemyUnit,
    ) -> Result<EventId, TroopError> {
        self.require_unit_type(&enemy.unit_type)?;
        self.simple_write(unit_id, year, EventPayload::Victory { enemy })
    }

    /// Delete one event.
    ///
    /// A `create` can only go when it is the unit's last remaining event.
    /// Deleting an `assign` also deletes its reciprocal `assign_to`, which
    /// therefore cannot be deleted on its own.
    pub fn delete_event(&mut self, event_id: EventId) -> Result<(), TroopError> {
        self.transaction(|m| {
            let event = m.store.event(event_id)?.ok_or_else(|| TroopError::NotFound {
                what: "event",
                id: event_id.to_string(),
            })?;

            let mut doomed = vec![event.id];
            match &event.payload {
                EventPayload::Create { .. } => {
                    let remaining = m.store.events(&EventQuery::for_unit(event.unit_id))?.len();
                    if remaining > 1 {
                        return Err(TroopError::InvariantViolation(format!(
                            "create event of unit {} cannot be deleted while {} other events remain",
                            event.unit_id,
                            remaining.saturating_sub(1)
                        )));
                    }
                }
                EventPayload::AssignTo { unit_id } => {
                    return Err(TroopError::InvariantViolation(format!(
                        "assign_to event {event_id} is removed with the assign event of unit {unit_id}"
                    )));
                }
                EventPayload::Assign { composite_id } => {
                    let reciprocal = m.find_reciprocal(*composite_id, event.year, event.unit_id)?;
                    doomed.push(reciprocal);
                }
                _ => {}
            }

            // Evict before deleting: the eviction set is derived from the
            // assignment events about to go.
            m.invalidate_unit(event.unit_id)?;
            for id in doomed {
                if !m.store.delete(id)? {
                    return Err(TroopError::NotFound {
                        what: "event",
                        id: id.to_string(),
                    });
                }
                tracing::debug!(event_id = %id, unit_id = %event.unit_id, "event deleted");
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Append one event after a lifespan check.
    fn simple_write(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: EventPayload,
    ) -> Result<EventId, TroopError> {
        self.transaction(|m| {
            m.require_within_lifespan(unit_id, year)?;
            m.append(unit_id, year, &payload)
        })
    }

    fn append(
        &mut self,
        unit_id: UnitId,
        year: i64,
        payload: &EventPayload,
    ) -> Result<EventId, TroopError> {
        let id = self.store.append(unit_id, year, payload)?;
        tracing::debug!(event_id = %id, unit_id = %unit_id, year, kind = %payload.kind(), "event recorded");
        self.invalidate_unit(unit_id)?;
        Ok(id)
    }

    /// Evict the unit and every unit linked to it by assignment.
    fn invalidate_unit(&mut self, unit_id: UnitId) -> Result<(), TroopError> {
        let links = self.store.events(
            &EventQuery::for_unit(unit_id).of_kinds(&[EventKind::Assign, EventKind::AssignTo]),
        )?;
        let mut affected = BTreeSet::from([unit_id]);
        affected.extend(links.iter().filter_map(|e| match e.payload {
            EventPayload::Assign { composite_id } => Some(composite_id),
            EventPayload::AssignTo { unit_id: sub } => Some(sub),
            _ => None,
        }));
        let cache = self.cache.get_mut();
        for id in affected {
            cache.invalidate(id);
        }
        Ok(())
    }

    fn require_unit_type(&self, key: &str) -> Result<(), TroopError> {
        match &self.keys {
            Some(keys) if key != COMPOSITE_UNIT_TYPE && !keys.has_unit_type(key) => {
                Err(TroopError::NotFound {
                    what: "unit type",
                    id: key.to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    fn require_within_lifespan(&self, unit_id: UnitId, year: i64) -> Result<(), TroopError> {
        match self.get_unit_lifespan(unit_id)? {
            (None, _) => Err(TroopError::unit_not_found(unit_id)),
            (Some(created), _) if year < created => Err(TroopError::InvalidTemporalOrder {
                unit_id,
                year,
                message: format!("precedes the unit's creation in {created}"),
            }),
            (_, Some(destroyed)) if year > destroyed => Err(TroopError::InvalidTemporalOrder {
                unit_id,
                year,
                message: format!("follows the unit's destruction in {destroyed}"),
            }),
            _ => Ok(()),
        }
    }

    /// The `assign_to` on `composite_id` paired with an `assign` of `unit_id`.
    fn find_reciprocal(
        &self,
        composite_id: UnitId,
        year: i64,
        unit_id: UnitId,
    ) -> Result<EventId, TroopError> {
        let candidates = self.store.events(
            &EventQuery::for_unit(composite_id)
                .from_year(year)
                .up_to(Some(year))
                .of_kinds(&[EventKind::AssignTo]),
        )?;
        candidates
            .iter()
            .find(|e| matches!(e.payload, EventPayload::AssignTo { unit_id: sub } if sub == unit_id))
            .map(|e| e.id)
            .ok_or_else(|| {
                TroopError::InvariantViolation(format!(
                    "no assign_to for unit {unit_id} on composite {composite_id} in {year}"
                ))
            })
    }
}

impl<S: EventStore, C: ViewCache> ViewSource for TroopManager<S, C> {
    fn unit_view(&self, unit_id: UnitId, year: Option<i64>) -> Result<Option<UnitView>, TroopError> {
        self.get_unit_view(unit_id, year)
    }
}
