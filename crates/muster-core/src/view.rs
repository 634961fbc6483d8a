//! Folding a unit's events into a [`UnitView`].
//!
//! A view as of year `Y` is built from the unit's events with `year <= Y`
//! in `(year, event_id)` order. Each event sets one field of the view and
//! contributes one history line. Two kinds look beyond the unit itself:
//!
//! - `assign` builds the target composite's view (same cutoff) to name it.
//! - `assign_to` scans the subordinate's create/rename events for its name.
//!
//! Composites then get a second pass that resolves their current
//! subordinates. Recursion follows assignment edges and is cut by a visited
//! set, so an assignment cycle degrades to a `unit #<id>` placeholder.

use std::cell::RefCell;
use std::collections::BTreeSet;

use muster_store::{EventQuery, EventStore};
use muster_types::{
    EnemyUnit, EnemyView, EventKind, EventPayload, HistoryEntry, UnitId, UnitView, Victory,
};

use crate::cache::{CachedView, ViewCache};
use crate::error::TroopError;
use crate::resolver::DisplayResolver;

/// Anything that can produce unit views as of a year.
///
/// Implemented by the troop manager; projections such as strength and
/// reports are written against this trait.
pub trait ViewSource {
    /// The view of `unit_id` as of `year` (`None` = latest), or `None` if
    /// the unit does not exist by then.
    fn unit_view(&self, unit_id: UnitId, year: Option<i64>) -> Result<Option<UnitView>, TroopError>;
}

/// A view together with the bookkeeping needed to cache it.
#[derive(Debug, Clone)]
pub(crate) struct Built {
    pub(crate) view: UnitView,
    /// Latest event year consulted, across every unit touched.
    pub(crate) reflected_year: i64,
    /// Set when the cycle guard replaced a name in this unit's own history.
    pub(crate) partial: bool,
}

/// One view build: store, resolver, and optional cache.
pub(crate) struct ViewBuilder<'a> {
    store: &'a dyn EventStore,
    resolver: &'a dyn DisplayResolver,
    cache: Option<&'a RefCell<dyn ViewCache + 'a>>,
}

impl<'a> ViewBuilder<'a> {
    pub(crate) const fn new(
        store: &'a dyn EventStore,
        resolver: &'a dyn DisplayResolver,
        cache: Option<&'a RefCell<dyn ViewCache + 'a>>,
    ) -> Self {
        Self {
            store,
            resolver,
            cache,
        }
    }

    /// Build the view of `unit_id` as of `year`.
    pub(crate) fn build(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
    ) -> Result<Option<UnitView>, TroopError> {
        let mut visited = BTreeSet::new();
        Ok(self.view(unit_id, year, &mut visited)?.map(|built| built.view))
    }

    fn view(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
        visited: &mut BTreeSet<UnitId>,
    ) -> Result<Option<Built>, TroopError> {
        if let Some(cache) = self.cache {
            let hit = cache.borrow_mut().lookup(unit_id, year);
            if let Some(entry) = hit {
                return Ok(Some(Built {
                    view: entry.view,
                    reflected_year: entry.reflected_year,
                    partial: false,
                }));
            }
        }

        let built = self.fold(unit_id, year, visited)?;

        let cacheable = built.as_ref().filter(|b| !b.partial);
        if let (Some(cache), Some(built)) = (self.cache, cacheable) {
            cache.borrow_mut().store(
                unit_id,
                CachedView {
                    reflected_year: built.reflected_year,
                    horizon: year,
                    view: built.view.clone(),
                },
            );
        }
        Ok(built)
    }

    fn fold(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
        visited: &mut BTreeSet<UnitId>,
    ) -> Result<Option<Built>, TroopError> {
        let events = self.store.events(&EventQuery::for_unit(unit_id).up_to(year))?;
        if events.is_empty() {
            return Ok(None);
        }

        visited.insert(unit_id);
        let mut view = UnitView::new(unit_id);
        let mut reflected_year = i64::MIN;
        let mut partial = false;

        for event in &events {
            reflected_year = reflected_year.max(event.year);
            let text = match &event.payload {
                EventPayload::Create {
                    name,
                    unit_type,
                    location,
                } => {
                    self.set_unit_type(&mut view, unit_type);
                    view.name = if name.is_empty() {
                        default_name(&view.unit_type_display, unit_id)
                    } else {
                        name.clone()
                    };
                    view.location.clone_from(location);
                    if view.is_composite() {
                        view.headquarters = Some(location.clone());
                    }
                    format!("{} created in {location}", view.unit_type_display)
                }
                EventPayload::Rename { name } => {
                    view.name.clone_from(name);
                    format!("renamed '{name}'")
                }
                EventPayload::Upgrade { unit_type } => {
                    self.set_unit_type(&mut view, unit_type);
                    format!("upgraded to '{}'", view.unit_type_display)
                }
                EventPayload::Assign { composite_id } => {
                    view.composite_unit_id = Some(*composite_id);
                    let composite = if visited.contains(composite_id) {
                        partial = true;
                        None
                    } else {
                        self.view(*composite_id, year, visited)?
                    };
                    match composite {
                        Some(built) => {
                            reflected_year = reflected_year.max(built.reflected_year);
                            format!("assigned to '{}'", built.view.name)
                        }
                        None => format!("assigned to 'unit #{composite_id}'"),
                    }
                }
                EventPayload::AssignTo { unit_id: sub } => match self.scan_name(*sub, year)? {
                    Some((name, seen)) => {
                        reflected_year = reflected_year.max(seen);
                        format!("'{name}' assigned")
                    }
                    None => format!("'unit #{sub}' assigned"),
                },
                EventPayload::Unassign {} => {
                    view.composite_unit_id = None;
                    "assigned independent".to_owned()
                }
                EventPayload::Promote { promotion } => {
                    view.promotions.push(promotion.clone());
                    format!("promoted to '{promotion}'")
                }
                EventPayload::Move { location } => {
                    view.location.clone_from(location);
                    format!("location changed to '{location}'")
                }
                EventPayload::TransferHq { location } => {
                    view.headquarters = Some(location.clone());
                    format!("headquarters transferred to '{location}'")
                }
                EventPayload::Destroy { enemy } => {
                    view.is_dead = true;
                    view.destroyed_by = enemy.as_ref().map(|e| self.enemy_view(e));
                    match &view.destroyed_by {
                        Some(enemy) => format!("destroyed by {}", describe_enemy(enemy)),
                        None => "destroyed/disbanded".to_owned(),
                    }
                }
                EventPayload::History { note } => note.clone(),
                EventPayload::Victory { enemy } => {
                    let enemy = self.enemy_view(enemy);
                    let text = format!("destroyed {}", describe_enemy(&enemy));
                    view.victories.push(Victory {
                        year: event.year,
                        enemy,
                    });
                    text
                }
            };
            view.history.push(HistoryEntry {
                year: event.year,
                event_id: event.id,
                text,
            });
        }

        if view.is_composite() {
            let seen = self.collect_subordinates(&mut view, year)?;
            reflected_year = reflected_year.max(seen);
        }
        view.history.sort_by_key(|entry| (entry.year, entry.event_id));
        visited.remove(&unit_id);

        Ok(Some(Built {
            view,
            reflected_year,
            partial,
        }))
    }

    /// Fill `subordinate_units` and return the latest membership year seen.
    fn collect_subordinates(
        &self,
        view: &mut UnitView,
        year: Option<i64>,
    ) -> Result<i64, TroopError> {
        let candidates = self.store.events(
            &EventQuery::for_unit(view.id)
                .up_to(year)
                .of_kinds(&[EventKind::AssignTo]),
        )?;

        let mut checked = BTreeSet::new();
        let mut seen = i64::MIN;
        for candidate in candidates {
            let EventPayload::AssignTo { unit_id: sub } = candidate.payload else {
                continue;
            };
            if !checked.insert(sub) {
                continue;
            }
            let links = self.store.events(
                &EventQuery::for_unit(sub)
                    .up_to(year)
                    .of_kinds(&[EventKind::Assign, EventKind::Unassign]),
            )?;
            if let Some(latest) = links.last() {
                seen = seen.max(latest.year);
                if matches!(latest.payload, EventPayload::Assign { composite_id } if composite_id == view.id)
                {
                    view.subordinate_units.push(sub);
                }
            }
        }
        Ok(seen)
    }

    /// The name of `unit_id` as of `year` from its create/rename events only.
    fn scan_name(
        &self,
        unit_id: UnitId,
        year: Option<i64>,
    ) -> Result<Option<(String, i64)>, TroopError> {
        let events = self.store.events(
            &EventQuery::for_unit(unit_id)
                .up_to(year)
                .of_kinds(&[EventKind::Create, EventKind::Rename]),
        )?;
        let mut current: Option<(String, i64)> = None;
        for event in events {
            let name = match event.payload {
                EventPayload::Create {
                    name, unit_type, ..
                } if name.is_empty() => {
                    default_name(&self.resolver.unit_type_display(&unit_type), unit_id)
                }
                EventPayload::Create { name, .. } | EventPayload::Rename { name } => name,
                _ => continue,
            };
            current = Some((name, event.year));
        }
        Ok(current)
    }

    fn set_unit_type(&self, view: &mut UnitView, unit_type: &str) {
        view.unit_type = unit_type.to_owned();
        view.unit_type_display = self.resolver.unit_type_display(unit_type);
    }

    fn enemy_view(&self, enemy: &EnemyUnit) -> EnemyView {
        EnemyView {
            owner: enemy.owner.clone(),
            owner_display: self.resolver.owner_display(&enemy.owner),
            unit_type: enemy.unit_type.clone(),
            unit_type_display: self.resolver.unit_type_display(&enemy.unit_type),
            name: enemy.name.clone(),
        }
    }
}

/// Name given to units created without one.
pub(crate) fn default_name(unit_type_display: &str, unit_id: UnitId) -> String {
    format!("{unit_type_display}-{unit_id}")
}

fn describe_enemy(enemy: &EnemyView) -> String {
    match &enemy.name {
        Some(name) => format!(
            "{}'s {name} ({})",
            enemy.owner_display, enemy.unit_type_display
        ),
        None => format!("{}'s {} unit", enemy.owner_display, enemy.unit_type_display),
    }
}
