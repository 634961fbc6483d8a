//! Command execution.
//!
//! Each command maps onto one troop-manager or catalog call. Results go to
//! stdout; logs go to stderr.

use muster_core::{
    DestroyDetails, GameCatalog, Roster, RosterOptions, StrengthModel, UnitReport, UnitTypeRecord,
};
use muster_types::{EnemyUnit, EventId, UnitView};

use crate::Ledger;
use crate::cli::{Command, PromotionCommand, UnitTypeCommand};
use crate::error::CliError;

/// Run one command against the ledger and catalog.
#[allow(clippy::too_many_lines)]
pub fn execute(
    command: Command,
    ledger: &mut Ledger,
    catalog: &mut GameCatalog,
) -> Result<(), CliError> {
    match command {
        Command::Create {
            year,
            unit_type,
            location,
            name,
        } => {
            let unit_id = ledger.create_unit(year, &name, &unit_type, &location)?;
            println!("{unit_id}");
        }
        Command::Rename { at, name } => {
            recorded(ledger.rename_unit(at.unit, at.year, &name)?);
        }
        Command::Upgrade { at, unit_type } => {
            recorded(ledger.upgrade_unit(at.unit, at.year, &unit_type)?);
        }
        Command::Move { at, location } => {
            recorded(ledger.move_unit(at.unit, at.year, &location)?);
        }
        Command::Hq {
            at,
            location,
            followers,
        } => {
            if followers.is_empty() {
                recorded(ledger.transferhq_unit(at.unit, at.year, &location)?);
            } else {
                ledger.transfer_hq_with(at.unit, at.year, &location, &followers)?;
            }
        }
        Command::Assign {
            at,
            composite,
            transfer_hq,
        } => {
            let event_id = if transfer_hq {
                ledger.assign_and_transfer_hq(at.unit, at.year, composite)?
            } else {
                ledger.assign_unit_to_composite(at.unit, at.year, composite)?
            };
            recorded(event_id);
        }
        Command::Unassign { at } => {
            recorded(ledger.unassign_unit_to_composite(at.unit, at.year)?);
        }
        Command::Promote { at, promotion } => {
            recorded(ledger.promote_unit(at.unit, at.year, &promotion)?);
        }
        Command::Destroy {
            at,
            owner,
            enemy_type,
            enemy_name,
            note,
        } => {
            let mut details = match (owner, enemy_type) {
                (Some(owner), Some(enemy_type)) => {
                    let enemy = EnemyUnit::new(owner, enemy_type);
                    DestroyDetails::by(match enemy_name {
                        Some(name) => enemy.named(name),
                        None => enemy,
                    })
                }
                _ => DestroyDetails::default(),
            };
            if let Some(note) = note {
                details = details.with_note(note);
            }
            recorded(ledger.destroy_unit_with(at.unit, at.year, details)?);
        }
        Command::Disband { at } => {
            recorded(ledger.disband_unit(at.unit, at.year)?);
        }
        Command::Note { at, text } => {
            recorded(ledger.unit_history(at.unit, at.year, &text)?);
        }
        Command::Victory {
            at,
            owner,
            enemy_type,
            enemy_name,
        } => {
            let enemy = EnemyUnit::new(owner, enemy_type).named(enemy_name.unwrap_or_default());
            recorded(ledger.unit_victory_with(at.unit, at.year, enemy)?);
        }
        Command::DeleteEvent { event } => {
            ledger.delete_event(event)?;
            println!("deleted event {event}");
        }
        Command::View { unit, year, json } => {
            let view = ledger
                .get_unit_view(unit, year)?
                .ok_or(CliError::NoView { unit_id: unit, year })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Command::Events { unit } => {
            for event in ledger.get_events(unit)? {
                let body = event.payload.to_body()?;
                println!("{}\t{}\t{}\t{body}", event.id, event.year, event.kind());
            }
        }
        Command::List { cutoff } => {
            for unit_id in ledger.get_unit_list(cutoff.year, cutoff.live)? {
                let name = ledger
                    .get_unit_view(unit_id, cutoff.year)?
                    .map(|view| view.name)
                    .unwrap_or_default();
                println!("{unit_id}\t{name}");
            }
        }
        Command::Roster { cutoff, flat } => {
            let options = RosterOptions {
                year: cutoff.year,
                live_only: cutoff.live,
                flat,
            };
            let model = StrengthModel::new(&*catalog);
            print!("{}", Roster::build(&*ledger, Some(&model), options)?);
        }
        Command::Report { unit, year } => {
            let model = StrengthModel::new(&*catalog);
            let report = UnitReport::build(&*ledger, unit, year, Some(&model))?
                .ok_or(CliError::NoView { unit_id: unit, year })?;
            print!("{report}");
        }
        Command::Years => match ledger.get_min_max_years()? {
            Some((first, last)) => println!("{first}\t{last}"),
            None => println!("no events recorded"),
        },
        Command::UnitType(sub) => unit_type(sub, catalog)?,
        Command::Promotion(sub) => promotion(sub, catalog)?,
    }
    Ok(())
}

fn unit_type(command: UnitTypeCommand, catalog: &mut GameCatalog) -> Result<(), CliError> {
    match command {
        UnitTypeCommand::Set {
            key,
            display,
            class,
            strength,
            movement,
            cost,
            overwrite,
        } => {
            let record = UnitTypeRecord {
                display: display.unwrap_or_else(|| key.clone()),
                class,
                strength,
                movement,
                cost,
            };
            catalog.set_unit_type(&key, record, overwrite)?;
            catalog.save(None)?;
        }
        UnitTypeCommand::Del { key } => {
            catalog.del_unit_type(&key)?;
            catalog.save(None)?;
        }
        UnitTypeCommand::List => {
            for key in catalog.unit_types() {
                if let Some(record) = catalog.unit_type(key) {
                    println!(
                        "{key}\t{}\t{}\t{}\t{}\t{}",
                        record.display, record.class, record.strength, record.movement, record.cost
                    );
                }
            }
        }
    }
    Ok(())
}

fn promotion(command: PromotionCommand, catalog: &mut GameCatalog) -> Result<(), CliError> {
    match command {
        PromotionCommand::Add { name } => {
            catalog.add_promotion(&name)?;
            catalog.save(None)?;
        }
        PromotionCommand::Del { name } => {
            catalog.del_promotion(&name)?;
            catalog.save(None)?;
        }
        PromotionCommand::List => {
            for name in catalog.promotions() {
                println!("{name}");
            }
        }
    }
    Ok(())
}

fn recorded(event_id: EventId) {
    println!("recorded event {event_id}");
}

fn print_view(view: &UnitView) {
    println!("{} (#{})", view.name, view.id);
    println!("  type:         {}", view.unit_type_display);
    println!("  location:     {}", view.location);
    if let Some(hq) = &view.headquarters {
        println!("  headquarters: {hq}");
    }
    if let Some(parent) = view.composite_unit_id {
        println!("  composite:    #{parent}");
    }
    if !view.subordinate_units.is_empty() {
        let subs: Vec<String> = view
            .subordinate_units
            .iter()
            .map(|id| format!("#{id}"))
            .collect();
        println!("  subordinates: {}", subs.join(", "));
    }
    if !view.promotions.is_empty() {
        println!("  promotions:   {}", view.promotions.join(", "));
    }
    if view.is_dead {
        println!("  status:       destroyed");
    }
    for entry in &view.history {
        println!("  {}: {} (event {})", entry.year, entry.text, entry.event_id);
    }
}
