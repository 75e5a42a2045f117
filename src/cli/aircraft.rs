use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aircraft::{self, AircraftUpdate, NewAircraft};
use crate::cli::{clearable, clearable_parsed, open_db, parse_opt, AircraftCommands, RateArgs};
use crate::cost::{RateConfig, RateFields, RateType};
use crate::error::{Result, TrueHourError};
use crate::fmt::money;
use crate::models::Aircraft;

impl RateArgs {
    fn fields(&self) -> RateFields {
        RateFields {
            hourly_rate_wet: self.wet_rate,
            hourly_rate_dry: self.dry_rate,
            operating_cost_per_hour: self.operating_cost,
            fuel_burn_rate: self.fuel_burn,
            fuel_price_per_gallon: self.fuel_price,
        }
    }
}

pub fn dispatch(command: AircraftCommands) -> Result<()> {
    match command {
        AircraftCommands::Add {
            tail,
            make,
            model,
            year,
            gear,
            complex,
            taa,
            high_performance,
            simulator,
            category,
            rate_type,
            rates,
            notes,
        } => {
            let conn = open_db()?;
            let rate_type: RateType = rate_type.parse()?;
            let new = NewAircraft {
                tail_number: tail,
                make,
                model,
                year,
                gear_type: gear,
                is_complex: complex,
                is_taa: taa,
                is_high_performance: high_performance,
                is_simulator: simulator,
                category: parse_opt(category)?,
                rate: RateConfig::from_fields(rate_type, &rates.fields())?,
                notes,
            };
            let added = aircraft::add_aircraft(&conn, new)?;
            println!(
                "Added aircraft {}: {} at {}/h ({})",
                added.id,
                added.label(),
                money(added.rate.hourly_cost()),
                added.rate.rate_type()
            );
            Ok(())
        }
        AircraftCommands::List { all } => {
            let conn = open_db()?;
            let rows = aircraft::list_aircraft(&conn, !all)?;
            println!("{}", format_aircraft(&rows));
            Ok(())
        }
        AircraftCommands::Show { key } => {
            let conn = open_db()?;
            let a = aircraft::resolve(&conn, &key)?;
            println!("{}", format_detail(&a));
            Ok(())
        }
        AircraftCommands::Edit {
            key,
            tail,
            make,
            model,
            year,
            gear,
            complex,
            taa,
            high_performance,
            simulator,
            category,
            rate_type,
            rates,
            notes,
            active,
        } => {
            let conn = open_db()?;
            let current = aircraft::resolve(&conn, &key)?;
            let year = match clearable(year) {
                None => None,
                Some(None) => Some(None),
                Some(Some(y)) => Some(Some(y.trim().parse::<i32>().map_err(|_| {
                    TrueHourError::validation(format!("year must be a number, got '{y}'"))
                })?)),
            };
            let update = AircraftUpdate {
                tail_number: tail,
                make: clearable(make),
                model: clearable(model),
                year,
                gear_type: clearable(gear),
                is_complex: complex,
                is_taa: taa,
                is_high_performance: high_performance,
                is_simulator: simulator,
                category: clearable_parsed(category)?,
                rate_type: parse_opt(rate_type)?,
                rate_fields: rates.fields(),
                notes: clearable(notes),
                is_active: active,
            };
            let updated = aircraft::update_aircraft(&conn, current.id, update)?;
            println!("Updated aircraft {}: {}", updated.id, updated.label());
            Ok(())
        }
        AircraftCommands::Delete { key } => {
            let conn = open_db()?;
            let current = aircraft::resolve(&conn, &key)?;
            let removed = aircraft::delete_aircraft(&conn, current.id)?;
            println!("Deleted aircraft {}", removed.tail_number);
            Ok(())
        }
    }
}

fn rate_summary(rate: &RateConfig) -> String {
    match *rate {
        RateConfig::Wet { hourly_rate } => format!("{}/h wet", money(hourly_rate)),
        RateConfig::Dry {
            hourly_rate,
            fuel_burn_rate,
            fuel_price_per_gallon,
        } => format!(
            "{}/h dry + {fuel_burn_rate} gal/h at {}",
            money(hourly_rate),
            money(fuel_price_per_gallon)
        ),
        RateConfig::Owned {
            operating_cost_per_hour,
            fuel_burn_rate,
            fuel_price_per_gallon,
        } => format!(
            "{}/h operating + {fuel_burn_rate} gal/h at {}",
            money(operating_cost_per_hour),
            money(fuel_price_per_gallon)
        ),
    }
}

fn features(a: &Aircraft) -> String {
    [
        (a.is_complex, "complex"),
        (a.is_taa, "TAA"),
        (a.is_high_performance, "high-perf"),
        (a.is_simulator, "sim"),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, name)| *name)
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn format_aircraft(rows: &[Aircraft]) -> String {
    if rows.is_empty() {
        return "No aircraft.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Tail", "Type", "Category", "Rate", "Per Hour", "Features"]);
    for a in rows {
        let tail = if a.is_active {
            a.tail_number.normal()
        } else {
            a.tail_number.dimmed()
        };
        let kind = [a.make.as_deref(), a.model.as_deref()]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(tail),
            Cell::new(kind),
            Cell::new(a.category.map(|c| c.to_string()).unwrap_or_default()),
            Cell::new(a.rate.rate_type()),
            Cell::new(money(a.rate.hourly_cost())),
            Cell::new(features(a)),
        ]);
    }
    format!("Aircraft\n{table}")
}

pub fn format_detail(a: &Aircraft) -> String {
    let mut out = format!("{}\n", a.label().bold());
    out.push_str(&format!("ID:        {}\n", a.id));
    if let Some(year) = a.year {
        out.push_str(&format!("Year:      {year}\n"));
    }
    if let Some(gear) = &a.gear_type {
        out.push_str(&format!("Gear:      {gear}\n"));
    }
    if let Some(category) = a.category {
        out.push_str(&format!("Category:  {category}\n"));
    }
    out.push_str(&format!("Rate:      {}\n", rate_summary(&a.rate)));
    out.push_str(&format!("Per hour:  {}\n", money(a.rate.hourly_cost())));
    let f = features(a);
    if !f.is_empty() {
        out.push_str(&format!("Features:  {f}\n"));
    }
    if let Some(notes) = &a.notes {
        out.push_str(&format!("Notes:     {notes}\n"));
    }
    out.push_str(&format!("Active:    {}", if a.is_active { "yes" } else { "no" }));
    out
}
