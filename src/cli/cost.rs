use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aircraft::resolve;
use crate::cli::open_db;
use crate::cost::{calculate_cost, CostBreakdown, RateConfig, RateFields, RateType};
use crate::error::{Result, TrueHourError};
use crate::fmt::{hours, money};
use crate::settings::load_settings;

/// Where the rate for an ad-hoc calculation comes from.
pub enum RateSource {
    Aircraft(String),
    Wet(f64),
    Dry(f64),
    Owned(f64),
}

impl RateSource {
    pub fn from_flags(
        aircraft: Option<String>,
        wet: Option<f64>,
        dry: Option<f64>,
        owned: Option<f64>,
    ) -> Result<Self> {
        match (aircraft, wet, dry, owned) {
            (Some(key), None, None, None) => Ok(RateSource::Aircraft(key)),
            (None, Some(r), None, None) => Ok(RateSource::Wet(r)),
            (None, None, Some(r), None) => Ok(RateSource::Dry(r)),
            (None, None, None, Some(r)) => Ok(RateSource::Owned(r)),
            _ => Err(TrueHourError::validation(
                "give exactly one of --aircraft, --wet, --dry or --owned",
            )),
        }
    }
}

fn rate_from_flags(
    source: RateSource,
    fuel_burn: Option<f64>,
    fuel_price: Option<f64>,
) -> Result<(RateConfig, Option<String>)> {
    let fuel = RateFields {
        fuel_burn_rate: fuel_burn,
        fuel_price_per_gallon: fuel_price,
        ..RateFields::default()
    };
    match source {
        RateSource::Aircraft(key) => {
            let conn = open_db()?;
            let aircraft = resolve(&conn, &key)?;
            Ok((aircraft.rate, Some(aircraft.label())))
        }
        RateSource::Wet(r) => Ok((RateConfig::Wet { hourly_rate: r }, None)),
        RateSource::Dry(r) => {
            let fields = RateFields {
                hourly_rate_dry: Some(r),
                ..fuel
            };
            Ok((RateConfig::from_fields(RateType::Dry, &fields)?, None))
        }
        RateSource::Owned(r) => {
            let fields = RateFields {
                operating_cost_per_hour: Some(r),
                ..fuel
            };
            Ok((RateConfig::from_fields(RateType::Owned, &fields)?, None))
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    aircraft: Option<String>,
    wet: Option<f64>,
    dry: Option<f64>,
    owned: Option<f64>,
    fuel_burn: Option<f64>,
    fuel_price: Option<f64>,
    flight_hours: f64,
    buffer: Option<f64>,
) -> Result<()> {
    let source = RateSource::from_flags(aircraft, wet, dry, owned)?;
    let (rate, label) = rate_from_flags(source, fuel_burn, fuel_price)?;
    let buffer = Some(buffer.unwrap_or(load_settings().budget_buffer_percentage));
    let breakdown = calculate_cost(&rate, flight_hours, buffer)?;
    if let Some(label) = label {
        println!("Priced on {label}");
    }
    println!("{}", format_breakdown(&breakdown));
    Ok(())
}

pub fn format_breakdown(b: &CostBreakdown) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Item", "Value"]);
    table.add_row(vec![Cell::new("Rate type"), Cell::new(b.rate_type)]);
    table.add_row(vec![Cell::new("Hourly cost"), Cell::new(money(b.hourly_cost))]);
    table.add_row(vec![Cell::new("Hours"), Cell::new(hours(b.hours))]);
    if let Some(buffer) = b.buffer_percent {
        table.add_row(vec![Cell::new("Buffer"), Cell::new(format!("{buffer}%"))]);
    }
    table.add_row(vec![
        Cell::new("Effective hours"),
        Cell::new(hours(b.effective_hours)),
    ]);
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(money(b.total).bold())]);
    format!("Cost Estimate\n{table}")
}
