use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::cards::{create_card, NewCard};
use crate::cost::calculate_cost;
use crate::error::Result;
use crate::models::{round_cents, Aircraft, BudgetCard};
use crate::requirements::Certification;

/// One planned line item for a certification. Items with `hours` are priced
/// from the aircraft when one is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTemplate {
    pub name: &'static str,
    pub category: &'static str,
    pub hours: Option<f64>,
    pub fallback_amount: f64,
}

const fn flight(name: &'static str, hours: f64, fallback_amount: f64) -> CardTemplate {
    CardTemplate {
        name,
        category: "Flight Training",
        hours: Some(hours),
        fallback_amount,
    }
}

const fn fixed(name: &'static str, category: &'static str, amount: f64) -> CardTemplate {
    CardTemplate {
        name,
        category,
        hours: None,
        fallback_amount: amount,
    }
}

const PRIVATE: &[CardTemplate] = &[
    flight("Dual flight instruction", 25.0, 5000.0),
    flight("Solo flight practice", 15.0, 2400.0),
    fixed("Ground school", "Ground School", 300.0),
    fixed("Private knowledge test", "Exams & Checkrides", 175.0),
    fixed("Private checkride", "Exams & Checkrides", 900.0),
    fixed("FAA medical exam", "Medical", 150.0),
];

const INSTRUMENT: &[CardTemplate] = &[
    flight("Instrument dual instruction", 30.0, 6000.0),
    flight("Safety pilot practice", 15.0, 2400.0),
    fixed("Instrument ground school", "Ground School", 250.0),
    fixed("Instrument knowledge test", "Exams & Checkrides", 175.0),
    fixed("Instrument checkride", "Exams & Checkrides", 1000.0),
];

const COMMERCIAL: &[CardTemplate] = &[
    flight("Time building", 100.0, 16000.0),
    flight("Commercial dual instruction", 20.0, 4000.0),
    flight("Complex / TAA training", 10.0, 2500.0),
    fixed("Commercial knowledge test", "Exams & Checkrides", 175.0),
    fixed("Commercial checkride", "Exams & Checkrides", 1100.0),
];

pub fn templates_for(certification: Certification) -> &'static [CardTemplate] {
    match certification {
        Certification::Private => PRIVATE,
        Certification::Instrument => INSTRUMENT,
        Certification::Commercial => COMMERCIAL,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuickstartOptions {
    pub aircraft: Option<Aircraft>,
    pub buffer_percent: f64,
    pub when_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub created: Vec<BudgetCard>,
    pub failed: Vec<FailedItem>,
}

fn build_card(
    template: &CardTemplate,
    certification: Certification,
    options: &QuickstartOptions,
) -> Result<NewCard> {
    let mut card = NewCard::new(
        template.name,
        template.category,
        &options.when_date,
        template.fallback_amount,
    );
    card.tags = vec![certification.as_str().to_string(), "quickstart".to_string()];

    if let (Some(hours), Some(aircraft)) = (template.hours, &options.aircraft) {
        let cost = calculate_cost(&aircraft.rate, hours, Some(options.buffer_percent))?;
        card.budgeted_amount = round_cents(cost.total);
        card.aircraft_id = Some(aircraft.id);
        card.hourly_rate_type = Some(aircraft.rate.rate_type());
        card.associated_hours = Some(hours);
    } else if let Some(hours) = template.hours {
        card.associated_hours = Some(hours);
    }
    Ok(card)
}

/// Creates the certification's template cards. A failing item is recorded
/// and the rest still run.
pub fn quickstart(
    conn: &Connection,
    certification: Certification,
    options: &QuickstartOptions,
) -> BatchReport {
    let mut report = BatchReport::default();
    for template in templates_for(certification) {
        let result = build_card(template, certification, options).and_then(|card| create_card(conn, card));
        match result {
            Ok(card) => report.created.push(card),
            Err(e) => {
                warn!(item = template.name, error = %e, "quickstart item failed");
                report.failed.push(FailedItem {
                    name: template.name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }
    info!(
        certification = %certification,
        created = report.created.len(),
        failed = report.failed.len(),
        "quickstart finished"
    );
    report
}
