use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::aircraft::get_aircraft;
use crate::cli::{open_db, resolve_certification};
use crate::cost::calculate_cost;
use crate::error::{Result, TrueHourError};
use crate::fmt::{hours, money, percent, progress_bar};
use crate::hours::{current_snapshot, latest};
use crate::progress::{report, ProgressReport};
use crate::requirements::Certification;
use crate::settings::{load_settings, Settings};
use crate::timeline::{estimate, TimelineEstimate, TrainingCadence};

const BAR_WIDTH: usize = 20;

pub fn run(cert: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let certification = resolve_certification(cert)?;
    let as_of = latest(&conn)?.map(|r| r.import_date);
    let progress = report(&current_snapshot(&conn)?, certification);
    if let Some(date) = as_of {
        println!("Hours as of {date}");
    } else {
        println!("{}", "No hours recorded yet; every requirement reads 0.".yellow());
    }
    println!("{}", format_progress(&progress));
    Ok(())
}

pub fn timeline(
    cert: Option<String>,
    hours_per_month: Option<f64>,
    cost_per_hour: Option<f64>,
) -> Result<()> {
    let conn = open_db()?;
    let certification = resolve_certification(cert)?;
    let cadence = resolve_cadence(&conn, &load_settings(), hours_per_month, cost_per_hour)?;
    let est = estimate(
        &current_snapshot(&conn)?,
        certification.key_requirement(),
        cadence,
    );
    println!("{}", format_timeline(certification, &est, chrono::Local::now().date_naive()));
    Ok(())
}

/// Training pace from flags, then settings. Cost per hour may also come from
/// one hour on the default aircraft.
pub(crate) fn resolve_cadence(
    conn: &Connection,
    settings: &Settings,
    hours_per_month: Option<f64>,
    cost_per_hour: Option<f64>,
) -> Result<TrainingCadence> {
    let hours_per_month = hours_per_month
        .or(settings.training_hours_per_month)
        .ok_or_else(|| {
            TrueHourError::validation(
                "training pace unknown; pass --hours-per-month or set training_hours_per_month",
            )
        })?;
    let cost_per_hour = match cost_per_hour.or(settings.training_cost_per_hour) {
        Some(c) => c,
        None => {
            let aircraft_id = settings.default_aircraft_id.ok_or_else(|| {
                TrueHourError::validation(
                    "hourly cost unknown; pass --cost-per-hour, set training_cost_per_hour or default_aircraft_id",
                )
            })?;
            let aircraft = get_aircraft(conn, aircraft_id)?;
            calculate_cost(&aircraft.rate, 1.0, None)?.total
        }
    };
    TrainingCadence::new(hours_per_month, cost_per_hour)
}

pub fn format_progress(progress: &ProgressReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Requirement", "Required", "Current", "Remaining", "Progress"]);
    for row in &progress.rows {
        let suffix = row.unit.suffix();
        let label = if row.complete {
            format!("✓ {}", row.label).green()
        } else {
            format!("  {}", row.label).normal()
        };
        table.add_row(vec![
            Cell::new(label),
            Cell::new(format!("{}{suffix}", hours(row.required))),
            Cell::new(format!("{}{suffix}", hours(row.current))),
            Cell::new(format!("{}{suffix}", hours(row.remaining))),
            Cell::new(format!(
                "{} {:>4}",
                progress_bar(row.percent, BAR_WIDTH),
                percent(row.percent)
            )),
        ]);
    }
    format!(
        "{}\n{table}\n{} of {} requirements met, {} overall",
        progress.certification.title().bold(),
        progress.completed,
        progress.total,
        percent(progress.overall_percent)
    )
}

pub fn format_timeline(
    certification: Certification,
    est: &TimelineEstimate,
    today: chrono::NaiveDate,
) -> String {
    let mut out = format!(
        "{}\n{} h remaining toward {} ({} of {} h)\n",
        certification.title().bold(),
        hours(est.remaining_hours),
        est.label,
        hours(est.current),
        hours(est.required)
    );
    if est.months_to_completion == 0 {
        out.push_str(&"Requirement met; no further flight hours budgeted.".green().to_string());
        return out;
    }
    out.push_str(&format!(
        "At {} h/month and {}/h:\n",
        hours(est.cadence.hours_per_month),
        money(est.cadence.cost_per_hour)
    ));
    out.push_str(&format!("  Months to completion:  {}\n", est.months_to_completion));
    if let Some(done) = est.projected_completion(today) {
        out.push_str(&format!("  Projected completion:  {}\n", done.format("%B %Y")));
    }
    out.push_str(&format!("  Estimated budget:      {}\n", money(est.estimated_budget)));
    out.push_str(&format!("  Monthly budget:        {}", money(est.monthly_budget)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{add_aircraft, sample};
    use crate::cost::RateConfig;
    use crate::db::test_db;
    use crate::hours::HoursSnapshot;

    fn snapshot(pairs: &[(&str, f64)]) -> HoursSnapshot {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_cadence_prefers_flags_then_settings() {
        let (_dir, conn) = test_db();
        let mut settings = Settings::default();
        settings.training_hours_per_month = Some(4.0);
        settings.training_cost_per_hour = Some(180.0);

        let c = resolve_cadence(&conn, &settings, None, None).unwrap();
        assert_eq!((c.hours_per_month, c.cost_per_hour), (4.0, 180.0));
        let c = resolve_cadence(&conn, &settings, Some(8.0), Some(150.0)).unwrap();
        assert_eq!((c.hours_per_month, c.cost_per_hour), (8.0, 150.0));
    }

    #[test]
    fn test_cadence_cost_from_default_aircraft() {
        let (_dir, conn) = test_db();
        let rate = RateConfig::Dry {
            hourly_rate: 150.0,
            fuel_burn_rate: 8.0,
            fuel_price_per_gallon: 5.0,
        };
        let plane = add_aircraft(&conn, sample("N733RX", rate)).unwrap();
        let mut settings = Settings::default();
        settings.default_aircraft_id = Some(plane.id);

        let c = resolve_cadence(&conn, &settings, Some(6.0), None).unwrap();
        assert_eq!(c.cost_per_hour, 190.0);
    }

    #[test]
    fn test_cadence_missing_is_validation_error() {
        let (_dir, conn) = test_db();
        let settings = Settings::default();
        let err = resolve_cadence(&conn, &settings, None, Some(100.0)).unwrap_err();
        assert!(err.to_string().contains("hours-per-month"));
        let err = resolve_cadence(&conn, &settings, Some(5.0), None).unwrap_err();
        assert!(err.to_string().contains("cost-per-hour"));
        assert!(resolve_cadence(&conn, &settings, Some(0.0), Some(100.0)).is_err());
    }

    #[test]
    fn test_format_progress_marks_complete_rows() {
        let snap = snapshot(&[("total", 35.0), ("cross_country", 6.0), ("pic", 5.0)]);
        let out = format_progress(&report(&snap, Certification::Private));
        assert!(out.contains("Private Pilot"));
        assert!(out.contains("35.0"));
        assert!(out.contains("requirements met"));
    }

    #[test]
    fn test_format_timeline() {
        let snap = snapshot(&[("total", 28.0)]);
        let cadence = TrainingCadence::new(5.0, 200.0).unwrap();
        let est = estimate(&snap, Certification::Private.key_requirement(), cadence);
        let today = chrono::NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        let out = format_timeline(Certification::Private, &est, today);
        assert!(out.contains("Months to completion:  3"));
        assert!(out.contains("February 2026"));
        assert!(out.contains("$2,400.00"));
        assert!(out.contains("$800.00"));
    }
}
