use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::aircraft::resolve;
use crate::cli::{clearable, open_db, today, FlightCountArgs, FlightTimeArgs, FlightsCommands};
use crate::error::{Result, TrueHourError};
use crate::flights::{
    self, Flight, FlightCounts, FlightFilter, FlightSummary, FlightTimes, FlightUpdate, NewFlight,
};
use crate::fmt::hours;

pub fn dispatch(command: FlightsCommands) -> Result<()> {
    match command {
        FlightsCommands::Add {
            date,
            aircraft,
            departure,
            arrival,
            route,
            distance,
            times,
            counts,
            checkride,
            remarks,
        } => {
            let conn = open_db()?;
            let new = NewFlight {
                aircraft_id: aircraft_id(&conn, aircraft.as_deref())?,
                date: date.unwrap_or_else(today),
                departure_airport: departure,
                arrival_airport: arrival,
                route,
                distance,
                times: apply_times(&times, FlightTimes::default()),
                counts: apply_counts(&counts, FlightCounts::default()),
                is_checkride: checkride,
                remarks,
            };
            let flight = flights::add_flight(&conn, new)?;
            println!(
                "Logged flight {}: {} {} ({} h)",
                flight.id,
                flight.date,
                flight.route_label(),
                hours(session(&flight))
            );
            Ok(())
        }
        FlightsCommands::List {
            aircraft,
            from_date,
            to_date,
            limit,
            offset,
        } => {
            let conn = open_db()?;
            let filter = FlightFilter {
                aircraft_id: aircraft_id(&conn, aircraft.as_deref())?,
                from: from_date,
                to: to_date,
                limit: Some(limit),
                offset,
            };
            let rows = flights::list_flights(&conn, &filter)?;
            println!("{}", format_flights(&rows));
            Ok(())
        }
        FlightsCommands::Show { id } => {
            let conn = open_db()?;
            println!("{}", format_detail(&flights::get_flight(&conn, id)?));
            Ok(())
        }
        FlightsCommands::Edit {
            id,
            date,
            aircraft,
            departure,
            arrival,
            route,
            distance,
            times,
            counts,
            checkride,
            remarks,
        } => {
            let conn = open_db()?;
            let current = flights::get_flight(&conn, id)?;
            let aircraft_id = match clearable(aircraft) {
                None => None,
                Some(None) => Some(None),
                Some(Some(key)) => Some(Some(resolve(&conn, &key)?.id)),
            };
            let distance = match clearable(distance) {
                None => None,
                Some(None) => Some(None),
                Some(Some(raw)) => Some(Some(raw.trim().parse::<f64>().map_err(|_| {
                    TrueHourError::validation(format!("distance must be a number, got '{raw}'"))
                })?)),
            };
            let update = FlightUpdate {
                aircraft_id,
                date,
                departure_airport: clearable(departure),
                arrival_airport: clearable(arrival),
                route: clearable(route),
                distance,
                times: Some(apply_times(&times, current.times)),
                counts: Some(apply_counts(&counts, current.counts)),
                is_checkride: checkride,
                remarks: clearable(remarks),
            };
            let flight = flights::update_flight(&conn, id, update)?;
            println!("Updated flight {}: {} {}", flight.id, flight.date, flight.route_label());
            Ok(())
        }
        FlightsCommands::Delete { id } => {
            let conn = open_db()?;
            let flight = flights::delete_flight(&conn, id)?;
            println!("Deleted flight {} ({})", flight.id, flight.date);
            Ok(())
        }
        FlightsCommands::Summary { from_date, to_date } => {
            let conn = open_db()?;
            let summary = flights::flight_summary(&conn, from_date.as_deref(), to_date.as_deref())?;
            println!("{}", format_summary(&summary));
            Ok(())
        }
    }
}

fn aircraft_id(conn: &Connection, key: Option<&str>) -> Result<Option<i64>> {
    key.map(|k| resolve(conn, k).map(|a| a.id)).transpose()
}

fn apply_times(args: &FlightTimeArgs, base: FlightTimes) -> FlightTimes {
    FlightTimes {
        total: args.total.unwrap_or(base.total),
        pic: args.pic.unwrap_or(base.pic),
        sic: args.sic.unwrap_or(base.sic),
        night: args.night.unwrap_or(base.night),
        solo: args.solo.unwrap_or(base.solo),
        cross_country: args.cross_country.unwrap_or(base.cross_country),
        actual_instrument: args.actual_instrument.unwrap_or(base.actual_instrument),
        simulated_instrument: args.simulated_instrument.unwrap_or(base.simulated_instrument),
        simulator: args.simulator.unwrap_or(base.simulator),
        dual_given: args.dual_given.unwrap_or(base.dual_given),
        dual_received: args.dual_received.unwrap_or(base.dual_received),
        complex: args.complex.unwrap_or(base.complex),
        taa: args.taa.unwrap_or(base.taa),
        high_performance: args.high_performance.unwrap_or(base.high_performance),
    }
}

fn apply_counts(args: &FlightCountArgs, base: FlightCounts) -> FlightCounts {
    let pick = |arg: Option<u32>, current: i64| arg.map(i64::from).unwrap_or(current);
    FlightCounts {
        day_takeoffs: pick(args.day_takeoffs, base.day_takeoffs),
        day_landings: pick(args.day_landings, base.day_landings),
        night_takeoffs: pick(args.night_takeoffs, base.night_takeoffs),
        night_landings: pick(args.night_landings, base.night_landings),
        all_landings: pick(args.landings, base.all_landings),
        approaches: pick(args.approaches, base.approaches),
    }
}

fn session(flight: &Flight) -> f64 {
    flight.times.total.max(flight.times.simulator)
}

pub fn format_flights(rows: &[Flight]) -> String {
    if rows.is_empty() {
        return "No flights.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Aircraft", "Route", "Total", "PIC", "XC", "Night", "Inst", "Dual", "Ldg",
    ]);
    let mut total = 0.0;
    for f in rows {
        let t = &f.times;
        let aircraft = if t.simulator > 0.0 && t.total == 0.0 {
            "SIM".to_string()
        } else {
            f.tail_number.clone().unwrap_or_default()
        };
        total += session(f);
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(&f.date),
            Cell::new(aircraft),
            Cell::new(f.route_label()),
            Cell::new(hours(session(f))),
            Cell::new(hours(t.pic)),
            Cell::new(hours(t.cross_country)),
            Cell::new(hours(t.night)),
            Cell::new(hours(t.actual_instrument + t.simulated_instrument)),
            Cell::new(hours(t.dual_received)),
            Cell::new(f.counts.all_landings),
        ]);
    }
    format!("{table}\n{} flight(s), {} h", rows.len(), hours(total))
}

pub fn format_detail(f: &Flight) -> String {
    let mut out = format!("{}\n", format!("Flight #{} {}", f.id, f.date).bold());
    if let Some(tail) = &f.tail_number {
        out.push_str(&format!("Aircraft:   {tail}\n"));
    }
    let route = f.route_label();
    if !route.is_empty() {
        out.push_str(&format!("Route:      {route}\n"));
    }
    if let Some(distance) = f.distance {
        out.push_str(&format!("Distance:   {distance:.0} nm\n"));
    }
    if f.is_checkride {
        out.push_str(&format!("{}\n", "Checkride".green()));
    }

    let t = &f.times;
    let rows = [
        ("Total", t.total),
        ("PIC", t.pic),
        ("SIC", t.sic),
        ("Solo", t.solo),
        ("Dual received", t.dual_received),
        ("Dual given", t.dual_given),
        ("Cross-country", t.cross_country),
        ("Night", t.night),
        ("Actual instrument", t.actual_instrument),
        ("Simulated instrument", t.simulated_instrument),
        ("Simulator", t.simulator),
        ("Complex", t.complex),
        ("TAA", t.taa),
        ("High performance", t.high_performance),
    ];
    let mut table = Table::new();
    table.set_header(vec!["Time", "Hours"]);
    for (label, value) in rows.iter().filter(|(_, v)| *v > 0.0) {
        table.add_row(vec![Cell::new(label), Cell::new(hours(*value))]);
    }
    out.push_str(&format!("{table}\n"));

    let c = &f.counts;
    out.push_str(&format!(
        "Takeoffs:   {} day, {} night\nLandings:   {} day, {} night full stop, {} total\nApproaches: {}",
        c.day_takeoffs, c.night_takeoffs, c.day_landings, c.night_landings, c.all_landings, c.approaches
    ));
    if let Some(remarks) = &f.remarks {
        out.push_str(&format!("\nRemarks:    {remarks}"));
    }
    out
}

pub fn format_summary(s: &FlightSummary) -> String {
    if s.flights == 0 {
        return "No flights in range.".to_string();
    }
    let rows = [
        ("Total", s.total),
        ("PIC", s.pic),
        ("SIC", s.sic),
        ("Night", s.night),
        ("Cross-country", s.cross_country),
        ("Actual instrument", s.actual_instrument),
        ("Simulated instrument", s.simulated_instrument),
        ("Simulator", s.simulator),
        ("Dual received", s.dual_received),
        ("Dual given", s.dual_given),
        ("Complex", s.complex),
        ("High performance", s.high_performance),
    ];
    let mut table = Table::new();
    table.set_header(vec!["Time", "Hours"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(hours(value))]);
    }
    table.add_row(vec![Cell::new("Landings"), Cell::new(s.landings)]);
    table.add_row(vec![Cell::new("Night landings"), Cell::new(s.night_landings)]);
    format!("Logbook Summary ({} flights)\n{table}", s.flights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::flights::{add_flight, flight_summary, sample};

    #[test]
    fn test_apply_times_keeps_unset_fields() {
        let base = FlightTimes {
            total: 1.5,
            pic: 1.5,
            night: 0.4,
            ..FlightTimes::default()
        };
        let args = FlightTimeArgs {
            night: Some(0.8),
            cross_country: Some(1.1),
            ..FlightTimeArgs::default()
        };
        let merged = apply_times(&args, base);
        assert_eq!(merged.total, 1.5);
        assert_eq!(merged.night, 0.8);
        assert_eq!(merged.cross_country, 1.1);

        let counts = apply_counts(
            &FlightCountArgs {
                approaches: Some(2),
                ..FlightCountArgs::default()
            },
            FlightCounts {
                all_landings: 4,
                ..FlightCounts::default()
            },
        );
        assert_eq!(counts.approaches, 2);
        assert_eq!(counts.all_landings, 4);
    }

    #[test]
    fn test_format_flights_and_detail() {
        let (_dir, conn) = test_db();
        let mut new = sample("2025-04-02", 1.3);
        new.route = Some("KAMW KDSM".into());
        new.remarks = Some("steep turns".into());
        let flight = add_flight(&conn, new).unwrap();
        add_flight(&conn, sample("2025-04-05", 1.2)).unwrap();
        let rows = flights::list_flights(&conn, &FlightFilter::default()).unwrap();
        let out = format_flights(&rows);
        assert!(out.contains("KAMW KDSM"));
        assert!(out.contains("2 flight(s), 2.5 h"));
        assert_eq!(format_flights(&[]), "No flights.");

        let detail = format_detail(&flight);
        assert!(detail.contains("Flight #1 2025-04-02"));
        assert!(detail.contains("Dual received"));
        assert!(!detail.contains("Simulator"));
        assert!(detail.contains("steep turns"));
    }

    #[test]
    fn test_format_summary() {
        let (_dir, conn) = test_db();
        assert_eq!(
            format_summary(&flight_summary(&conn, None, None).unwrap()),
            "No flights in range."
        );
        add_flight(&conn, sample("2025-04-02", 1.3)).unwrap();
        let out = format_summary(&flight_summary(&conn, None, None).unwrap());
        assert!(out.contains("Logbook Summary (1 flights)"));
        assert!(out.contains("1.3"));
    }
}
