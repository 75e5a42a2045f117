use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, TrueHourError};
use crate::hours::HoursSnapshot;
use crate::models::{optional_text, parse_date, require_non_negative, round_cents};

pub const MAX_PAGE: usize = 1000;

/// Logged durations for one flight, in hours. `simulator` is time in a
/// training device rather than an aircraft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlightTimes {
    pub total: f64,
    pub pic: f64,
    pub sic: f64,
    pub night: f64,
    pub solo: f64,
    pub cross_country: f64,
    pub actual_instrument: f64,
    pub simulated_instrument: f64,
    pub simulator: f64,
    pub dual_given: f64,
    pub dual_received: f64,
    pub complex: f64,
    pub taa: f64,
    pub high_performance: f64,
}

impl FlightTimes {
    fn labelled(&self) -> [(&'static str, f64); 14] {
        [
            ("total time", self.total),
            ("PIC time", self.pic),
            ("SIC time", self.sic),
            ("night time", self.night),
            ("solo time", self.solo),
            ("cross-country time", self.cross_country),
            ("actual instrument time", self.actual_instrument),
            ("simulated instrument time", self.simulated_instrument),
            ("simulator time", self.simulator),
            ("dual given", self.dual_given),
            ("dual received", self.dual_received),
            ("complex time", self.complex),
            ("TAA time", self.taa),
            ("high-performance time", self.high_performance),
        ]
    }

    /// Every component fits inside the session, which is the aircraft total
    /// or, for a device session, the simulator time.
    fn validate(&self) -> Result<()> {
        for (label, value) in self.labelled() {
            require_non_negative(label, value)?;
        }
        let session = self.total.max(self.simulator);
        if session <= 0.0 {
            return Err(TrueHourError::validation(
                "a flight needs total time or simulator time",
            ));
        }
        for (label, value) in self.labelled().into_iter().skip(1) {
            if label != "simulator time" && value > session + 1e-9 {
                return Err(TrueHourError::validation(format!(
                    "{label} ({value}) exceeds the session length ({session})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FlightCounts {
    pub day_takeoffs: i64,
    pub day_landings: i64,
    pub night_takeoffs: i64,
    pub night_landings: i64,
    pub all_landings: i64,
    pub approaches: i64,
}

impl FlightCounts {
    fn validate(&self) -> Result<()> {
        let all = [
            self.day_takeoffs,
            self.day_landings,
            self.night_takeoffs,
            self.night_landings,
            self.all_landings,
            self.approaches,
        ];
        if all.iter().any(|n| *n < 0) {
            return Err(TrueHourError::validation(
                "takeoff, landing and approach counts must be zero or greater",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flight {
    pub id: i64,
    pub aircraft_id: Option<i64>,
    pub tail_number: Option<String>,
    pub date: String,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub route: Option<String>,
    /// Nautical miles.
    pub distance: Option<f64>,
    pub times: FlightTimes,
    pub counts: FlightCounts,
    pub is_checkride: bool,
    pub remarks: Option<String>,
}

impl Flight {
    pub fn route_label(&self) -> String {
        if let Some(route) = &self.route {
            return route.clone();
        }
        match (&self.departure_airport, &self.arrival_airport) {
            (Some(from), Some(to)) => format!("{from} - {to}"),
            (Some(a), None) | (None, Some(a)) => a.clone(),
            (None, None) => String::new(),
        }
    }

    fn in_aircraft(&self) -> bool {
        self.times.simulator == 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewFlight {
    pub aircraft_id: Option<i64>,
    pub date: String,
    pub departure_airport: Option<String>,
    pub arrival_airport: Option<String>,
    pub route: Option<String>,
    pub distance: Option<f64>,
    pub times: FlightTimes,
    pub counts: FlightCounts,
    pub is_checkride: bool,
    pub remarks: Option<String>,
}

/// Partial update. `Some(None)` clears an optional column. `times` and
/// `counts` replace the stored values as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightUpdate {
    pub aircraft_id: Option<Option<i64>>,
    pub date: Option<String>,
    pub departure_airport: Option<Option<String>>,
    pub arrival_airport: Option<Option<String>>,
    pub route: Option<Option<String>>,
    pub distance: Option<Option<f64>>,
    pub times: Option<FlightTimes>,
    pub counts: Option<FlightCounts>,
    pub is_checkride: Option<bool>,
    pub remarks: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightFilter {
    pub aircraft_id: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightSummary {
    pub flights: i64,
    pub total: f64,
    pub pic: f64,
    pub sic: f64,
    pub night: f64,
    pub cross_country: f64,
    pub actual_instrument: f64,
    pub simulated_instrument: f64,
    pub simulator: f64,
    pub dual_received: f64,
    pub dual_given: f64,
    pub complex: f64,
    pub high_performance: f64,
    pub landings: i64,
    pub night_landings: i64,
}

const FLIGHT_COLUMNS: &str = "f.id, f.aircraft_id, a.tail_number, f.date, f.departure_airport, \
     f.arrival_airport, f.route, f.distance, f.total_time, f.pic_time, f.sic_time, f.night_time, \
     f.solo_time, f.cross_country_time, f.actual_instrument_time, f.simulated_instrument_time, \
     f.simulated_flight_time, f.dual_given_time, f.dual_received_time, f.complex_time, f.taa_time, \
     f.high_performance_time, f.day_takeoffs, f.day_landings_full_stop, f.night_takeoffs, \
     f.night_landings_full_stop, f.all_landings, f.approaches, f.is_checkride, f.remarks";

const FLIGHT_FROM: &str = "flights f LEFT JOIN aircraft a ON a.id = f.aircraft_id";

fn row_to_flight(row: &rusqlite::Row) -> rusqlite::Result<Flight> {
    Ok(Flight {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        tail_number: row.get(2)?,
        date: row.get(3)?,
        departure_airport: row.get(4)?,
        arrival_airport: row.get(5)?,
        route: row.get(6)?,
        distance: row.get(7)?,
        times: FlightTimes {
            total: row.get(8)?,
            pic: row.get(9)?,
            sic: row.get(10)?,
            night: row.get(11)?,
            solo: row.get(12)?,
            cross_country: row.get(13)?,
            actual_instrument: row.get(14)?,
            simulated_instrument: row.get(15)?,
            simulator: row.get(16)?,
            dual_given: row.get(17)?,
            dual_received: row.get(18)?,
            complex: row.get(19)?,
            taa: row.get(20)?,
            high_performance: row.get(21)?,
        },
        counts: FlightCounts {
            day_takeoffs: row.get(22)?,
            day_landings: row.get(23)?,
            night_takeoffs: row.get(24)?,
            night_landings: row.get(25)?,
            all_landings: row.get(26)?,
            approaches: row.get(27)?,
        },
        is_checkride: row.get(28)?,
        remarks: row.get(29)?,
    })
}

fn airport(code: Option<String>) -> Option<String> {
    optional_text(code).map(|c| c.to_ascii_uppercase())
}

fn route(raw: Option<String>) -> Option<String> {
    optional_text(raw).map(|r| r.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase())
}

fn check_distance(distance: Option<f64>) -> Result<Option<f64>> {
    distance.map(|d| require_non_negative("distance", d)).transpose()
}

fn check_aircraft(conn: &Connection, aircraft_id: Option<i64>) -> Result<()> {
    if let Some(id) = aircraft_id {
        crate::aircraft::get_aircraft(conn, id)?;
    }
    Ok(())
}

struct FlightRow<'a> {
    aircraft_id: Option<i64>,
    date: &'a str,
    departure_airport: Option<&'a str>,
    arrival_airport: Option<&'a str>,
    route: Option<&'a str>,
    distance: Option<f64>,
    times: &'a FlightTimes,
    counts: &'a FlightCounts,
    is_checkride: bool,
    remarks: Option<&'a str>,
}

impl FlightRow<'_> {
    fn params(&self) -> Vec<Value> {
        let t = self.times;
        let c = self.counts;
        let text = |v: Option<&str>| v.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null);
        vec![
            self.aircraft_id.map(Value::Integer).unwrap_or(Value::Null),
            Value::Text(self.date.to_string()),
            text(self.departure_airport),
            text(self.arrival_airport),
            text(self.route),
            self.distance.map(Value::Real).unwrap_or(Value::Null),
            Value::Real(t.total),
            Value::Real(t.pic),
            Value::Real(t.sic),
            Value::Real(t.night),
            Value::Real(t.solo),
            Value::Real(t.cross_country),
            Value::Real(t.actual_instrument),
            Value::Real(t.simulated_instrument),
            Value::Real(t.simulator),
            Value::Real(t.dual_given),
            Value::Real(t.dual_received),
            Value::Real(t.complex),
            Value::Real(t.taa),
            Value::Real(t.high_performance),
            Value::Integer(c.day_takeoffs),
            Value::Integer(c.day_landings),
            Value::Integer(c.night_takeoffs),
            Value::Integer(c.night_landings),
            Value::Integer(c.all_landings),
            Value::Integer(c.approaches),
            Value::Integer(self.is_checkride as i64),
            text(self.remarks),
        ]
    }
}

const WRITE_COLUMNS: &str = "aircraft_id, date, departure_airport, arrival_airport, route, distance, \
     total_time, pic_time, sic_time, night_time, solo_time, cross_country_time, \
     actual_instrument_time, simulated_instrument_time, simulated_flight_time, dual_given_time, \
     dual_received_time, complex_time, taa_time, high_performance_time, day_takeoffs, \
     day_landings_full_stop, night_takeoffs, night_landings_full_stop, all_landings, approaches, \
     is_checkride, remarks";

pub fn get_flight(conn: &Connection, id: i64) -> Result<Flight> {
    conn.query_row(
        &format!("SELECT {FLIGHT_COLUMNS} FROM {FLIGHT_FROM} WHERE f.id = ?1"),
        [id],
        row_to_flight,
    )
    .optional()?
    .ok_or_else(|| TrueHourError::not_found("Flight", id))
}

pub fn add_flight(conn: &Connection, new: NewFlight) -> Result<Flight> {
    let date = parse_date(&new.date)?;
    new.times.validate()?;
    new.counts.validate()?;
    let distance = check_distance(new.distance)?;
    check_aircraft(conn, new.aircraft_id)?;
    let departure = airport(new.departure_airport);
    let arrival = airport(new.arrival_airport);
    let route = route(new.route);
    let remarks = optional_text(new.remarks);

    let row = FlightRow {
        aircraft_id: new.aircraft_id,
        date: &date,
        departure_airport: departure.as_deref(),
        arrival_airport: arrival.as_deref(),
        route: route.as_deref(),
        distance,
        times: &new.times,
        counts: &new.counts,
        is_checkride: new.is_checkride,
        remarks: remarks.as_deref(),
    };
    let placeholders = vec!["?"; 28].join(", ");
    conn.execute(
        &format!("INSERT INTO flights ({WRITE_COLUMNS}) VALUES ({placeholders})"),
        rusqlite::params_from_iter(row.params()),
    )?;
    let id = conn.last_insert_rowid();
    info!(id, date = %date, total = new.times.total, "logged flight");
    get_flight(conn, id)
}

pub fn update_flight(conn: &Connection, id: i64, update: FlightUpdate) -> Result<Flight> {
    let current = get_flight(conn, id)?;
    let date = match update.date {
        Some(d) => parse_date(&d)?,
        None => current.date.clone(),
    };
    let times = update.times.unwrap_or(current.times);
    times.validate()?;
    let counts = update.counts.unwrap_or(current.counts);
    counts.validate()?;
    let distance = match update.distance {
        Some(d) => check_distance(d)?,
        None => current.distance,
    };
    let aircraft_id = update.aircraft_id.unwrap_or(current.aircraft_id);
    check_aircraft(conn, aircraft_id)?;
    let departure = update.departure_airport.map(airport).unwrap_or(current.departure_airport);
    let arrival = update.arrival_airport.map(airport).unwrap_or(current.arrival_airport);
    let route = update.route.map(route).unwrap_or(current.route);
    let remarks = update.remarks.map(optional_text).unwrap_or(current.remarks);

    let row = FlightRow {
        aircraft_id,
        date: &date,
        departure_airport: departure.as_deref(),
        arrival_airport: arrival.as_deref(),
        route: route.as_deref(),
        distance,
        times: &times,
        counts: &counts,
        is_checkride: update.is_checkride.unwrap_or(current.is_checkride),
        remarks: remarks.as_deref(),
    };
    let assignments = WRITE_COLUMNS
        .split(',')
        .map(|c| format!("{} = ?", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params = row.params();
    params.push(Value::Integer(id));
    conn.execute(
        &format!("UPDATE flights SET {assignments}, updated_at = datetime('now') WHERE id = ?"),
        rusqlite::params_from_iter(params),
    )?;
    info!(id, "updated flight");
    get_flight(conn, id)
}

pub fn delete_flight(conn: &Connection, id: i64) -> Result<Flight> {
    let flight = get_flight(conn, id)?;
    conn.execute("DELETE FROM flights WHERE id = ?1", [id])?;
    info!(id, "deleted flight");
    Ok(flight)
}

fn date_range(from: Option<&str>, to: Option<&str>) -> Result<(Option<String>, Option<String>)> {
    Ok((from.map(parse_date).transpose()?, to.map(parse_date).transpose()?))
}

pub fn list_flights(conn: &Connection, filter: &FlightFilter) -> Result<Vec<Flight>> {
    let limit = filter.limit.unwrap_or(100);
    if limit == 0 || limit > MAX_PAGE {
        return Err(TrueHourError::validation(format!(
            "limit must be between 1 and {MAX_PAGE}"
        )));
    }
    let (from, to) = date_range(filter.from.as_deref(), filter.to.as_deref())?;
    let sql = format!(
        "SELECT {FLIGHT_COLUMNS} FROM {FLIGHT_FROM}
         WHERE (?1 IS NULL OR f.aircraft_id = ?1)
           AND (?2 IS NULL OR f.date >= ?2) AND (?3 IS NULL OR f.date <= ?3)
         ORDER BY f.date DESC, f.id DESC LIMIT ?4 OFFSET ?5"
    );
    debug!(sql = %sql, "listing flights");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params![filter.aircraft_id, from, to, limit as i64, filter.offset as i64],
            row_to_flight,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every flight, oldest first.
pub fn all_flights(conn: &Connection) -> Result<Vec<Flight>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FLIGHT_COLUMNS} FROM {FLIGHT_FROM} ORDER BY f.date, f.id"
    ))?;
    let rows = stmt
        .query_map([], row_to_flight)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn flight_summary(conn: &Connection, from: Option<&str>, to: Option<&str>) -> Result<FlightSummary> {
    let (from, to) = date_range(from, to)?;
    conn.query_row(
        "SELECT count(*), COALESCE(SUM(total_time), 0), COALESCE(SUM(pic_time), 0),
            COALESCE(SUM(sic_time), 0), COALESCE(SUM(night_time), 0),
            COALESCE(SUM(cross_country_time), 0), COALESCE(SUM(actual_instrument_time), 0),
            COALESCE(SUM(simulated_instrument_time), 0), COALESCE(SUM(simulated_flight_time), 0),
            COALESCE(SUM(dual_received_time), 0), COALESCE(SUM(dual_given_time), 0),
            COALESCE(SUM(complex_time), 0), COALESCE(SUM(high_performance_time), 0),
            COALESCE(SUM(all_landings), 0), COALESCE(SUM(night_landings_full_stop), 0)
         FROM flights
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)",
        rusqlite::params![from, to],
        |row| {
            Ok(FlightSummary {
                flights: row.get(0)?,
                total: round_cents(row.get(1)?),
                pic: round_cents(row.get(2)?),
                sic: round_cents(row.get(3)?),
                night: round_cents(row.get(4)?),
                cross_country: round_cents(row.get(5)?),
                actual_instrument: round_cents(row.get(6)?),
                simulated_instrument: round_cents(row.get(7)?),
                simulator: round_cents(row.get(8)?),
                dual_received: round_cents(row.get(9)?),
                dual_given: round_cents(row.get(10)?),
                complex: round_cents(row.get(11)?),
                high_performance: round_cents(row.get(12)?),
                landings: row.get(13)?,
                night_landings: row.get(14)?,
            })
        },
    )
    .map_err(Into::into)
}

// ---------------------------------------------------------------------------
// Requirement totals
// ---------------------------------------------------------------------------

const TOWERED: &[&str] = &[
    "KALO", "KAMW", "KATL", "KAUS", "KBNA", "KBOS", "KBWI", "KCLE", "KCVG", "KDAL", "KDCA", "KDEN",
    "KDFW", "KDSM", "KEWR", "KIAH", "KJFK", "KLAS", "KLAX", "KLGA", "KMCO", "KMDW", "KMIA", "KMSY",
    "KOAK", "KORD", "KPDX", "KPHX", "KPIT", "KRDU", "KSAN", "KSDA", "KSEA", "KSFO", "KSLC", "KSMF",
    "KSNA", "KSTL",
];

/// Days counted as "the last two calendar months" for recency requirements.
const RECENT_DAYS: i64 = 60;

const SIMULATOR_INSTRUMENT_CAP: f64 = 5.0;
const TOWERED_OPS_CAP: f64 = 3.0;
const NIGHT_TOWERED_CAP: f64 = 10.0;

fn is_towered(code: Option<&str>) -> bool {
    code.is_some_and(|c| TOWERED.contains(&c))
}

/// ICAO airport codes in a route string (four letters beginning with K).
fn route_airports(route: Option<&str>) -> usize {
    route
        .unwrap_or("")
        .split_whitespace()
        .filter(|s| s.len() == 4 && s.starts_with('K') && s.chars().all(|c| c.is_ascii_alphabetic()))
        .count()
}

fn flag(met: bool) -> f64 {
    if met {
        1.0
    } else {
        0.0
    }
}

/// Derives the snapshot fields the certification tables read from a logbook.
/// Recency fields count flights on or after `today` minus sixty days.
pub fn logbook_totals(flights: &[Flight], today: NaiveDate) -> HoursSnapshot {
    let cutoff = (today - chrono::Duration::days(RECENT_DAYS))
        .format("%Y-%m-%d")
        .to_string();

    let mut sums: std::collections::BTreeMap<&'static str, f64> = std::collections::BTreeMap::new();
    let mut add = |key: &'static str, value: f64| *sums.entry(key).or_insert(0.0) += value;

    let mut long_xc = false;
    let mut ir_xc = false;
    let mut day_xc = false;
    let mut night_xc = false;
    let mut xc_300 = false;
    let mut towered_ops: f64 = 0.0;
    let mut night_takeoffs: f64 = 0.0;
    let mut night_landings: f64 = 0.0;

    for f in flights {
        let t = &f.times;
        let c = &f.counts;
        let recent = f.date.as_str() >= cutoff.as_str();
        let distance = f.distance.unwrap_or(0.0);
        let airports = route_airports(f.route.as_deref());
        let instrument = t.actual_instrument + t.simulated_instrument;

        add("total", t.total);
        add("pic", t.pic);
        add("sic", t.sic);
        add("cross_country", t.cross_country);
        add("night", t.night);
        add("solo", t.solo);
        add("dual_received", t.dual_received);
        add("dual_given", t.dual_given);
        add("simulator_time", t.simulator);
        add("actual_instrument", t.actual_instrument);
        add("simulated_instrument", t.simulated_instrument);
        add("instrument_total", instrument);
        add("complex", t.complex);
        add("taa", t.taa);
        add("high_performance", t.high_performance);

        if t.dual_received > 0.0 && t.complex > 0.0 {
            add("complex_dual", t.dual_received.min(t.complex));
        }
        if t.pic > 0.0 && t.cross_country > 0.0 {
            add("pic_xc", t.pic.min(t.cross_country));
        }
        if t.dual_received > 0.0 && t.cross_country > 0.0 {
            add("dual_xc", t.dual_received.min(t.cross_country));
        }
        if t.dual_received > 0.0 && t.pic > 0.0 && t.simulated_instrument > 0.0 && f.in_aircraft() {
            add("instrument_dual_airplane", t.dual_received.min(t.simulated_instrument));
        }
        if t.dual_received > 0.0 && !f.in_aircraft() && t.simulated_instrument > 0.0 {
            add("instrument_dual_simulator", t.dual_received.min(t.simulated_instrument));
        }
        if recent && t.dual_received > 0.0 && instrument > 0.0 && f.in_aircraft() {
            add("recent_instrument", t.dual_received.min(instrument));
        }
        if recent && t.dual_received > 0.0 && f.in_aircraft() {
            add("cpl_checkride_prep_recent", t.dual_received);
        }
        if t.night > 0.0 && (t.solo > 0.0 || t.dual_received > 0.0) {
            add("cpl_night_vfr", t.night);
        }

        if distance >= 150.0 && t.solo > 0.0 && airports >= 3 {
            long_xc = true;
        }
        if t.solo > 0.0 {
            if is_towered(f.departure_airport.as_deref()) {
                towered_ops += c.day_takeoffs as f64;
            }
            if is_towered(f.arrival_airport.as_deref()) {
                towered_ops += c.day_landings as f64;
            }
        }
        if t.night > 0.0 {
            if is_towered(f.departure_airport.as_deref()) {
                night_takeoffs += c.night_takeoffs as f64;
            }
            if is_towered(f.arrival_airport.as_deref()) {
                night_landings += c.night_landings as f64;
            }
        }
        if distance >= 250.0 && c.approaches >= 3 && airports >= 3 && instrument > 0.0 {
            ir_xc = true;
        }
        let mostly_day = t.night == 0.0 || t.total > t.night;
        if mostly_day && t.total >= 2.0 && distance >= 100.0 && t.dual_received > 0.0 {
            day_xc = true;
        }
        if t.night >= 2.0 && distance >= 100.0 && t.dual_received > 0.0 {
            night_xc = true;
        }
        if distance >= 300.0
            && airports >= 3
            && (t.solo > 0.0 || (t.pic > 0.0 && t.dual_received > 0.0))
        {
            xc_300 = true;
        }
    }

    let get = |key: &str| sums.get(key).copied().unwrap_or(0.0);
    let airplane_dual = get("instrument_dual_airplane");
    let simulator_dual = get("instrument_dual_simulator").min(SIMULATOR_INSTRUMENT_CAP);
    let derived = [
        ("cpl_sim_instrument_training", airplane_dual + simulator_dual),
        ("cpl_sim_instrument_airplane", airplane_dual),
        ("cpl_complex_turbine_taa", get("complex_dual")),
        ("cpl_solo_se", get("solo")),
        ("private_long_xc", flag(long_xc)),
        ("private_towered_ops", towered_ops.min(TOWERED_OPS_CAP)),
        ("ir_250nm_xc", flag(ir_xc)),
        ("cpl_2hr_day_xc", flag(day_xc)),
        ("cpl_2hr_night_xc", flag(night_xc)),
        ("cpl_300nm_xc", flag(xc_300)),
        ("cpl_night_takeoffs_towered", night_takeoffs.min(NIGHT_TOWERED_CAP)),
        ("cpl_night_landings_towered", night_landings.min(NIGHT_TOWERED_CAP)),
    ];

    let mut snapshot: HoursSnapshot = sums
        .iter()
        .map(|(k, v)| (k.to_string(), round_cents(*v)))
        .collect();
    for key in ["pic_xc", "dual_xc", "recent_instrument", "cpl_checkride_prep_recent", "cpl_night_vfr"] {
        if !sums.contains_key(key) {
            snapshot.set(key, 0.0);
        }
    }
    for (key, value) in derived {
        snapshot.set(key, round_cents(value));
    }
    snapshot
}

#[cfg(test)]
pub(crate) fn sample(date: &str, total: f64) -> NewFlight {
    NewFlight {
        date: date.into(),
        departure_airport: Some("kamw".into()),
        arrival_airport: Some("KAMW".into()),
        times: FlightTimes {
            total,
            pic: total,
            dual_received: total,
            ..FlightTimes::default()
        },
        counts: FlightCounts {
            day_takeoffs: 1,
            day_landings: 1,
            all_landings: 1,
            ..FlightCounts::default()
        },
        ..NewFlight::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{add_aircraft, sample as aircraft_sample};
    use crate::cost::RateConfig;
    use crate::db::test_db;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn logged(conn: &Connection, new: NewFlight) -> Flight {
        add_flight(conn, new).unwrap()
    }

    #[test]
    fn test_add_normalises_and_joins_tail() {
        let (_dir, conn) = test_db();
        let plane = add_aircraft(
            &conn,
            aircraft_sample("N172SP", RateConfig::Wet { hourly_rate: 165.0 }),
        )
        .unwrap();
        let mut new = sample("03/04/2025", 1.4);
        new.aircraft_id = Some(plane.id);
        new.route = Some(" kamw   kdsm kamw ".into());
        let flight = logged(&conn, new);
        assert_eq!(flight.date, "2025-03-04");
        assert_eq!(flight.departure_airport.as_deref(), Some("KAMW"));
        assert_eq!(flight.route.as_deref(), Some("KAMW KDSM KAMW"));
        assert_eq!(flight.tail_number.as_deref(), Some("N172SP"));
        assert_eq!(flight.times.total, 1.4);
    }

    #[test]
    fn test_add_validates_times() {
        let (_dir, conn) = test_db();
        assert!(add_flight(&conn, sample("2025-03-04", 0.0)).is_err());
        let mut over = sample("2025-03-04", 1.0);
        over.times.night = 1.5;
        assert!(add_flight(&conn, over).is_err());
        let mut negative = sample("2025-03-04", 1.0);
        negative.counts.approaches = -1;
        assert!(add_flight(&conn, negative).is_err());
        let mut unknown = sample("2025-03-04", 1.0);
        unknown.aircraft_id = Some(77);
        assert!(matches!(add_flight(&conn, unknown), Err(TrueHourError::NotFound { .. })));

        let device = NewFlight {
            date: "2025-03-04".into(),
            times: FlightTimes {
                simulator: 1.0,
                dual_received: 1.0,
                simulated_instrument: 1.0,
                ..FlightTimes::default()
            },
            ..NewFlight::default()
        };
        assert!(add_flight(&conn, device).is_ok());
        let count: i64 = conn.query_row("SELECT count(*) FROM flights", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let (_dir, conn) = test_db();
        let flight = logged(&conn, sample("2025-03-04", 1.2));
        let mut times = flight.times;
        times.night = 0.5;
        let updated = update_flight(
            &conn,
            flight.id,
            FlightUpdate {
                times: Some(times),
                remarks: Some(Some("first night lesson".into())),
                arrival_airport: Some(None),
                ..FlightUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.times.night, 0.5);
        assert_eq!(updated.times.total, 1.2);
        assert_eq!(updated.arrival_airport, None);
        assert_eq!(updated.departure_airport.as_deref(), Some("KAMW"));
        assert_eq!(updated.remarks.as_deref(), Some("first night lesson"));

        times.pic = 9.0;
        let bad = FlightUpdate {
            times: Some(times),
            ..FlightUpdate::default()
        };
        assert!(update_flight(&conn, flight.id, bad).is_err());
        assert_eq!(get_flight(&conn, flight.id).unwrap().times.pic, 1.2);
    }

    #[test]
    fn test_delete_and_missing() {
        let (_dir, conn) = test_db();
        let flight = logged(&conn, sample("2025-03-04", 1.0));
        delete_flight(&conn, flight.id).unwrap();
        assert!(matches!(get_flight(&conn, flight.id), Err(TrueHourError::NotFound { .. })));
        assert!(delete_flight(&conn, flight.id).is_err());
    }

    #[test]
    fn test_list_filters_and_summary() {
        let (_dir, conn) = test_db();
        logged(&conn, sample("2025-01-10", 1.0));
        logged(&conn, sample("2025-02-10", 1.5));
        let mut night = sample("2025-02-20", 2.0);
        night.times.night = 1.2;
        night.counts.night_landings = 3;
        night.counts.all_landings = 3;
        logged(&conn, night);

        let all = list_flights(&conn, &FlightFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date, "2025-02-20");
        let feb = FlightFilter {
            from: Some("2025-02-01".into()),
            ..FlightFilter::default()
        };
        assert_eq!(list_flights(&conn, &feb).unwrap().len(), 2);
        let too_big = FlightFilter {
            limit: Some(MAX_PAGE + 1),
            ..FlightFilter::default()
        };
        assert!(list_flights(&conn, &too_big).is_err());

        let summary = flight_summary(&conn, None, None).unwrap();
        assert_eq!(summary.flights, 3);
        assert_eq!(summary.total, 4.5);
        assert_eq!(summary.night, 1.2);
        assert_eq!(summary.landings, 5);
        assert_eq!(summary.night_landings, 3);
        assert_eq!(flight_summary(&conn, Some("2025-02-15"), None).unwrap().flights, 1);
    }

    fn flight(date: &str, times: FlightTimes) -> Flight {
        Flight {
            id: 0,
            aircraft_id: None,
            tail_number: None,
            date: date.into(),
            departure_airport: None,
            arrival_airport: None,
            route: None,
            distance: None,
            times,
            counts: FlightCounts::default(),
            is_checkride: false,
            remarks: None,
        }
    }

    #[test]
    fn test_logbook_totals_private_fields() {
        let hood = flight(
            "2024-11-10",
            FlightTimes {
                total: 1.5,
                pic: 1.5,
                dual_received: 1.5,
                simulated_instrument: 0.5,
                ..FlightTimes::default()
            },
        );
        let mut long_solo = flight(
            "2025-02-01",
            FlightTimes {
                total: 3.2,
                pic: 3.2,
                solo: 3.2,
                cross_country: 3.2,
                ..FlightTimes::default()
            },
        );
        long_solo.distance = Some(160.0);
        long_solo.route = Some("KAMW KDSM KALO KAMW".into());
        long_solo.departure_airport = Some("KAMW".into());
        long_solo.arrival_airport = Some("KAMW".into());
        long_solo.counts.day_takeoffs = 1;
        long_solo.counts.day_landings = 3;
        let mut night_dual = flight(
            "2025-02-20",
            FlightTimes {
                total: 2.5,
                pic: 2.5,
                dual_received: 2.5,
                cross_country: 2.5,
                night: 2.1,
                ..FlightTimes::default()
            },
        );
        night_dual.distance = Some(110.0);
        let device = flight(
            "2025-02-25",
            FlightTimes {
                simulator: 1.0,
                dual_received: 1.0,
                simulated_instrument: 1.0,
                ..FlightTimes::default()
            },
        );
        let complex = flight(
            "2024-10-01",
            FlightTimes {
                total: 1.2,
                pic: 1.2,
                dual_received: 1.2,
                complex: 1.2,
                ..FlightTimes::default()
            },
        );

        let snap = logbook_totals(&[hood, long_solo, night_dual, device, complex], day("2025-03-01"));
        assert_eq!(snap.get("total"), 8.4);
        assert_eq!(snap.get("solo"), 3.2);
        assert_eq!(snap.get("dual_received"), 6.2);
        assert_eq!(snap.get("pic_xc"), 5.7);
        assert_eq!(snap.get("dual_xc"), 2.5);
        assert_eq!(snap.get("instrument_dual_airplane"), 0.5);
        assert_eq!(snap.get("instrument_dual_simulator"), 1.0);
        assert_eq!(snap.get("cpl_sim_instrument_training"), 1.5);
        assert_eq!(snap.get("instrument_total"), 1.5);
        assert_eq!(snap.get("private_long_xc"), 1.0);
        assert_eq!(snap.get("private_towered_ops"), 3.0);
        assert_eq!(snap.get("cpl_2hr_day_xc"), 1.0);
        assert_eq!(snap.get("cpl_2hr_night_xc"), 1.0);
        assert_eq!(snap.get("cpl_300nm_xc"), 0.0);
        assert_eq!(snap.get("cpl_checkride_prep_recent"), 2.5);
        assert_eq!(snap.get("cpl_night_vfr"), 2.1);
        assert_eq!(snap.get("complex_dual"), 1.2);
        assert_eq!(snap.get("cpl_complex_turbine_taa"), 1.2);
        assert_eq!(snap.get("recent_instrument"), 0.0);
    }

    #[test]
    fn test_logbook_totals_instrument_cross_country() {
        let mut long_ifr = flight(
            "2025-02-10",
            FlightTimes {
                total: 3.5,
                pic: 3.5,
                dual_received: 3.5,
                cross_country: 3.5,
                actual_instrument: 1.0,
                simulated_instrument: 1.5,
                ..FlightTimes::default()
            },
        );
        long_ifr.distance = Some(320.0);
        long_ifr.route = Some("KAMW KDSM KOMA KAMW".into());
        long_ifr.counts.approaches = 3;

        let snap = logbook_totals(std::slice::from_ref(&long_ifr), day("2025-03-01"));
        assert_eq!(snap.get("ir_250nm_xc"), 1.0);
        assert_eq!(snap.get("cpl_300nm_xc"), 1.0);
        assert_eq!(snap.get("recent_instrument"), 2.5);
        assert_eq!(snap.get("instrument_dual_airplane"), 1.5);

        long_ifr.counts.approaches = 2;
        let snap = logbook_totals(&[long_ifr], day("2025-06-01"));
        assert_eq!(snap.get("ir_250nm_xc"), 0.0);
        assert_eq!(snap.get("recent_instrument"), 0.0);
    }

    #[test]
    fn test_night_towered_ops_are_capped() {
        let mut night = flight(
            "2025-01-05",
            FlightTimes {
                total: 1.5,
                pic: 1.5,
                solo: 1.5,
                night: 1.5,
                ..FlightTimes::default()
            },
        );
        night.departure_airport = Some("KDSM".into());
        night.arrival_airport = Some("KDSM".into());
        night.counts.night_takeoffs = 6;
        night.counts.night_landings = 6;
        let snap = logbook_totals(&[night.clone(), night], day("2025-03-01"));
        assert_eq!(snap.get("cpl_night_takeoffs_towered"), 10.0);
        assert_eq!(snap.get("cpl_night_landings_towered"), 10.0);
        assert_eq!(snap.get("private_towered_ops"), 0.0);
    }
}
