use regex::Regex;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::cost::{RateConfig, RateFields, RateType};
use crate::error::{Result, TrueHourError};
use crate::models::{optional_text, Aircraft, AircraftCategory};

#[derive(Debug, Clone, PartialEq)]
pub struct NewAircraft {
    pub tail_number: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub gear_type: Option<String>,
    pub is_complex: bool,
    pub is_taa: bool,
    pub is_high_performance: bool,
    pub is_simulator: bool,
    pub category: Option<AircraftCategory>,
    pub rate: RateConfig,
    pub notes: Option<String>,
}

/// Partial update. `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftUpdate {
    pub tail_number: Option<String>,
    pub make: Option<Option<String>>,
    pub model: Option<Option<String>>,
    pub year: Option<Option<i32>>,
    pub gear_type: Option<Option<String>>,
    pub is_complex: Option<bool>,
    pub is_taa: Option<bool>,
    pub is_high_performance: Option<bool>,
    pub is_simulator: Option<bool>,
    pub category: Option<Option<AircraftCategory>>,
    pub rate_type: Option<RateType>,
    pub rate_fields: RateFields,
    pub notes: Option<Option<String>>,
    pub is_active: Option<bool>,
}

const TAIL_PATTERN: &str = r"^[A-Z0-9][A-Z0-9-]{1,9}$";

pub fn normalize_tail(raw: &str) -> Result<String> {
    let tail = raw.trim().to_ascii_uppercase();
    let pattern = Regex::new(TAIL_PATTERN).map_err(|e| TrueHourError::Other(e.to_string()))?;
    if !pattern.is_match(&tail) {
        return Err(TrueHourError::validation(format!(
            "invalid tail number '{}'",
            raw.trim()
        )));
    }
    Ok(tail)
}

fn check_year(year: Option<i32>) -> Result<()> {
    match year {
        Some(y) if !(1900..=2100).contains(&y) => Err(TrueHourError::validation(format!(
            "year {y} must be between 1900 and 2100"
        ))),
        _ => Ok(()),
    }
}

fn ensure_tail_free(conn: &Connection, tail: &str, except_id: Option<i64>) -> Result<()> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM aircraft WHERE tail_number = ?1 COLLATE NOCASE AND id != ?2",
            rusqlite::params![tail, except_id.unwrap_or(-1)],
            |row| row.get(0),
        )
        .optional()?;
    match taken {
        Some(id) => Err(TrueHourError::Conflict(format!(
            "tail number {tail} already belongs to aircraft {id}"
        ))),
        None => Ok(()),
    }
}

const AIRCRAFT_COLUMNS: &str = "id, tail_number, make, model, year, gear_type, is_complex, is_taa, \
     is_high_performance, is_simulator, category, rate_type, hourly_rate_wet, hourly_rate_dry, \
     operating_cost_per_hour, fuel_burn_rate, fuel_price_per_gallon, notes, is_active";

fn row_to_aircraft(row: &rusqlite::Row) -> rusqlite::Result<Aircraft> {
    let rate_type: RateType = row.get(11)?;
    let fields = RateFields {
        hourly_rate_wet: row.get(12)?,
        hourly_rate_dry: row.get(13)?,
        operating_cost_per_hour: row.get(14)?,
        fuel_burn_rate: row.get(15)?,
        fuel_price_per_gallon: row.get(16)?,
    };
    let rate = RateConfig::from_fields(rate_type, &fields).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Aircraft {
        id: row.get(0)?,
        tail_number: row.get(1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        year: row.get(4)?,
        gear_type: row.get(5)?,
        is_complex: row.get(6)?,
        is_taa: row.get(7)?,
        is_high_performance: row.get(8)?,
        is_simulator: row.get(9)?,
        category: row.get(10)?,
        rate,
        notes: row.get(17)?,
        is_active: row.get(18)?,
    })
}

pub fn get_aircraft(conn: &Connection, id: i64) -> Result<Aircraft> {
    conn.query_row(
        &format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE id = ?1"),
        [id],
        row_to_aircraft,
    )
    .optional()?
    .ok_or_else(|| TrueHourError::not_found("Aircraft", id))
}

pub fn find_by_tail(conn: &Connection, tail: &str) -> Result<Option<Aircraft>> {
    let found = conn
        .query_row(
            &format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE tail_number = ?1 COLLATE NOCASE"),
            [tail.trim()],
            row_to_aircraft,
        )
        .optional()?;
    Ok(found)
}

/// Resolves either a numeric id or a tail number.
pub fn resolve(conn: &Connection, key: &str) -> Result<Aircraft> {
    if let Ok(id) = key.trim().parse::<i64>() {
        return get_aircraft(conn, id);
    }
    find_by_tail(conn, key)?.ok_or_else(|| TrueHourError::not_found("Aircraft", key.trim()))
}

pub fn list_aircraft(conn: &Connection, active_only: bool) -> Result<Vec<Aircraft>> {
    let sql = if active_only {
        format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE is_active = 1 ORDER BY tail_number")
    } else {
        format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft ORDER BY tail_number")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_aircraft)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn add_aircraft(conn: &Connection, new: NewAircraft) -> Result<Aircraft> {
    let tail = normalize_tail(&new.tail_number)?;
    check_year(new.year)?;
    new.rate.validate()?;
    ensure_tail_free(conn, &tail, None)?;

    let rate = new.rate.to_fields();
    conn.execute(
        "INSERT INTO aircraft (tail_number, make, model, year, gear_type, is_complex, is_taa,
            is_high_performance, is_simulator, category, rate_type, hourly_rate_wet, hourly_rate_dry,
            operating_cost_per_hour, fuel_burn_rate, fuel_price_per_gallon, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        rusqlite::params![
            tail,
            optional_text(new.make),
            optional_text(new.model),
            new.year,
            optional_text(new.gear_type),
            new.is_complex,
            new.is_taa,
            new.is_high_performance,
            new.is_simulator,
            new.category,
            new.rate.rate_type(),
            rate.hourly_rate_wet,
            rate.hourly_rate_dry,
            rate.operating_cost_per_hour,
            rate.fuel_burn_rate,
            rate.fuel_price_per_gallon,
            optional_text(new.notes),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, tail = %tail, "added aircraft");
    get_aircraft(conn, id)
}

pub fn update_aircraft(conn: &Connection, id: i64, update: AircraftUpdate) -> Result<Aircraft> {
    let current = get_aircraft(conn, id)?;

    let tail = match &update.tail_number {
        Some(raw) => {
            let tail = normalize_tail(raw)?;
            ensure_tail_free(conn, &tail, Some(id))?;
            tail
        }
        None => current.tail_number.clone(),
    };
    let year = update.year.unwrap_or(current.year);
    check_year(year)?;

    // Unchanged columns of the current rate fill any gaps in the new one.
    let rate_type = update.rate_type.unwrap_or(current.rate.rate_type());
    let fields = current.rate.to_fields().merged(&update.rate_fields);
    let rate = RateConfig::from_fields(rate_type, &fields)?;
    let stored = rate.to_fields();

    conn.execute(
        "UPDATE aircraft SET tail_number = ?1, make = ?2, model = ?3, year = ?4, gear_type = ?5,
            is_complex = ?6, is_taa = ?7, is_high_performance = ?8, is_simulator = ?9, category = ?10,
            rate_type = ?11, hourly_rate_wet = ?12, hourly_rate_dry = ?13, operating_cost_per_hour = ?14,
            fuel_burn_rate = ?15, fuel_price_per_gallon = ?16, notes = ?17, is_active = ?18,
            updated_at = datetime('now')
         WHERE id = ?19",
        rusqlite::params![
            tail,
            update.make.map(optional_text).unwrap_or(current.make),
            update.model.map(optional_text).unwrap_or(current.model),
            year,
            update.gear_type.map(optional_text).unwrap_or(current.gear_type),
            update.is_complex.unwrap_or(current.is_complex),
            update.is_taa.unwrap_or(current.is_taa),
            update.is_high_performance.unwrap_or(current.is_high_performance),
            update.is_simulator.unwrap_or(current.is_simulator),
            update.category.unwrap_or(current.category),
            rate_type,
            stored.hourly_rate_wet,
            stored.hourly_rate_dry,
            stored.operating_cost_per_hour,
            stored.fuel_burn_rate,
            stored.fuel_price_per_gallon,
            update.notes.map(optional_text).unwrap_or(current.notes),
            update.is_active.unwrap_or(current.is_active),
            id,
        ],
    )?;
    info!(id, "updated aircraft");
    get_aircraft(conn, id)
}

/// Removes the aircraft. Expenses and cards that referenced it keep their
/// rows with the reference cleared.
pub fn delete_aircraft(conn: &Connection, id: i64) -> Result<Aircraft> {
    let aircraft = get_aircraft(conn, id)?;
    conn.execute("DELETE FROM aircraft WHERE id = ?1", [id])?;
    info!(id, tail = %aircraft.tail_number, "deleted aircraft");
    Ok(aircraft)
}

#[cfg(test)]
pub(crate) fn sample(tail: &str, rate: RateConfig) -> NewAircraft {
    NewAircraft {
        tail_number: tail.to_string(),
        make: Some("Cessna".into()),
        model: Some("172S".into()),
        year: Some(2004),
        gear_type: Some("fixed".into()),
        is_complex: false,
        is_taa: true,
        is_high_performance: false,
        is_simulator: false,
        category: Some(AircraftCategory::Rental),
        rate,
        notes: None,
    }
}
