use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Result, TrueHourError};
use crate::models::text_enum;

/// Point-in-time hour and operation totals keyed by field name
/// (`total`, `pic`, `cross_country`, ...). Missing keys read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoursSnapshot(BTreeMap<String, f64>);

impl HoursSnapshot {
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for HoursSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        HoursSnapshot(iter.into_iter().collect())
    }
}

text_enum!(
    ImportType, "import type" {
        Json => "json",
        Manual => "manual",
        Recalculated => "recalculated",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRecord {
    pub id: i64,
    pub import_type: ImportType,
    pub file_name: Option<String>,
    pub flights_imported: i64,
    pub hours: HoursSnapshot,
    pub import_date: String,
    pub notes: Option<String>,
    pub checksum: Option<String>,
}

#[derive(Debug)]
pub enum ImportOutcome {
    Imported(ImportRecord),
    Duplicate { checksum: String },
}

/// Parsed contents of an hours file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHours {
    pub hours: HoursSnapshot,
    pub flights: i64,
}

fn check_value(key: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(TrueHourError::validation(format!(
            "hours value for '{key}' must be zero or greater"
        )));
    }
    Ok(value)
}

/// Accepts either a flat `{"total": 52.3, ...}` object or
/// `{"flights": 120, "hours": {...}}`. Keys starting with `_` and values that
/// are not numbers are ignored.
pub fn parse_json(raw: &str) -> Result<ParsedHours> {
    parse_value(serde_json::from_str(raw)?)
}

fn parse_value(value: serde_json::Value) -> Result<ParsedHours> {
    let root = value
        .as_object()
        .ok_or_else(|| TrueHourError::validation("hours file must contain a JSON object"))?;

    let (map, flights) = match root.get("hours").and_then(|h| h.as_object()) {
        Some(inner) => {
            let flights = root
                .get("flights")
                .or_else(|| root.get("flights_imported"))
                .and_then(|f| f.as_i64())
                .unwrap_or(0);
            (inner, flights)
        }
        None => (root, 0),
    };

    let mut hours = HoursSnapshot::default();
    for (key, value) in map {
        if key.starts_with('_') {
            continue;
        }
        match value.as_f64() {
            Some(n) => hours.set(key.clone(), check_value(key, n)?),
            None => debug!(key = %key, "ignoring non-numeric hours value"),
        }
    }
    Ok(ParsedHours { hours, flights })
}

/// Parses `field=value` as typed on the command line.
pub fn parse_assignment(raw: &str) -> Result<(String, f64)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| TrueHourError::validation(format!("expected field=value, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(TrueHourError::validation(format!("missing field name in '{raw}'")));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| TrueHourError::validation(format!("'{}' is not a number", value.trim())))?;
    Ok((key.to_string(), check_value(key, value)?))
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

struct NewImport<'a> {
    import_type: ImportType,
    file_name: Option<&'a str>,
    flights_imported: i64,
    hours: &'a HoursSnapshot,
    notes: Option<&'a str>,
    checksum: Option<&'a str>,
}

fn insert_import(conn: &Connection, new: &NewImport<'_>) -> Result<ImportRecord> {
    let hours_json = serde_json::to_string(new.hours)?;
    conn.execute(
        "INSERT INTO import_history (import_type, file_name, flights_imported, hours_imported, notes, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            new.import_type,
            new.file_name,
            new.flights_imported,
            hours_json,
            new.notes,
            new.checksum,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_import(conn, id)?.ok_or_else(|| TrueHourError::not_found("Import", id))
}

pub fn import_json(conn: &Connection, path: &Path, notes: Option<&str>) -> Result<ImportOutcome> {
    let data = std::fs::read(path)?;
    let checksum = compute_checksum(&data);
    {
        let mut stmt = conn.prepare("SELECT 1 FROM import_history WHERE checksum = ?1")?;
        if stmt.exists([&checksum])? {
            warn!(file = %path.display(), "hours file already imported, skipping");
            return Ok(ImportOutcome::Duplicate { checksum });
        }
    }

    let parsed = parse_value(serde_json::from_slice(&data)?)?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    let record = insert_import(
        conn,
        &NewImport {
            import_type: ImportType::Json,
            file_name,
            flights_imported: parsed.flights,
            hours: &parsed.hours,
            notes,
            checksum: Some(&checksum),
        },
    )?;
    info!(id = record.id, fields = record.hours.len(), "imported hours snapshot");
    Ok(ImportOutcome::Imported(record))
}

/// Records a manual snapshot. Unless `replace` is set the values are layered
/// over the current snapshot, so a single corrected field keeps the rest.
pub fn record_manual(
    conn: &Connection,
    values: &[(String, f64)],
    replace: bool,
    notes: Option<&str>,
) -> Result<ImportRecord> {
    if values.is_empty() {
        return Err(TrueHourError::validation("no hour values given"));
    }
    let mut hours = if replace {
        HoursSnapshot::default()
    } else {
        current_snapshot(conn)?
    };
    for (key, value) in values {
        hours.set(key.clone(), check_value(key, *value)?);
    }
    let record = insert_import(
        conn,
        &NewImport {
            import_type: ImportType::Manual,
            file_name: None,
            flights_imported: 0,
            hours: &hours,
            notes,
            checksum: None,
        },
    )?;
    info!(id = record.id, replace, "recorded manual hours snapshot");
    Ok(record)
}

/// Rebuilds the snapshot from the flight log. The result replaces the
/// current snapshot rather than merging with it.
pub fn recalculate(conn: &Connection, today: chrono::NaiveDate, notes: Option<&str>) -> Result<ImportRecord> {
    let flights = crate::flights::all_flights(conn)?;
    if flights.is_empty() {
        return Err(TrueHourError::validation(
            "no flights logged; add some with `truehour flights add`",
        ));
    }
    let hours = crate::flights::logbook_totals(&flights, today);
    let record = insert_import(
        conn,
        &NewImport {
            import_type: ImportType::Recalculated,
            file_name: None,
            flights_imported: flights.len() as i64,
            hours: &hours,
            notes,
            checksum: None,
        },
    )?;
    info!(id = record.id, flights = flights.len(), "recalculated hours from flight log");
    Ok(record)
}

const IMPORT_COLUMNS: &str =
    "id, import_type, file_name, flights_imported, hours_imported, import_date, notes, checksum";

type RawImport = (i64, ImportType, Option<String>, i64, String, String, Option<String>, Option<String>);

fn raw_import(row: &rusqlite::Row) -> rusqlite::Result<RawImport> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_record(raw: RawImport) -> Result<ImportRecord> {
    let (id, import_type, file_name, flights_imported, hours_json, import_date, notes, checksum) = raw;
    Ok(ImportRecord {
        id,
        import_type,
        file_name,
        flights_imported,
        hours: serde_json::from_str(&hours_json)?,
        import_date,
        notes,
        checksum,
    })
}

pub fn get_import(conn: &Connection, id: i64) -> Result<Option<ImportRecord>> {
    let raw = conn
        .query_row(
            &format!("SELECT {IMPORT_COLUMNS} FROM import_history WHERE id = ?1"),
            [id],
            raw_import,
        )
        .optional()?;
    raw.map(into_record).transpose()
}

/// The current snapshot is the most recent import row.
pub fn latest(conn: &Connection) -> Result<Option<ImportRecord>> {
    let raw = conn
        .query_row(
            &format!(
                "SELECT {IMPORT_COLUMNS} FROM import_history ORDER BY import_date DESC, id DESC LIMIT 1"
            ),
            [],
            raw_import,
        )
        .optional()?;
    raw.map(into_record).transpose()
}

pub fn current_snapshot(conn: &Connection) -> Result<HoursSnapshot> {
    Ok(latest(conn)?.map(|r| r.hours).unwrap_or_default())
}

pub fn history(conn: &Connection, limit: usize, offset: usize) -> Result<Vec<ImportRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IMPORT_COLUMNS} FROM import_history ORDER BY import_date DESC, id DESC LIMIT ?1 OFFSET ?2"
    ))?;
    let raws = stmt
        .query_map(rusqlite::params![limit as i64, offset as i64], raw_import)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(into_record).collect()
}
