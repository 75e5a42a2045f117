use std::path::PathBuf;

use comfy_table::{Cell, Table};

use crate::cli::{open_db, HoursCommands};
use crate::error::Result;
use crate::fmt::hours;
use crate::hours::{self as store, parse_assignment, HoursSnapshot, ImportOutcome, ImportRecord, ImportType};

pub fn dispatch(command: HoursCommands) -> Result<()> {
    match command {
        HoursCommands::Import { file, notes } => {
            let conn = open_db()?;
            match store::import_json(&conn, &PathBuf::from(&file), notes.as_deref())? {
                ImportOutcome::Imported(record) => {
                    println!(
                        "Imported {} hour field(s) from {file} ({} flights)",
                        record.hours.len(),
                        record.flights_imported
                    );
                }
                ImportOutcome::Duplicate { checksum } => {
                    let short = checksum.get(..12).unwrap_or(&checksum);
                    println!("This file has already been imported (checksum {short}).");
                }
            }
            Ok(())
        }
        HoursCommands::Set { values, replace, notes } => {
            let conn = open_db()?;
            let pairs = values
                .iter()
                .map(|v| parse_assignment(v))
                .collect::<Result<Vec<_>>>()?;
            let record = store::record_manual(&conn, &pairs, replace, notes.as_deref())?;
            println!("Recorded manual snapshot {} ({} fields)", record.id, record.hours.len());
            Ok(())
        }
        HoursCommands::Show => {
            let conn = open_db()?;
            match store::latest(&conn)? {
                Some(record) => println!("{}", format_snapshot(&record)),
                None => println!("No hours recorded. Use `truehour hours import` or `truehour hours set`."),
            }
            Ok(())
        }
        HoursCommands::History { limit, offset } => {
            let conn = open_db()?;
            let rows = store::history(&conn, limit, offset)?;
            println!("{}", format_history(&rows));
            Ok(())
        }
        HoursCommands::Recalculate { notes } => {
            let conn = open_db()?;
            let today = chrono::Local::now().date_naive();
            let record = store::recalculate(&conn, today, notes.as_deref())?;
            println!(
                "Recalculated snapshot {} from {} flight(s)",
                record.id, record.flights_imported
            );
            println!("{}", format_snapshot(&record));
            Ok(())
        }
    }
}

fn snapshot_table(snapshot: &HoursSnapshot) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    for (key, value) in snapshot.iter() {
        table.add_row(vec![Cell::new(key), Cell::new(hours(value))]);
    }
    table
}

pub fn format_snapshot(record: &ImportRecord) -> String {
    let source = match (&record.file_name, record.import_type) {
        (Some(name), _) => name.as_str(),
        (None, ImportType::Recalculated) => "flight log",
        (None, _) => "manual entry",
    };
    format!(
        "Hours as of {} ({source})\n{}",
        record.import_date,
        snapshot_table(&record.hours)
    )
}

pub fn format_history(rows: &[ImportRecord]) -> String {
    if rows.is_empty() {
        return "No hour imports.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Type", "File", "Flights", "Total", "Notes"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.import_date),
            Cell::new(r.import_type),
            Cell::new(r.file_name.as_deref().unwrap_or("")),
            Cell::new(r.flights_imported),
            Cell::new(hours(r.hours.get("total"))),
            Cell::new(r.notes.as_deref().unwrap_or("")),
        ]);
    }
    format!("Import History\n{table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::hours::record_manual;

    #[test]
    fn test_format_snapshot_lists_fields() {
        let (_dir, conn) = test_db();
        let record = record_manual(
            &conn,
            &[("total".into(), 41.25), ("night".into(), 3.0)],
            false,
            None,
        )
        .unwrap();
        let out = format_snapshot(&record);
        assert!(out.contains("manual entry"));
        assert!(out.contains("41.2") || out.contains("41.3"));
        assert!(out.contains("night"));
    }

    #[test]
    fn test_format_history() {
        let (_dir, conn) = test_db();
        record_manual(&conn, &[("total".into(), 10.0)], false, Some("first lesson")).unwrap();
        let rows = store::history(&conn, 10, 0).unwrap();
        let out = format_history(&rows);
        assert!(out.contains("manual"));
        assert!(out.contains("first lesson"));
        assert_eq!(format_history(&[]), "No hour imports.");
    }
}
