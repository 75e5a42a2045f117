use std::io::Write;

use rusqlite::Connection;

use crate::aircraft::list_aircraft;
use crate::cards::{list_cards, CardFilter};
use crate::error::Result;
use crate::expenses::{row_to_expense, EXPENSE_COLUMNS, EXPENSE_WIDTH};
use crate::models::parse_date;

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn amount(value: f64) -> String {
    format!("{value:.2}")
}

/// Every card with its derived actual and remaining amounts. Returns the
/// number of rows written.
pub fn write_cards_csv<W: Write>(conn: &Connection, out: W) -> Result<usize> {
    let cards = list_cards(conn, &CardFilter::default())?;
    let aircraft = list_aircraft(conn, false)?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "ID", "Name", "Category", "Frequency", "Date", "Budgeted", "Actual", "Remaining", "Status",
        "Aircraft", "Hours", "Rate Type", "Tags", "Notes",
    ])?;
    for card in &cards {
        let tail = card
            .aircraft_id
            .and_then(|id| aircraft.iter().find(|a| a.id == id))
            .map(|a| a.label())
            .unwrap_or_default();
        writer.write_record([
            card.id.to_string(),
            card.name.clone(),
            card.category.clone(),
            card.frequency.to_string(),
            card.when_date.clone(),
            amount(card.budgeted_amount),
            amount(card.actual_amount),
            amount(card.remaining_amount()),
            card.status.to_string(),
            tail,
            opt(&card.associated_hours),
            opt(&card.hourly_rate_type),
            card.tags.join(";"),
            opt(&card.notes),
        ])?;
    }
    writer.flush()?;
    Ok(cards.len())
}

/// Expenses in the date range, with the names of the cards each is linked to.
pub fn write_expenses_csv<W: Write>(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
    out: W,
) -> Result<usize> {
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS},
                (SELECT group_concat(c.name, '; ')
                 FROM expense_budget_links l JOIN budget_cards c ON c.id = l.budget_card_id
                 WHERE l.expense_id = e.id),
                (SELECT COALESCE(SUM(l.amount), 0) FROM expense_budget_links l WHERE l.expense_id = e.id)
         FROM expenses e
         WHERE (?1 IS NULL OR e.date >= ?1) AND (?2 IS NULL OR e.date <= ?2)
         ORDER BY e.date DESC, e.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![from, to], |row| {
            Ok((
                row_to_expense(row)?,
                row.get::<_, Option<String>>(EXPENSE_WIDTH)?,
                row.get::<_, f64>(EXPENSE_WIDTH + 1)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "ID", "Date", "Category", "Subcategory", "Description", "Amount", "Vendor", "Recurring",
        "Interval", "Tax Deductible", "Tax Category", "Linked Cards", "Linked Amount",
    ])?;
    for (expense, cards, linked) in &rows {
        writer.write_record([
            expense.id.to_string(),
            expense.date.clone(),
            expense.category.clone(),
            opt(&expense.subcategory),
            opt(&expense.description),
            amount(expense.amount),
            opt(&expense.vendor),
            expense.is_recurring.to_string(),
            opt(&expense.recurrence_interval),
            expense.is_tax_deductible.to_string(),
            opt(&expense.tax_category),
            cards.clone().unwrap_or_default(),
            amount(*linked),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub fn write_aircraft_csv<W: Write>(conn: &Connection, out: W) -> Result<usize> {
    let aircraft = list_aircraft(conn, false)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "ID", "Tail", "Make", "Model", "Year", "Category", "Rate Type", "Hourly Cost", "Complex",
        "TAA", "High Performance", "Simulator", "Active",
    ])?;
    for a in &aircraft {
        writer.write_record([
            a.id.to_string(),
            a.tail_number.clone(),
            opt(&a.make),
            opt(&a.model),
            opt(&a.year),
            opt(&a.category),
            a.rate.rate_type().to_string(),
            amount(a.rate.hourly_cost()),
            a.is_complex.to_string(),
            a.is_taa.to_string(),
            a.is_high_performance.to_string(),
            a.is_simulator.to_string(),
            a.is_active.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(aircraft.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::{add_aircraft, sample as sample_aircraft};
    use crate::cards::{create_card, link_expense, NewCard};
    use crate::cost::RateConfig;
    use crate::db::test_db;
    use crate::expenses::{add_expense, sample};

    fn read(bytes: Vec<u8>) -> Vec<Vec<String>> {
        csv::Reader::from_reader(bytes.as_slice())
            .records()
            .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_cards_csv_includes_derived_amounts() {
        let (_dir, conn) = test_db();
        let plane = add_aircraft(&conn, sample_aircraft("N172SP", RateConfig::Wet { hourly_rate: 150.0 })).unwrap();
        let mut new = NewCard::new("Lessons, block 1", "Flight Training", "2025-05-01", 1500.0);
        new.aircraft_id = Some(plane.id);
        let card = create_card(&conn, new).unwrap();
        let e = add_expense(&conn, sample(600.0, "2025-05-02")).unwrap();
        link_expense(&conn, e.id, card.id, 600.0).unwrap();

        let mut buf = Vec::new();
        assert_eq!(write_cards_csv(&conn, &mut buf).unwrap(), 1);
        let rows = read(buf);
        assert_eq!(rows[0][1], "Lessons, block 1");
        assert_eq!(rows[0][6], "600.00");
        assert_eq!(rows[0][7], "900.00");
        assert_eq!(rows[0][9], "N172SP (Cessna 172S)");
    }

    #[test]
    fn test_expenses_csv_lists_linked_cards() {
        let (_dir, conn) = test_db();
        let a = create_card(&conn, NewCard::new("Lessons", "Flight Training", "2025-05-01", 1500.0)).unwrap();
        let b = create_card(&conn, NewCard::new("Ground", "Ground School", "2025-05-01", 300.0)).unwrap();
        let e = add_expense(&conn, sample(500.0, "2025-05-02")).unwrap();
        link_expense(&conn, e.id, a.id, 300.0).unwrap();
        link_expense(&conn, e.id, b.id, 100.0).unwrap();
        add_expense(&conn, sample(90.0, "2025-04-02")).unwrap();

        let mut buf = Vec::new();
        assert_eq!(write_expenses_csv(&conn, Some("2025-05-01"), None, &mut buf).unwrap(), 1);
        let rows = read(buf);
        assert!(rows[0][11].contains("Lessons"));
        assert!(rows[0][11].contains("Ground"));
        assert_eq!(rows[0][12], "400.00");
    }

    #[test]
    fn test_aircraft_csv() {
        let (_dir, conn) = test_db();
        let rate = RateConfig::Dry {
            hourly_rate: 120.0,
            fuel_burn_rate: 8.0,
            fuel_price_per_gallon: 6.0,
        };
        add_aircraft(&conn, sample_aircraft("N733RX", rate)).unwrap();
        let mut buf = Vec::new();
        assert_eq!(write_aircraft_csv(&conn, &mut buf).unwrap(), 1);
        let rows = read(buf);
        assert_eq!(rows[0][1], "N733RX");
        assert_eq!(rows[0][6], "dry");
        assert_eq!(rows[0][7], "168.00");
    }
}
