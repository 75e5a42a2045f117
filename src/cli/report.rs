use chrono::Datelike;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{open_db, ReportCommands};
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, AnnualSummary, CategorySummary, MonthSummary};

pub fn dispatch(command: ReportCommands) -> Result<()> {
    let conn = open_db()?;
    let out = match command {
        ReportCommands::Monthly { year } => format_monthly(&reports::monthly_summary(&conn, year)?),
        ReportCommands::Category { year } => {
            format_category(&reports::category_summary(&conn, year)?)
        }
        ReportCommands::Annual { year } => {
            let year = year.unwrap_or_else(|| chrono::Local::now().year());
            format_annual(&reports::annual_summary(&conn, year)?)
        }
    };
    println!("{out}");
    Ok(())
}

fn remaining_cell(remaining: f64) -> Cell {
    if remaining < 0.0 {
        Cell::new(money(remaining).red())
    } else {
        Cell::new(money(remaining))
    }
}

fn month_table(rows: &[MonthSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Month", "Budgeted", "Actual", "Remaining"]);
    for m in rows {
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(money(m.budgeted)),
            Cell::new(money(m.actual)),
            remaining_cell(m.remaining),
        ]);
    }
    table
}

fn category_table(rows: &[CategorySummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Cards", "Budgeted", "Actual", "Remaining"]);
    for c in rows {
        table.add_row(vec![
            Cell::new(&c.category),
            Cell::new(c.card_count),
            Cell::new(money(c.budgeted)),
            Cell::new(money(c.actual)),
            remaining_cell(c.remaining),
        ]);
    }
    table
}

pub fn format_monthly(rows: &[MonthSummary]) -> String {
    if rows.is_empty() {
        return "No active budget cards.".to_string();
    }
    format!("Monthly Budget\n{}", month_table(rows))
}

pub fn format_category(rows: &[CategorySummary]) -> String {
    if rows.is_empty() {
        return "No active budget cards.".to_string();
    }
    format!("Budget by Category\n{}", category_table(rows))
}

pub fn format_annual(summary: &AnnualSummary) -> String {
    let mut out = format!("{}\n", format!("Annual Budget {}", summary.year).bold());
    out.push_str(&format!("Budgeted:   {}\n", money(summary.total_budgeted)));
    out.push_str(&format!("Actual:     {}\n", money(summary.total_actual)));
    out.push_str(&format!("Remaining:  {}", money(summary.total_remaining)));
    if summary.by_month.is_empty() {
        out.push_str("\n\nNo active budget cards this year.");
        return out;
    }

    let mut table = Table::new();
    table.set_header(vec!["Month / Card", "Budgeted", "Actual", "Remaining"]);
    for month in &summary.by_month {
        let s = &month.summary;
        table.add_row(vec![
            Cell::new(s.month.as_str().bold()),
            Cell::new(money(s.budgeted)),
            Cell::new(money(s.actual)),
            remaining_cell(s.remaining),
        ]);
        for card in &month.cards {
            table.add_row(vec![
                Cell::new(format!("  {}", card.name)),
                Cell::new(money(card.budgeted_amount)),
                Cell::new(money(card.actual_amount)),
                remaining_cell(card.remaining_amount()),
            ]);
        }
    }
    out.push_str(&format!("\n\nBy Month\n{table}"));
    out.push_str(&format!("\n\nBy Category\n{}", category_table(&summary.by_category)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{create_card, NewCard};
    use crate::db::test_db;

    #[test]
    fn test_format_annual_lists_cards_under_months() {
        let (_dir, conn) = test_db();
        create_card(&conn, NewCard::new("Dual block", "Flight Training", "2025-02-01", 2400.0)).unwrap();
        create_card(&conn, NewCard::new("Medical", "Medical", "2025-02-20", 150.0)).unwrap();
        let out = format_annual(&reports::annual_summary(&conn, 2025).unwrap());
        assert!(out.contains("2025-02"));
        assert!(out.contains("Dual block"));
        assert!(out.contains("$2,550.00"));
        assert!(out.contains("By Category"));
    }

    #[test]
    fn test_empty_reports() {
        let (_dir, conn) = test_db();
        assert_eq!(format_monthly(&[]), "No active budget cards.");
        let out = format_annual(&reports::annual_summary(&conn, 2030).unwrap());
        assert!(out.contains("No active budget cards this year."));
    }
}
