use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::aircraft::{get_aircraft, resolve};
use crate::cards::{self, CardFilter, CardUpdate, LinkedExpense, NewCard};
use crate::cli::{
    clearable, clearable_parsed, open_db, parse_opt, resolve_certification, today, CardsCommands,
};
use crate::error::{Result, TrueHourError};
use crate::expenses::{expense_links, get_expense};
use crate::fmt::{hours, money};
use crate::models::{parse_month, round_cents, BudgetCard, CardStatus};
use crate::requirements::Certification;
use crate::settings::load_settings;
use crate::templates::{quickstart, BatchReport, QuickstartOptions};

pub fn dispatch(command: CardsCommands) -> Result<()> {
    match command {
        CardsCommands::Add {
            name,
            category,
            amount,
            date,
            frequency,
            tags,
            notes,
            aircraft,
            hours,
            rate_type,
        } => {
            let conn = open_db()?;
            let mut new = NewCard::new(&name, &category, &date.unwrap_or_else(today), amount);
            new.frequency = frequency.parse()?;
            new.tags = tags;
            new.notes = notes;
            new.aircraft_id = aircraft_id(&conn, aircraft.as_deref())?;
            new.associated_hours = hours;
            new.hourly_rate_type = parse_opt(rate_type)?;
            let card = cards::create_card(&conn, new)?;
            println!("Created card {}: {} ({})", card.id, card.name, money(card.budgeted_amount));
            Ok(())
        }
        CardsCommands::List { status, category, month } => {
            let conn = open_db()?;
            let filter = CardFilter {
                status: parse_opt(status)?,
                category,
                month: month.as_deref().map(parse_month).transpose()?,
            };
            let rows = cards::list_cards(&conn, &filter)?;
            println!("{}", format_cards(&rows));
            Ok(())
        }
        CardsCommands::Show { id } => show(id),
        CardsCommands::Edit {
            id,
            name,
            category,
            amount,
            date,
            frequency,
            tags,
            notes,
            aircraft,
            hours,
            rate_type,
        } => {
            let conn = open_db()?;
            let aircraft_id = match clearable(aircraft) {
                None => None,
                Some(None) => Some(None),
                Some(Some(key)) => Some(Some(resolve(&conn, &key)?.id)),
            };
            let update = CardUpdate {
                name,
                category,
                frequency: parse_opt(frequency)?,
                when_date: date,
                budgeted_amount: amount,
                status: None,
                tags: tags.map(|t| split_tags(&t)),
                notes: clearable(notes),
                aircraft_id,
                hourly_rate_type: clearable_parsed(rate_type)?,
                associated_hours: clearable_hours(hours)?,
            };
            let card = cards::update_card(&conn, id, update)?;
            println!("Updated card {}: {}", card.id, card.name);
            Ok(())
        }
        CardsCommands::Status { id, status } => {
            let conn = open_db()?;
            let status: CardStatus = status.parse()?;
            let card = cards::set_status(&conn, id, status)?;
            println!("Card {} is now {}", card.id, card.status);
            Ok(())
        }
        CardsCommands::Delete { id } => {
            let conn = open_db()?;
            let unlinked = cards::delete_card(&conn, id)?;
            println!("Deleted card {id} ({unlinked} expense link(s) removed, expenses kept)");
            Ok(())
        }
        CardsCommands::Duplicate { id } => {
            let conn = open_db()?;
            let card = cards::duplicate_card(&conn, id)?;
            println!("Duplicated card {id} as {}: {}", card.id, card.name);
            Ok(())
        }
        CardsCommands::Link { card_id, expense_id, amount } => {
            let conn = open_db()?;
            let amount = match amount {
                Some(a) => a,
                None => unlinked_amount(&conn, expense_id)?,
            };
            let link = cards::link_expense(&conn, expense_id, card_id, amount)?;
            let card = cards::get_card(&conn, card_id)?;
            println!(
                "Linked {} of expense {expense_id} to card {card_id} (actual now {})",
                money(link.amount),
                money(card.actual_amount)
            );
            Ok(())
        }
        CardsCommands::Unlink { card_id, expense_id } => {
            let conn = open_db()?;
            let link = cards::unlink_expense(&conn, card_id, expense_id)?;
            println!("Unlinked {} of expense {expense_id} from card {card_id}", money(link.amount));
            Ok(())
        }
        CardsCommands::Expenses { id } => {
            let conn = open_db()?;
            let rows = cards::card_expenses(&conn, id)?;
            println!("{}", format_linked(&rows));
            Ok(())
        }
        CardsCommands::Cost { id, buffer, apply } => {
            let conn = open_db()?;
            let buffer = Some(buffer.unwrap_or(load_settings().budget_buffer_percentage));
            let cost = if apply {
                let (card, cost) = cards::apply_calculated_cost(&conn, id, buffer)?;
                println!("Budget for card {} set to {}", card.id, money(card.budgeted_amount));
                cost
            } else {
                cards::calculate_card_cost(&conn, id, buffer)?
            };
            println!("Priced on {}", cost.aircraft);
            println!("{}", crate::cli::cost::format_breakdown(&cost.breakdown));
            Ok(())
        }
        CardsCommands::Quickstart { cert, aircraft, date } => {
            let conn = open_db()?;
            let settings = load_settings();
            let certification = resolve_certification(cert)?;
            let aircraft = match aircraft {
                Some(key) => Some(resolve(&conn, &key)?),
                None => match settings.default_aircraft_id {
                    Some(id) => match get_aircraft(&conn, id) {
                        Ok(a) => Some(a),
                        Err(e) => {
                            tracing::warn!(id, error = %e, "default aircraft unavailable");
                            None
                        }
                    },
                    None => None,
                },
            };
            let options = QuickstartOptions {
                aircraft,
                buffer_percent: settings.budget_buffer_percentage,
                when_date: date.unwrap_or_else(today),
            };
            let report = quickstart(&conn, certification, &options);
            println!("{}", format_batch(certification, &report));
            Ok(())
        }
    }
}

fn aircraft_id(conn: &Connection, key: Option<&str>) -> Result<Option<i64>> {
    key.map(|k| resolve(conn, k).map(|a| a.id)).transpose()
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn clearable_hours(raw: Option<String>) -> Result<Option<Option<f64>>> {
    match clearable(raw) {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(v)) => {
            let h = v
                .trim()
                .parse::<f64>()
                .map_err(|_| TrueHourError::validation(format!("hours must be a number, got '{v}'")))?;
            Ok(Some(Some(h)))
        }
    }
}

/// The part of an expense not yet allocated to any card.
fn unlinked_amount(conn: &Connection, expense_id: i64) -> Result<f64> {
    let expense = get_expense(conn, expense_id)?;
    let linked: f64 = expense_links(conn, expense_id)?.iter().map(|l| l.amount).sum();
    Ok(round_cents(expense.amount - linked))
}

fn show(id: i64) -> Result<()> {
    let conn = open_db()?;
    let card = cards::get_card(&conn, id)?;
    let aircraft = card
        .aircraft_id
        .map(|a| get_aircraft(&conn, a))
        .transpose()?
        .map(|a| a.label());
    let linked = cards::card_expenses(&conn, id)?;

    println!("{}", format!("{} (#{})", card.name, card.id).bold());
    println!("Category:   {}", card.category);
    println!("Date:       {} ({})", card.when_date, card.frequency);
    println!("Status:     {}", status_label(card.status));
    println!("Budgeted:   {}", money(card.budgeted_amount));
    println!("Actual:     {}", money(card.actual_amount));
    println!("Remaining:  {}", remaining_label(&card));
    if let Some(a) = aircraft {
        println!("Aircraft:   {a}");
    }
    if let Some(h) = card.associated_hours {
        let rate = card.hourly_rate_type.map(|r| format!(" ({r})")).unwrap_or_default();
        println!("Hours:      {}{rate}", hours(h));
    }
    if !card.tags.is_empty() {
        println!("Tags:       {}", card.tags.join(", "));
    }
    if let Some(notes) = &card.notes {
        println!("Notes:      {notes}");
    }
    if !linked.is_empty() {
        println!();
        println!("{}", format_linked(&linked));
    }
    Ok(())
}

fn status_label(status: CardStatus) -> colored::ColoredString {
    match status {
        CardStatus::Active => status.as_str().green(),
        CardStatus::Inactive => status.as_str().yellow(),
        CardStatus::Completed => status.as_str().dimmed(),
    }
}

fn remaining_label(card: &BudgetCard) -> colored::ColoredString {
    let text = money(card.remaining_amount());
    if card.is_over_budget() {
        text.red()
    } else {
        text.normal()
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

pub fn format_cards(rows: &[BudgetCard]) -> String {
    if rows.is_empty() {
        return "No budget cards.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Name", "Category", "Status", "Budgeted", "Actual", "Remaining",
    ]);
    for card in rows {
        table.add_row(vec![
            Cell::new(card.id),
            Cell::new(&card.when_date),
            Cell::new(&card.name),
            Cell::new(&card.category),
            Cell::new(status_label(card.status)),
            Cell::new(money(card.budgeted_amount)),
            Cell::new(money(card.actual_amount)),
            Cell::new(remaining_label(card)),
        ]);
    }
    let budgeted: f64 = rows.iter().map(|c| c.budgeted_amount).sum();
    let actual: f64 = rows.iter().map(|c| c.actual_amount).sum();
    table.add_row(vec![
        Cell::new(""),
        Cell::new(""),
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(budgeted)),
        Cell::new(money(actual)),
        Cell::new(money(budgeted - actual)),
    ]);
    format!("Budget Cards\n{table}")
}

pub fn format_linked(rows: &[LinkedExpense]) -> String {
    if rows.is_empty() {
        return "No linked expenses.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Expense", "Date", "Category", "Vendor", "Amount", "Linked"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.expense.id),
            Cell::new(&row.expense.date),
            Cell::new(&row.expense.category),
            Cell::new(row.expense.vendor.as_deref().unwrap_or("")),
            Cell::new(money(row.expense.amount)),
            Cell::new(money(row.link.amount)),
        ]);
    }
    format!("Linked Expenses\n{table}")
}

pub fn format_batch(certification: Certification, report: &BatchReport) -> String {
    let mut out = format!(
        "{}: {} card(s) created",
        certification.title(),
        report.created.len()
    );
    if !report.created.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["ID", "Name", "Category", "Hours", "Budgeted"]);
        for card in &report.created {
            table.add_row(vec![
                Cell::new(card.id),
                Cell::new(&card.name),
                Cell::new(&card.category),
                Cell::new(card.associated_hours.map(hours).unwrap_or_default()),
                Cell::new(money(card.budgeted_amount)),
            ]);
        }
        out.push_str(&format!("\n{table}"));
    }
    for failed in &report.failed {
        out.push_str(&format!("\n{} {}: {}", "failed".red(), failed.name, failed.error));
    }
    out
}
