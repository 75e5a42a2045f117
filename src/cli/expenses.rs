use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::aircraft::resolve;
use crate::cards::get_card;
use crate::cli::{clearable, clearable_parsed, open_db, parse_id, parse_opt, today, ExpensesCommands};
use crate::error::Result;
use crate::expenses::{
    self, ExpenseFilter, ExpenseSummaryRow, ExpenseUpdate, NewExpense, SummaryGroup,
};
use crate::fmt::money;
use crate::models::{Expense, RecurrenceInterval};

pub fn dispatch(command: ExpensesCommands) -> Result<()> {
    match command {
        ExpensesCommands::Add {
            amount,
            category,
            date,
            subcategory,
            description,
            vendor,
            aircraft,
            card,
            recurring,
            recurring_until,
            tax_deductible,
            tax_category,
        } => {
            let conn = open_db()?;
            let interval: Option<RecurrenceInterval> = parse_opt(recurring)?;
            let new = NewExpense {
                aircraft_id: aircraft_id(&conn, aircraft.as_deref())?,
                category,
                subcategory,
                description,
                amount,
                date: date.unwrap_or_else(today),
                is_recurring: interval.is_some(),
                recurrence_interval: interval,
                recurrence_end_date: recurring_until,
                vendor,
                is_tax_deductible: tax_deductible,
                tax_category,
                card_id: card,
            };
            let expense = expenses::add_expense(&conn, new)?;
            println!("Added expense {}: {} on {}", expense.id, money(expense.amount), expense.date);
            if let Some(card_id) = card {
                let card = get_card(&conn, card_id)?;
                println!("Linked to card {}: {} (actual now {})", card.id, card.name, money(card.actual_amount));
            }
            Ok(())
        }
        ExpensesCommands::List {
            category,
            aircraft,
            from_date,
            to_date,
            limit,
            offset,
        } => {
            let conn = open_db()?;
            let filter = ExpenseFilter {
                category,
                aircraft_id: aircraft_id(&conn, aircraft.as_deref())?,
                from: from_date,
                to: to_date,
                limit: Some(limit),
                offset,
            };
            let rows = expenses::list_expenses(&conn, &filter)?;
            println!("{}", format_expenses(&rows));
            Ok(())
        }
        ExpensesCommands::Show { id } => {
            let conn = open_db()?;
            println!("{}", format_detail(&conn, id)?);
            Ok(())
        }
        ExpensesCommands::Edit {
            id,
            amount,
            category,
            date,
            subcategory,
            description,
            vendor,
            aircraft,
            card,
            recurring,
            recurring_until,
            tax_deductible,
            tax_category,
        } => {
            let conn = open_db()?;
            let aircraft_id = match clearable(aircraft) {
                None => None,
                Some(None) => Some(None),
                Some(Some(key)) => Some(Some(resolve(&conn, &key)?.id)),
            };
            let card = match clearable(card) {
                None => None,
                Some(None) => Some(None),
                Some(Some(raw)) => Some(Some(parse_id("card", &raw)?)),
            };
            let interval: Option<Option<RecurrenceInterval>> = clearable_parsed(recurring)?;
            let update = ExpenseUpdate {
                aircraft_id,
                category,
                subcategory: clearable(subcategory),
                description: clearable(description),
                amount,
                date,
                is_recurring: interval.map(|i| i.is_some()),
                recurrence_interval: interval,
                recurrence_end_date: clearable(recurring_until),
                vendor: clearable(vendor),
                is_tax_deductible: tax_deductible,
                tax_category: clearable(tax_category),
                card,
            };
            let expense = expenses::update_expense(&conn, id, update)?;
            println!("Updated expense {}: {} on {}", expense.id, money(expense.amount), expense.date);
            Ok(())
        }
        ExpensesCommands::Delete { id } => {
            let conn = open_db()?;
            let (expense, links) = expenses::delete_expense(&conn, id)?;
            println!(
                "Deleted expense {} ({}, {links} card link(s) removed)",
                expense.id,
                money(expense.amount)
            );
            Ok(())
        }
        ExpensesCommands::Summary {
            from_date,
            to_date,
            group_by,
        } => {
            let conn = open_db()?;
            let group: SummaryGroup = group_by.parse()?;
            let rows =
                expenses::expense_summary(&conn, from_date.as_deref(), to_date.as_deref(), group)?;
            println!("{}", format_summary(group, &rows));
            Ok(())
        }
    }
}

fn aircraft_id(conn: &Connection, key: Option<&str>) -> Result<Option<i64>> {
    key.map(|k| resolve(conn, k).map(|a| a.id)).transpose()
}

pub fn format_expenses(rows: &[Expense]) -> String {
    if rows.is_empty() {
        return "No expenses.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Category", "Description", "Vendor", "Amount"]);
    for e in rows {
        let category = match &e.subcategory {
            Some(sub) => format!("{} / {sub}", e.category),
            None => e.category.clone(),
        };
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(&e.date),
            Cell::new(category),
            Cell::new(e.description.as_deref().unwrap_or("")),
            Cell::new(e.vendor.as_deref().unwrap_or("")),
            Cell::new(money(e.amount)),
        ]);
    }
    let total: f64 = rows.iter().map(|e| e.amount).sum();
    table.add_row(vec![
        Cell::new(""),
        Cell::new(""),
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(total)),
    ]);
    format!("Expenses\n{table}")
}

fn format_detail(conn: &Connection, id: i64) -> Result<String> {
    let e = expenses::get_expense(conn, id)?;
    let mut out = format!("{}\n", format!("Expense #{} {}", e.id, money(e.amount)).bold());
    out.push_str(&format!("Date:         {}\n", e.date));
    out.push_str(&format!("Category:     {}\n", e.category));
    if let Some(sub) = &e.subcategory {
        out.push_str(&format!("Subcategory:  {sub}\n"));
    }
    if let Some(desc) = &e.description {
        out.push_str(&format!("Description:  {desc}\n"));
    }
    if let Some(vendor) = &e.vendor {
        out.push_str(&format!("Vendor:       {vendor}\n"));
    }
    if let Some(aircraft_id) = e.aircraft_id {
        let label = crate::aircraft::get_aircraft(conn, aircraft_id)?.label();
        out.push_str(&format!("Aircraft:     {label}\n"));
    }
    if e.is_recurring {
        let interval = e.recurrence_interval.map(|i| i.to_string()).unwrap_or_default();
        let until = e
            .recurrence_end_date
            .as_deref()
            .map(|d| format!(" until {d}"))
            .unwrap_or_default();
        out.push_str(&format!("Recurring:    {interval}{until}\n"));
    }
    if e.is_tax_deductible {
        let cat = e.tax_category.as_deref().unwrap_or("deductible");
        out.push_str(&format!("Tax:          {cat}\n"));
    }

    let links = expenses::expense_links(conn, id)?;
    if links.is_empty() {
        out.push_str("Not linked to any budget card.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Card", "Name", "Linked", "Created"]);
        for link in &links {
            let card = get_card(conn, link.budget_card_id)?;
            table.add_row(vec![
                Cell::new(card.id),
                Cell::new(card.name),
                Cell::new(money(link.amount)),
                Cell::new(&link.created_at),
            ]);
        }
        out.push_str(&format!("Budget Links\n{table}"));
    }
    Ok(out)
}

pub fn format_summary(group: SummaryGroup, rows: &[ExpenseSummaryRow]) -> String {
    if rows.is_empty() {
        return "No expenses in range.".to_string();
    }
    let label = match group {
        SummaryGroup::Category => "Category",
        SummaryGroup::Subcategory => "Subcategory",
    };
    let mut table = Table::new();
    table.set_header(vec![label, "Count", "Total", "Average", "Min", "Max"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(&r.group),
            Cell::new(r.count),
            Cell::new(money(r.total)),
            Cell::new(money(r.average)),
            Cell::new(money(r.min)),
            Cell::new(money(r.max)),
        ]);
    }
    format!("Expense Summary\n{table}")
}
