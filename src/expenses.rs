use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::cards;
use crate::error::{Result, TrueHourError};
use crate::models::{
    cents, optional_text, parse_date, require_positive_amount, require_text, text_enum, Expense,
    ExpenseLink, RecurrenceInterval,
};

pub const MAX_PAGE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewExpense {
    pub aircraft_id: Option<i64>,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub amount: f64,
    pub date: String,
    pub is_recurring: bool,
    pub recurrence_interval: Option<RecurrenceInterval>,
    pub recurrence_end_date: Option<String>,
    pub vendor: Option<String>,
    pub is_tax_deductible: bool,
    pub tax_category: Option<String>,
    /// Links the whole amount to this card on creation.
    pub card_id: Option<i64>,
}

/// Partial update. `Some(None)` clears an optional column; `card: Some(None)`
/// removes the expense's card link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseUpdate {
    pub aircraft_id: Option<Option<i64>>,
    pub category: Option<String>,
    pub subcategory: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub is_recurring: Option<bool>,
    pub recurrence_interval: Option<Option<RecurrenceInterval>>,
    pub recurrence_end_date: Option<Option<String>>,
    pub vendor: Option<Option<String>>,
    pub is_tax_deductible: Option<bool>,
    pub tax_category: Option<Option<String>>,
    pub card: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub aircraft_id: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

text_enum!(
    SummaryGroup, "summary grouping" {
        Category => "category",
        Subcategory => "subcategory",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummaryRow {
    pub group: String,
    pub count: i64,
    pub total: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

pub(crate) const EXPENSE_COLUMNS: &str = "e.id, e.aircraft_id, e.category, e.subcategory, \
     e.description, e.amount, e.date, e.is_recurring, e.recurrence_interval, \
     e.recurrence_end_date, e.vendor, e.is_tax_deductible, e.tax_category";

/// Number of columns `row_to_expense` consumes from the start of a row.
pub(crate) const EXPENSE_WIDTH: usize = 13;

pub(crate) fn row_to_expense(row: &rusqlite::Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        category: row.get(2)?,
        subcategory: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        date: row.get(6)?,
        is_recurring: row.get(7)?,
        recurrence_interval: row.get(8)?,
        recurrence_end_date: row.get(9)?,
        vendor: row.get(10)?,
        is_tax_deductible: row.get(11)?,
        tax_category: row.get(12)?,
    })
}

fn check_aircraft(conn: &Connection, aircraft_id: Option<i64>) -> Result<()> {
    if let Some(id) = aircraft_id {
        crate::aircraft::get_aircraft(conn, id)?;
    }
    Ok(())
}

fn check_recurrence(
    date: &str,
    is_recurring: bool,
    interval: Option<RecurrenceInterval>,
    end_date: Option<&str>,
) -> Result<()> {
    if is_recurring && interval.is_none() {
        return Err(TrueHourError::validation(
            "recurring expenses need a recurrence interval",
        ));
    }
    if let Some(end) = end_date {
        if end < date {
            return Err(TrueHourError::validation(
                "recurrence end date is before the expense date",
            ));
        }
    }
    Ok(())
}

fn parse_optional_date(raw: Option<String>) -> Result<Option<String>> {
    optional_text(raw).map(|d| parse_date(&d)).transpose()
}

pub fn get_expense(conn: &Connection, id: i64) -> Result<Expense> {
    conn.query_row(
        &format!("SELECT {EXPENSE_COLUMNS} FROM expenses e WHERE e.id = ?1"),
        [id],
        row_to_expense,
    )
    .optional()?
    .ok_or_else(|| TrueHourError::not_found("Expense", id))
}

pub fn add_expense(conn: &Connection, new: NewExpense) -> Result<Expense> {
    let category = require_text("category", &new.category)?;
    let amount = require_positive_amount("amount", new.amount)?;
    let date = parse_date(&new.date)?;
    let end_date = parse_optional_date(new.recurrence_end_date)?;
    check_recurrence(&date, new.is_recurring, new.recurrence_interval, end_date.as_deref())?;
    check_aircraft(conn, new.aircraft_id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO expenses (aircraft_id, category, subcategory, description, amount, date,
            is_recurring, recurrence_interval, recurrence_end_date, vendor, is_tax_deductible, tax_category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            new.aircraft_id,
            category,
            optional_text(new.subcategory),
            optional_text(new.description),
            amount,
            date,
            new.is_recurring,
            new.recurrence_interval,
            end_date,
            optional_text(new.vendor),
            new.is_tax_deductible,
            optional_text(new.tax_category),
        ],
    )?;
    let id = tx.last_insert_rowid();
    if let Some(card_id) = new.card_id {
        cards::insert_link(&tx, id, card_id, amount)?;
    }
    tx.commit()?;

    info!(id, amount, card = ?new.card_id, "added expense");
    get_expense(conn, id)
}

pub fn update_expense(conn: &Connection, id: i64, update: ExpenseUpdate) -> Result<Expense> {
    let tx = conn.unchecked_transaction()?;
    let current = get_expense(&tx, id)?;

    let category = match update.category {
        Some(c) => require_text("category", &c)?,
        None => current.category.clone(),
    };
    let amount = match update.amount {
        Some(a) => require_positive_amount("amount", a)?,
        None => current.amount,
    };
    let date = match update.date {
        Some(d) => parse_date(&d)?,
        None => current.date.clone(),
    };
    let end_date = match update.recurrence_end_date {
        Some(d) => parse_optional_date(d)?,
        None => current.recurrence_end_date.clone(),
    };
    let is_recurring = update.is_recurring.unwrap_or(current.is_recurring);
    let interval = update.recurrence_interval.unwrap_or(current.recurrence_interval);
    check_recurrence(&date, is_recurring, interval, end_date.as_deref())?;
    let aircraft_id = update.aircraft_id.unwrap_or(current.aircraft_id);
    check_aircraft(&tx, aircraft_id)?;

    tx.execute(
        "UPDATE expenses SET aircraft_id = ?1, category = ?2, subcategory = ?3, description = ?4,
            amount = ?5, date = ?6, is_recurring = ?7, recurrence_interval = ?8,
            recurrence_end_date = ?9, vendor = ?10, is_tax_deductible = ?11, tax_category = ?12,
            updated_at = datetime('now')
         WHERE id = ?13",
        rusqlite::params![
            aircraft_id,
            category,
            update.subcategory.map(optional_text).unwrap_or(current.subcategory),
            update.description.map(optional_text).unwrap_or(current.description),
            amount,
            date,
            is_recurring,
            interval,
            end_date,
            update.vendor.map(optional_text).unwrap_or(current.vendor),
            update.is_tax_deductible.unwrap_or(current.is_tax_deductible),
            update.tax_category.map(optional_text).unwrap_or(current.tax_category),
            id,
        ],
    )?;

    let amount_changed = cents(amount) != cents(current.amount);
    let links = expense_links(&tx, id)?;
    match update.card {
        Some(target) => retarget_link(&tx, id, &links, target, amount, amount_changed)?,
        None if amount_changed => match links.as_slice() {
            [] => {}
            [only] => {
                cards::delete_link(&tx, id, only.budget_card_id)?;
                cards::insert_link(&tx, id, only.budget_card_id, amount)?;
                debug!(expense = id, card = only.budget_card_id, "relinked for new amount");
            }
            split => {
                let allocated: i64 = split.iter().map(|l| cents(l.amount)).sum();
                if cents(amount) < allocated {
                    return Err(TrueHourError::validation(format!(
                        "expense {id} has {} allocated across {} cards; amount cannot drop below it",
                        crate::fmt::money(allocated as f64 / 100.0),
                        split.len()
                    )));
                }
            }
        },
        None => {}
    }
    tx.commit()?;

    info!(id, "updated expense");
    get_expense(conn, id)
}

/// Moves an expense's single card link to `target`, or drops it for `None`.
/// The old link is deleted and a fresh one created for the full amount.
fn retarget_link(
    conn: &Connection,
    expense_id: i64,
    links: &[ExpenseLink],
    target: Option<i64>,
    amount: f64,
    amount_changed: bool,
) -> Result<()> {
    if links.len() > 1 {
        return Err(TrueHourError::validation(format!(
            "expense {expense_id} is split across {} cards; use `cards link`/`cards unlink` instead",
            links.len()
        )));
    }
    let existing = links.first().map(|l| l.budget_card_id);
    if existing == target && !amount_changed {
        return Ok(());
    }
    if let Some(card_id) = existing {
        cards::delete_link(conn, expense_id, card_id)?;
    }
    if let Some(card_id) = target {
        cards::insert_link(conn, expense_id, card_id, amount)?;
    }
    debug!(expense = expense_id, from = ?existing, to = ?target, "relinked expense");
    Ok(())
}

/// Deletes the expense and its link rows. Returns the removed expense and the
/// number of links that went with it.
pub fn delete_expense(conn: &Connection, id: i64) -> Result<(Expense, usize)> {
    let expense = get_expense(conn, id)?;
    let links = expense_links(conn, id)?.len();
    conn.execute("DELETE FROM expenses WHERE id = ?1", [id])?;
    info!(id, links, "deleted expense");
    Ok((expense, links))
}

pub fn list_expenses(conn: &Connection, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
    let limit = filter.limit.unwrap_or(100);
    if limit == 0 || limit > MAX_PAGE {
        return Err(TrueHourError::validation(format!(
            "limit must be between 1 and {MAX_PAGE}"
        )));
    }

    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(category) = &filter.category {
        clauses.push("e.category = ? COLLATE NOCASE");
        params.push(Value::Text(category.clone()));
    }
    if let Some(aircraft_id) = filter.aircraft_id {
        clauses.push("e.aircraft_id = ?");
        params.push(Value::Integer(aircraft_id));
    }
    if let Some(from) = &filter.from {
        clauses.push("e.date >= ?");
        params.push(Value::Text(parse_date(from)?));
    }
    if let Some(to) = &filter.to {
        clauses.push("e.date <= ?");
        params.push(Value::Text(parse_date(to)?));
    }
    params.push(Value::Integer(limit as i64));
    params.push(Value::Integer(filter.offset as i64));

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses e {where_sql} ORDER BY e.date DESC, e.id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %sql, "listing expenses");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), row_to_expense)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn expense_links(conn: &Connection, expense_id: i64) -> Result<Vec<ExpenseLink>> {
    let mut stmt = conn.prepare(
        "SELECT id, expense_id, budget_card_id, amount, created_at
         FROM expense_budget_links WHERE expense_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([expense_id], cards::row_to_link)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn expense_summary(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
    group_by: SummaryGroup,
) -> Result<Vec<ExpenseSummaryRow>> {
    let column = match group_by {
        SummaryGroup::Category => "category",
        SummaryGroup::Subcategory => "COALESCE(subcategory, '(none)')",
    };
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;
    let sql = format!(
        "SELECT {column} AS grp, count(*), SUM(amount), AVG(amount), MIN(amount), MAX(amount)
         FROM expenses
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
         GROUP BY grp ORDER BY SUM(amount) DESC, grp"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![from, to], |row| {
            Ok(ExpenseSummaryRow {
                group: row.get(0)?,
                count: row.get(1)?,
                total: row.get(2)?,
                average: row.get(3)?,
                min: row.get(4)?,
                max: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) fn sample(amount: f64, date: &str) -> NewExpense {
    NewExpense {
        category: "Flight Training".into(),
        amount,
        date: date.into(),
        vendor: Some("Skyline Aviation".into()),
        ..NewExpense::default()
    }
}
