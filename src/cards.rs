use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::aircraft::{self, get_aircraft};
use crate::cost::{calculate_cost, CostBreakdown, RateType};
use crate::error::{Result, TrueHourError};
use crate::expenses::{self, get_expense, EXPENSE_COLUMNS, EXPENSE_WIDTH};
use crate::fmt::money;
use crate::models::{
    cents, optional_text, parse_date, require_non_negative, require_positive_amount, require_text,
    round_cents, BudgetCard, CardStatus, Expense, ExpenseLink, Frequency,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub name: String,
    pub category: String,
    pub frequency: Frequency,
    pub when_date: String,
    pub budgeted_amount: f64,
    pub status: CardStatus,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub aircraft_id: Option<i64>,
    pub hourly_rate_type: Option<RateType>,
    pub associated_hours: Option<f64>,
}

impl NewCard {
    pub fn new(name: &str, category: &str, when_date: &str, budgeted_amount: f64) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            frequency: Frequency::Once,
            when_date: when_date.to_string(),
            budgeted_amount,
            status: CardStatus::Active,
            tags: Vec::new(),
            notes: None,
            aircraft_id: None,
            hourly_rate_type: None,
            associated_hours: None,
        }
    }
}

/// Partial update. `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub frequency: Option<Frequency>,
    pub when_date: Option<String>,
    pub budgeted_amount: Option<f64>,
    pub status: Option<CardStatus>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<Option<String>>,
    pub aircraft_id: Option<Option<i64>>,
    pub hourly_rate_type: Option<Option<RateType>>,
    pub associated_hours: Option<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFilter {
    pub status: Option<CardStatus>,
    pub category: Option<String>,
    /// (year, month) of `when_date`.
    pub month: Option<(i32, u32)>,
}

/// An expense linked to a card, with the portion allocated to that card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedExpense {
    pub expense: Expense,
    pub link: ExpenseLink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardCost {
    pub card_id: i64,
    pub aircraft: String,
    pub breakdown: CostBreakdown,
}

const CARD_SELECT: &str = "SELECT c.id, c.name, c.category, c.frequency, c.when_date, \
     c.budgeted_amount, c.status, c.tags, c.notes, c.aircraft_id, c.hourly_rate_type, \
     c.associated_hours, \
     COALESCE((SELECT SUM(l.amount) FROM expense_budget_links l WHERE l.budget_card_id = c.id), 0) \
     FROM budget_cards c";

fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<BudgetCard> {
    let tags_json: String = row.get(7)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(BudgetCard {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        frequency: row.get(3)?,
        when_date: row.get(4)?,
        budgeted_amount: row.get(5)?,
        status: row.get(6)?,
        tags,
        notes: row.get(8)?,
        aircraft_id: row.get(9)?,
        hourly_rate_type: row.get(10)?,
        associated_hours: row.get(11)?,
        actual_amount: round_cents(row.get(12)?),
    })
}

pub(crate) fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<ExpenseLink> {
    link_at(row, 0)
}

fn link_at(row: &rusqlite::Row, start: usize) -> rusqlite::Result<ExpenseLink> {
    Ok(ExpenseLink {
        id: row.get(start)?,
        expense_id: row.get(start + 1)?,
        budget_card_id: row.get(start + 2)?,
        amount: row.get(start + 3)?,
        created_at: row.get::<_, Option<String>>(start + 4)?.unwrap_or_default(),
    })
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Normalizes and checks every field of a card before it is written.
fn validate(conn: &Connection, card: NewCard) -> Result<NewCard> {
    let name = require_text("name", &card.name)?;
    let category = require_text("category", &card.category)?;
    let when_date = parse_date(&card.when_date)?;
    let budgeted_amount = require_positive_amount("budgeted amount", card.budgeted_amount)?;
    let associated_hours = card
        .associated_hours
        .map(|h| require_non_negative("associated hours", h))
        .transpose()?;
    if let Some(id) = card.aircraft_id {
        get_aircraft(conn, id)?;
    }
    Ok(NewCard {
        name,
        category,
        frequency: card.frequency,
        when_date,
        budgeted_amount,
        status: card.status,
        tags: clean_tags(card.tags),
        notes: optional_text(card.notes),
        aircraft_id: card.aircraft_id,
        hourly_rate_type: card.hourly_rate_type,
        associated_hours,
    })
}

fn insert_card(conn: &Connection, card: &NewCard) -> Result<i64> {
    conn.execute(
        "INSERT INTO budget_cards (name, category, frequency, when_date, budgeted_amount, status,
            tags, notes, aircraft_id, hourly_rate_type, associated_hours)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            card.name,
            card.category,
            card.frequency,
            card.when_date,
            card.budgeted_amount,
            card.status,
            serde_json::to_string(&card.tags)?,
            card.notes,
            card.aircraft_id,
            card.hourly_rate_type,
            card.associated_hours,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn create_card(conn: &Connection, new: NewCard) -> Result<BudgetCard> {
    let card = validate(conn, new)?;
    let id = insert_card(conn, &card)?;
    info!(id, name = %card.name, budgeted = card.budgeted_amount, "created budget card");
    get_card(conn, id)
}

pub fn get_card(conn: &Connection, id: i64) -> Result<BudgetCard> {
    conn.query_row(&format!("{CARD_SELECT} WHERE c.id = ?1"), [id], row_to_card)
        .optional()?
        .ok_or_else(|| TrueHourError::not_found("Budget card", id))
}

pub fn list_cards(conn: &Connection, filter: &CardFilter) -> Result<Vec<BudgetCard>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    if let Some(status) = filter.status {
        clauses.push("c.status = ?");
        params.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(category) = &filter.category {
        clauses.push("c.category = ? COLLATE NOCASE");
        params.push(Value::Text(category.clone()));
    }
    if let Some((year, month)) = filter.month {
        clauses.push("substr(c.when_date, 1, 7) = ?");
        params.push(Value::Text(format!("{year:04}-{month:02}")));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("{CARD_SELECT}{where_sql} ORDER BY c.when_date DESC, c.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), row_to_card)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_card(conn: &Connection, id: i64, update: CardUpdate) -> Result<BudgetCard> {
    let current = get_card(conn, id)?;
    let merged = NewCard {
        name: update.name.unwrap_or(current.name),
        category: update.category.unwrap_or(current.category),
        frequency: update.frequency.unwrap_or(current.frequency),
        when_date: update.when_date.unwrap_or(current.when_date),
        budgeted_amount: update.budgeted_amount.unwrap_or(current.budgeted_amount),
        status: update.status.unwrap_or(current.status),
        tags: update.tags.unwrap_or(current.tags),
        notes: update.notes.unwrap_or(current.notes),
        aircraft_id: update.aircraft_id.unwrap_or(current.aircraft_id),
        hourly_rate_type: update.hourly_rate_type.unwrap_or(current.hourly_rate_type),
        associated_hours: update.associated_hours.unwrap_or(current.associated_hours),
    };
    let card = validate(conn, merged)?;
    conn.execute(
        "UPDATE budget_cards SET name = ?1, category = ?2, frequency = ?3, when_date = ?4,
            budgeted_amount = ?5, status = ?6, tags = ?7, notes = ?8, aircraft_id = ?9,
            hourly_rate_type = ?10, associated_hours = ?11, updated_at = datetime('now')
         WHERE id = ?12",
        rusqlite::params![
            card.name,
            card.category,
            card.frequency,
            card.when_date,
            card.budgeted_amount,
            card.status,
            serde_json::to_string(&card.tags)?,
            card.notes,
            card.aircraft_id,
            card.hourly_rate_type,
            card.associated_hours,
            id,
        ],
    )?;
    info!(id, "updated budget card");
    get_card(conn, id)
}

/// Any status may move to any other.
pub fn set_status(conn: &Connection, id: i64, status: CardStatus) -> Result<BudgetCard> {
    let changed = conn.execute(
        "UPDATE budget_cards SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        rusqlite::params![status, id],
    )?;
    if changed == 0 {
        return Err(TrueHourError::not_found("Budget card", id));
    }
    info!(id, status = %status, "changed card status");
    get_card(conn, id)
}

/// Deletes the card and its link rows. The linked expenses stay as they were,
/// now unlinked from this card. Returns the number of links removed.
pub fn delete_card(conn: &Connection, id: i64) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let card = get_card(&tx, id)?;
    let unlinked = tx.execute("DELETE FROM expense_budget_links WHERE budget_card_id = ?1", [id])?;
    tx.execute("DELETE FROM budget_cards WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(id, name = %card.name, unlinked, "deleted budget card");
    Ok(unlinked)
}

/// Copies every field into a new card. Links are not copied, so the copy
/// starts with no actual spend.
pub fn duplicate_card(conn: &Connection, id: i64) -> Result<BudgetCard> {
    let source = get_card(conn, id)?;
    let copy = NewCard {
        name: source.name,
        category: source.category,
        frequency: source.frequency,
        when_date: source.when_date,
        budgeted_amount: source.budgeted_amount,
        status: source.status,
        tags: source.tags,
        notes: source.notes,
        aircraft_id: source.aircraft_id,
        hourly_rate_type: source.hourly_rate_type,
        associated_hours: source.associated_hours,
    };
    let new_id = insert_card(conn, &copy)?;
    info!(source = id, id = new_id, "duplicated budget card");
    get_card(conn, new_id)
}

// ---------------------------------------------------------------------------
// Expense links
// ---------------------------------------------------------------------------

fn linked_total(conn: &Connection, expense_id: i64) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM expense_budget_links WHERE expense_id = ?1",
        [expense_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn find_link(conn: &Connection, expense_id: i64, card_id: i64) -> Result<Option<ExpenseLink>> {
    let link = conn
        .query_row(
            "SELECT id, expense_id, budget_card_id, amount, created_at
             FROM expense_budget_links WHERE expense_id = ?1 AND budget_card_id = ?2",
            [expense_id, card_id],
            row_to_link,
        )
        .optional()?;
    Ok(link)
}

/// Checks and writes one link without opening a transaction, so callers that
/// already hold one can compose it.
pub(crate) fn insert_link(
    conn: &Connection,
    expense_id: i64,
    card_id: i64,
    amount: f64,
) -> Result<ExpenseLink> {
    let amount = require_positive_amount("link amount", amount)?;
    let expense = get_expense(conn, expense_id)?;
    get_card(conn, card_id)?;
    if find_link(conn, expense_id, card_id)?.is_some() {
        return Err(TrueHourError::Conflict(format!(
            "expense {expense_id} is already linked to card {card_id}"
        )));
    }
    let available = cents(expense.amount) - cents(linked_total(conn, expense_id)?);
    if cents(amount) > available {
        return Err(TrueHourError::validation(format!(
            "link amount {} exceeds the {} of expense {expense_id} not yet linked",
            money(amount),
            money(available as f64 / 100.0)
        )));
    }
    conn.execute(
        "INSERT INTO expense_budget_links (expense_id, budget_card_id, amount) VALUES (?1, ?2, ?3)",
        rusqlite::params![expense_id, card_id, amount],
    )?;
    let id = conn.last_insert_rowid();
    debug!(expense = expense_id, card = card_id, amount, "inserted link");
    conn.query_row(
        "SELECT id, expense_id, budget_card_id, amount, created_at FROM expense_budget_links WHERE id = ?1",
        [id],
        row_to_link,
    )
    .map_err(Into::into)
}

pub(crate) fn delete_link(conn: &Connection, expense_id: i64, card_id: i64) -> Result<ExpenseLink> {
    let link = find_link(conn, expense_id, card_id)?.ok_or_else(|| {
        TrueHourError::not_found("Link", format!("between expense {expense_id} and card {card_id}"))
    })?;
    conn.execute("DELETE FROM expense_budget_links WHERE id = ?1", [link.id])?;
    Ok(link)
}

/// Allocates `amount` of an expense to a card. Fails without writing anything
/// when either side is missing, the pair is already linked, or the amount is
/// more than the part of the expense not yet linked elsewhere.
pub fn link_expense(conn: &Connection, expense_id: i64, card_id: i64, amount: f64) -> Result<ExpenseLink> {
    let tx = conn.unchecked_transaction()?;
    let link = insert_link(&tx, expense_id, card_id, amount)?;
    tx.commit()?;
    info!(expense = expense_id, card = card_id, amount = link.amount, "linked expense");
    Ok(link)
}

pub fn unlink_expense(conn: &Connection, card_id: i64, expense_id: i64) -> Result<ExpenseLink> {
    let link = delete_link(conn, expense_id, card_id)?;
    info!(expense = expense_id, card = card_id, "unlinked expense");
    Ok(link)
}

pub fn card_expenses(conn: &Connection, card_id: i64) -> Result<Vec<LinkedExpense>> {
    get_card(conn, card_id)?;
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS}, l.id, l.expense_id, l.budget_card_id, l.amount, l.created_at
         FROM expense_budget_links l JOIN expenses e ON e.id = l.expense_id
         WHERE l.budget_card_id = ?1
         ORDER BY e.date DESC, e.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([card_id], |row| {
            Ok(LinkedExpense {
                expense: expenses::row_to_expense(row)?,
                link: link_at(row, EXPENSE_WIDTH)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

/// Prices the card's associated hours on its aircraft's rate.
pub fn calculate_card_cost(conn: &Connection, card_id: i64, buffer_percent: Option<f64>) -> Result<CardCost> {
    let card = get_card(conn, card_id)?;
    let aircraft_id = card.aircraft_id.ok_or_else(|| {
        TrueHourError::validation(format!("card {card_id} has no aircraft to price against"))
    })?;
    let hours = card.associated_hours.ok_or_else(|| {
        TrueHourError::validation(format!("card {card_id} has no associated hours"))
    })?;
    let aircraft = aircraft::get_aircraft(conn, aircraft_id)?;
    if let Some(expected) = card.hourly_rate_type {
        if expected != aircraft.rate.rate_type() {
            return Err(TrueHourError::validation(format!(
                "card {card_id} expects a {expected} rate but {} is billed {}",
                aircraft.tail_number,
                aircraft.rate.rate_type()
            )));
        }
    }
    let breakdown = calculate_cost(&aircraft.rate, hours, buffer_percent)?;
    debug!(card = card_id, total = breakdown.total, "calculated card cost");
    Ok(CardCost {
        card_id,
        aircraft: aircraft.label(),
        breakdown,
    })
}

/// Calculates the card's cost and stores it as the budgeted amount.
pub fn apply_calculated_cost(
    conn: &Connection,
    card_id: i64,
    buffer_percent: Option<f64>,
) -> Result<(BudgetCard, CardCost)> {
    let cost = calculate_card_cost(conn, card_id, buffer_percent)?;
    let card = update_card(
        conn,
        card_id,
        CardUpdate {
            budgeted_amount: Some(round_cents(cost.breakdown.total)),
            ..CardUpdate::default()
        },
    )?;
    Ok((card, cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::add_aircraft;
    use crate::cost::RateConfig;
    use crate::db::test_db;
    use crate::expenses::{add_expense, expense_links, sample};

    fn new_card(conn: &Connection, name: &str, budget: f64) -> BudgetCard {
        create_card(conn, NewCard::new(name, "Flight Training", "2025-04-01", budget)).unwrap()
    }

    fn expense(conn: &Connection, amount: f64) -> Expense {
        add_expense(conn, sample(amount, "2025-04-03")).unwrap()
    }

    fn links_sum(conn: &Connection, card_id: i64) -> f64 {
        conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM expense_budget_links WHERE budget_card_id = ?1",
            [card_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    fn assert_actual_matches_links(conn: &Connection, card_id: i64) {
        let card = get_card(conn, card_id).unwrap();
        assert_eq!(cents(card.actual_amount), cents(links_sum(conn, card_id)));
    }

    #[test]
    fn test_create_validates() {
        let (_dir, conn) = test_db();
        assert!(create_card(&conn, NewCard::new("  ", "Flight Training", "2025-04-01", 100.0)).is_err());
        assert!(create_card(&conn, NewCard::new("Lessons", "Flight Training", "2025-04-01", 0.0)).is_err());
        assert!(create_card(&conn, NewCard::new("Lessons", "Flight Training", "soon", 100.0)).is_err());
        let mut with_aircraft = NewCard::new("Lessons", "Flight Training", "2025-04-01", 100.0);
        with_aircraft.aircraft_id = Some(7);
        assert!(create_card(&conn, with_aircraft).is_err());
    }

    #[test]
    fn test_create_starts_with_zero_actual() {
        let (_dir, conn) = test_db();
        let mut new = NewCard::new("  Headset ", "Equipment", "04/15/2025", 1099.0);
        new.tags = vec!["gear".into(), " gear".into(), "".into()];
        let card = create_card(&conn, new).unwrap();
        assert_eq!(card.name, "Headset");
        assert_eq!(card.when_date, "2025-04-15");
        assert_eq!(card.actual_amount, 0.0);
        assert_eq!(card.remaining_amount(), 1099.0);
        assert_eq!(card.status, CardStatus::Active);
        assert_eq!(card.tags, vec!["gear"]);
    }

    #[test]
    fn test_actual_tracks_every_link_change() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 2000.0);
        let e1 = expense(&conn, 300.0);
        let e2 = expense(&conn, 150.25);
        let e3 = expense(&conn, 80.0);

        link_expense(&conn, e1.id, card.id, 300.0).unwrap();
        assert_actual_matches_links(&conn, card.id);
        link_expense(&conn, e2.id, card.id, 100.10).unwrap();
        assert_actual_matches_links(&conn, card.id);
        link_expense(&conn, e3.id, card.id, 80.0).unwrap();
        assert_actual_matches_links(&conn, card.id);
        assert_eq!(get_card(&conn, card.id).unwrap().actual_amount, 480.10);

        unlink_expense(&conn, card.id, e2.id).unwrap();
        assert_actual_matches_links(&conn, card.id);
        link_expense(&conn, e2.id, card.id, 150.25).unwrap();
        assert_actual_matches_links(&conn, card.id);
        unlink_expense(&conn, card.id, e1.id).unwrap();
        assert_actual_matches_links(&conn, card.id);
        assert_eq!(get_card(&conn, card.id).unwrap().actual_amount, 230.25);
    }

    #[test]
    fn test_over_allocation_rejected_without_change() {
        let (_dir, conn) = test_db();
        let a = new_card(&conn, "Lessons", 1000.0);
        let b = new_card(&conn, "Ground", 1000.0);
        let e = expense(&conn, 100.0);
        link_expense(&conn, e.id, a.id, 60.0).unwrap();

        let err = link_expense(&conn, e.id, b.id, 40.01).unwrap_err();
        assert!(matches!(err, TrueHourError::Validation(_)), "unexpected: {err}");
        assert_eq!(get_card(&conn, b.id).unwrap().actual_amount, 0.0);
        assert_eq!(get_card(&conn, a.id).unwrap().actual_amount, 60.0);
        assert_eq!(expense_links(&conn, e.id).unwrap().len(), 1);
        assert_eq!(get_expense(&conn, e.id).unwrap().amount, 100.0);

        link_expense(&conn, e.id, b.id, 40.0).unwrap();
        assert_eq!(get_card(&conn, b.id).unwrap().actual_amount, 40.0);
    }

    #[test]
    fn test_link_rejects_duplicates_and_bad_amounts() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        let e = expense(&conn, 100.0);
        assert!(link_expense(&conn, e.id, card.id, 0.0).is_err());
        assert!(link_expense(&conn, e.id, card.id, -10.0).is_err());
        assert!(link_expense(&conn, e.id, 999, 10.0).is_err());
        assert!(link_expense(&conn, 999, card.id, 10.0).is_err());
        link_expense(&conn, e.id, card.id, 10.0).unwrap();
        assert!(matches!(
            link_expense(&conn, e.id, card.id, 10.0),
            Err(TrueHourError::Conflict(_))
        ));
        assert_eq!(get_card(&conn, card.id).unwrap().actual_amount, 10.0);
    }

    #[test]
    fn test_unlink_missing_is_not_found() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        let e = expense(&conn, 100.0);
        assert!(matches!(
            unlink_expense(&conn, card.id, e.id),
            Err(TrueHourError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_card_leaves_expenses_untouched() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        let other = new_card(&conn, "Ground", 500.0);
        let expenses: Vec<Expense> = [120.0, 75.5, 210.0].iter().map(|a| expense(&conn, *a)).collect();
        for e in &expenses {
            link_expense(&conn, e.id, card.id, e.amount).unwrap();
        }
        let before: Vec<Expense> = expenses.iter().map(|e| get_expense(&conn, e.id).unwrap()).collect();

        let removed = delete_card(&conn, card.id).unwrap();
        assert_eq!(removed, 3);
        assert!(matches!(get_card(&conn, card.id), Err(TrueHourError::NotFound { .. })));
        for (e, was) in expenses.iter().zip(&before) {
            assert!(expense_links(&conn, e.id).unwrap().is_empty());
            assert_eq!(&get_expense(&conn, e.id).unwrap(), was);
        }
        assert!(get_card(&conn, other.id).is_ok());
    }

    #[test]
    fn test_duplicate_copies_fields_not_links() {
        let (_dir, conn) = test_db();
        let mut new = NewCard::new("Checkride", "Exams & Checkrides", "2025-08-01", 900.0);
        new.frequency = Frequency::Once;
        new.tags = vec!["ppl".into()];
        new.notes = Some("DPE fee".into());
        new.associated_hours = Some(1.5);
        let source = create_card(&conn, new).unwrap();
        let e = expense(&conn, 450.0);
        link_expense(&conn, e.id, source.id, 450.0).unwrap();
        let source = get_card(&conn, source.id).unwrap();

        let copy = duplicate_card(&conn, source.id).unwrap();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.actual_amount, 0.0);
        assert!(card_expenses(&conn, copy.id).unwrap().is_empty());
        assert_eq!(
            BudgetCard {
                id: source.id,
                actual_amount: source.actual_amount,
                ..copy.clone()
            },
            source
        );

        update_card(
            &conn,
            source.id,
            CardUpdate {
                name: Some("Checkride retake".into()),
                budgeted_amount: Some(950.0),
                ..CardUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(get_card(&conn, copy.id).unwrap(), copy);
    }

    #[test]
    fn test_status_changes_freely() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        for status in [CardStatus::Completed, CardStatus::Active, CardStatus::Inactive, CardStatus::Completed] {
            assert_eq!(set_status(&conn, card.id, status).unwrap().status, status);
        }
        assert!(set_status(&conn, 404, CardStatus::Active).is_err());
    }

    #[test]
    fn test_update_validates_and_clears() {
        let (_dir, conn) = test_db();
        let mut new = NewCard::new("Lessons", "Flight Training", "2025-04-01", 1000.0);
        new.notes = Some("weekday slots".into());
        let card = create_card(&conn, new).unwrap();
        assert!(update_card(
            &conn,
            card.id,
            CardUpdate {
                budgeted_amount: Some(-1.0),
                ..CardUpdate::default()
            }
        )
        .is_err());
        let updated = update_card(
            &conn,
            card.id,
            CardUpdate {
                notes: Some(None),
                when_date: Some("2025-05-01".into()),
                ..CardUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.notes, None);
        assert_eq!(updated.when_date, "2025-05-01");
        assert_eq!(updated.budgeted_amount, 1000.0);
    }

    #[test]
    fn test_list_filters_and_order() {
        let (_dir, conn) = test_db();
        create_card(&conn, NewCard::new("A", "Flight Training", "2025-04-01", 100.0)).unwrap();
        create_card(&conn, NewCard::new("B", "Medical", "2025-06-01", 100.0)).unwrap();
        let c = create_card(&conn, NewCard::new("C", "Flight Training", "2025-06-15", 100.0)).unwrap();
        set_status(&conn, c.id, CardStatus::Completed).unwrap();

        let all = list_cards(&conn, &CardFilter::default()).unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);

        let june = CardFilter {
            month: Some((2025, 6)),
            ..CardFilter::default()
        };
        assert_eq!(list_cards(&conn, &june).unwrap().len(), 2);

        let active_training = CardFilter {
            status: Some(CardStatus::Active),
            category: Some("flight training".into()),
            ..CardFilter::default()
        };
        let rows = list_cards(&conn, &active_training).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "A");
    }

    #[test]
    fn test_card_expenses_show_linked_portion() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        let e = expense(&conn, 250.0);
        link_expense(&conn, e.id, card.id, 100.0).unwrap();
        let rows = card_expenses(&conn, card.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].expense.amount, 250.0);
        assert_eq!(rows[0].link.amount, 100.0);
        assert_eq!(rows[0].link.budget_card_id, card.id);
    }

    #[test]
    fn test_card_cost_uses_aircraft_rate() {
        let (_dir, conn) = test_db();
        let rate = RateConfig::Dry {
            hourly_rate: 150.0,
            fuel_burn_rate: 8.0,
            fuel_price_per_gallon: 5.0,
        };
        let plane = add_aircraft(&conn, crate::aircraft::sample("N172SP", rate)).unwrap();
        let mut new = NewCard::new("Dual lessons", "Flight Training", "2025-04-01", 100.0);
        new.aircraft_id = Some(plane.id);
        new.associated_hours = Some(10.0);
        let card = create_card(&conn, new).unwrap();

        let cost = calculate_card_cost(&conn, card.id, Some(10.0)).unwrap();
        assert!((cost.breakdown.total - 2090.0).abs() < 1e-9);
        assert_eq!(get_card(&conn, card.id).unwrap().budgeted_amount, 100.0);

        let (updated, _) = apply_calculated_cost(&conn, card.id, Some(10.0)).unwrap();
        assert_eq!(updated.budgeted_amount, 2090.0);
    }

    #[test]
    fn test_card_cost_needs_aircraft_and_hours() {
        let (_dir, conn) = test_db();
        let card = new_card(&conn, "Lessons", 1000.0);
        assert!(calculate_card_cost(&conn, card.id, None).is_err());

        let plane = add_aircraft(
            &conn,
            crate::aircraft::sample("N172SP", RateConfig::Wet { hourly_rate: 165.0 }),
        )
        .unwrap();
        let mut new = NewCard::new("Lessons", "Flight Training", "2025-04-01", 100.0);
        new.aircraft_id = Some(plane.id);
        new.associated_hours = Some(2.0);
        new.hourly_rate_type = Some(RateType::Dry);
        let mismatched = create_card(&conn, new).unwrap();
        assert!(calculate_card_cost(&conn, mismatched.id, None).is_err());
    }
}
