use rusqlite::Connection;
use serde::Serialize;

use crate::cards::{list_cards, CardFilter};
use crate::error::Result;
use crate::models::{round_cents, BudgetCard, CardStatus};

// Every summary covers active cards only; paused and completed cards drop out
// of the plan totals.

const CARD_TOTALS: &str = "
    FROM budget_cards c
    LEFT JOIN (
        SELECT budget_card_id, SUM(amount) AS actual
        FROM expense_budget_links
        GROUP BY budget_card_id
    ) l ON l.budget_card_id = c.id
    WHERE c.status = 'active' AND (?1 IS NULL OR substr(c.when_date, 1, 4) = ?1)";

// ---------------------------------------------------------------------------
// Monthly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    /// YYYY-MM
    pub month: String,
    pub budgeted: f64,
    pub actual: f64,
    pub remaining: f64,
}

pub fn monthly_summary(conn: &Connection, year: Option<i32>) -> Result<Vec<MonthSummary>> {
    let sql = format!(
        "SELECT substr(c.when_date, 1, 7) AS month,
                SUM(c.budgeted_amount),
                SUM(COALESCE(l.actual, 0))
         {CARD_TOTALS}
         GROUP BY month ORDER BY month"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([year.map(|y| format!("{y:04}"))], |row| {
            let budgeted: f64 = row.get(1)?;
            let actual: f64 = row.get(2)?;
            Ok(MonthSummary {
                month: row.get(0)?,
                budgeted: round_cents(budgeted),
                actual: round_cents(actual),
                remaining: round_cents(budgeted - actual),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub budgeted: f64,
    pub actual: f64,
    pub remaining: f64,
    pub card_count: i64,
}

pub fn category_summary(conn: &Connection, year: Option<i32>) -> Result<Vec<CategorySummary>> {
    let sql = format!(
        "SELECT c.category,
                SUM(c.budgeted_amount) AS budgeted,
                SUM(COALESCE(l.actual, 0)),
                COUNT(c.id)
         {CARD_TOTALS}
         GROUP BY c.category ORDER BY budgeted DESC, c.category"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([year.map(|y| format!("{y:04}"))], |row| {
            let budgeted: f64 = row.get(1)?;
            let actual: f64 = row.get(2)?;
            Ok(CategorySummary {
                category: row.get(0)?,
                budgeted: round_cents(budgeted),
                actual: round_cents(actual),
                remaining: round_cents(budgeted - actual),
                card_count: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Annual
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthDetail {
    pub summary: MonthSummary,
    pub cards: Vec<BudgetCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub total_budgeted: f64,
    pub total_actual: f64,
    pub total_remaining: f64,
    pub by_month: Vec<MonthDetail>,
    pub by_category: Vec<CategorySummary>,
}

pub fn annual_summary(conn: &Connection, year: i32) -> Result<AnnualSummary> {
    let monthly = monthly_summary(conn, Some(year))?;
    let by_category = category_summary(conn, Some(year))?;

    let total_budgeted = round_cents(monthly.iter().map(|m| m.budgeted).sum());
    let total_actual = round_cents(monthly.iter().map(|m| m.actual).sum());

    let mut by_month = Vec::with_capacity(monthly.len());
    for summary in monthly {
        let month = crate::models::parse_month(&summary.month)?;
        let cards = list_cards(
            conn,
            &CardFilter {
                status: Some(CardStatus::Active),
                month: Some(month),
                ..CardFilter::default()
            },
        )?;
        by_month.push(MonthDetail { summary, cards });
    }

    Ok(AnnualSummary {
        year,
        total_budgeted,
        total_actual,
        total_remaining: round_cents(total_budgeted - total_actual),
        by_month,
        by_category,
    })
}
