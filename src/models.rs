use serde::Serialize;

use crate::cost::{RateConfig, RateType};
use crate::error::{Result, TrueHourError};

/// Declares a lowercase text-backed enum that parses from user input, prints
/// as its canonical text and round-trips through SQLite TEXT columns.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::TrueHourError;

            fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err($crate::error::TrueHourError::Validation(format!(
                        "unknown {} '{}' (expected one of: {})",
                        $label,
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: $crate::error::TrueHourError| {
                        rusqlite::types::FromSqlError::Other(Box::new(e))
                    })
            }
        }
    };
}

pub(crate) use text_enum;

text_enum!(
    /// Lifecycle flag on a budget card. Any status may be set from any other.
    CardStatus, "status" {
        Active => "active",
        Inactive => "inactive" | "paused",
        Completed => "completed" | "done",
    }
);

text_enum!(
    Frequency, "frequency" {
        Once => "once",
        Monthly => "monthly",
        Annual => "annual" | "yearly",
    }
);

text_enum!(
    RecurrenceInterval, "recurrence interval" {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Annual => "annual" | "yearly",
    }
);

text_enum!(
    AircraftCategory, "aircraft category" {
        Owned => "owned",
        Club => "club",
        Rental => "rental",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetCard {
    pub id: i64,
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
    /// Sum of every link amount pointing at this card, derived on read.
    pub actual_amount: f64,
}

impl BudgetCard {
    pub fn remaining_amount(&self) -> f64 {
        round_cents(self.budgeted_amount - self.actual_amount)
    }

    pub fn is_over_budget(&self) -> bool {
        cents(self.actual_amount) > cents(self.budgeted_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
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
}

/// Allocation of part of one expense to one budget card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseLink {
    pub id: i64,
    pub expense_id: i64,
    pub budget_card_id: i64,
    pub amount: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aircraft {
    pub id: i64,
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
    pub is_active: bool,
}

impl Aircraft {
    pub fn label(&self) -> String {
        match (&self.make, &self.model) {
            (Some(make), Some(model)) => format!("{} ({make} {model})", self.tail_number),
            (None, Some(model)) => format!("{} ({model})", self.tail_number),
            _ => self.tail_number.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Input validation helpers
// ---------------------------------------------------------------------------

/// Accepts YYYY-MM-DD or MM/DD/YYYY and returns the ISO form.
pub fn parse_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| TrueHourError::validation(format!("invalid date '{raw}' (use YYYY-MM-DD)")))
}

/// Accepts YYYY-MM and returns (year, month).
pub fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let parts: Vec<&str> = raw.trim().split('-').collect();
    if parts.len() == 2 {
        if let (Ok(y), Ok(m)) = (parts[0].parse::<i32>(), parts[1].parse::<u32>()) {
            if (1..=12).contains(&m) {
                return Ok((y, m));
            }
        }
    }
    Err(TrueHourError::validation(format!("invalid month '{raw}' (use YYYY-MM)")))
}

pub fn require_text(label: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrueHourError::validation(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Blank optional text collapses to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn require_positive_amount(label: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || cents(value) <= 0 {
        return Err(TrueHourError::validation(format!(
            "{label} must be greater than zero"
        )));
    }
    Ok(round_cents(value))
}

pub fn require_non_negative(label: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(TrueHourError::validation(format!(
            "{label} must be zero or greater"
        )));
    }
    Ok(value)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whole cents, for exact comparisons between dollar amounts.
pub fn cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_status_parses_aliases() {
        assert_eq!("Active".parse::<CardStatus>().unwrap(), CardStatus::Active);
        assert_eq!("paused".parse::<CardStatus>().unwrap(), CardStatus::Inactive);
        assert_eq!(" completed ".parse::<CardStatus>().unwrap(), CardStatus::Completed);
    }

    #[test]
    fn test_unknown_variant_lists_choices() {
        let err = "weekly".parse::<Frequency>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("once, monthly, annual"), "unexpected: {msg}");
    }

    #[test]
    fn test_text_enum_serializes_lowercase() {
        let json = serde_json::to_string(&CardStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2025-03-09").unwrap(), "2025-03-09");
        assert_eq!(parse_date("3/9/2025").unwrap(), "2025-03-09");
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-07").unwrap(), (2025, 7));
        assert!(parse_month("2025-00").is_err());
        assert!(parse_month("July").is_err());
    }

    #[test]
    fn test_positive_amount_rounds_to_cents() {
        assert_eq!(require_positive_amount("amount", 12.345).unwrap(), 12.35);
        assert!(require_positive_amount("amount", 0.0).is_err());
        assert!(require_positive_amount("amount", 0.004).is_err());
        assert!(require_positive_amount("amount", f64::NAN).is_err());
    }

    #[test]
    fn test_cents_absorbs_float_noise() {
        assert_eq!(cents(0.1 + 0.2), 30);
        assert_eq!(cents(100.10 - 50.05), 5005);
    }

    #[test]
    fn test_remaining_and_over_budget() {
        let card = BudgetCard {
            id: 1,
            name: "Checkride".into(),
            category: "Exams & Checkrides".into(),
            frequency: Frequency::Once,
            when_date: "2025-06-01".into(),
            budgeted_amount: 800.0,
            status: CardStatus::Active,
            tags: vec![],
            notes: None,
            aircraft_id: None,
            hourly_rate_type: None,
            associated_hours: None,
            actual_amount: 850.0,
        };
        assert_eq!(card.remaining_amount(), -50.0);
        assert!(card.is_over_budget());
    }
}
