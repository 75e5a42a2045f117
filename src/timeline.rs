use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::error::{Result, TrueHourError};
use crate::hours::HoursSnapshot;
use crate::requirements::Requirement;

/// Assumed flying pace used to project time and money to completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingCadence {
    pub hours_per_month: f64,
    pub cost_per_hour: f64,
}

impl TrainingCadence {
    pub fn new(hours_per_month: f64, cost_per_hour: f64) -> Result<Self> {
        if !hours_per_month.is_finite() || hours_per_month <= 0.0 {
            return Err(TrueHourError::validation(
                "training hours per month must be greater than zero",
            ));
        }
        if !cost_per_hour.is_finite() || cost_per_hour < 0.0 {
            return Err(TrueHourError::validation(
                "training cost per hour must be zero or greater",
            ));
        }
        Ok(Self {
            hours_per_month,
            cost_per_hour,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEstimate {
    pub label: &'static str,
    pub required: f64,
    pub current: f64,
    pub remaining_hours: f64,
    pub months_to_completion: u32,
    pub estimated_budget: f64,
    pub monthly_budget: f64,
    pub cadence: TrainingCadence,
}

impl TimelineEstimate {
    /// First day of the month in which training should wrap up, counting
    /// `from` as month zero.
    pub fn projected_completion(&self, from: NaiveDate) -> Option<NaiveDate> {
        let start = from.with_day(1)?;
        start.checked_add_months(Months::new(self.months_to_completion))
    }
}

pub fn estimate(
    snapshot: &HoursSnapshot,
    key: &Requirement,
    cadence: TrainingCadence,
) -> TimelineEstimate {
    let current = key.source.resolve(snapshot);
    let remaining_hours = (key.required - current).max(0.0);
    let months_to_completion = (remaining_hours / cadence.hours_per_month).ceil() as u32;
    let estimated_budget = remaining_hours * cadence.cost_per_hour;
    let monthly_budget = if months_to_completion == 0 {
        0.0
    } else {
        estimated_budget / months_to_completion as f64
    };

    TimelineEstimate {
        label: key.label,
        required: key.required,
        current,
        remaining_hours,
        months_to_completion,
        estimated_budget,
        monthly_budget,
        cadence,
    }
}
