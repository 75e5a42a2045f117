use serde::Serialize;

use crate::hours::HoursSnapshot;
use crate::requirements::{Certification, Requirement, Unit};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementProgress {
    pub label: &'static str,
    pub unit: Unit,
    pub required: f64,
    pub current: f64,
    pub percent: f64,
    pub remaining: f64,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub certification: Certification,
    pub rows: Vec<RequirementProgress>,
    pub completed: usize,
    pub total: usize,
    pub overall_percent: f64,
}

pub fn evaluate(snapshot: &HoursSnapshot, requirement: &Requirement) -> RequirementProgress {
    let current = requirement.source.resolve(snapshot);
    let required = requirement.required;

    let (percent, remaining) = if required <= 0.0 {
        (100.0, 0.0)
    } else {
        let remaining = (required - current).max(0.0);
        let percent = if remaining == 0.0 {
            100.0
        } else {
            (current / required * 100.0).clamp(0.0, 100.0)
        };
        (percent, remaining)
    };

    RequirementProgress {
        label: requirement.label,
        unit: requirement.unit,
        required,
        current,
        percent,
        remaining,
        complete: remaining == 0.0,
    }
}

pub fn calculate(snapshot: &HoursSnapshot, requirements: &[Requirement]) -> Vec<RequirementProgress> {
    requirements.iter().map(|r| evaluate(snapshot, r)).collect()
}

pub fn report(snapshot: &HoursSnapshot, certification: Certification) -> ProgressReport {
    let rows = calculate(snapshot, certification.requirements());
    let completed = rows.iter().filter(|r| r.complete).count();
    let total = rows.len();
    let overall_percent = if total == 0 {
        100.0
    } else {
        rows.iter().map(|r| r.percent).sum::<f64>() / total as f64
    };
    ProgressReport {
        certification,
        rows,
        completed,
        total,
        overall_percent,
    }
}
