use serde::{Deserialize, Serialize};

use crate::error::{Result, TrueHourError};
use crate::models::text_enum;

text_enum!(
    RateType, "rate type" {
        Wet => "wet",
        Dry => "dry",
        Owned => "owned",
    }
);

/// How an aircraft is billed per hour. Only the selected variant's fields exist,
/// so a "dry" aircraft can never carry a stale wet rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rate_type", rename_all = "lowercase")]
pub enum RateConfig {
    Wet {
        hourly_rate: f64,
    },
    Dry {
        hourly_rate: f64,
        fuel_burn_rate: f64,
        fuel_price_per_gallon: f64,
    },
    Owned {
        operating_cost_per_hour: f64,
        fuel_burn_rate: f64,
        fuel_price_per_gallon: f64,
    },
}

/// Loose rate columns as stored in SQLite or typed on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateFields {
    pub hourly_rate_wet: Option<f64>,
    pub hourly_rate_dry: Option<f64>,
    pub operating_cost_per_hour: Option<f64>,
    pub fuel_burn_rate: Option<f64>,
    pub fuel_price_per_gallon: Option<f64>,
}

impl RateFields {
    /// Fields present in `patch` win over `self`.
    pub fn merged(&self, patch: &RateFields) -> RateFields {
        RateFields {
            hourly_rate_wet: patch.hourly_rate_wet.or(self.hourly_rate_wet),
            hourly_rate_dry: patch.hourly_rate_dry.or(self.hourly_rate_dry),
            operating_cost_per_hour: patch.operating_cost_per_hour.or(self.operating_cost_per_hour),
            fuel_burn_rate: patch.fuel_burn_rate.or(self.fuel_burn_rate),
            fuel_price_per_gallon: patch.fuel_price_per_gallon.or(self.fuel_price_per_gallon),
        }
    }
}

fn required_field(rate_type: RateType, name: &str, value: Option<f64>) -> Result<f64> {
    let value = value.ok_or_else(|| {
        TrueHourError::validation(format!("{rate_type} rate requires {name}"))
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(TrueHourError::validation(format!(
            "{name} must be zero or greater"
        )));
    }
    Ok(value)
}

impl RateConfig {
    /// Builds the rate for `rate_type`, failing if any of its fields is missing.
    /// Fields belonging to other rate types are ignored.
    pub fn from_fields(rate_type: RateType, fields: &RateFields) -> Result<Self> {
        let rate = match rate_type {
            RateType::Wet => RateConfig::Wet {
                hourly_rate: required_field(rate_type, "hourly_rate_wet", fields.hourly_rate_wet)?,
            },
            RateType::Dry => RateConfig::Dry {
                hourly_rate: required_field(rate_type, "hourly_rate_dry", fields.hourly_rate_dry)?,
                fuel_burn_rate: required_field(rate_type, "fuel_burn_rate", fields.fuel_burn_rate)?,
                fuel_price_per_gallon: required_field(
                    rate_type,
                    "fuel_price_per_gallon",
                    fields.fuel_price_per_gallon,
                )?,
            },
            RateType::Owned => RateConfig::Owned {
                operating_cost_per_hour: required_field(
                    rate_type,
                    "operating_cost_per_hour",
                    fields.operating_cost_per_hour,
                )?,
                fuel_burn_rate: required_field(rate_type, "fuel_burn_rate", fields.fuel_burn_rate)?,
                fuel_price_per_gallon: required_field(
                    rate_type,
                    "fuel_price_per_gallon",
                    fields.fuel_price_per_gallon,
                )?,
            },
        };
        Ok(rate)
    }

    pub fn to_fields(&self) -> RateFields {
        match *self {
            RateConfig::Wet { hourly_rate } => RateFields {
                hourly_rate_wet: Some(hourly_rate),
                ..RateFields::default()
            },
            RateConfig::Dry {
                hourly_rate,
                fuel_burn_rate,
                fuel_price_per_gallon,
            } => RateFields {
                hourly_rate_dry: Some(hourly_rate),
                fuel_burn_rate: Some(fuel_burn_rate),
                fuel_price_per_gallon: Some(fuel_price_per_gallon),
                ..RateFields::default()
            },
            RateConfig::Owned {
                operating_cost_per_hour,
                fuel_burn_rate,
                fuel_price_per_gallon,
            } => RateFields {
                operating_cost_per_hour: Some(operating_cost_per_hour),
                fuel_burn_rate: Some(fuel_burn_rate),
                fuel_price_per_gallon: Some(fuel_price_per_gallon),
                ..RateFields::default()
            },
        }
    }

    pub fn rate_type(&self) -> RateType {
        match self {
            RateConfig::Wet { .. } => RateType::Wet,
            RateConfig::Dry { .. } => RateType::Dry,
            RateConfig::Owned { .. } => RateType::Owned,
        }
    }

    /// Dollars per flight hour, fuel included.
    pub fn hourly_cost(&self) -> f64 {
        match *self {
            RateConfig::Wet { hourly_rate } => hourly_rate,
            RateConfig::Dry {
                hourly_rate,
                fuel_burn_rate,
                fuel_price_per_gallon,
            } => hourly_rate + fuel_burn_rate * fuel_price_per_gallon,
            RateConfig::Owned {
                operating_cost_per_hour,
                fuel_burn_rate,
                fuel_price_per_gallon,
            } => operating_cost_per_hour + fuel_burn_rate * fuel_price_per_gallon,
        }
    }

    /// Re-checks a config that may have been built directly rather than via
    /// `from_fields`.
    pub fn validate(&self) -> Result<()> {
        RateConfig::from_fields(self.rate_type(), &self.to_fields()).map(|_| ())
    }

    fn total_for(&self, hours: f64) -> f64 {
        self.hourly_cost() * hours
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub rate_type: RateType,
    pub hourly_cost: f64,
    pub hours: f64,
    pub buffer_percent: Option<f64>,
    pub effective_hours: f64,
    pub total: f64,
}

/// Cost of flying `hours` on `rate`. A buffer inflates the hours before any
/// rate is applied, never the resulting dollar total.
pub fn calculate_cost(rate: &RateConfig, hours: f64, buffer_percent: Option<f64>) -> Result<CostBreakdown> {
    rate.validate()?;
    if !hours.is_finite() || hours < 0.0 {
        return Err(TrueHourError::validation("hours must be zero or greater"));
    }
    let effective_hours = match buffer_percent {
        Some(buffer) => {
            if !buffer.is_finite() || buffer < 0.0 {
                return Err(TrueHourError::validation(
                    "buffer percentage must be zero or greater",
                ));
            }
            hours * (100.0 + buffer) / 100.0
        }
        None => hours,
    };

    Ok(CostBreakdown {
        rate_type: rate.rate_type(),
        hourly_cost: rate.hourly_cost(),
        hours,
        buffer_percent,
        effective_hours,
        total: rate.total_for(effective_hours),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_wet_rate() {
        let rate = RateConfig::Wet { hourly_rate: 165.0 };
        let cost = calculate_cost(&rate, 2.5, None).unwrap();
        assert!(close(cost.total, 412.5));
        assert_eq!(cost.rate_type, RateType::Wet);
    }

    #[test]
    fn test_dry_rate_adds_fuel() {
        let rate = RateConfig::Dry {
            hourly_rate: 150.0,
            fuel_burn_rate: 8.0,
            fuel_price_per_gallon: 5.0,
        };
        let cost = calculate_cost(&rate, 10.0, None).unwrap();
        assert!(close(cost.hourly_cost, 190.0));
        assert!(close(cost.total, 1900.0));
    }

    #[test]
    fn test_owned_rate_adds_fuel() {
        let rate = RateConfig::Owned {
            operating_cost_per_hour: 60.0,
            fuel_burn_rate: 9.0,
            fuel_price_per_gallon: 6.0,
        };
        let cost = calculate_cost(&rate, 3.0, None).unwrap();
        assert!(close(cost.total, (60.0 + 54.0) * 3.0));
    }

    #[test]
    fn test_buffer_inflates_hours_not_total() {
        let rate = RateConfig::Dry {
            hourly_rate: 150.0,
            fuel_burn_rate: 8.0,
            fuel_price_per_gallon: 5.0,
        };
        let cost = calculate_cost(&rate, 10.0, Some(10.0)).unwrap();
        assert!(close(cost.effective_hours, 11.0));
        assert!(close(cost.total, 2090.0));
        assert_eq!(cost.hours, 10.0);
        assert_eq!(cost.buffer_percent, Some(10.0));
    }

    #[test]
    fn test_zero_buffer_matches_no_buffer() {
        let rate = RateConfig::Wet { hourly_rate: 140.0 };
        let with = calculate_cost(&rate, 4.0, Some(0.0)).unwrap();
        let without = calculate_cost(&rate, 4.0, None).unwrap();
        assert!(close(with.total, without.total));
    }

    #[test]
    fn test_rejects_negative_inputs() {
        let rate = RateConfig::Wet { hourly_rate: 140.0 };
        assert!(calculate_cost(&rate, -1.0, None).is_err());
        assert!(calculate_cost(&rate, 1.0, Some(-5.0)).is_err());
        let bad = RateConfig::Wet { hourly_rate: -1.0 };
        assert!(calculate_cost(&bad, 1.0, None).is_err());
    }

    #[test]
    fn test_from_fields_requires_selected_type_fields() {
        let fields = RateFields {
            hourly_rate_dry: Some(120.0),
            fuel_burn_rate: Some(8.5),
            ..RateFields::default()
        };
        let err = RateConfig::from_fields(RateType::Dry, &fields).unwrap_err();
        assert!(err.to_string().contains("fuel_price_per_gallon"), "unexpected: {err}");
        assert!(RateConfig::from_fields(RateType::Wet, &fields).is_err());
    }

    #[test]
    fn test_from_fields_ignores_other_types() {
        let fields = RateFields {
            hourly_rate_wet: Some(180.0),
            hourly_rate_dry: Some(120.0),
            fuel_burn_rate: Some(8.0),
            fuel_price_per_gallon: Some(6.0),
            ..RateFields::default()
        };
        let rate = RateConfig::from_fields(RateType::Wet, &fields).unwrap();
        assert_eq!(rate, RateConfig::Wet { hourly_rate: 180.0 });
        assert_eq!(rate.to_fields().hourly_rate_dry, None);
    }

    #[test]
    fn test_merged_prefers_patch() {
        let base = RateFields {
            hourly_rate_dry: Some(120.0),
            fuel_burn_rate: Some(8.0),
            fuel_price_per_gallon: Some(6.0),
            ..RateFields::default()
        };
        let patch = RateFields {
            fuel_price_per_gallon: Some(6.5),
            ..RateFields::default()
        };
        let merged = base.merged(&patch);
        assert_eq!(merged.fuel_price_per_gallon, Some(6.5));
        assert_eq!(merged.hourly_rate_dry, Some(120.0));
    }

    #[test]
    fn test_serializes_with_rate_type_tag() {
        let rate = RateConfig::Wet { hourly_rate: 150.0 };
        let json = serde_json::to_value(rate).unwrap();
        assert_eq!(json["rate_type"], "wet");
        assert_eq!(json["hourly_rate"], 150.0);
    }
}
