use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::db::DB_FILE;
use crate::error::{Result, TrueHourError};
use crate::requirements::Certification;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub target_certification: Option<Certification>,
    #[serde(default = "default_buffer")]
    pub budget_buffer_percentage: f64,
    #[serde(default)]
    pub default_aircraft_id: Option<i64>,
    #[serde(default = "default_categories")]
    pub budget_categories: Vec<String>,
    #[serde(default)]
    pub training_hours_per_month: Option<f64>,
    #[serde(default)]
    pub training_cost_per_hour: Option<f64>,
}

pub const KEYS: &[&str] = &[
    "data_dir",
    "target_certification",
    "budget_buffer_percentage",
    "default_aircraft_id",
    "budget_categories",
    "training_hours_per_month",
    "training_cost_per_hour",
];

fn default_buffer() -> f64 {
    10.0
}

fn default_categories() -> Vec<String> {
    [
        "Flight Training",
        "Aircraft Rental",
        "Ground School",
        "Exams & Checkrides",
        "Medical",
        "Fuel",
        "Insurance",
        "Maintenance",
        "Equipment",
        "Memberships",
        "Other",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            target_certification: None,
            budget_buffer_percentage: default_buffer(),
            default_aircraft_id: None,
            budget_categories: default_categories(),
            training_hours_per_month: None,
            training_cost_per_hour: None,
        }
    }
}

fn is_clear(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "" | "none" | "unset")
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| TrueHourError::Settings(format!("{key} must be a number, got '{value}'")))
}

impl Settings {
    /// Updates one key from its textual form. `none` clears optional keys.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => {
                if is_clear(value) {
                    return Err(TrueHourError::Settings("data_dir cannot be empty".into()));
                }
                self.data_dir = shellexpand_path(value.trim());
            }
            "target_certification" => {
                self.target_certification = if is_clear(value) {
                    None
                } else {
                    Some(value.parse()?)
                };
            }
            "budget_buffer_percentage" => {
                let n = parse_number(key, value)?;
                if !(0.0..=100.0).contains(&n) {
                    return Err(TrueHourError::Settings(
                        "budget_buffer_percentage must be between 0 and 100".into(),
                    ));
                }
                self.budget_buffer_percentage = n;
            }
            "default_aircraft_id" => {
                self.default_aircraft_id = if is_clear(value) {
                    None
                } else {
                    let id = value.trim().parse::<i64>().map_err(|_| {
                        TrueHourError::Settings(format!("default_aircraft_id must be an id, got '{value}'"))
                    })?;
                    Some(id)
                };
            }
            "budget_categories" => {
                let categories: Vec<String> = value
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                self.budget_categories = if categories.is_empty() {
                    default_categories()
                } else {
                    categories
                };
            }
            "training_hours_per_month" | "training_cost_per_hour" => {
                let parsed = if is_clear(value) {
                    None
                } else {
                    let n = parse_number(key, value)?;
                    let valid = if key == "training_hours_per_month" { n > 0.0 } else { n >= 0.0 };
                    if !valid {
                        return Err(TrueHourError::Settings(format!("{key} is out of range")));
                    }
                    Some(n)
                };
                if key == "training_hours_per_month" {
                    self.training_hours_per_month = parsed;
                } else {
                    self.training_cost_per_hour = parsed;
                }
            }
            other => {
                return Err(TrueHourError::Settings(format!(
                    "unknown setting '{other}' (expected one of: {})",
                    KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("truehour")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("truehour")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TrueHourError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "target_certification": "instrument"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.target_certification, Some(Certification::Instrument));
        assert_eq!(s.budget_buffer_percentage, 10.0);
        assert!(s.budget_categories.contains(&"Flight Training".to_string()));
        assert_eq!(s.training_hours_per_month, None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.data_dir = "/tmp/test".into();
        settings.training_hours_per_month = Some(6.0);
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded: Settings = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_set_value_validates() {
        let mut s = Settings::default();
        s.set_value("budget_buffer_percentage", "15").unwrap();
        assert_eq!(s.budget_buffer_percentage, 15.0);
        assert!(s.set_value("budget_buffer_percentage", "150").is_err());
        assert!(s.set_value("budget_buffer_percentage", "lots").is_err());

        s.set_value("target_certification", "cpl").unwrap();
        assert_eq!(s.target_certification, Some(Certification::Commercial));
        assert!(s.set_value("target_certification", "atp").is_err());
        s.set_value("target_certification", "none").unwrap();
        assert_eq!(s.target_certification, None);

        assert!(s.set_value("training_hours_per_month", "0").is_err());
        s.set_value("training_hours_per_month", "6.5").unwrap();
        assert_eq!(s.training_hours_per_month, Some(6.5));
        s.set_value("training_cost_per_hour", "0").unwrap();
        assert_eq!(s.training_cost_per_hour, Some(0.0));

        assert!(s.set_value("favorite_color", "blue").is_err());
    }

    #[test]
    fn test_set_categories_from_list() {
        let mut s = Settings::default();
        s.set_value("budget_categories", "Fuel, Rental , ,Headset").unwrap();
        assert_eq!(s.budget_categories, vec!["Fuel", "Rental", "Headset"]);
        s.set_value("budget_categories", "").unwrap();
        assert_eq!(s.budget_categories, default_categories());
    }

    #[test]
    fn test_db_path_under_data_dir() {
        let mut s = Settings::default();
        s.data_dir = "/tmp/th".into();
        assert_eq!(s.db_path(), PathBuf::from("/tmp/th/truehour.db"));
    }
}
