use comfy_table::{Cell, Table};

use crate::aircraft::get_aircraft;
use crate::cli::{open_db, SettingsCommands};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, Settings};

pub fn dispatch(command: SettingsCommands) -> Result<()> {
    match command {
        SettingsCommands::Show => {
            println!("{}", format_settings(&load_settings()));
            Ok(())
        }
        SettingsCommands::Set { key, value } => set(&key, &value),
    }
}

fn set(key: &str, value: &str) -> Result<()> {
    let mut settings = load_settings();
    settings.set_value(key, value)?;
    if key == "default_aircraft_id" {
        if let Some(id) = settings.default_aircraft_id {
            let conn = open_db()?;
            get_aircraft(&conn, id)?;
        }
    }
    save_settings(&settings)?;
    tracing::info!(key, "setting changed");
    println!("{key} = {}", display_value(&settings, key));
    Ok(())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "(not set)".to_string())
}

fn display_value(settings: &Settings, key: &str) -> String {
    match key {
        "data_dir" => settings.data_dir.clone(),
        "target_certification" => opt(settings.target_certification),
        "budget_buffer_percentage" => format!("{}%", settings.budget_buffer_percentage),
        "default_aircraft_id" => opt(settings.default_aircraft_id),
        "budget_categories" => settings.budget_categories.join(", "),
        "training_hours_per_month" => opt(settings.training_hours_per_month),
        "training_cost_per_hour" => opt(settings.training_cost_per_hour),
        _ => String::new(),
    }
}

pub fn format_settings(settings: &Settings) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);
    for key in crate::settings::KEYS {
        table.add_row(vec![Cell::new(key), Cell::new(display_value(settings, key))]);
    }
    format!("Settings\n{table}")
}
