use std::fs::File;
use std::path::PathBuf;

use crate::cli::{open_db, ExportCommands};
use crate::error::Result;
use crate::export::{write_aircraft_csv, write_cards_csv, write_expenses_csv};
use crate::settings::get_data_dir;

fn default_path(name: &str, ext: &str) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d").to_string();
    get_data_dir().join("exports").join(format!("{name}-{date}.{ext}"))
}

fn create(output: Option<String>, name: &str, ext: &str) -> Result<(PathBuf, File)> {
    let path = output.map(PathBuf::from).unwrap_or_else(|| default_path(name, ext));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    Ok((path, file))
}

#[cfg(feature = "pdf")]
fn write_pdf(bytes: &[u8], path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn dispatch(command: ExportCommands) -> Result<()> {
    let conn = open_db()?;
    match command {
        ExportCommands::Cards { output } => {
            let (path, file) = create(output, "budget-cards", "csv")?;
            let rows = write_cards_csv(&conn, file)?;
            println!("Wrote {rows} card(s) to {}", path.display());
        }
        ExportCommands::Expenses {
            from_date,
            to_date,
            output,
        } => {
            let (path, file) = create(output, "expenses", "csv")?;
            let rows = write_expenses_csv(&conn, from_date.as_deref(), to_date.as_deref(), file)?;
            println!("Wrote {rows} expense(s) to {}", path.display());
        }
        ExportCommands::Aircraft { output } => {
            let (path, file) = create(output, "aircraft", "csv")?;
            let rows = write_aircraft_csv(&conn, file)?;
            println!("Wrote {rows} aircraft to {}", path.display());
        }
        #[cfg(feature = "pdf")]
        ExportCommands::PdfAnnual { year, output } => {
            use chrono::Datelike;
            let year = year.unwrap_or_else(|| chrono::Local::now().year());
            let summary = crate::reports::annual_summary(&conn, year)?;
            let bytes = crate::pdf::render_annual(&summary)?;
            let path = output
                .map(PathBuf::from)
                .unwrap_or_else(|| default_path(&format!("annual-budget-{year}"), "pdf"));
            write_pdf(&bytes, &path)?;
        }
        #[cfg(feature = "pdf")]
        ExportCommands::PdfProgress { cert, output } => {
            let certification = crate::cli::resolve_certification(cert)?;
            let snapshot = crate::hours::current_snapshot(&conn)?;
            let progress = crate::progress::report(&snapshot, certification);
            let settings = crate::settings::load_settings();
            // The timeline section is optional; without a cadence the PDF shows progress only.
            let timeline = match crate::cli::progress::resolve_cadence(&conn, &settings, None, None) {
                Ok(cadence) => Some(crate::timeline::estimate(
                    &snapshot,
                    certification.key_requirement(),
                    cadence,
                )),
                Err(e) => {
                    tracing::debug!(error = %e, "no training cadence, skipping timeline");
                    None
                }
            };
            let bytes = crate::pdf::render_progress(&progress, timeline.as_ref())?;
            let path = output
                .map(PathBuf::from)
                .unwrap_or_else(|| default_path(&format!("progress-{certification}"), "pdf"));
            write_pdf(&bytes, &path)?;
        }
    }
    Ok(())
}
