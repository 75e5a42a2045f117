pub mod aircraft;
pub mod backup;
pub mod cards;
pub mod cost;
pub mod expenses;
pub mod export;
pub mod flights;
pub mod hours;
pub mod init;
pub mod progress;
pub mod report;
pub mod settings;
pub mod status;

use std::str::FromStr;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db, DB_FILE};
use crate::error::{Result, TrueHourError};
use crate::requirements::Certification;
use crate::settings::{get_data_dir, load_settings};

/// Opens the configured database, refusing to create one implicitly.
/// Tables added since the database was created are filled in on open.
pub(crate) fn open_db() -> Result<Connection> {
    let db_path = get_data_dir().join(DB_FILE);
    if !db_path.exists() {
        return Err(TrueHourError::Settings(format!(
            "No database found at {}\nRun `truehour init` to create one.",
            db_path.display()
        )));
    }
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

pub(crate) fn parse_opt<T>(raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr<Err = TrueHourError>,
{
    raw.map(|r| r.parse()).transpose()
}

fn is_clear(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "" | "none")
}

/// Edit flag for an optional text column: absent leaves it, `none` clears it.
pub(crate) fn clearable(raw: Option<String>) -> Option<Option<String>> {
    raw.map(|r| if is_clear(&r) { None } else { Some(r) })
}

/// Like `clearable`, but the value is parsed.
pub(crate) fn clearable_parsed<T>(raw: Option<String>) -> Result<Option<Option<T>>>
where
    T: FromStr<Err = TrueHourError>,
{
    match raw {
        None => Ok(None),
        Some(r) if is_clear(&r) => Ok(Some(None)),
        Some(r) => Ok(Some(Some(r.parse()?))),
    }
}

pub(crate) fn parse_id(label: &'static str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| TrueHourError::validation(format!("{label} must be a numeric id, got '{raw}'")))
}

pub(crate) fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// The `--cert` flag, falling back to the configured target.
pub(crate) fn resolve_certification(cert: Option<String>) -> Result<Certification> {
    match cert {
        Some(c) => c.parse(),
        None => load_settings().target_certification.ok_or_else(|| {
            TrueHourError::validation(
                "no certification given; pass --cert or run `truehour settings set target_certification <cert>`",
            )
        }),
    }
}

#[derive(Parser)]
#[command(
    name = "truehour",
    version,
    about = "Flight-training budget, expense and certification-progress tracker."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for TrueHour data (default: ~/Documents/truehour)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Show the data directory, database and record counts.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/truehour-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// Plan training spend with budget cards.
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// Log and review expenses.
    Expenses {
        #[command(subcommand)]
        command: ExpensesCommands,
    },
    /// Manage aircraft and their rates.
    Aircraft {
        #[command(subcommand)]
        command: AircraftCommands,
    },
    /// Log flights and review logbook totals.
    Flights {
        #[command(subcommand)]
        command: FlightsCommands,
    },
    /// Import or enter logbook hour totals.
    Hours {
        #[command(subcommand)]
        command: HoursCommands,
    },
    /// Show progress toward a certification's requirements.
    Progress {
        /// private, instrument or commercial (default: settings target)
        #[arg(long)]
        cert: Option<String>,
    },
    /// Project months and money to finish a certification.
    Timeline {
        #[arg(long)]
        cert: Option<String>,
        /// Flight hours flown per month
        #[arg(long = "hours-per-month")]
        hours_per_month: Option<f64>,
        /// Cost per flight hour
        #[arg(long = "cost-per-hour")]
        cost_per_hour: Option<f64>,
    },
    /// Price flight hours on an aircraft or an ad-hoc rate.
    Cost {
        /// Aircraft id or tail number
        #[arg(long, conflicts_with_all = ["wet", "dry", "owned"])]
        aircraft: Option<String>,
        /// Wet hourly rate
        #[arg(long, conflicts_with_all = ["dry", "owned"])]
        wet: Option<f64>,
        /// Dry hourly rate (needs --fuel-burn and --fuel-price)
        #[arg(long, conflicts_with = "owned")]
        dry: Option<f64>,
        /// Owner operating cost per hour (needs --fuel-burn and --fuel-price)
        #[arg(long)]
        owned: Option<f64>,
        /// Gallons per hour
        #[arg(long = "fuel-burn")]
        fuel_burn: Option<f64>,
        /// Price per gallon
        #[arg(long = "fuel-price")]
        fuel_price: Option<f64>,
        #[arg(long)]
        hours: f64,
        /// Extra hours as a percentage (default: settings buffer)
        #[arg(long)]
        buffer: Option<f64>,
    },
    /// Budget reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export data to CSV or reports to PDF.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// View or change settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum CardsCommands {
    /// Create a budget card.
    Add {
        name: String,
        #[arg(long)]
        category: String,
        /// Budgeted amount
        #[arg(long)]
        amount: f64,
        /// Planned date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// once, monthly or annual
        #[arg(long, default_value = "once")]
        frequency: String,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Aircraft id or tail number
        #[arg(long)]
        aircraft: Option<String>,
        /// Flight hours the card pays for
        #[arg(long)]
        hours: Option<f64>,
        /// wet, dry or owned
        #[arg(long = "rate-type")]
        rate_type: Option<String>,
    },
    /// List budget cards.
    List {
        /// active, inactive or completed
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Month: YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Show one card with its linked expenses.
    Show { id: i64 },
    /// Change fields on a card. Pass `none` to clear an optional field.
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        frequency: Option<String>,
        /// Comma-separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        aircraft: Option<String>,
        #[arg(long)]
        hours: Option<String>,
        #[arg(long = "rate-type")]
        rate_type: Option<String>,
    },
    /// Set a card's status: active, inactive or completed.
    Status { id: i64, status: String },
    /// Delete a card. Linked expenses are kept.
    Delete { id: i64 },
    /// Copy a card without its links.
    Duplicate { id: i64 },
    /// Allocate part of an expense to a card.
    Link {
        card_id: i64,
        expense_id: i64,
        /// Amount to allocate (default: the part of the expense not yet linked)
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Remove an expense's allocation from a card.
    Unlink { card_id: i64, expense_id: i64 },
    /// List the expenses linked to a card.
    Expenses { id: i64 },
    /// Price a card's hours on its aircraft.
    Cost {
        id: i64,
        #[arg(long)]
        buffer: Option<f64>,
        /// Store the result as the card's budgeted amount
        #[arg(long)]
        apply: bool,
    },
    /// Create the standard cards for a certification.
    Quickstart {
        /// private, instrument or commercial (default: settings target)
        #[arg(long)]
        cert: Option<String>,
        /// Aircraft to price flight items on (default: settings aircraft)
        #[arg(long)]
        aircraft: Option<String>,
        /// Planned date for the cards (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExpensesCommands {
    /// Log an expense.
    Add {
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        category: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        vendor: Option<String>,
        /// Aircraft id or tail number
        #[arg(long)]
        aircraft: Option<String>,
        /// Budget card to link the full amount to
        #[arg(long)]
        card: Option<i64>,
        /// Recurs: monthly, quarterly or annual
        #[arg(long)]
        recurring: Option<String>,
        /// Last date of the recurrence
        #[arg(long = "recurring-until")]
        recurring_until: Option<String>,
        #[arg(long = "tax-deductible")]
        tax_deductible: bool,
        #[arg(long = "tax-category")]
        tax_category: Option<String>,
    },
    /// List expenses, newest first.
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        aircraft: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show one expense and its card links.
    Show { id: i64 },
    /// Change fields on an expense. Pass `none` to clear an optional field.
    Edit {
        id: i64,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        aircraft: Option<String>,
        /// Move the expense to this card, or `none` to unlink it
        #[arg(long)]
        card: Option<String>,
        /// monthly, quarterly, annual, or `none` to stop recurring
        #[arg(long)]
        recurring: Option<String>,
        #[arg(long = "recurring-until")]
        recurring_until: Option<String>,
        #[arg(long = "tax-deductible")]
        tax_deductible: Option<bool>,
        #[arg(long = "tax-category")]
        tax_category: Option<String>,
    },
    /// Delete an expense and its card links.
    Delete { id: i64 },
    /// Totals by category or subcategory.
    Summary {
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        /// category or subcategory
        #[arg(long = "by", default_value = "category")]
        group_by: String,
    },
}

#[derive(Subcommand)]
pub enum AircraftCommands {
    /// Register an aircraft.
    Add {
        tail: String,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        gear: Option<String>,
        #[arg(long)]
        complex: bool,
        #[arg(long)]
        taa: bool,
        #[arg(long = "high-performance")]
        high_performance: bool,
        #[arg(long)]
        simulator: bool,
        /// owned, club or rental
        #[arg(long)]
        category: Option<String>,
        /// wet, dry or owned
        #[arg(long = "rate-type")]
        rate_type: String,
        #[command(flatten)]
        rates: RateArgs,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List aircraft.
    List {
        /// Include inactive aircraft
        #[arg(long)]
        all: bool,
    },
    /// Show one aircraft by id or tail number.
    Show { key: String },
    /// Change fields on an aircraft. Pass `none` to clear an optional field.
    Edit {
        key: String,
        #[arg(long)]
        tail: Option<String>,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        gear: Option<String>,
        #[arg(long)]
        complex: Option<bool>,
        #[arg(long)]
        taa: Option<bool>,
        #[arg(long = "high-performance")]
        high_performance: Option<bool>,
        #[arg(long)]
        simulator: Option<bool>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "rate-type")]
        rate_type: Option<String>,
        #[command(flatten)]
        rates: RateArgs,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete an aircraft. Cards and expenses keep their rows.
    Delete { key: String },
}

#[derive(clap::Args, Default)]
pub struct RateArgs {
    #[arg(long = "wet-rate")]
    pub wet_rate: Option<f64>,
    #[arg(long = "dry-rate")]
    pub dry_rate: Option<f64>,
    #[arg(long = "operating-cost")]
    pub operating_cost: Option<f64>,
    /// Gallons per hour
    #[arg(long = "fuel-burn")]
    pub fuel_burn: Option<f64>,
    /// Price per gallon
    #[arg(long = "fuel-price")]
    pub fuel_price: Option<f64>,
}

#[derive(Subcommand)]
pub enum HoursCommands {
    /// Import hour totals from a JSON file.
    Import {
        file: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record hour totals by hand, e.g. `total=52.3 pic=20`.
    Set {
        #[arg(required = true)]
        values: Vec<String>,
        /// Start from an empty snapshot instead of the current one
        #[arg(long)]
        replace: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the current hour totals.
    Show,
    /// List past imports and manual entries.
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Rebuild hour totals from the flight log.
    Recalculate {
        #[arg(long)]
        notes: Option<String>,
    },
}

/// Hours logged on a flight. Unset values are zero when adding and
/// unchanged when editing.
#[derive(clap::Args, Default)]
pub struct FlightTimeArgs {
    #[arg(long)]
    pub total: Option<f64>,
    #[arg(long)]
    pub pic: Option<f64>,
    #[arg(long)]
    pub sic: Option<f64>,
    #[arg(long)]
    pub night: Option<f64>,
    #[arg(long)]
    pub solo: Option<f64>,
    #[arg(long = "cross-country", visible_alias = "xc")]
    pub cross_country: Option<f64>,
    #[arg(long = "actual-instrument")]
    pub actual_instrument: Option<f64>,
    #[arg(long = "simulated-instrument", visible_alias = "hood")]
    pub simulated_instrument: Option<f64>,
    /// Time in a simulator or training device
    #[arg(long)]
    pub simulator: Option<f64>,
    #[arg(long = "dual-given")]
    pub dual_given: Option<f64>,
    #[arg(long = "dual-received", visible_alias = "dual")]
    pub dual_received: Option<f64>,
    #[arg(long)]
    pub complex: Option<f64>,
    #[arg(long)]
    pub taa: Option<f64>,
    #[arg(long = "high-performance")]
    pub high_performance: Option<f64>,
}

#[derive(clap::Args, Default)]
pub struct FlightCountArgs {
    #[arg(long = "day-takeoffs")]
    pub day_takeoffs: Option<u32>,
    /// Day full-stop landings
    #[arg(long = "day-landings")]
    pub day_landings: Option<u32>,
    #[arg(long = "night-takeoffs")]
    pub night_takeoffs: Option<u32>,
    /// Night full-stop landings
    #[arg(long = "night-landings")]
    pub night_landings: Option<u32>,
    /// All landings, including touch-and-goes
    #[arg(long)]
    pub landings: Option<u32>,
    #[arg(long)]
    pub approaches: Option<u32>,
}

#[derive(Subcommand)]
pub enum FlightsCommands {
    /// Log a flight or simulator session.
    Add {
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Aircraft id or tail number
        #[arg(long)]
        aircraft: Option<String>,
        #[arg(long)]
        departure: Option<String>,
        #[arg(long)]
        arrival: Option<String>,
        /// Airports flown, space separated, e.g. "KAMW KDSM KAMW"
        #[arg(long)]
        route: Option<String>,
        /// Longest straight-line distance from departure, in nm
        #[arg(long)]
        distance: Option<f64>,
        #[command(flatten)]
        times: FlightTimeArgs,
        #[command(flatten)]
        counts: FlightCountArgs,
        #[arg(long)]
        checkride: bool,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// List flights, newest first.
    List {
        #[arg(long)]
        aircraft: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show one flight.
    Show { id: i64 },
    /// Change fields on a flight. Pass `none` to clear an optional field.
    Edit {
        id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        aircraft: Option<String>,
        #[arg(long)]
        departure: Option<String>,
        #[arg(long)]
        arrival: Option<String>,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        distance: Option<String>,
        #[command(flatten)]
        times: FlightTimeArgs,
        #[command(flatten)]
        counts: FlightCountArgs,
        #[arg(long)]
        checkride: Option<bool>,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Delete a flight.
    Delete { id: i64 },
    /// Logbook totals over an optional date range.
    Summary {
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Budgeted vs actual per month.
    Monthly {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Budgeted vs actual per category.
    Category {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Year totals with monthly and category breakdowns.
    Annual {
        /// Year (default: current year)
        #[arg(long)]
        year: Option<i32>,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Budget cards to CSV.
    Cards {
        #[arg(long)]
        output: Option<String>,
    },
    /// Expenses to CSV.
    Expenses {
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Aircraft to CSV.
    Aircraft {
        #[arg(long)]
        output: Option<String>,
    },
    /// Annual budget summary to PDF.
    #[cfg(feature = "pdf")]
    PdfAnnual {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Certification progress and timeline to PDF.
    #[cfg(feature = "pdf")]
    PdfProgress {
        #[arg(long)]
        cert: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print every setting.
    Show,
    /// Change one setting. Use `none` to clear optional values.
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardStatus;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_clearable_values() {
        assert_eq!(clearable(None), None);
        assert_eq!(clearable(Some("none".into())), Some(None));
        assert_eq!(clearable(Some("Skyline".into())), Some(Some("Skyline".into())));

        let status: Option<Option<CardStatus>> = clearable_parsed(Some("done".into())).unwrap();
        assert_eq!(status, Some(Some(CardStatus::Completed)));
        assert!(clearable_parsed::<CardStatus>(Some("bogus".into())).is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("card", " 7 ").unwrap(), 7);
        assert!(parse_id("card", "seven").is_err());
    }
}
