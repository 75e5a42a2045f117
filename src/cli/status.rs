use crate::db::{get_connection, init_db, DB_FILE};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::hours::latest;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(DB_FILE);

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!(
        "Target:     {}",
        settings
            .target_certification
            .map(|c| c.title())
            .unwrap_or("(not set)")
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        init_db(&conn)?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
        };
        let active: i64 = conn.query_row(
            "SELECT count(*) FROM budget_cards WHERE status = 'active'",
            [],
            |r| r.get(0),
        )?;

        println!();
        println!("Budget cards:  {} ({active} active)", count("budget_cards")?);
        println!("Expenses:      {}", count("expenses")?);
        println!("Links:         {}", count("expense_budget_links")?);
        println!("Aircraft:      {}", count("aircraft")?);
        println!("Flights:       {}", count("flights")?);
        println!("Hour imports:  {}", count("import_history")?);
        if let Some(record) = latest(&conn)? {
            println!("Latest hours:  {} ({})", record.import_date, record.import_type);
        }
    } else {
        println!();
        println!("Database not found. Run `truehour init` to set up.");
    }

    Ok(())
}
