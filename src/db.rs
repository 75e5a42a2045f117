use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "truehour.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS aircraft (
    id INTEGER PRIMARY KEY,
    tail_number TEXT NOT NULL UNIQUE COLLATE NOCASE,
    make TEXT,
    model TEXT,
    year INTEGER,
    gear_type TEXT,
    is_complex INTEGER NOT NULL DEFAULT 0,
    is_taa INTEGER NOT NULL DEFAULT 0,
    is_high_performance INTEGER NOT NULL DEFAULT 0,
    is_simulator INTEGER NOT NULL DEFAULT 0,
    category TEXT,
    rate_type TEXT NOT NULL,
    hourly_rate_wet REAL,
    hourly_rate_dry REAL,
    operating_cost_per_hour REAL,
    fuel_burn_rate REAL,
    fuel_price_per_gallon REAL,
    notes TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    aircraft_id INTEGER,
    category TEXT NOT NULL,
    subcategory TEXT,
    description TEXT,
    amount REAL NOT NULL CHECK (amount > 0),
    date TEXT NOT NULL,
    is_recurring INTEGER NOT NULL DEFAULT 0,
    recurrence_interval TEXT,
    recurrence_end_date TEXT,
    vendor TEXT,
    is_tax_deductible INTEGER NOT NULL DEFAULT 0,
    tax_category TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (aircraft_id) REFERENCES aircraft(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS budget_cards (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    frequency TEXT NOT NULL DEFAULT 'once',
    when_date TEXT NOT NULL,
    budgeted_amount REAL NOT NULL CHECK (budgeted_amount > 0),
    status TEXT NOT NULL DEFAULT 'active',
    tags TEXT NOT NULL DEFAULT '[]',
    notes TEXT,
    aircraft_id INTEGER,
    hourly_rate_type TEXT,
    associated_hours REAL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (aircraft_id) REFERENCES aircraft(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS expense_budget_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    expense_id INTEGER NOT NULL,
    budget_card_id INTEGER NOT NULL,
    amount REAL NOT NULL CHECK (amount > 0),
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (expense_id, budget_card_id),
    FOREIGN KEY (expense_id) REFERENCES expenses(id) ON DELETE CASCADE,
    FOREIGN KEY (budget_card_id) REFERENCES budget_cards(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS import_history (
    id INTEGER PRIMARY KEY,
    import_type TEXT NOT NULL,
    file_name TEXT,
    flights_imported INTEGER NOT NULL DEFAULT 0,
    hours_imported TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    notes TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY,
    aircraft_id INTEGER,
    date TEXT NOT NULL,
    departure_airport TEXT,
    arrival_airport TEXT,
    route TEXT,
    distance REAL,
    total_time REAL NOT NULL DEFAULT 0,
    pic_time REAL NOT NULL DEFAULT 0,
    sic_time REAL NOT NULL DEFAULT 0,
    night_time REAL NOT NULL DEFAULT 0,
    solo_time REAL NOT NULL DEFAULT 0,
    cross_country_time REAL NOT NULL DEFAULT 0,
    actual_instrument_time REAL NOT NULL DEFAULT 0,
    simulated_instrument_time REAL NOT NULL DEFAULT 0,
    simulated_flight_time REAL NOT NULL DEFAULT 0,
    dual_given_time REAL NOT NULL DEFAULT 0,
    dual_received_time REAL NOT NULL DEFAULT 0,
    complex_time REAL NOT NULL DEFAULT 0,
    taa_time REAL NOT NULL DEFAULT 0,
    high_performance_time REAL NOT NULL DEFAULT 0,
    day_takeoffs INTEGER NOT NULL DEFAULT 0,
    day_landings_full_stop INTEGER NOT NULL DEFAULT 0,
    night_takeoffs INTEGER NOT NULL DEFAULT 0,
    night_landings_full_stop INTEGER NOT NULL DEFAULT 0,
    all_landings INTEGER NOT NULL DEFAULT 0,
    approaches INTEGER NOT NULL DEFAULT 0,
    is_checkride INTEGER NOT NULL DEFAULT 0,
    remarks TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (aircraft_id) REFERENCES aircraft(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);
CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category);
CREATE INDEX IF NOT EXISTS idx_budget_cards_when ON budget_cards(when_date);
CREATE INDEX IF NOT EXISTS idx_links_card ON expense_budget_links(budget_card_id);
CREATE INDEX IF NOT EXISTS idx_import_history_date ON import_history(import_date);
CREATE INDEX IF NOT EXISTS idx_flights_date ON flights(date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in [
            "aircraft",
            "budget_cards",
            "expense_budget_links",
            "expenses",
            "flights",
            "import_history",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let (_dir, conn) = test_db();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_link_pair_is_unique() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO expenses (category, amount, date) VALUES ('Flight Training', 100, '2025-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO budget_cards (name, category, when_date, budgeted_amount) VALUES ('Lessons', 'Flight Training', '2025-01-01', 500)",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO expense_budget_links (expense_id, budget_card_id, amount) VALUES (1, 1, 50)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_link_ids_are_not_reused() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO expenses (category, amount, date) VALUES ('Flight Training', 100, '2025-01-01')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO budget_cards (name, category, when_date, budgeted_amount) VALUES ('Lessons', 'Flight Training', '2025-01-01', 500)",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO expense_budget_links (expense_id, budget_card_id, amount) VALUES (1, 1, 50)";
        conn.execute(insert, []).unwrap();
        let first = conn.last_insert_rowid();
        conn.execute("DELETE FROM expense_budget_links", []).unwrap();
        conn.execute(insert, []).unwrap();
        assert_ne!(conn.last_insert_rowid(), first);
    }
}
