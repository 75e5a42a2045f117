use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    home: TempDir,
}

impl Env {
    fn new() -> Self {
        Env {
            home: TempDir::new().unwrap(),
        }
    }

    fn initialized() -> Self {
        let env = Env::new();
        let data_dir = env.home.path().join("data");
        env.cmd()
            .args(["init", "--data-dir", data_dir.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized truehour"));
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("truehour").unwrap();
        cmd.env("HOME", self.home.path()).env_remove("TRUEHOUR_LOG");
        cmd
    }
}

#[test]
fn commands_without_init_point_at_init() {
    let env = Env::new();
    env.cmd()
        .args(["cards", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("truehour init"));
}

#[test]
fn card_expense_link_flow() {
    let env = Env::initialized();
    env.cmd()
        .args(["aircraft", "add", "N733RX", "--rate-type", "wet", "--wet-rate", "165"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added aircraft 1"));
    env.cmd()
        .args([
            "cards", "add", "Dual block", "--category", "Flight Training", "--amount", "2400",
            "--date", "2025-03-01", "--aircraft", "N733RX",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created card 1: Dual block ($2,400.00)"));
    env.cmd()
        .args([
            "expenses", "add", "--amount", "330", "--category", "Flight Training", "--date",
            "2025-03-05", "--card", "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("actual now $330.00"));
    env.cmd()
        .args(["expenses", "add", "--amount", "200", "--category", "Fuel", "--date", "2025-03-07"])
        .assert()
        .success();
    env.cmd()
        .args(["cards", "link", "1", "2", "--amount", "150"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked $150.00 of expense 2 to card 1"));

    env.cmd()
        .args(["cards", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Actual:     $480.00"));

    env.cmd()
        .args(["cards", "add", "Fuel", "--category", "Fuel", "--amount", "600"])
        .assert()
        .success();
    env.cmd()
        .args(["cards", "link", "2", "2", "--amount", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not yet linked"));
    env.cmd()
        .args(["cards", "link", "2", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked $50.00 of expense 2 to card 2"));

    env.cmd()
        .args(["cards", "unlink", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unlinked $150.00"));
    env.cmd()
        .args(["cards", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dual block"));
}

#[test]
fn progress_after_manual_hours() {
    let env = Env::initialized();
    env.cmd()
        .args(["hours", "set", "total=35", "cross_country=6", "pic=5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded manual snapshot"));
    env.cmd()
        .args(["progress", "--cert", "private"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Private Pilot"))
        .stdout(predicate::str::contains("requirements met"));
    env.cmd()
        .args(["progress"])
        .assert()
        .failure();
}

#[test]
fn ad_hoc_dry_cost_with_buffer() {
    let env = Env::initialized();
    env.cmd()
        .args([
            "cost", "--dry", "150", "--fuel-burn", "8", "--fuel-price", "5", "--hours", "10",
            "--buffer", "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("$2,090.00"));
    env.cmd()
        .args(["cost", "--dry", "150", "--hours", "10"])
        .assert()
        .failure();
}

#[test]
fn settings_are_validated() {
    let env = Env::initialized();
    env.cmd()
        .args(["settings", "set", "budget_buffer_percentage", "150"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 100"));
    env.cmd()
        .args(["settings", "set", "default_aircraft_id", "42"])
        .assert()
        .failure();
    env.cmd()
        .args(["settings", "set", "target_certification", "instrument"])
        .assert()
        .success();
    env.cmd()
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("instrument"));
}

#[test]
fn export_cards_csv() {
    let env = Env::initialized();
    env.cmd()
        .args(["cards", "add", "Checkride", "--category", "Exams & Checkrides", "--amount", "900"])
        .assert()
        .success();
    let out = env.home.path().join("cards.csv");
    env.cmd()
        .args(["export", "cards", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 card(s)"));
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("ID,Name,Category"));
    assert!(csv.contains("Checkride"));
}

#[test]
fn flight_log_feeds_hours() {
    let env = Env::initialized();
    env.cmd()
        .args(["hours", "recalculate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no flights logged"));
    env.cmd()
        .args(["aircraft", "add", "N733RX", "--rate-type", "wet", "--wet-rate", "165"])
        .assert()
        .success();
    env.cmd()
        .args([
            "flights", "add", "--date", "2025-03-05", "--aircraft", "N733RX", "--route",
            "KAMW KDSM KAMW", "--total", "2.0", "--pic", "2.0", "--dual", "2.0", "--xc", "1.5",
            "--landings", "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged flight 1: 2025-03-05 KAMW KDSM KAMW (2.0 h)"));
    env.cmd()
        .args(["flights", "add", "--total", "1.0", "--night", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds"));
    env.cmd()
        .args(["flights", "edit", "1", "--night", "0.5"])
        .assert()
        .success();
    env.cmd()
        .args(["flights", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("N733RX"));
    env.cmd()
        .args(["flights", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logbook Summary (1 flights)"));

    env.cmd()
        .args(["hours", "recalculate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from 1 flight(s)"))
        .stdout(predicate::str::contains("pic_xc"))
        .stdout(predicate::str::contains("flight log"));
    env.cmd()
        .args(["progress", "--cert", "private"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Private Pilot"));

    env.cmd()
        .args(["flights", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted flight 1"));
}
