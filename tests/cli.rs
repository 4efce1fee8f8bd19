mod common;

use assert_cmd::Command;
use common::{Cell, TestWorkspace, num, text};
use predicates::prelude::*;
use predicates::str::contains;
use sheet_to_sql::database::{Database, DuckDbDatabase};

fn bin() -> Command {
    Command::cargo_bin("sheet-to-sql").expect("binary exists")
}

fn inventory_workbook(ws: &TestWorkspace) -> std::path::PathBuf {
    ws.write_xlsx(
        "inventory.xlsx",
        &["sku", "name", "qty", "price"],
        &[
            vec![text("A-1"), text("bolt"), num(100.0), num(0.25)],
            vec![text("A-2"), text("nut"), num(250.0), num(0.1)],
            vec![text("B-7"), text("washer"), Cell::Blank, num(0.05)],
        ],
    )
}

fn upload(ws: &TestWorkspace, input: &std::path::Path) -> Command {
    let mut cmd = bin();
    cmd.arg("upload")
        .arg("-i")
        .arg(input)
        .arg("--database")
        .arg(ws.database_path());
    cmd
}

fn with_database(ws: &TestWorkspace, args: &[&str]) -> Command {
    let mut cmd = bin();
    cmd.args(args).arg("--database").arg(ws.database_path());
    cmd
}

#[test]
fn sheets_lists_worksheet_names() {
    let ws = TestWorkspace::new();
    let headers: &[&str] = &["a"];
    let rows = vec![vec![num(1.0)]];
    let path = ws.write_xlsx_sheets("book.xlsx", &[("Jan", headers, rows.as_slice()), ("Feb", headers, rows.as_slice())]);

    bin()
        .arg("sheets")
        .arg("-i")
        .arg(&path)
        .assert()
        .success()
        .stdout("Jan\nFeb\n");
}

#[test]
fn preview_shows_inferred_types() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);

    bin()
        .args(["preview", "--rows", "2", "-i"])
        .arg(&path)
        .assert()
        .success()
        .stdout(contains("sku (text)"))
        .stdout(contains("qty (integer)"))
        .stdout(contains("price (float)"))
        .stdout(contains("... 1 more row(s)"))
        .stdout(contains("3 row(s) x 4 column(s)"));
}

#[test]
fn upload_creates_table_and_describe_reads_it_back() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);

    upload(&ws, &path)
        .arg("--yes")
        .assert()
        .success()
        .stdout(contains("Uploaded 3 of 3 row(s) into 'inventory' (table created)"))
        .stdout(contains("Table 'inventory' now holds 3 row(s)"));

    with_database(&ws, &["tables"])
        .assert()
        .success()
        .stdout("inventory\n");

    with_database(&ws, &["describe", "--table", "inventory", "--rows", "3"])
        .assert()
        .success()
        .stdout(contains("qty"))
        .stdout(contains("BIGINT"))
        .stdout(contains("washer"))
        .stdout(contains("NULL"))
        .stdout(contains("3 row(s)"));
}

#[test]
fn fast_mode_skips_existing_table() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    upload(&ws, &path).arg("--yes").assert().success();

    upload(&ws, &path)
        .args(["--mode", "fast"])
        .assert()
        .success()
        .stdout(contains("Uploaded").not());

    with_database(&ws, &["describe", "--table", "inventory", "--rows", "0"])
        .assert()
        .success()
        .stdout(contains("3 row(s)"));
}

#[test]
fn standard_mode_prompts_before_replacing() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    upload(&ws, &path).arg("--yes").assert().success();

    // Keep the suggested name, confirm the upload, confirm the replace.
    upload(&ws, &path)
        .write_stdin("\ny\nyes\n")
        .assert()
        .success()
        .stdout(contains("(table recreated)"));

    // End of input declines.
    upload(&ws, &path)
        .write_stdin("")
        .assert()
        .success()
        .stdout(contains("Uploaded").not());
}

#[test]
fn fast_mode_still_asks_before_replacing_when_policy_prompts() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    upload(&ws, &path).arg("--yes").assert().success();

    upload(&ws, &path)
        .args(["--mode", "fast", "--if-exists", "prompt"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(contains("Uploaded").not());

    with_database(&ws, &["describe", "--table", "inventory", "--rows", "0"])
        .assert()
        .success()
        .stdout(contains("3 row(s)"));

    upload(&ws, &path)
        .args(["--mode", "fast", "--if-exists", "prompt"])
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(contains("(table recreated)"));
}

#[test]
fn append_adds_rows_to_existing_table() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    upload(&ws, &path).arg("--yes").assert().success();

    upload(&ws, &path)
        .args(["--yes", "--if-exists", "append", "--table", "inventory"])
        .assert()
        .success()
        .stdout(contains("Table 'inventory' now holds 6 row(s)"));
}

#[test]
fn json_report_is_machine_readable() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);

    let output = upload(&ws, &path)
        .args(["--yes", "--report", "json", "--table", "stock"])
        .output()
        .expect("run upload");
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout holds only the report");
    assert_eq!(report["table"], "stock");
    assert_eq!(report["mode"], "standard");
    assert_eq!(report["rows_succeeded"], 3);
    assert_eq!(report["created"], true);
}

#[test]
fn check_reports_type_mismatches() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    let other = ws.write("inventory.csv", "sku,qty\nA-1,many\n");
    upload(&ws, &path).arg("--yes").assert().success();

    with_database(&ws, &["check", "--table", "inventory"])
        .arg("-i").arg(&path)
        .assert()
        .success()
        .stdout(contains("match table 'inventory'"));

    with_database(&ws, &["check", "--table", "inventory"])
        .arg("-i").arg(&other)
        .assert()
        .failure()
        .stderr(contains("Schema mismatch for table 'inventory'"))
        .stderr(contains("column 'qty'"));
}

#[test]
fn row_failure_policies_drive_the_exit_status() {
    let ws = TestWorkspace::new();
    {
        let mut db = DuckDbDatabase::open(&ws.database_path()).expect("open database");
        db.execute("CREATE TABLE nums (n BIGINT NOT NULL, label VARCHAR)")
            .expect("create table");
    }
    let path = ws.write("nums.csv", "n,label\n1,a\n,b\n3,c\n");

    upload(&ws, &path)
        .args(["--yes", "--if-exists", "append", "--on-row-error", "abort"])
        .assert()
        .failure()
        .stderr(contains("Error inserting row 2 into 'nums'"));

    with_database(&ws, &["describe", "--table", "nums", "--rows", "0"])
        .assert()
        .success()
        .stdout(contains("0 row(s)"));

    upload(&ws, &path)
        .args(["--yes", "--if-exists", "append"])
        .assert()
        .success()
        .stdout(contains("Uploaded 2 of 3 row(s) into 'nums'"))
        .stdout(contains("  row 2:"));
}

#[test]
fn credentials_auth_is_rejected() {
    let ws = TestWorkspace::new();
    with_database(&ws, &["tables", "--auth", "credentials", "--username", "sa"])
        .env("SHEET_TO_SQL_PASSWORD", "s3cret")
        .assert()
        .failure()
        .stderr(contains("Could not connect"))
        .stderr(contains("s3cret").not());
}

#[test]
fn missing_database_is_reported() {
    bin()
        .arg("tables")
        .assert()
        .failure()
        .stderr(contains("No database given"));
}

#[test]
fn profile_supplies_connection_and_mode() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    let profile = ws.write(
        "profile.yaml",
        &format!(
            "connection:\n  server: {}\n  database: warehouse\nupload:\n  mode: fast\n  text_length: 64\n",
            ws.path().display()
        ),
    );

    bin()
        .args(["upload", "-i"])
        .arg(&path)
        .arg("--profile")
        .arg(&profile)
        .assert()
        .success()
        .stdout(contains("(table created)"));

    assert!(ws.path().join("warehouse.duckdb").exists());

    bin()
        .args(["describe", "--table", "inventory", "--profile"])
        .arg(&profile)
        .assert()
        .success()
        .stdout(contains("VARCHAR"));
}

#[test]
fn invalid_table_name_is_rejected() {
    let ws = TestWorkspace::new();
    let path = inventory_workbook(&ws);
    upload(&ws, &path)
        .args(["--yes", "--table", "   "])
        .assert()
        .failure()
        .stderr(contains("Invalid identifier"));
}
