#![cfg(feature = "sqlite-backend")]

use std::path::Path;

use assert_cmd::Command;
use cascade_delete::{EntityId, sqlite::SqliteStore};
use predicates::prelude::*;
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    db: String,
    account: EntityId,
    contact: EntityId,
}

fn prepare_db() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("cascade.db");
    let store = SqliteStore::open(&path).expect("open db");
    let conn = store.connection();
    conn.execute_batch(
        "CREATE TABLE account (id TEXT PRIMARY KEY);
         CREATE TABLE contact (
             id TEXT PRIMARY KEY,
             account_id TEXT REFERENCES account(id) ON DELETE RESTRICT
         );",
    )
    .expect("schema");
    let account = EntityId::new_v4();
    let contact = EntityId::new_v4();
    conn.execute(
        "INSERT INTO account (id) VALUES (?1)",
        params![account.to_string()],
    )
    .expect("account");
    conn.execute(
        "INSERT INTO contact (id, account_id) VALUES (?1, ?2)",
        params![contact.to_string(), account.to_string()],
    )
    .expect("contact");
    Fixture {
        db: path_str(&path),
        dir,
        account,
        contact,
    }
}

fn path_str(path: &Path) -> String {
    path.to_str().expect("utf-8 path").to_string()
}

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cascade-delete"))
}

fn count(db: &str, table: &str) -> i64 {
    SqliteStore::open(db)
        .expect("reopen")
        .count(table)
        .expect("count")
}

#[test]
fn test_cli_exits_with_success_on_help() {
    cli().arg("--help").assert().success();
}

#[test]
fn test_cli_delete_cascades_and_prints_results() {
    let fixture = prepare_db();
    cli()
        .args(["delete", "--db", &fixture.db, "--entity", "account"])
        .arg(fixture.account.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "contact,{},Success",
            fixture.contact
        )))
        .stdout(predicate::str::contains(format!(
            "account,{},Success",
            fixture.account
        )))
        .stderr(predicate::str::contains("2 of 2 records deleted"));
    assert_eq!(count(&fixture.db, "account"), 0);
    assert_eq!(count(&fixture.db, "contact"), 0);
}

#[test]
fn test_cli_json_output() {
    let fixture = prepare_db();
    let output = cli()
        .args([
            "--format",
            "json",
            "delete",
            "--db",
            &fixture.db,
            "--entity",
            "account",
            "--dry-run",
        ])
        .arg(fixture.account.to_string())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let document: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(document["dry_run"], Value::Bool(true));
    let results = document["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["entity_name"], "contact");
    assert_eq!(results[0]["outcome"]["status"], "success");
    assert_eq!(count(&fixture.db, "account"), 1);
}

#[test]
fn test_cli_ids_file() {
    let fixture = prepare_db();
    let ids = fixture.dir.path().join("ids.txt");
    std::fs::write(&ids, format!("# accounts\n\n{}\n", fixture.account)).expect("ids file");
    cli()
        .args(["delete", "--db", &fixture.db, "--entity", "account"])
        .args(["--ids-file", &path_str(&ids)])
        .assert()
        .success();
    assert_eq!(count(&fixture.db, "account"), 0);
}

#[test]
fn test_cli_record_failure_exits_with_one() {
    let fixture = prepare_db();
    let missing = EntityId::new_v4();
    cli()
        .args(["delete", "--db", &fixture.db, "--entity", "contact"])
        .arg(missing.to_string())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_invalid_id_is_fatal() {
    let fixture = prepare_db();
    cli()
        .args(["delete", "--db", &fixture.db, "--entity", "account", "not-a-uuid"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid id not-a-uuid"));
}

#[test]
fn test_cli_missing_database_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let db = path_str(&dir.path().join("absent.db"));
    cli()
        .args(["delete", "--db", &db, "--entity", "account"])
        .arg(EntityId::new_v4().to_string())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_zero_batch_size_is_fatal() {
    let fixture = prepare_db();
    cli()
        .args(["delete", "--db", &fixture.db, "--entity", "account"])
        .args(["--batch-size", "0"])
        .arg(fixture.account.to_string())
        .assert()
        .code(2);
    assert_eq!(count(&fixture.db, "account"), 1);
}

#[test]
fn test_cli_deps_prints_tree() {
    let fixture = prepare_db();
    cli()
        .args(["deps", "--db", &fixture.db, "--entity", "account"])
        .assert()
        .success()
        .stdout(predicate::str::contains("account\n  contact.account_id"));
}
