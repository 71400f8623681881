use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn autotable(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autotable"))
        .arg("--db")
        .arg(db)
        .args(args)
        .output()
        .expect("failed to run autotable")
}

fn query_json(db: &Path, sql: &str) -> serde_json::Value {
    let out = autotable(db, &["query", sql]);
    assert!(
        out.status.success(),
        "query failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("query output should be JSON")
}

#[test]
fn insert_json_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rows.db");

    let out = autotable(
        &db,
        &["insert", "--table", "events", "--json", r#"{"kind": "click", "x": 3}"#],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Inserted 1 row(s) into 'events'"));

    let out = autotable(
        &db,
        &["insert", "--table", "events", "--json", r#"{"kind": "scroll", "dy": 0.5}"#],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let rows = query_json(&db, "SELECT kind, x, dy FROM events ORDER BY rowid");
    assert_eq!(
        rows,
        serde_json::json!([
            {"kind": "click", "x": 3, "dy": null},
            {"kind": "scroll", "x": null, "dy": 0.5},
        ])
    );
}

#[test]
fn insert_file_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rows.db");
    let input = dir.path().join("rows.jsonl");
    let lines: Vec<String> = (0..20)
        .map(|i| format!(r#"{{"id": {i}, "field_{}": true}}"#, i % 5))
        .collect();
    fs::write(&input, lines.join("\n")).unwrap();

    let out = autotable(
        &db,
        &[
            "insert",
            "--table",
            "bulk",
            "--file",
            input.to_str().unwrap(),
            "--jobs",
            "4",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Inserted 20 row(s)"));

    let rows = query_json(&db, "SELECT count(*) AS n FROM bulk");
    assert_eq!(rows, serde_json::json!([{"n": 20}]));
    let columns = query_json(&db, "SELECT name FROM pragma_table_info('bulk')");
    assert_eq!(columns.as_array().unwrap().len(), 6);
}

#[test]
fn invalid_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rows.db");
    let out = autotable(&db, &["insert", "--table", "t", "--json", "{oops"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("error: Invalid JSON"));
}

#[test]
fn type_mismatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rows.db");
    let out = autotable(&db, &["insert", "--table", "t", "--json", r#"{"n": 1.5}"#]);
    assert!(out.status.success());

    let out = autotable(&db, &["insert", "--table", "t", "--json", r#"{"n": "text"}"#]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("1 of 1 row(s) failed"), "{stderr}");

    let rows = query_json(&db, "SELECT count(*) AS n FROM t");
    assert_eq!(rows, serde_json::json!([{"n": 1}]));
}

#[test]
fn query_error_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rows.db");
    let out = autotable(&db, &["query", "SELECT * FROM missing"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("no such table"));
}

#[test]
fn init_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("configured.db");
    let config = dir.path().join("conf").join("autotable.yml");

    let out = autotable(&db, &["init-config", config.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let raw = fs::read_to_string(&config).unwrap();
    assert!(raw.contains("busy_timeout_ms: 5000"), "{raw}");
    assert!(raw.contains("configured.db"), "{raw}");

    let again = autotable(&db, &["init-config", config.to_str().unwrap()]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already exists"));

    let out = Command::new(env!("CARGO_BIN_EXE_autotable"))
        .args([
            "--config",
            config.to_str().unwrap(),
            "insert",
            "--table",
            "t",
            "--json",
            r#"{"a": 1}"#,
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(db.exists());
}

#[test]
fn insert_without_db_warns() {
    let out = Command::new(env!("CARGO_BIN_EXE_autotable"))
        .env_remove("RUST_LOG")
        .args(["insert", "--table", "t", "--json", r#"{"a": 1}"#])
        .output()
        .expect("failed to run autotable");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("in-memory database"), "{stderr}");
}
