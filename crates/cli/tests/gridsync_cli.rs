// End-to-end tests: the real `gridsync` binary against an httpmock sheet API
// and a temporary SQLite database.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::json;

use gridsync_recon::{TableRef, Value};
use gridsync_sql::SqliteStore;

/// Temp workspace with an isolated config dir so saved credentials on the
/// machine running the tests are never read or written.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn gridsync(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_gridsync"));
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env_remove("GRIDSYNC_TOKEN")
            .env_remove("GRIDSYNC_API_BASE")
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_job(&self, body: &str) -> PathBuf {
        let path = self.path("items.sync.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn seed_db(&self) -> PathBuf {
        let path = self.path("items.db");
        let store = SqliteStore::open(&path).unwrap();
        store
            .connection()
            .execute_batch(
                r#"
                CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, status TEXT);
                INSERT INTO items VALUES (1, 'A', 'open');
                INSERT INTO items VALUES (2, 'New', NULL);
                "#,
            )
            .unwrap();
        path
    }
}

const JOB: &str = r#"
name = "items"

[sheet]
id = 77

[table]
database = "items.db"
name = "items"

[[columns]]
name = "Id"
sql = "id"
action = "primary_key"

[[columns]]
name = "Name"
sql = "name"
action = "push"

[[columns]]
name = "Status"
sql = "status"
action = "pull"
"#;

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn mock_sheet(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77/columns");
        then.status(200).json_body(json!({
            "data": [
                { "id": 10, "index": 0, "title": "Id" },
                { "id": 11, "index": 1, "title": "Name" },
                { "id": 12, "index": 2, "title": "Status" }
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77");
        then.status(200).json_body(json!({
            "id": 77,
            "rows": [
                { "id": 501, "cells": [
                    { "columnId": 10, "value": 1 },
                    { "columnId": 11, "value": "B" },
                    { "columnId": 12, "value": "closed" }
                ]}
            ]
        }));
    });
}

fn read_items(db: &Path) -> Vec<Vec<Value>> {
    let store = SqliteStore::open(db).unwrap();
    store.read_table(&TableRef::new("main", "items")).unwrap().rows
}

// ===========================================================================
// validate
// ===========================================================================

#[test]
fn validate_ok() {
    let ws = Workspace::new();
    let job = ws.write_job(JOB);
    let out = ws.gridsync().args(["validate", job.to_str().unwrap()]).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(err.contains("ok"), "stderr: {err}");
    assert!(err.contains("Id -> id"), "stderr: {err}");
}

#[test]
fn validate_two_primary_keys() {
    let ws = Workspace::new();
    let job = ws.write_job(&JOB.replace(r#"action = "push""#, r#"action = "primary_key""#));
    let out = ws.gridsync().args(["validate", job.to_str().unwrap()]).output().unwrap();
    assert_eq!(out.status.code(), Some(4), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("exactly one"), "stderr: {}", stderr(&out));
}

#[test]
fn validate_constrained_primary_key() {
    let ws = Workspace::new();
    let body = JOB.replace(
        "action = \"primary_key\"",
        "action = \"primary_key\"\nconstraint = \"currency\"",
    );
    let job = ws.write_job(&body);
    let out = ws.gridsync().args(["validate", job.to_str().unwrap()]).output().unwrap();
    assert_eq!(out.status.code(), Some(4), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("primary_key column 'Id'"), "stderr: {}", stderr(&out));
}

#[test]
fn validate_missing_file() {
    let ws = Workspace::new();
    let out = ws.gridsync().args(["validate", "nope.sync.toml"]).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_without_token() {
    let ws = Workspace::new();
    let job = ws.write_job(JOB);
    ws.seed_db();
    let out = ws.gridsync().args(["run", job.to_str().unwrap()]).output().unwrap();
    assert_eq!(out.status.code(), Some(20), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("gridsync login"));
}

#[test]
fn run_applies_all_paths() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let insert = server.mock(|when, then| {
        when.method(POST)
            .path("/sheets/77/rows")
            .header("authorization", "Bearer tok")
            .json_body(json!([
                { "toBottom": true, "cells": [
                    { "columnId": 10, "value": 2, "strict": true },
                    { "columnId": 11, "value": "New", "strict": true }
                ]}
            ]));
        then.status(200).json_body(json!({ "message": "SUCCESS", "resultCode": 0 }));
    });
    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/sheets/77/rows")
            .json_body(json!([
                { "id": 501, "cells": [
                    { "columnId": 11, "value": "A", "strict": true }
                ]}
            ]));
        then.status(200).json_body(json!({ "message": "SUCCESS", "resultCode": 0 }));
    });

    let job = ws.write_job(JOB);
    let db = ws.seed_db();
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--json", "--token", "tok"])
        .args(["--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    insert.assert();
    update.assert();

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["meta"]["job"], "items");
    assert_eq!(report["meta"]["sheet_id"], "77");
    assert_eq!(report["meta"]["table"], "main.items");
    assert_eq!(report["applied"]["remote_inserted"], 1);
    assert_eq!(report["applied"]["remote_updated"], 1);
    assert_eq!(report["applied"]["local_updated"], 1);
    assert_eq!(report["applied"]["local_flushes"], 1);

    let rows = read_items(&db);
    assert_eq!(rows[0], vec![Value::Int(1), "A".into(), "closed".into()]);
    assert_eq!(rows[1][2], Value::Null);
}

#[test]
fn pulled_number_into_text_column_updates_every_run() {
    let ws = Workspace::new();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77/columns");
        then.status(200).json_body(json!({
            "data": [
                { "id": 10, "index": 0, "title": "Id" },
                { "id": 11, "index": 1, "title": "Name" },
                { "id": 12, "index": 2, "title": "Status" }
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77");
        then.status(200).json_body(json!({
            "id": 77,
            "rows": [
                { "id": 501, "cells": [
                    { "columnId": 10, "value": 1 },
                    { "columnId": 11, "value": "A" },
                    { "columnId": 12, "value": 5 }
                ]}
            ]
        }));
    });

    let job = ws.write_job(JOB);
    let db = ws.seed_db();
    for _ in 0..2 {
        let out = ws
            .gridsync()
            .args(["run", job.to_str().unwrap(), "--json", "--no-insert", "--no-push"])
            .args(["--token", "tok", "--api-base", &server.base_url()])
            .output()
            .unwrap();
        assert!(out.status.success(), "stderr: {}", stderr(&out));
        let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
        // TEXT affinity stores '5', which never equals the sheet's 5.
        assert_eq!(report["applied"]["local_updated"], 1);
    }
    assert_eq!(read_items(&db)[0][2], Value::from("5"));
}

#[test]
fn run_dry_run_writes_nothing() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);
    let writes = server.mock(|when, then| {
        when.path("/sheets/77/rows");
        then.status(200).json_body(json!({ "resultCode": 0 }));
    });

    let job = ws.write_job(JOB);
    let db = ws.seed_db();
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--dry-run"])
        .env("GRIDSYNC_TOKEN", "tok")
        .env("GRIDSYNC_API_BASE", server.base_url())
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("dry run"), "stderr: {}", stderr(&out));
    assert!(out.stdout.is_empty());

    writes.assert_calls(0);
    assert_eq!(read_items(&db)[0][2], Value::from("open"));
}

#[test]
fn run_with_paths_disabled() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);
    let writes = server.mock(|when, then| {
        when.path("/sheets/77/rows");
        then.status(200).json_body(json!({ "resultCode": 0 }));
    });

    let job = ws.write_job(JOB);
    let db = ws.seed_db();
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--no-insert", "--no-push", "--token", "tok"])
        .args(["--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("disabled with pending changes: insert, push"));

    writes.assert_calls(0);
    assert_eq!(read_items(&db)[0][2], Value::from("closed"));
}

#[test]
fn run_unknown_sheet_column() {
    let ws = Workspace::new();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77/columns");
        then.status(200).json_body(json!({
            "data": [
                { "id": 10, "index": 0, "title": "Id" },
                { "id": 11, "index": 1, "title": "Name" }
            ]
        }));
    });

    let job = ws.write_job(JOB);
    ws.seed_db();
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--token", "tok"])
        .args(["--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(10), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("Status"));
}

#[test]
fn run_rejected_token() {
    let ws = Workspace::new();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/sheets/77/columns");
        then.status(401).json_body(json!({ "errorCode": 1002, "message": "invalid token" }));
    });

    let job = ws.write_job(JOB);
    ws.seed_db();
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--token", "bad"])
        .args(["--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(21), "stderr: {}", stderr(&out));
}

#[test]
fn run_missing_database() {
    let ws = Workspace::new();
    let job = ws.write_job(JOB);
    let out = ws
        .gridsync()
        .args(["run", job.to_str().unwrap(), "--token", "tok", "--api-base", "http://127.0.0.1:1"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(30), "stderr: {}", stderr(&out));
}

// ===========================================================================
// sheets / columns / import
// ===========================================================================

#[test]
fn columns_json() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let out = ws
        .gridsync()
        .args(["columns", "77", "--json", "--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let cols: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(cols[2], json!({ "index": 2, "id": 12, "title": "Status" }));
}

#[test]
fn sheets_plain() {
    let ws = Workspace::new();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/sheets");
        then.status(200).json_body(json!({
            "data": [{ "id": 77, "name": "Items", "permalink": "https://app.test/77" }]
        }));
    });

    let out = ws
        .gridsync()
        .args(["sheets", "--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "77, Items, https://app.test/77");
}

#[test]
fn import_creates_table() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let db = ws.path("copy.db");
    let out = ws
        .gridsync()
        .args(["import", "77", "--db", db.to_str().unwrap(), "--table", "[main].[items_copy]"])
        .args(["--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("imported 1 row(s)"));

    let store = SqliteStore::open(&db).unwrap();
    let table = store.read_table(&TableRef::new("main", "items_copy")).unwrap();
    assert_eq!(table.columns, ["Id", "Name", "Status"]);
    assert_eq!(table.rows, vec![vec![Value::Int(1), "B".into(), "closed".into()]]);
}

#[test]
fn import_append_with_row_id() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let db = ws.path("copy.db");
    for _ in 0..2 {
        let out = ws
            .gridsync()
            .args(["import", "77", "--db", db.to_str().unwrap(), "--table", "copy"])
            .args(["--mode", "append", "--row-id", "row_id"])
            .args(["--token", "tok", "--api-base", &server.base_url()])
            .output()
            .unwrap();
        assert!(out.status.success(), "stderr: {}", stderr(&out));
    }

    let store = SqliteStore::open(&db).unwrap();
    let table = store.read_table(&TableRef::new("main", "copy")).unwrap();
    assert_eq!(table.columns, ["Id", "Name", "Status", "row_id"]);
    let row = vec![Value::Int(1), "B".into(), "closed".into(), Value::Int(501)];
    assert_eq!(table.rows, vec![row.clone(), row]);
}

#[test]
fn import_reload_keeps_schema() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let db = ws.path("copy.db");
    let store = SqliteStore::open(&db).unwrap();
    store
        .connection()
        .execute_batch(
            r#"CREATE TABLE copy ("Id" INTEGER, "Name" TEXT, "Status" TEXT, note TEXT);
               INSERT INTO copy VALUES (9, 'old', 'open', 'kept?');"#,
        )
        .unwrap();
    drop(store);

    let out = ws
        .gridsync()
        .args(["import", "77", "--db", db.to_str().unwrap(), "--table", "copy", "--mode", "reload"])
        .args(["--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let store = SqliteStore::open(&db).unwrap();
    let table = store.read_table(&TableRef::new("main", "copy")).unwrap();
    assert_eq!(table.columns, ["Id", "Name", "Status", "note"]);
    assert_eq!(table.rows, vec![vec![Value::Int(1), "B".into(), "closed".into(), Value::Null]]);
}

#[test]
fn import_reload_missing_table_is_database_error() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let db = ws.path("copy.db");
    let out = ws
        .gridsync()
        .args(["import", "77", "--db", db.to_str().unwrap(), "--table", "copy", "--mode", "reload"])
        .args(["--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(30), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("existing table"));
}

#[test]
fn import_row_id_clash_is_usage_error() {
    let ws = Workspace::new();
    let server = MockServer::start();
    mock_sheet(&server);

    let db = ws.path("copy.db");
    let out = ws
        .gridsync()
        .args(["import", "77", "--db", db.to_str().unwrap(), "--table", "copy", "--row-id", "Name"])
        .args(["--token", "tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
}

// ===========================================================================
// login / logout
// ===========================================================================

#[test]
fn login_then_use_saved_token() {
    let ws = Workspace::new();
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/sheets").header("authorization", "Bearer saved-tok");
        then.status(200).json_body(json!({ "data": [] }));
    });

    let out = ws
        .gridsync()
        .args(["login", "--token", "saved-tok", "--api-base", &server.base_url()])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    // No flag or env: token and api base come from the saved file.
    let out = ws.gridsync().args(["sheets"]).output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    listing.assert_calls(2);

    let out = ws.gridsync().args(["logout"]).output().unwrap();
    assert!(out.status.success());
    assert!(stderr(&out).contains("removed"));

    let out = ws.gridsync().args(["sheets"]).output().unwrap();
    assert_eq!(out.status.code(), Some(20));
}

#[test]
fn login_requires_token() {
    let ws = Workspace::new();
    let out = ws.gridsync().args(["login"]).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}
