//! Sheet-side commands: login, logout, sheets, columns, import.
//!
//! - `gridsync login`: verify and store an API token
//! - `gridsync sheets`: list sheets visible to the token
//! - `gridsync columns`: column index, id and title of one sheet
//! - `gridsync import`: download a sheet into a SQLite table

use std::path::PathBuf;

use log::debug;

use gridsync_recon::store::Table;
use gridsync_recon::{SheetId, TableRef, Value};
use gridsync_sheet_client::{
    delete_auth, load_auth, save_auth, AuthCredentials, SheetClient, DEFAULT_API_BASE,
};
use gridsync_sql::{LoadMode, SqliteStore};

use crate::exit_codes::*;
use crate::{ApiArgs, CliError};

/// Token: `--token` > `GRIDSYNC_TOKEN` > saved credentials.
/// API base: `--api-base` > `GRIDSYNC_API_BASE` > saved credentials > default.
pub fn resolve_credentials(api: ApiArgs) -> Result<AuthCredentials, CliError> {
    let saved = load_auth();
    let token = api
        .token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| saved.as_ref().map(|c| c.token.clone()))
        .ok_or_else(|| CliError::from(gridsync_sheet_client::SheetError::NotAuthenticated))?;
    let api_base = api
        .api_base
        .or_else(|| saved.map(|c| c.api_base))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    debug!("api base {api_base}");
    Ok(AuthCredentials::new(token, api_base))
}

fn client(api: ApiArgs) -> Result<SheetClient, CliError> {
    Ok(SheetClient::new(resolve_credentials(api)?)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}

// ── Login / logout ──────────────────────────────────────────────────

pub fn cmd_login(api: ApiArgs, no_verify: bool) -> Result<(), CliError> {
    let token = api.token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        CliError::usage("no token provided").with_hint("pass --token or set GRIDSYNC_TOKEN")
    })?;
    let creds = AuthCredentials::new(
        token,
        api.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
    );

    if !no_verify {
        let sheets = SheetClient::new(creds.clone())?.list_sheets()?;
        eprintln!("token ok ({} sheet(s) visible)", sheets.len());
    }

    let path = save_auth(&creds)?;
    eprintln!("saved credentials to {}", path.display());
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    if delete_auth()? {
        eprintln!("removed saved credentials");
    } else {
        eprintln!("no saved credentials");
    }
    Ok(())
}

// ── Listing ─────────────────────────────────────────────────────────

pub fn cmd_sheets(json: bool, api: ApiArgs) -> Result<(), CliError> {
    let sheets = client(api)?.list_sheets()?;
    if json {
        return print_json(&sheets);
    }
    for sheet in &sheets {
        println!(
            "{}, {}, {}",
            sheet.id,
            sheet.name,
            sheet.permalink.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ColumnOut<'a> {
    index: usize,
    id: i64,
    title: &'a str,
}

pub fn cmd_columns(sheet: String, json: bool, api: ApiArgs) -> Result<(), CliError> {
    let columns = client(api)?.list_columns(&SheetId(sheet))?;
    if json {
        let out: Vec<ColumnOut> = columns
            .iter()
            .map(|c| ColumnOut { index: c.index, id: c.id.0, title: &c.title })
            .collect();
        return print_json(&out);
    }
    for c in &columns {
        println!("{}, {}, {}", c.index, c.id.0, c.title);
    }
    Ok(())
}

// ── Import ──────────────────────────────────────────────────────────

pub struct ImportArgs {
    pub sheet: String,
    pub db: PathBuf,
    pub table: String,
    pub mode: LoadMode,
    pub row_id: Option<String>,
    pub api: ApiArgs,
}

pub fn cmd_import(args: ImportArgs) -> Result<(), CliError> {
    let ImportArgs {
        sheet,
        db,
        table,
        mode,
        row_id,
        api,
    } = args;
    let target = TableRef::parse(&table)?;
    let client = client(api)?;
    let sheet = SheetId(sheet);

    let columns = client.list_columns(&sheet)?;
    let rows = client.list_rows(&sheet)?;

    let mut names: Vec<String> = columns.iter().map(|c| c.title.clone()).collect();
    if let Some(name) = &row_id {
        if names.iter().any(|n| n == name) {
            return Err(CliError::usage(format!(
                "--row-id column '{name}' clashes with a sheet column"
            )));
        }
        names.push(name.clone());
    }

    let data = Table {
        columns: names,
        rows: rows
            .iter()
            .filter_map(|r| {
                let mut values: Vec<Value> = columns
                    .iter()
                    .map(|c| r.cells.get(&c.id).cloned().unwrap_or(Value::Null))
                    .collect();
                if values.iter().all(Value::is_blank) {
                    return None;
                }
                if row_id.is_some() {
                    values.push(Value::Int(r.row_id.0));
                }
                Some(values)
            })
            .collect(),
    };
    debug!("importing sheet {sheet} into {target} ({mode})");

    let mut store = SqliteStore::open(&db).map_err(|e| {
        CliError::new(EXIT_DATABASE, format!("cannot open {}: {e}", db.display()))
    })?;
    let loaded = store
        .load_table(&target, &data, mode)
        .map_err(|e| CliError::new(EXIT_DATABASE, e.to_string()))?;

    eprintln!(
        "imported {loaded} row(s), {} column(s) into {target} ({})",
        data.columns.len(),
        db.display()
    );
    Ok(())
}
