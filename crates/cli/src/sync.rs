//! `gridsync run` and `gridsync validate`: job-file driven reconciliation.

use std::path::{Path, PathBuf};

use log::info;

use gridsync_recon::batch::WritePaths;
use gridsync_recon::{Reconciler, RunOptions, SyncConfig, SyncReport, SyncTarget};
use gridsync_sheet_client::SheetClient;
use gridsync_sql::SqliteStore;

use crate::exit_codes::{EXIT_DATABASE, EXIT_JOB_INVALID, EXIT_JOB_READ};
use crate::sheets::resolve_credentials;
use crate::{ApiArgs, CliError};

pub struct RunArgs {
    pub job: PathBuf,
    pub dry_run: bool,
    pub json: bool,
    pub no_insert: bool,
    pub no_push: bool,
    pub no_pull: bool,
    pub api: ApiArgs,
}

fn load_job(path: &Path) -> Result<SyncConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_JOB_READ, format!("cannot read {}: {e}", path.display()))
    })?;
    SyncConfig::from_toml(&text).map_err(|e| {
        CliError::new(EXIT_JOB_INVALID, format!("{}: {e}", path.display()))
    })
}

/// Relative database paths resolve against the job file's directory.
pub fn database_path(job: &Path, database: &str) -> PathBuf {
    let db = Path::new(database);
    if db.is_absolute() {
        return db.to_path_buf();
    }
    job.parent().unwrap_or_else(|| Path::new(".")).join(db)
}

pub fn cmd_validate(job: PathBuf) -> Result<(), CliError> {
    let config = load_job(&job)?;
    let policy = config.policy()?;
    let table = config.table_ref()?;

    eprintln!("{}: ok", job.display());
    eprintln!("  sheet:   {}", config.sheet_id());
    eprintln!(
        "  table:   {} in {}",
        table,
        database_path(&job, &config.table.database).display()
    );
    eprintln!(
        "  columns: {} ({} tracked), key {} -> {}",
        policy.len(),
        policy.tracked().count(),
        policy.primary_key_remote_name(),
        policy.primary_key_local_name(),
    );
    Ok(())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_job(&args.job)?;
    let policy = config.policy()?;
    let target = SyncTarget {
        sheet: config.sheet_id(),
        table: config.table_ref()?,
    };

    let api = ApiArgs {
        token: args.api.token,
        api_base: args.api.api_base.or_else(|| config.sheet.api_base.clone()),
    };
    let client = SheetClient::new(resolve_credentials(api)?)?;

    let db_path = database_path(&args.job, &config.table.database);
    if !db_path.exists() {
        return Err(CliError::new(
            EXIT_DATABASE,
            format!("database not found: {}", db_path.display()),
        ));
    }
    info!("opening {}", db_path.display());
    let store = SqliteStore::open(&db_path).map_err(|e| {
        CliError::new(EXIT_DATABASE, format!("cannot open {}: {e}", db_path.display()))
    })?;

    let options = RunOptions {
        dry_run: args.dry_run,
        paths: WritePaths {
            insert_remote: !args.no_insert,
            update_remote: !args.no_push,
            update_local: !args.no_pull,
        },
        job: Some(config.name.clone()),
    };

    let mut engine = Reconciler::new(policy, target, client, store)?;
    let report = engine.run(&options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(crate::exit_codes::EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json}");
    }
    print_summary(&config.name, &report, &options.paths);
    Ok(())
}

/// Human summary to stderr.
fn print_summary(name: &str, report: &SyncReport, paths: &WritePaths) {
    let snap = &report.snapshot;
    let plan = &report.planned;
    let applied = &report.applied;

    eprintln!(
        "{name}: {} table row(s), {} sheet row(s){}",
        snap.local_rows,
        snap.remote_rows,
        if snap.skipped_rows > 0 {
            format!(", {} skipped", snap.skipped_rows)
        } else {
            String::new()
        }
    );

    if report.meta.dry_run {
        eprintln!(
            "dry run: would insert {}, update {} sheet row(s), update {} table row(s)",
            plan.remote_inserts, plan.remote_updates, plan.local_updates
        );
    } else {
        eprintln!(
            "inserted {}, updated {} sheet row(s), updated {} table row(s) in {} flush(es)",
            applied.remote_inserted, applied.remote_updated, applied.local_updated, applied.local_flushes
        );
        let skipped: Vec<&str> = [
            (!paths.insert_remote && plan.remote_inserts > 0, "insert"),
            (!paths.update_remote && plan.remote_updates > 0, "push"),
            (!paths.update_local && plan.local_updates > 0, "pull"),
        ]
        .iter()
        .filter(|(skipped, _)| *skipped)
        .map(|(_, name)| *name)
        .collect();
        if !skipped.is_empty() {
            eprintln!("disabled with pending changes: {}", skipped.join(", "));
        }
    }

    if plan.remote_only > 0 {
        eprintln!(
            "{} sheet row(s) have no matching table row (left in place)",
            plan.remote_only
        );
    }
}
