// gridsync CLI - keep a SQL table and a sheet in sync

mod exit_codes;
mod sheets;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "gridsync")]
#[command(about = "Reconcile a SQL table with a remote sheet, column by column")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// `import` load behavior.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Drop the table and recreate it from the sheet's columns
    Replace,
    /// Empty an existing table, keep its schema
    Reload,
    /// Add rows, creating the table if missing
    Append,
}

impl From<ImportMode> for gridsync_sql::LoadMode {
    fn from(mode: ImportMode) -> Self {
        match mode {
            ImportMode::Replace => Self::Replace,
            ImportMode::Reload => Self::Reload,
            ImportMode::Append => Self::Append,
        }
    }
}

/// Token and endpoint overrides shared by every command that calls the API.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ApiArgs {
    /// API token (falls back to saved credentials from `gridsync login`)
    #[arg(long, env = "GRIDSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, env = "GRIDSYNC_API_BASE")]
    pub api_base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass from a job file
    #[command(after_help = "\
Examples:
  gridsync run orders.sync.toml
  gridsync run orders.sync.toml --dry-run
  gridsync run orders.sync.toml --json > report.json
  gridsync run orders.sync.toml --no-pull")]
    Run {
        /// Path to the .sync.toml job file
        job: PathBuf,

        /// Compute and report the plan without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Do not create missing rows on the sheet
        #[arg(long)]
        no_insert: bool,

        /// Do not update PUSH columns on the sheet
        #[arg(long)]
        no_push: bool,

        /// Do not update PULL columns in the table
        #[arg(long)]
        no_pull: bool,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Parse and validate a job file without contacting anything
    #[command(after_help = "\
Examples:
  gridsync validate orders.sync.toml")]
    Validate {
        /// Path to the .sync.toml job file
        job: PathBuf,
    },

    /// Print index, id and title of every column of a sheet
    Columns {
        sheet: String,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// List sheets visible to the token
    Sheets {
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Download a sheet into a SQLite table
    #[command(after_help = "\
Examples:
  gridsync import 4583173393803140 --db orders.db --table orders
  gridsync import 4583173393803140 --db orders.db --table '[main].[orders_copy]' --mode append
  gridsync import 4583173393803140 --db orders.db --table orders --mode reload --row-id row_id")]
    Import {
        sheet: String,

        /// SQLite database file (created if missing)
        #[arg(long)]
        db: PathBuf,

        /// Target table: `table`, `schema.table` or `[schema].[table]`
        #[arg(long)]
        table: String,

        /// How existing table contents are treated
        #[arg(long, value_enum, default_value_t = ImportMode::Replace)]
        mode: ImportMode,

        /// Also store each sheet row id in this column
        #[arg(long, value_name = "COLUMN")]
        row_id: Option<String>,

        #[command(flatten)]
        api: ApiArgs,
    },

    /// Verify and save an API token
    Login {
        #[command(flatten)]
        api: ApiArgs,

        /// Save without calling the API
        #[arg(long)]
        no_verify: bool,
    },

    /// Remove saved credentials
    Logout,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  gridsync-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Logs go to stderr so `--json` output on stdout stays clean.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            job,
            dry_run,
            json,
            no_insert,
            no_push,
            no_pull,
            api,
        } => sync::cmd_run(sync::RunArgs {
            job,
            dry_run,
            json,
            no_insert,
            no_push,
            no_pull,
            api,
        }),
        Commands::Validate { job } => sync::cmd_validate(job),
        Commands::Columns { sheet, json, api } => sheets::cmd_columns(sheet, json, api),
        Commands::Sheets { json, api } => sheets::cmd_sheets(json, api),
        Commands::Import {
            sheet,
            db,
            table,
            mode,
            row_id,
            api,
        } => sheets::cmd_import(sheets::ImportArgs {
            sheet,
            db,
            table,
            mode: mode.into(),
            row_id,
            api,
        }),
        Commands::Login { api, no_verify } => sheets::cmd_login(api, no_verify),
        Commands::Logout => sheets::cmd_logout(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<gridsync_sheet_client::SheetError> for CliError {
    fn from(err: gridsync_sheet_client::SheetError) -> Self {
        use gridsync_sheet_client::SheetError;
        let code = exit_codes::sheet_exit_code(&err);
        let hint = match &err {
            SheetError::NotAuthenticated => {
                Some("run `gridsync login --token <TOKEN>` or set GRIDSYNC_TOKEN".to_string())
            }
            e if e.is_auth() => Some("the token was rejected; generate a new one and log in again".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<gridsync_recon::ReconError> for CliError {
    fn from(err: gridsync_recon::ReconError) -> Self {
        use gridsync_recon::ReconError;
        let code = exit_codes::recon_exit_code(&err);
        let hint = match &err {
            ReconError::UnknownColumn { .. } => {
                Some("column names must match exactly; `gridsync columns <sheet>` lists sheet titles".to_string())
            }
            ReconError::RelationalWrite { committed, .. } if *committed > 0 => Some(format!(
                "{committed} flush(es) were committed before the failure; rerun to finish"
            )),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}
