//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args, missing file) |
//! | 3-9     | job        | Job file problems                        |
//! | 10-19   | sync       | Reconciliation pass failures             |
//! | 20-29   | sheet      | Sheet API                                |
//! | 30-39   | database   | Local SQL database                       |

use gridsync_recon::ReconError;
use gridsync_sheet_client::SheetError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Job (3-9)
// =============================================================================

/// Job file could not be read.
pub const EXIT_JOB_READ: u8 = 3;

/// Job file parsed but is invalid (policy, table name, unknown keys).
pub const EXIT_JOB_INVALID: u8 = 4;

// =============================================================================
// Sync (10-19)
// =============================================================================

/// A policy column is missing from the sheet or the table.
pub const EXIT_SYNC_UNKNOWN_COLUMN: u8 = 10;

/// Snapshot load failed; nothing was written.
pub const EXIT_SYNC_READ: u8 = 11;

/// Sheet write failed; earlier paths of the pass may have been applied.
pub const EXIT_SYNC_REMOTE_WRITE: u8 = 12;

/// Table write failed; flushes before the failing one stay committed.
pub const EXIT_SYNC_LOCAL_WRITE: u8 = 13;

// =============================================================================
// Sheet API (20-29)
// =============================================================================

/// No token from flag, environment or saved credentials.
pub const EXIT_SHEET_NOT_AUTH: u8 = 20;

/// Token rejected (401/403).
pub const EXIT_SHEET_AUTH: u8 = 21;

/// Network failure or unexpected HTTP status.
pub const EXIT_SHEET_NETWORK: u8 = 22;

/// Request rejected as invalid (400/422).
pub const EXIT_SHEET_VALIDATION: u8 = 23;

// =============================================================================
// Database (30-39)
// =============================================================================

/// SQLite open, read or write failure outside a sync pass.
pub const EXIT_DATABASE: u8 = 30;

// =============================================================================
// Mapping
// =============================================================================

pub fn sheet_exit_code(err: &SheetError) -> u8 {
    match err {
        SheetError::NotAuthenticated => EXIT_SHEET_NOT_AUTH,
        e if e.is_auth() => EXIT_SHEET_AUTH,
        SheetError::Validation(_) => EXIT_SHEET_VALIDATION,
        SheetError::Network(_) | SheetError::Http(..) | SheetError::Parse(_) => EXIT_SHEET_NETWORK,
        SheetError::Io(_) => EXIT_ERROR,
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Configuration(_) => EXIT_JOB_INVALID,
        ReconError::UnknownColumn { .. } => EXIT_SYNC_UNKNOWN_COLUMN,
        ReconError::RemoteRead(source) => match source.downcast_ref::<SheetError>() {
            Some(e) if e.is_auth() => EXIT_SHEET_AUTH,
            _ => EXIT_SYNC_READ,
        },
        ReconError::RelationalRead(_) => EXIT_SYNC_READ,
        ReconError::RemoteWrite(_) => EXIT_SYNC_REMOTE_WRITE,
        ReconError::RelationalWrite { .. } => EXIT_SYNC_LOCAL_WRITE,
    }
}
