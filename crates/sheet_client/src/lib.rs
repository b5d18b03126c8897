//! Sheet API client: the remote side of a gridsync job.
//!
//! Blocking HTTP with bearer-token auth. Implements the engine's
//! [`gridsync_recon::TabularStore`] seam so the reconciler never sees HTTP.

mod auth;
mod client;

pub use auth::{
    auth_file_path, delete_auth, delete_auth_at, load_auth, load_auth_from, save_auth,
    save_auth_to, AuthCredentials, DEFAULT_API_BASE,
};
pub use client::{SheetClient, SheetError, SheetSummary};
