//! `gridsync-recon`: column-policy reconciliation between a SQL table and a
//! remote sheet.
//!
//! Pure engine crate: talks to both stores only through the [`TabularStore`]
//! and [`RelationalStore`] traits. No HTTP or SQL driver dependencies.
//!
//! One pass is load → diff → write:
//! both sides are snapshotted, rows are joined on the policy's primary key,
//! differences are classified per column action, and the resulting mutations
//! are written back in bounded batches.

pub mod batch;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod resolver;
pub mod snapshot;
pub mod store;

pub use config::SyncConfig;
pub use engine::{Reconciler, RunOptions, SyncTarget};
pub use error::ReconError;
pub use model::{SyncReport, Value};
pub use policy::{ColumnPolicy, ColumnSpec, DeletePolicy, SyncAction, TypeConstraint};
pub use store::{RelationalStore, SheetId, TableRef, TabularStore};
