//! One reconciliation pass: load, diff, write.

use chrono::Utc;
use log::info;

use crate::batch::{BatchOutcome, MutationBatcher, WritePaths};
use crate::diff::{diff, MutationPlan};
use crate::error::ReconError;
use crate::model::{SnapshotCounts, SyncMeta, SyncReport};
use crate::policy::ColumnPolicy;
use crate::resolver::ColumnResolver;
use crate::snapshot::SnapshotPair;
use crate::store::{RelationalStore, SheetId, TableRef, TabularStore};

/// The pair of objects being kept in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub sheet: SheetId,
    pub table: TableRef,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute and report the plan without writing.
    pub dry_run: bool,
    pub paths: WritePaths,
    /// Label carried into the report.
    pub job: Option<String>,
}

/// Drives passes between one sheet and one table.
///
/// Sheet columns are resolved once, at construction. A pass re-reads both
/// stores in full, so running twice with no outside edits produces an empty
/// second plan.
pub struct Reconciler<T, R> {
    policy: ColumnPolicy,
    target: SyncTarget,
    resolver: ColumnResolver,
    tabular: T,
    relational: R,
}

impl<T: TabularStore, R: RelationalStore> Reconciler<T, R> {
    pub fn new(
        policy: ColumnPolicy,
        target: SyncTarget,
        tabular: T,
        relational: R,
    ) -> Result<Self, ReconError> {
        let columns = tabular
            .list_columns(&target.sheet)
            .map_err(|e| ReconError::RemoteRead(Box::new(e)))?;
        let resolver = ColumnResolver::new(&policy, &columns)?;
        Ok(Self {
            policy,
            target,
            resolver,
            tabular,
            relational,
        })
    }

    pub fn policy(&self) -> &ColumnPolicy {
        &self.policy
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    pub fn load(&self) -> Result<SnapshotPair, ReconError> {
        SnapshotPair::load(
            &self.policy,
            &self.resolver,
            &self.tabular,
            &self.relational,
            &self.target.sheet,
            &self.target.table,
        )
    }

    /// Load both sides and compute the mutations without applying them.
    pub fn plan(&self) -> Result<MutationPlan, ReconError> {
        let pair = self.load()?;
        Ok(diff(&pair, &self.policy))
    }

    pub fn run(&mut self, options: &RunOptions) -> Result<SyncReport, ReconError> {
        let run_at = Utc::now().to_rfc3339();
        info!(
            "sync {} <-> {}{}",
            self.target.sheet,
            self.target.table,
            if options.dry_run { " (dry run)" } else { "" }
        );

        let pair = self.load()?;
        let snapshot = SnapshotCounts {
            local_rows: pair.local.len(),
            remote_rows: pair.remote.len(),
            skipped_rows: pair.local.skipped() + pair.remote.skipped(),
        };
        info!(
            "loaded {} relational row(s), {} sheet row(s)",
            snapshot.local_rows, snapshot.remote_rows
        );

        let plan = diff(&pair, &self.policy);
        let planned = plan.counts();
        info!(
            "plan: {} insert(s), {} sheet update(s), {} table update(s), {} sheet-only row(s)",
            planned.remote_inserts, planned.remote_updates, planned.local_updates, planned.remote_only
        );

        let applied = if options.dry_run {
            BatchOutcome::default()
        } else {
            self.apply(&plan, options.paths)?
        };

        Ok(SyncReport {
            meta: SyncMeta {
                job: options.job.clone(),
                sheet_id: self.target.sheet.to_string(),
                table: self.target.table.to_string(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at,
                dry_run: options.dry_run,
            },
            snapshot,
            planned,
            applied,
        })
    }

    /// Inserts first, then sheet updates, then table updates. The first
    /// failure stops the pass; writes already issued stay.
    fn apply(&mut self, plan: &MutationPlan, paths: WritePaths) -> Result<BatchOutcome, ReconError> {
        let batcher = MutationBatcher::new(
            &self.policy,
            &self.resolver,
            &self.target.sheet,
            &self.target.table,
        );
        let mut outcome = BatchOutcome::default();

        if paths.insert_remote {
            outcome.remote_inserted = batcher.insert_remote(&mut self.tabular, &plan.to_insert_remote)?;
        }
        if paths.update_remote {
            outcome.remote_updated = batcher.update_remote(&mut self.tabular, &plan.to_update_remote)?;
        }
        if paths.update_local {
            let (rows, flushes) = batcher.update_local(&mut self.relational, &plan.to_update_local)?;
            outcome.local_updated = rows;
            outcome.local_flushes = flushes;
        }
        Ok(outcome)
    }

    pub fn tabular(&self) -> &T {
        &self.tabular
    }

    pub fn relational(&self) -> &R {
        &self.relational
    }

    pub fn into_stores(self) -> (T, R) {
        (self.tabular, self.relational)
    }
}
