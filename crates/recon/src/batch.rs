//! Mutation batcher: turns a [`MutationPlan`] into store writes.
//!
//! Three independent paths. Sheet inserts and sheet updates each go out in a
//! single call. Relational updates are flushed every [`LOCAL_BATCH_SIZE`]
//! statements; a failed flush does not roll back earlier ones.

use log::{debug, info};
use serde::Serialize;

use crate::diff::{CellChange, LocalUpdate, RemoteInsert, RemoteUpdate};
use crate::error::{ReconError, Side};
use crate::model::Value;
use crate::normalize::{strict_for, CURRENCY_FORMAT};
use crate::policy::{ColumnPolicy, TypeConstraint};
use crate::resolver::ColumnResolver;
use crate::store::{
    CellWrite, NewRow, RelationalStore, RowUpdate, SheetId, TableRef, TabularStore, UpdateStatement,
};

/// Statements per relational flush.
pub const LOCAL_BATCH_SIZE: usize = 100;

/// Which write paths a run may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePaths {
    pub insert_remote: bool,
    pub update_remote: bool,
    pub update_local: bool,
}

impl Default for WritePaths {
    fn default() -> Self {
        Self {
            insert_remote: true,
            update_remote: true,
            update_local: true,
        }
    }
}

/// Writes actually issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub remote_inserted: usize,
    pub remote_updated: usize,
    pub local_updated: usize,
    pub local_flushes: usize,
}

pub struct MutationBatcher<'a> {
    policy: &'a ColumnPolicy,
    resolver: &'a ColumnResolver,
    sheet: &'a SheetId,
    table: &'a TableRef,
}

impl<'a> MutationBatcher<'a> {
    pub fn new(
        policy: &'a ColumnPolicy,
        resolver: &'a ColumnResolver,
        sheet: &'a SheetId,
        table: &'a TableRef,
    ) -> Self {
        Self {
            policy,
            resolver,
            sheet,
            table,
        }
    }

    /// Create all missing rows on the sheet in one call.
    pub fn insert_remote<T: TabularStore>(
        &self,
        store: &mut T,
        inserts: &[RemoteInsert],
    ) -> Result<usize, ReconError> {
        if inserts.is_empty() {
            return Ok(0);
        }
        let rows = inserts
            .iter()
            .map(|ins| self.new_row(ins))
            .collect::<Result<Vec<_>, _>>()?;

        info!("creating {} sheet row(s)", rows.len());
        store
            .create_rows(self.sheet, &rows)
            .map_err(|e| ReconError::RemoteWrite(Box::new(e)))?;
        Ok(rows.len())
    }

    /// Send changed PUSH cells for existing sheet rows in one call.
    pub fn update_remote<T: TabularStore>(
        &self,
        store: &mut T,
        updates: &[RemoteUpdate],
    ) -> Result<usize, ReconError> {
        if updates.is_empty() {
            return Ok(0);
        }
        let rows = updates
            .iter()
            .map(|up| self.row_update(up))
            .collect::<Result<Vec<_>, _>>()?;

        info!("updating {} sheet row(s)", rows.len());
        store
            .update_rows(self.sheet, &rows)
            .map_err(|e| ReconError::RemoteWrite(Box::new(e)))?;
        Ok(rows.len())
    }

    /// Write changed PULL cells to the table. Returns `(rows, flushes)`.
    pub fn update_local<R: RelationalStore>(
        &self,
        store: &mut R,
        updates: &[LocalUpdate],
    ) -> Result<(usize, usize), ReconError> {
        let mut written = 0;
        let mut flushes = 0;
        for chunk in updates.chunks(LOCAL_BATCH_SIZE) {
            let statements: Vec<UpdateStatement> = chunk.iter().map(|u| self.statement(u)).collect();
            debug!(
                "flushing {} update statement(s) to {} (flush {})",
                statements.len(),
                self.table,
                flushes + 1
            );
            store
                .execute_updates(self.table, &statements)
                .map_err(|e| ReconError::RelationalWrite {
                    committed: flushes,
                    source: Box::new(e),
                })?;
            written += statements.len();
            flushes += 1;
        }
        if written > 0 {
            info!("updated {written} row(s) in {} over {flushes} flush(es)", self.table);
        }
        Ok((written, flushes))
    }

    pub fn new_row(&self, insert: &RemoteInsert) -> Result<NewRow, ReconError> {
        let cells = insert
            .cells
            .iter()
            .map(|c| self.cell_write(c, false))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NewRow {
            to_bottom: true,
            cells,
        })
    }

    pub fn row_update(&self, update: &RemoteUpdate) -> Result<RowUpdate, ReconError> {
        let cells = update
            .cells
            .iter()
            .map(|c| self.cell_write(c, true))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RowUpdate {
            row_id: update.row_id,
            cells,
        })
    }

    /// Parameterized `UPDATE` keyed by the row's relational primary key.
    pub fn statement(&self, update: &LocalUpdate) -> UpdateStatement {
        UpdateStatement {
            assignments: update
                .cells
                .iter()
                .map(|c| (self.policy.column(c.slot).local_name.clone(), c.value.clone()))
                .collect(),
            key_column: self.policy.primary_key_local_name().to_string(),
            key: update.key_value.clone(),
        }
    }

    fn cell_write(&self, change: &CellChange, with_display: bool) -> Result<CellWrite, ReconError> {
        let spec = self.policy.column(change.slot);
        let column_id = self
            .resolver
            .id(change.slot)
            .ok_or_else(|| ReconError::UnknownColumn {
                side: Side::Remote,
                column: spec.remote_name.clone(),
            })?;

        let currency = spec.constraint == TypeConstraint::Currency;
        let display_value = match &change.value {
            Value::Null => None,
            v if currency && with_display => Some(v.to_string()),
            _ => None,
        };

        Ok(CellWrite {
            column_id,
            value: change.value.clone(),
            strict: strict_for(spec.constraint),
            format: currency.then(|| CURRENCY_FORMAT.to_string()),
            display_value,
        })
    }
}
