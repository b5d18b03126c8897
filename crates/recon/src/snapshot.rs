//! Point-in-time copies of both sides, projected onto the column policy.

use std::collections::HashSet;

use log::warn;

use crate::error::{ReconError, Side};
use crate::model::Value;
use crate::policy::{ColumnPolicy, ColumnSlot};
use crate::resolver::ColumnResolver;
use crate::store::{RelationalStore, RowId, SheetId, SheetRow, Table, TableRef, TabularStore};

/// A row keyed by policy slot rather than by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    fn blank(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
        }
    }

    pub fn get(&self, slot: ColumnSlot) -> &Value {
        &self.values[slot.index()]
    }

    fn set(&mut self, slot: ColumnSlot, value: Value) {
        self.values[slot.index()] = value;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    /// Canonical join key (see [`Value::key_string`]).
    pub key: String,
    /// Store-assigned id; only set on the remote side.
    pub row_id: Option<RowId>,
    pub record: Record,
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    rows: Vec<SnapshotRow>,
    skipped: usize,
}

impl Snapshot {
    /// Project a relational table onto the policy.
    ///
    /// Every tracked policy column must be present in the table.
    pub fn from_table(policy: &ColumnPolicy, table: &Table) -> Result<Self, ReconError> {
        let mut positions: Vec<(ColumnSlot, usize)> = Vec::new();
        for (slot, spec) in policy.tracked() {
            let pos = table
                .columns
                .iter()
                .position(|c| *c == spec.local_name)
                .ok_or_else(|| ReconError::UnknownColumn {
                    side: Side::Local,
                    column: spec.local_name.clone(),
                })?;
            positions.push((slot, pos));
        }

        let mut builder = Builder::new(Side::Local);
        for row in &table.rows {
            let mut record = Record::blank(policy.len());
            for &(slot, pos) in &positions {
                if let Some(v) = row.get(pos) {
                    record.set(slot, v.clone());
                }
            }
            builder.push(policy, record, None);
        }
        Ok(builder.finish())
    }

    /// Project sheet rows onto the policy. Rows whose tracked cells are all
    /// blank are dropped.
    pub fn from_sheet(policy: &ColumnPolicy, resolver: &ColumnResolver, rows: &[SheetRow]) -> Self {
        let mut builder = Builder::new(Side::Remote);
        for row in rows {
            let mut record = Record::blank(policy.len());
            let mut any = false;
            for (slot, _) in policy.tracked() {
                let Some(id) = resolver.id(slot) else { continue };
                if let Some(v) = row.cells.get(&id) {
                    any |= !v.is_blank();
                    record.set(slot, v.clone());
                }
            }
            if !any {
                builder.skipped += 1;
                continue;
            }
            builder.push(policy, record, Some(row.row_id));
        }
        builder.finish()
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped while loading.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

struct Builder {
    side: Side,
    rows: Vec<SnapshotRow>,
    seen: HashSet<String>,
    skipped: usize,
}

impl Builder {
    fn new(side: Side) -> Self {
        Self {
            side,
            rows: Vec::new(),
            seen: HashSet::new(),
            skipped: 0,
        }
    }

    fn push(&mut self, policy: &ColumnPolicy, record: Record, row_id: Option<RowId>) {
        let Some(key) = record.get(policy.primary_key()).key_string() else {
            warn!("skipping {} row with blank primary key", self.side);
            self.skipped += 1;
            return;
        };
        if !self.seen.insert(key.clone()) {
            warn!("skipping duplicate {} row for key '{key}'", self.side);
            self.skipped += 1;
            return;
        }
        self.rows.push(SnapshotRow { key, row_id, record });
    }

    fn finish(self) -> Snapshot {
        Snapshot {
            rows: self.rows,
            skipped: self.skipped,
        }
    }
}

/// Both sides, loaded fresh for one pass.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPair {
    pub local: Snapshot,
    pub remote: Snapshot,
}

impl SnapshotPair {
    /// Read both stores in full. Any read failure aborts before writes start.
    pub fn load<T: TabularStore, R: RelationalStore>(
        policy: &ColumnPolicy,
        resolver: &ColumnResolver,
        tabular: &T,
        relational: &R,
        sheet: &SheetId,
        table: &TableRef,
    ) -> Result<Self, ReconError> {
        let sheet_rows = tabular
            .list_rows(sheet)
            .map_err(|e| ReconError::RemoteRead(Box::new(e)))?;
        let remote = Snapshot::from_sheet(policy, resolver, &sheet_rows);

        let table_data = relational
            .read_table(table)
            .map_err(|e| ReconError::RelationalRead(Box::new(e)))?;
        let local = Snapshot::from_table(policy, &table_data)?;

        Ok(Self { local, remote })
    }
}
