//! Column title → stable column id lookup, built once per engine.

use std::collections::HashMap;

use crate::error::{ReconError, Side};
use crate::policy::{ColumnPolicy, ColumnSlot};
use crate::store::{ColumnId, ColumnInfo};

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    /// Indexed by policy slot. `None` only for IGNORE columns.
    ids: Vec<Option<ColumnId>>,
}

impl ColumnResolver {
    /// Map every tracked policy column to its sheet column id.
    ///
    /// Titles match exactly (trailing spaces included). IGNORE columns are not
    /// required to exist.
    pub fn new(policy: &ColumnPolicy, columns: &[ColumnInfo]) -> Result<Self, ReconError> {
        let by_title: HashMap<String, ColumnId> =
            columns.iter().map(|c| (c.title.clone(), c.id)).collect();

        let mut ids = Vec::with_capacity(policy.len());
        for (_, spec) in policy.columns() {
            let id = by_title.get(&spec.remote_name).copied();
            if id.is_none() && spec.is_tracked() {
                return Err(ReconError::UnknownColumn {
                    side: Side::Remote,
                    column: spec.remote_name.clone(),
                });
            }
            ids.push(id);
        }

        Ok(Self { ids })
    }

    /// Column id for a policy slot.
    pub fn id(&self, slot: ColumnSlot) -> Option<ColumnId> {
        self.ids.get(slot.index()).copied().flatten()
    }
}
