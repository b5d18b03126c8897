//! Row matcher/differ: classifies joined rows into the three mutation queues.
//!
//! Pure function of the two snapshots and the policy; no store access.

use log::warn;

use crate::matcher::{join_on_key, MatchedRow};
use crate::model::{PlanCounts, Value};
use crate::normalize::normalize;
use crate::policy::{ColumnPolicy, ColumnSlot, SyncAction};
use crate::snapshot::{SnapshotPair, SnapshotRow};
use crate::store::RowId;

/// One column's new value, already normalized for the target side.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    pub slot: ColumnSlot,
    pub value: Value,
}

/// A relational row missing from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteInsert {
    pub key: String,
    pub cells: Vec<CellChange>,
}

/// Changed PUSH cells for an existing sheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUpdate {
    pub key: String,
    pub row_id: RowId,
    pub cells: Vec<CellChange>,
}

/// Changed PULL cells for an existing relational row.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUpdate {
    pub key: String,
    /// Primary key exactly as the table holds it; used in the WHERE clause.
    pub key_value: Value,
    pub cells: Vec<CellChange>,
}

/// Pending mutations for one pass. Rebuilt every pass, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationPlan {
    pub to_insert_remote: Vec<RemoteInsert>,
    pub to_update_remote: Vec<RemoteUpdate>,
    pub to_update_local: Vec<LocalUpdate>,
    /// Keys present only on the sheet.
    pub remote_only: Vec<String>,
}

impl MutationPlan {
    /// True when no write would be issued.
    pub fn is_empty(&self) -> bool {
        self.to_insert_remote.is_empty()
            && self.to_update_remote.is_empty()
            && self.to_update_local.is_empty()
    }

    pub fn counts(&self) -> PlanCounts {
        PlanCounts {
            remote_inserts: self.to_insert_remote.len(),
            remote_updates: self.to_update_remote.len(),
            local_updates: self.to_update_local.len(),
            remote_only: self.remote_only.len(),
        }
    }
}

pub fn diff(pair: &SnapshotPair, policy: &ColumnPolicy) -> MutationPlan {
    let joined = join_on_key(&pair.local, &pair.remote);
    let mut plan = MutationPlan::default();

    for row in &joined.local_only {
        plan.to_insert_remote.push(build_insert(row, policy));
    }

    for m in &joined.matched {
        let pushed = changed_cells(m, policy, SyncAction::Push);
        if !pushed.is_empty() {
            match m.remote.row_id {
                Some(row_id) => plan.to_update_remote.push(RemoteUpdate {
                    key: m.key().to_string(),
                    row_id,
                    cells: pushed,
                }),
                None => warn!("sheet row for key '{}' has no row id; skipping update", m.key()),
            }
        }

        let pulled = changed_cells(m, policy, SyncAction::Pull);
        if !pulled.is_empty() {
            plan.to_update_local.push(LocalUpdate {
                key: m.key().to_string(),
                key_value: m.local.record.get(policy.primary_key()).clone(),
                cells: pulled,
            });
        }
    }

    // Deletion propagation is not supported; orphans are only reported.
    plan.remote_only = joined.remote_only.iter().map(|r| r.key.clone()).collect();

    plan
}

/// Cells for a new sheet row: PRIMARY_KEY, PUSH and POPULATE columns with a value.
fn build_insert(row: &SnapshotRow, policy: &ColumnPolicy) -> RemoteInsert {
    let cells = policy
        .columns()
        .filter(|(_, c)| {
            matches!(
                c.action,
                SyncAction::PrimaryKey | SyncAction::Push | SyncAction::Populate
            )
        })
        .filter_map(|(slot, c)| {
            let value = normalize(c.constraint, row.record.get(slot));
            (!matches!(value, Value::Null)).then_some(CellChange { slot, value })
        })
        .collect();

    RemoteInsert {
        key: row.key.clone(),
        cells,
    }
}

/// Columns with `action` whose normalized values differ. The returned value
/// comes from the authoritative side: the table for PUSH, the sheet for PULL.
fn changed_cells(m: &MatchedRow<'_>, policy: &ColumnPolicy, action: SyncAction) -> Vec<CellChange> {
    policy
        .columns_with_action(action)
        .filter_map(|(slot, c)| {
            let local = normalize(c.constraint, m.local.record.get(slot));
            let remote = normalize(c.constraint, m.remote.record.get(slot));
            if local == remote {
                return None;
            }
            let value = if action == SyncAction::Pull { remote } else { local };
            Some(CellChange { slot, value })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::policy::{ColumnSpec, TypeConstraint};
    use crate::resolver::ColumnResolver;
    use crate::snapshot::Snapshot;
    use crate::store::{ColumnId, ColumnInfo, SheetRow, Table};

    fn policy() -> ColumnPolicy {
        ColumnPolicy::new(vec![
            ColumnSpec::new("id", SyncAction::PrimaryKey),
            ColumnSpec::new("name", SyncAction::Push),
            ColumnSpec::new("status", SyncAction::Pull),
            ColumnSpec::new("price", SyncAction::Push).constraint(TypeConstraint::Currency),
            ColumnSpec::new("created", SyncAction::Populate),
            ColumnSpec::new("scratch", SyncAction::Ignore),
        ])
        .unwrap()
    }

    fn slot(p: &ColumnPolicy, name: &str) -> ColumnSlot {
        p.columns().find(|(_, c)| c.local_name == name).unwrap().0
    }

    /// Local rows are (id, name, status, price, created, scratch).
    fn pair(p: &ColumnPolicy, local: Vec<Vec<Value>>, remote: Vec<(i64, Vec<Value>)>) -> SnapshotPair {
        let names = ["id", "name", "status", "price", "created", "scratch"];
        let table = Table {
            columns: names.iter().map(|s| s.to_string()).collect(),
            rows: local,
        };
        let cols: Vec<ColumnInfo> = names
            .iter()
            .enumerate()
            .map(|(i, n)| ColumnInfo { id: ColumnId(i as i64 + 10), index: i, title: n.to_string() })
            .collect();
        let resolver = ColumnResolver::new(p, &cols).unwrap();
        let sheet_rows: Vec<SheetRow> = remote
            .into_iter()
            .map(|(row_id, vals)| SheetRow {
                row_id: RowId(row_id),
                cells: vals
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (ColumnId(i as i64 + 10), v))
                    .collect::<HashMap<_, _>>(),
            })
            .collect();
        SnapshotPair {
            local: Snapshot::from_table(p, &table).unwrap(),
            remote: Snapshot::from_sheet(p, &resolver, &sheet_rows),
        }
    }

    fn row(id: i64, name: &str, status: &str, price: Value, created: &str) -> Vec<Value> {
        vec![
            Value::Int(id),
            Value::from(name),
            Value::from(status),
            price,
            Value::from(created),
            Value::from("local scratch"),
        ]
    }

    #[test]
    fn push_and_pull_scenario() {
        let p = policy();
        let snaps = pair(
            &p,
            vec![row(1, "A", "open", Value::Float(10.0), "2024-01-01")],
            vec![(500, row(1, "B", "closed", Value::from("10.00"), "changed later"))],
        );
        let plan = diff(&snaps, &p);

        assert!(plan.to_insert_remote.is_empty());
        assert_eq!(plan.to_update_remote.len(), 1);
        let up = &plan.to_update_remote[0];
        assert_eq!(up.row_id, RowId(500));
        assert_eq!(
            up.cells,
            vec![CellChange { slot: slot(&p, "name"), value: Value::from("A") }]
        );

        assert_eq!(plan.to_update_local.len(), 1);
        let lu = &plan.to_update_local[0];
        assert_eq!(lu.key_value, Value::Int(1));
        assert_eq!(
            lu.cells,
            vec![CellChange { slot: slot(&p, "status"), value: Value::from("closed") }]
        );
    }

    #[test]
    fn equal_rows_are_noops() {
        let p = policy();
        let snaps = pair(
            &p,
            vec![row(7, "A", "open", Value::Float(12.5), "x")],
            vec![(1, row(7, "A", "open", Value::from("12.50"), "y"))],
        );
        let plan = diff(&snaps, &p);
        assert!(plan.is_empty());
        assert_eq!(plan.counts(), PlanCounts::default());
    }

    #[test]
    fn insert_cells_limited_to_push_populate_and_key() {
        let p = policy();
        let snaps = pair(&p, vec![row(42, "New", "open", Value::Int(3), "today")], vec![]);
        let plan = diff(&snaps, &p);

        assert_eq!(plan.to_insert_remote.len(), 1);
        let ins = &plan.to_insert_remote[0];
        assert_eq!(ins.key, "42");
        let names: Vec<&str> = ins
            .cells
            .iter()
            .map(|c| p.column(c.slot).local_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "name", "price", "created"]);
        assert_eq!(ins.cells[2].value, Value::from("3.00"));
    }

    #[test]
    fn insert_skips_null_cells() {
        let p = policy();
        let local = vec![vec![
            Value::Int(5),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::from(""),
            Value::Null,
        ]];
        let plan = diff(&pair(&p, local, vec![]), &p);
        assert_eq!(plan.to_insert_remote[0].cells.len(), 1);
    }

    #[test]
    fn remote_only_rows_are_reported_not_planned() {
        let p = policy();
        let snaps = pair(&p, vec![], vec![(9, row(3, "Z", "open", Value::Null, ""))]);
        let plan = diff(&snaps, &p);
        assert!(plan.is_empty());
        assert_eq!(plan.remote_only, vec!["3".to_string()]);
        assert_eq!(plan.counts().remote_only, 1);
    }

    #[test]
    fn pull_to_blank_writes_null() {
        let p = policy();
        let snaps = pair(
            &p,
            vec![row(1, "A", "open", Value::Null, "")],
            vec![(2, row(1, "A", "", Value::Null, ""))],
        );
        let plan = diff(&snaps, &p);
        assert_eq!(plan.to_update_local[0].cells[0].value, Value::Null);
    }
}
