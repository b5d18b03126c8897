use std::collections::{HashMap, HashSet};

use crate::snapshot::{Snapshot, SnapshotRow};

/// The relational and remote views of one logical row.
#[derive(Debug, Clone, Copy)]
pub struct MatchedRow<'a> {
    pub local: &'a SnapshotRow,
    pub remote: &'a SnapshotRow,
}

impl MatchedRow<'_> {
    pub fn key(&self) -> &str {
        &self.local.key
    }
}

#[derive(Debug, Default)]
pub struct JoinOutput<'a> {
    pub matched: Vec<MatchedRow<'a>>,
    pub local_only: Vec<&'a SnapshotRow>,
    pub remote_only: Vec<&'a SnapshotRow>,
}

/// Outer-join two snapshots on their canonical primary key.
///
/// Output follows the relational snapshot's row order; `remote_only` follows
/// the sheet's.
pub fn join_on_key<'a>(local: &'a Snapshot, remote: &'a Snapshot) -> JoinOutput<'a> {
    let remote_by_key: HashMap<&str, &SnapshotRow> =
        remote.rows().iter().map(|r| (r.key.as_str(), r)).collect();

    let mut out = JoinOutput::default();
    for l in local.rows() {
        match remote_by_key.get(l.key.as_str()) {
            Some(r) => out.matched.push(MatchedRow { local: l, remote: r }),
            None => out.local_only.push(l),
        }
    }

    let local_keys: HashSet<&str> =
        local.rows().iter().map(|l| l.key.as_str()).collect();
    out.remote_only = remote
        .rows()
        .iter()
        .filter(|r| !local_keys.contains(r.key.as_str()))
        .collect();

    out
}
