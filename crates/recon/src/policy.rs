//! Column policy: which side owns each column and how its values normalize.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Action + constraint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SyncAction {
    /// Join key between the table and the sheet. Exactly one per policy.
    PrimaryKey,
    /// Table is authoritative; differences are written to the sheet.
    Push,
    /// Sheet is authoritative; differences are written to the table.
    Pull,
    /// Written to the sheet once, when the row is created. Never compared.
    Populate,
    /// Never read or written.
    Ignore,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "primary_key",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Populate => "populate",
            Self::Ignore => "ignore",
        }
    }
}

impl FromStr for SyncAction {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "primary_key" => Ok(Self::PrimaryKey),
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "populate" => Ok(Self::Populate),
            "ignore" => Ok(Self::Ignore),
            _ => Err(ReconError::config(format!(
                "unknown column action '{s}' (expected primary_key, push, pull, populate or ignore)"
            ))),
        }
    }
}

impl TryFrom<String> for SyncAction {
    type Error = ReconError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SyncAction> for String {
    fn from(a: SyncAction) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeConstraint {
    /// Value used as-is; the sheet validates it strictly.
    #[default]
    None,
    /// Fixed-point decimal with two fractional digits.
    Currency,
    /// Boolean-like, rendered as `"true"` / `"false"`.
    Checkbox,
}

impl TypeConstraint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Currency => "currency",
            Self::Checkbox => "checkbox",
        }
    }
}

impl FromStr for TypeConstraint {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "currency" => Ok(Self::Currency),
            "checkbox" => Ok(Self::Checkbox),
            _ => Err(ReconError::config(format!(
                "unknown type constraint '{s}' (expected none, currency or checkbox)"
            ))),
        }
    }
}

impl TryFrom<String> for TypeConstraint {
    type Error = ReconError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TypeConstraint> for String {
    fn from(c: TypeConstraint) -> Self {
        c.as_str().to_string()
    }
}

/// What to do with rows that exist on only one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Orphans are reported and left alone.
    #[default]
    Retain,
    /// Delete orphans. Not supported; rejected when the policy is built.
    Propagate,
}

// ---------------------------------------------------------------------------
// Column spec
// ---------------------------------------------------------------------------

/// One logical column of the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column title on the sheet.
    pub remote_name: String,
    /// Column name in the table.
    pub local_name: String,
    pub action: SyncAction,
    pub constraint: TypeConstraint,
}

impl ColumnSpec {
    /// A column with the same name on both sides and no type constraint.
    pub fn new(remote_name: impl Into<String>, action: SyncAction) -> Self {
        let remote_name = remote_name.into();
        Self {
            local_name: remote_name.clone(),
            remote_name,
            action,
            constraint: TypeConstraint::None,
        }
    }

    pub fn local(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = local_name.into();
        self
    }

    pub fn constraint(mut self, constraint: TypeConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Whether the engine ever reads this column.
    pub fn is_tracked(&self) -> bool {
        self.action != SyncAction::Ignore
    }
}

/// Position of a column within its policy. Rows are stored as
/// slot-indexed records, so every column reference is resolved once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnSlot(usize);

impl ColumnSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Validated, immutable set of column rules.
#[derive(Debug, Clone)]
pub struct ColumnPolicy {
    columns: Vec<ColumnSpec>,
    primary_key: ColumnSlot,
    deletes: DeletePolicy,
}

impl ColumnPolicy {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, ReconError> {
        Self::with_deletes(columns, DeletePolicy::Retain)
    }

    pub fn with_deletes(columns: Vec<ColumnSpec>, deletes: DeletePolicy) -> Result<Self, ReconError> {
        if deletes == DeletePolicy::Propagate {
            return Err(ReconError::config(
                "deletion propagation is not supported (use deletes = \"retain\")",
            ));
        }

        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.action == SyncAction::PrimaryKey)
            .map(|(i, _)| i)
            .collect();

        let primary_key = match keys.as_slice() {
            [only] => ColumnSlot(*only),
            [] => return Err(ReconError::config("policy has no primary_key column")),
            many => {
                let names: Vec<&str> = many.iter().map(|&i| columns[i].remote_name.as_str()).collect();
                return Err(ReconError::config(format!(
                    "policy has {} primary_key columns ({}); exactly one is required",
                    many.len(),
                    names.join(", ")
                )));
            }
        };

        let key = &columns[primary_key.0];
        if key.constraint != TypeConstraint::None {
            return Err(ReconError::config(format!(
                "primary_key column '{}' cannot carry a {} constraint",
                key.remote_name,
                key.constraint.as_str()
            )));
        }

        let mut remote_seen = HashSet::new();
        let mut local_seen = HashSet::new();
        for c in &columns {
            if c.remote_name.is_empty() || c.local_name.is_empty() {
                return Err(ReconError::config("column names must not be empty"));
            }
            if !remote_seen.insert(c.remote_name.as_str()) {
                return Err(ReconError::config(format!(
                    "remote column '{}' is listed more than once",
                    c.remote_name
                )));
            }
            if !local_seen.insert(c.local_name.as_str()) {
                return Err(ReconError::config(format!(
                    "local column '{}' is listed more than once",
                    c.local_name
                )));
            }
        }

        Ok(Self {
            columns,
            primary_key,
            deletes,
        })
    }

    pub fn primary_key(&self) -> ColumnSlot {
        self.primary_key
    }

    pub fn primary_key_local_name(&self) -> &str {
        &self.column(self.primary_key).local_name
    }

    pub fn primary_key_remote_name(&self) -> &str {
        &self.column(self.primary_key).remote_name
    }

    pub fn deletes(&self) -> DeletePolicy {
        self.deletes
    }

    /// Columns carrying `action`, in policy order.
    pub fn columns_with_action(
        &self,
        action: SyncAction,
    ) -> impl Iterator<Item = (ColumnSlot, &ColumnSpec)> + '_ {
        self.columns().filter(move |(_, c)| c.action == action)
    }

    pub fn remote_name_for(&self, local_name: &str) -> Option<&str> {
        self.find_local(local_name).map(|c| c.remote_name.as_str())
    }

    pub fn type_constraint_for(&self, local_name: &str) -> Option<TypeConstraint> {
        self.find_local(local_name).map(|c| c.constraint)
    }

    pub fn column(&self, slot: ColumnSlot) -> &ColumnSpec {
        &self.columns[slot.0]
    }

    pub fn columns(&self) -> impl Iterator<Item = (ColumnSlot, &ColumnSpec)> + '_ {
        self.columns.iter().enumerate().map(|(i, c)| (ColumnSlot(i), c))
    }

    /// Every column except IGNORE ones.
    pub fn tracked(&self) -> impl Iterator<Item = (ColumnSlot, &ColumnSpec)> + '_ {
        self.columns().filter(|(_, c)| c.is_tracked())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn find_local(&self, local_name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.local_name == local_name)
    }
}
