use serde::Deserialize;

use crate::error::ReconError;
use crate::policy::{ColumnPolicy, ColumnSpec, DeletePolicy, SyncAction, TypeConstraint};
use crate::store::{SheetId, TableRef};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A sync job as declared in a `.sync.toml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    pub name: String,
    #[serde(default)]
    pub deletes: DeletePolicy,
    pub sheet: SheetConfig,
    pub table: TableConfig,
    pub columns: Vec<ColumnEntry>,
}

// ---------------------------------------------------------------------------
// Sheet + Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetConfig {
    pub id: SheetKey,
    /// Overrides the API base URL from saved credentials.
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Sheet ids are large integers; quoted strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SheetKey {
    Number(i64),
    Text(String),
}

impl SheetKey {
    fn as_sheet_id(&self) -> SheetId {
        match self {
            Self::Number(n) => SheetId(n.to_string()),
            Self::Text(s) => SheetId(s.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// SQLite database path. Relative paths resolve against the job file.
    pub database: String,
    /// `table`, `schema.table` or `[schema].[table]`.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnEntry {
    /// Column title on the sheet.
    pub name: String,
    /// Column name in the table. Defaults to `name`.
    #[serde(default)]
    pub sql: Option<String>,
    pub action: SyncAction,
    #[serde(default)]
    pub constraint: TypeConstraint,
}

impl ColumnEntry {
    fn to_spec(&self) -> ColumnSpec {
        let spec = ColumnSpec::new(self.name.clone(), self.action).constraint(self.constraint);
        match &self.sql {
            Some(local) => spec.local(local.clone()),
            None => spec,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: SyncConfig = toml::from_str(input)
            .map_err(|e| ReconError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::Configuration("name must not be empty".into()));
        }

        if self.sheet_id().0.is_empty() {
            return Err(ReconError::Configuration("sheet.id must not be empty".into()));
        }

        if self.table.database.trim().is_empty() {
            return Err(ReconError::Configuration(
                "table.database must not be empty".into(),
            ));
        }

        self.table_ref()?;
        self.policy()?;
        Ok(())
    }

    /// Build the column policy. Fails on the same conditions as
    /// [`ColumnPolicy::with_deletes`].
    pub fn policy(&self) -> Result<ColumnPolicy, ReconError> {
        let specs = self.columns.iter().map(ColumnEntry::to_spec).collect();
        ColumnPolicy::with_deletes(specs, self.deletes)
    }

    pub fn table_ref(&self) -> Result<TableRef, ReconError> {
        TableRef::parse(&self.table.name)
    }

    pub fn sheet_id(&self) -> SheetId {
        self.sheet.id.as_sheet_id()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
