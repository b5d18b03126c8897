//! Capability traits for the two stores, plus the wire-neutral types they
//! exchange with the engine.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::ReconError;
use crate::model::Value;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SheetId(pub String);

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColumnId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RowId(pub i64);

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub const DEFAULT_SCHEMA: &'static str = "main";

    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `table`, `schema.table`, `[schema].[table]` or `"schema"."table"`.
    pub fn parse(name: &str) -> Result<Self, ReconError> {
        let cleaned: String = name
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '"' | '`'))
            .collect();
        let parts: Vec<&str> = cleaned.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ReconError::Configuration(format!("invalid table name '{name}'")));
        }
        match parts.as_slice() {
            [table] => Ok(Self::new(Self::DEFAULT_SCHEMA, *table)),
            [schema, table] => Ok(Self::new(*schema, *table)),
            _ => Err(ReconError::Configuration(format!(
                "table name '{name}' has more than two parts"
            ))),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

// ---------------------------------------------------------------------------
// Tabular store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub id: ColumnId,
    pub index: usize,
    pub title: String,
}

/// One sheet row as read: cell values keyed by column id.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub row_id: RowId,
    pub cells: HashMap<ColumnId, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub column_id: ColumnId,
    /// `Value::Null` clears the cell.
    pub value: Value,
    /// Whether the sheet must reject values that don't fit the column type.
    pub strict: bool,
    pub format: Option<String>,
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub to_bottom: bool,
    pub cells: Vec<CellWrite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub row_id: RowId,
    pub cells: Vec<CellWrite>,
}

/// Remote sheet: rows of cells addressed by stable row and column ids.
///
/// Create and update calls are all-or-nothing from the engine's view: a
/// failure fails the whole call.
pub trait TabularStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list_columns(&self, sheet: &SheetId) -> Result<Vec<ColumnInfo>, Self::Error>;
    fn list_rows(&self, sheet: &SheetId) -> Result<Vec<SheetRow>, Self::Error>;
    fn create_rows(&mut self, sheet: &SheetId, rows: &[NewRow]) -> Result<(), Self::Error>;
    fn update_rows(&mut self, sheet: &SheetId, rows: &[RowUpdate]) -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// Relational store
// ---------------------------------------------------------------------------

/// A fully materialized table: column names plus positional rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// `UPDATE <table> SET <assignments> WHERE <key_column> = <key>`, with every
/// value bound as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub assignments: Vec<(String, Value)>,
    pub key_column: String,
    pub key: Value,
}

pub trait RelationalStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn read_table(&self, table: &TableRef) -> Result<Table, Self::Error>;

    /// Run one batch of updates. Implementations commit the batch as a unit.
    fn execute_updates(
        &mut self,
        table: &TableRef,
        statements: &[UpdateStatement],
    ) -> Result<(), Self::Error>;
}
