//! SQLite relational store.
//!
//! Every identifier is double-quoted and every value is bound as a
//! parameter; no value text is ever spliced into SQL.

use std::path::Path;

use log::debug;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};

use gridsync_recon::store::{Table, UpdateStatement};
use gridsync_recon::{RelationalStore, TableRef, Value};

#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot write table {table}: {reason}")]
    InvalidTable { table: String, reason: String },
}

/// How `load_table` treats the target table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Drop and recreate from the loaded columns.
    #[default]
    Replace,
    /// Delete existing rows, keep the schema.
    Reload,
    /// Add rows, creating the table if missing.
    Append,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Reload => "reload",
            Self::Append => "append",
        }
    }
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SQLite database holding the synced table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, SqlError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, SqlError> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read every column and row of `table`.
    pub fn read_table(&self, table: &TableRef) -> Result<Table, SqlError> {
        let sql = format!("SELECT * FROM {}", qualified(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sql(row.get_ref(i)?));
            }
            rows.push(values);
        }
        debug!("read {} row(s) from {table}", rows.len());
        Ok(Table { columns, rows })
    }

    /// Apply all statements in one transaction.
    pub fn execute_updates(
        &mut self,
        table: &TableRef,
        statements: &[UpdateStatement],
    ) -> Result<(), SqlError> {
        let target = qualified(table);
        let tx = self.conn.transaction()?;
        let mut touched = 0usize;
        for update in statements {
            if update.assignments.is_empty() {
                continue;
            }
            let sets: Vec<String> = update
                .assignments
                .iter()
                .enumerate()
                .map(|(i, (col, _))| format!("{} = ?{}", quote_ident(col), i + 1))
                .collect();
            let sql = format!(
                "UPDATE {target} SET {} WHERE {} = ?{}",
                sets.join(", "),
                quote_ident(&update.key_column),
                update.assignments.len() + 1
            );
            let params = update
                .assignments
                .iter()
                .map(|(_, v)| to_sql(v))
                .chain(std::iter::once(to_sql(&update.key)));
            touched += tx.prepare_cached(&sql)?.execute(params_from_iter(params))?;
        }
        tx.commit()?;
        debug!("{} statement(s) on {table} touched {touched} row(s)", statements.len());
        Ok(())
    }

    /// Load every row of `data` into `table` in one transaction.
    ///
    /// `Replace` drops and recreates the table from `data`'s columns.
    /// `Reload` empties an existing table and keeps its schema. `Append`
    /// creates the table if missing and adds rows. Returns the row count.
    pub fn load_table(
        &mut self,
        table: &TableRef,
        data: &Table,
        mode: LoadMode,
    ) -> Result<usize, SqlError> {
        if data.columns.is_empty() {
            return Err(SqlError::InvalidTable {
                table: table.to_string(),
                reason: "no columns".into(),
            });
        }
        if let Some(bad) = data.rows.iter().position(|r| r.len() != data.columns.len()) {
            return Err(SqlError::InvalidTable {
                table: table.to_string(),
                reason: format!(
                    "row {} has {} value(s), expected {}",
                    bad + 1,
                    data.rows[bad].len(),
                    data.columns.len()
                ),
            });
        }

        let target = qualified(table);
        let column_list = data
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=data.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        match mode {
            LoadMode::Replace => {
                tx.execute(&format!("DROP TABLE IF EXISTS {target}"), [])?;
                tx.execute(&format!("CREATE TABLE {target} ({column_list})"), [])?;
            }
            LoadMode::Reload => {
                if !table_exists(&tx, table)? {
                    return Err(SqlError::InvalidTable {
                        table: table.to_string(),
                        reason: "reload needs an existing table".into(),
                    });
                }
                let cleared = tx.execute(&format!("DELETE FROM {target}"), [])?;
                debug!("cleared {cleared} row(s) from {table}");
            }
            LoadMode::Append => {
                tx.execute(&format!("CREATE TABLE IF NOT EXISTS {target} ({column_list})"), [])?;
            }
        }
        {
            let mut insert =
                tx.prepare(&format!("INSERT INTO {target} ({column_list}) VALUES ({placeholders})"))?;
            for row in &data.rows {
                insert.execute(params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        debug!("loaded {} row(s) into {table} ({mode})", data.rows.len());
        Ok(data.rows.len())
    }
}

impl RelationalStore for SqliteStore {
    type Error = SqlError;

    fn read_table(&self, table: &TableRef) -> Result<Table, SqlError> {
        SqliteStore::read_table(self, table)
    }

    fn execute_updates(
        &mut self,
        table: &TableRef,
        statements: &[UpdateStatement],
    ) -> Result<(), SqlError> {
        SqliteStore::execute_updates(self, table, statements)
    }
}

/// `"name"` with embedded quotes doubled.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}

fn table_exists(conn: &Connection, table: &TableRef) -> Result<bool, SqlError> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
        quote_ident(&table.schema)
    );
    let count: i64 = conn.query_row(&sql, [&table.table], |row| row.get(0))?;
    Ok(count > 0)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
    }
}
