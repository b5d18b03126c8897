use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::BatchOutcome;

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// A loosely-typed scalar as read from either store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PartialEq for Value {
    /// Exact equality. Integers and floats compare numerically so that a SQL
    /// `INTEGER 5` equals a sheet number `5.0`; no epsilon is applied.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => *i as f64 == *f,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Canonical join-key form. `None` for blank values, which cannot be joined.
    ///
    /// Integral floats render without a fraction so `42`, `42.0` and `"42"`
    /// produce the same key.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(float_key(*f)),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }
        }
    }

    /// Convert a JSON scalar from the sheet API.
    ///
    /// Arrays and objects (multi-contact cells and the like) are kept as their
    /// JSON text so they still compare deterministically.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// JSON form for the sheet API. Null maps to JSON null; callers decide
    /// how a cleared cell is encoded on the wire.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

fn float_key(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Mutation counts computed by the differ for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub remote_inserts: usize,
    pub remote_updates: usize,
    pub local_updates: usize,
    /// Rows present only on the sheet. Reported, never acted on.
    pub remote_only: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotCounts {
    pub local_rows: usize,
    pub remote_rows: usize,
    /// Rows dropped while loading (blank or duplicate keys, all-blank sheet rows).
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    pub sheet_id: String,
    pub table: String,
    pub engine_version: String,
    pub run_at: String,
    pub dry_run: bool,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub meta: SyncMeta,
    pub snapshot: SnapshotCounts,
    pub planned: PlanCounts,
    pub applied: BatchOutcome,
}
