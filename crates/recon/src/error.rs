use std::fmt;

/// Boxed client failure carried inside read/write errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which side of the reconciliation a column or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The relational table.
    Local,
    /// The remote sheet.
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "relational"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Malformed column policy or job config.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Policy references a column the store does not have.
    #[error("{side} store has no column named '{column}'")]
    UnknownColumn { side: Side, column: String },
    /// Snapshot load from the sheet failed.
    #[error("remote read failed: {0}")]
    RemoteRead(#[source] BoxError),
    /// Snapshot load from the table failed.
    #[error("relational read failed: {0}")]
    RelationalRead(#[source] BoxError),
    /// A create/update call against the sheet failed.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] BoxError),
    /// A flush of update statements failed. Earlier flushes stay committed.
    #[error("relational write failed after {committed} committed flush(es): {source}")]
    RelationalWrite {
        committed: usize,
        #[source]
        source: BoxError,
    },
}

impl ReconError {
    /// Stable tag for the error kind, used in CLI output and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::RemoteRead(_) => "remote_read",
            Self::RelationalRead(_) => "relational_read",
            Self::RemoteWrite(_) => "remote_write",
            Self::RelationalWrite { .. } => "relational_write",
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
