//! Sheet API HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).

use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use gridsync_recon::store::{
    CellWrite, ColumnId, ColumnInfo, NewRow, RowId, RowUpdate, SheetId, SheetRow, TabularStore,
};
use gridsync_recon::Value;

use crate::auth::{load_auth, AuthCredentials};

/// Sheet API client (blocking).
#[derive(Clone)]
pub struct SheetClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

/// Error type for sheet API operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// No auth credentials configured
    #[error("not authenticated; run `gridsync login` first")]
    NotAuthenticated,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}: {1}")]
    Http(u16, String),
    /// Server rejected the request (400/422, or a non-zero result code)
    #[error("{0}")]
    Validation(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl SheetError {
    /// 401/403 from the API.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::Http(401 | 403, _))
    }
}

/// Sheet listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SheetSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub permalink: Option<String>,
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct IndexResult<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct WireColumn {
    id: i64,
    index: usize,
    title: String,
}

#[derive(Deserialize)]
struct WireSheet {
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Deserialize)]
struct WireRow {
    id: i64,
    #[serde(default)]
    cells: Vec<WireCellRead>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCellRead {
    column_id: i64,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCellWrite {
    column_id: i64,
    value: serde_json::Value,
    strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_value: Option<String>,
}

impl From<&CellWrite> for WireCellWrite {
    fn from(cell: &CellWrite) -> Self {
        // The API clears a cell on an empty string, not on null.
        let value = match &cell.value {
            Value::Null => serde_json::Value::String(String::new()),
            v => v.to_json(),
        };
        Self {
            column_id: cell.column_id.0,
            value,
            strict: cell.strict,
            format: cell.format.clone(),
            display_value: cell.display_value.clone(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireNewRow {
    to_bottom: bool,
    cells: Vec<WireCellWrite>,
}

#[derive(Serialize)]
struct WireRowUpdate {
    id: i64,
    cells: Vec<WireCellWrite>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteResult {
    #[serde(default)]
    result_code: i64,
    #[serde(default)]
    message: String,
}

impl SheetClient {
    /// Create a new client using saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, SheetError> {
        let creds = load_auth().ok_or(SheetError::NotAuthenticated)?;
        Self::new(creds)
    }

    /// Create a new client with explicit credentials.
    pub fn new(creds: AuthCredentials) -> Result<Self, SheetError> {
        Self::with_base_url(creds.token, creds.api_base)
    }

    pub fn with_base_url(token: String, api_base: String) -> Result<Self, SheetError> {
        if token.trim().is_empty() {
            return Err(SheetError::NotAuthenticated);
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("gridsync/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SheetError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// All sheets the token can see.
    pub fn list_sheets(&self) -> Result<Vec<SheetSummary>, SheetError> {
        let url = format!("{}/sheets?includeAll=true", self.api_base);
        let result: IndexResult<SheetSummary> = parse(self.get(&url)?)?;
        Ok(result.data)
    }

    pub fn list_columns(&self, sheet: &SheetId) -> Result<Vec<ColumnInfo>, SheetError> {
        let url = format!("{}/sheets/{}/columns?includeAll=true", self.api_base, sheet);
        let result: IndexResult<WireColumn> = parse(self.get(&url)?)?;
        let mut columns: Vec<ColumnInfo> = result
            .data
            .into_iter()
            .map(|c| ColumnInfo {
                id: ColumnId(c.id),
                index: c.index,
                title: c.title,
            })
            .collect();
        columns.sort_by_key(|c| c.index);
        debug!("sheet {sheet}: {} column(s)", columns.len());
        Ok(columns)
    }

    pub fn list_rows(&self, sheet: &SheetId) -> Result<Vec<SheetRow>, SheetError> {
        let url = format!("{}/sheets/{}", self.api_base, sheet);
        let wire: WireSheet = parse(self.get(&url)?)?;
        let rows: Vec<SheetRow> = wire
            .rows
            .into_iter()
            .map(|r| SheetRow {
                row_id: RowId(r.id),
                cells: r
                    .cells
                    .iter()
                    .map(|c| (ColumnId(c.column_id), Value::from_json(&c.value)))
                    .collect::<HashMap<_, _>>(),
            })
            .collect();
        debug!("sheet {sheet}: {} row(s)", rows.len());
        Ok(rows)
    }

    pub fn create_rows(&self, sheet: &SheetId, rows: &[NewRow]) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let body: Vec<WireNewRow> = rows
            .iter()
            .map(|r| WireNewRow {
                to_bottom: r.to_bottom,
                cells: r.cells.iter().map(WireCellWrite::from).collect(),
            })
            .collect();
        let url = format!("{}/sheets/{}/rows", self.api_base, sheet);
        let resp = self.send_json(self.http.post(&url), &body)?;
        check_result(resp)
    }

    pub fn update_rows(&self, sheet: &SheetId, rows: &[RowUpdate]) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let body: Vec<WireRowUpdate> = rows
            .iter()
            .map(|r| WireRowUpdate {
                id: r.row_id.0,
                cells: r.cells.iter().map(WireCellWrite::from).collect(),
            })
            .collect();
        let url = format!("{}/sheets/{}/rows", self.api_base, sheet);
        let resp = self.send_json(self.http.put(&url), &body)?;
        check_result(resp)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, SheetError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| SheetError::Network(e.to_string()))?;
        check_status(response)
    }

    fn send_json<B: Serialize + ?Sized>(
        &self,
        request: reqwest::blocking::RequestBuilder,
        body: &B,
    ) -> Result<reqwest::blocking::Response, SheetError> {
        let response = request
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| SheetError::Network(e.to_string()))?;
        check_status(response)
    }
}

impl TabularStore for SheetClient {
    type Error = SheetError;

    fn list_columns(&self, sheet: &SheetId) -> Result<Vec<ColumnInfo>, SheetError> {
        SheetClient::list_columns(self, sheet)
    }

    fn list_rows(&self, sheet: &SheetId) -> Result<Vec<SheetRow>, SheetError> {
        SheetClient::list_rows(self, sheet)
    }

    fn create_rows(&mut self, sheet: &SheetId, rows: &[NewRow]) -> Result<(), SheetError> {
        SheetClient::create_rows(self, sheet, rows)
    }

    fn update_rows(&mut self, sheet: &SheetId, rows: &[RowUpdate]) -> Result<(), SheetError> {
        SheetClient::update_rows(self, sheet, rows)
    }
}

// ── Free functions ──────────────────────────────────────────────────

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, SheetError> {
    let status = response.status().as_u16();
    if !response.status().is_success() {
        let body = response.text().unwrap_or_default();
        if status == 422 || status == 400 {
            return Err(SheetError::Validation(body));
        }
        return Err(SheetError::Http(status, body));
    }
    Ok(response)
}

fn parse<T: serde::de::DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, SheetError> {
    response.json::<T>().map_err(|e| SheetError::Parse(e.to_string()))
}

/// Write calls answer 200 with a result code; anything but 0 is a rejection.
fn check_result(response: reqwest::blocking::Response) -> Result<(), SheetError> {
    let result: WriteResult = parse(response)?;
    if result.result_code != 0 {
        return Err(SheetError::Validation(format!(
            "result code {}: {}",
            result.result_code, result.message
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cell_clears() {
        let cell = CellWrite {
            column_id: ColumnId(5),
            value: Value::Null,
            strict: true,
            format: None,
            display_value: None,
        };
        let json = serde_json::to_value(WireCellWrite::from(&cell)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "columnId": 5, "value": "", "strict": true })
        );
    }

    #[test]
    fn test_currency_cell_wire_shape() {
        let cell = CellWrite {
            column_id: ColumnId(9),
            value: Value::from("12.50"),
            strict: false,
            format: Some(",,,,,,,,,,,13,0,1,2,,".into()),
            display_value: Some("12.50".into()),
        };
        let json = serde_json::to_value(WireCellWrite::from(&cell)).unwrap();
        assert_eq!(json["columnId"], 9);
        assert_eq!(json["value"], "12.50");
        assert_eq!(json["strict"], false);
        assert_eq!(json["format"], ",,,,,,,,,,,13,0,1,2,,");
        assert_eq!(json["displayValue"], "12.50");
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = SheetClient::with_base_url("  ".into(), "http://localhost".into())
            .err()
            .unwrap();
        assert!(err.is_auth());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SheetError::Http(503, "busy".into()).to_string(), "HTTP 503: busy");
        assert!(SheetError::NotAuthenticated.to_string().contains("gridsync login"));
    }
}
