use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::SpreadsheetConfig;

use super::{MirrorError, VoteMirror};

/// Google Sheets v4 `values` API client.
///
/// Locates the row whose id column holds the voter's original id and writes
/// the voted marker into the configured column of that row.
#[derive(Clone)]
pub struct SheetsMirror {
    http: Client,
    config: SpreadsheetConfig,
}

impl SheetsMirror {
    pub fn new(config: SpreadsheetConfig) -> Result<Self, MirrorError> {
        let timeout = config.request_timeout();
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }

    fn values_url(&self, range: &str) -> Result<Url, MirrorError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|err| MirrorError::Endpoint(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MirrorError::Endpoint(self.config.api_base.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                range,
            ]);
        Ok(url)
    }

    fn sheet_prefix(&self) -> String {
        quote_sheet_name(&self.config.sheet_name)
    }

    /// One-based sheet row holding `original_id` in the id column.
    pub async fn find_row(&self, original_id: i64) -> Result<usize, MirrorError> {
        let column = &self.config.id_column;
        let range = format!("{}!{column}:{column}", self.sheet_prefix());
        let response = self
            .http
            .get(self.values_url(&range)?)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: ValueRange = response.json().await?;

        body.values
            .iter()
            .position(|row| row.first().and_then(numeric_cell) == Some(original_id))
            .map(|index| index + 1)
            .ok_or(MirrorError::RowNotFound { original_id })
    }

    async fn write_cell(&self, row: usize, value: &str) -> Result<(), MirrorError> {
        let range = format!(
            "{}!{}{row}",
            self.sheet_prefix(),
            self.config.voted_column
        );
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let payload = ValueRange {
            range: Some(range),
            values: vec![vec![Value::String(value.to_string())]],
        };
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl VoteMirror for SheetsMirror {
    async fn record_vote(&self, original_id: i64, voted: bool) -> Result<(), MirrorError> {
        let row = self.find_row(original_id).await?;
        let marker = if voted {
            &self.config.voted_value
        } else {
            &self.config.unvoted_value
        };
        self.write_cell(row, marker).await?;
        info!("Spreadsheet row {row} marked {marker} for original id {original_id}");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MirrorError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Id cells arrive formatted (`"42"`) or unformatted (`42`, `42.0`).
fn numeric_cell(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
