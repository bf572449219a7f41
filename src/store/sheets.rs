//! Google Sheets backend for `RowStore`.
//!
//! The first worksheet holds form responses, header in row 1. Two columns are
//! owned by the relay: `Processed` and `Summary`. They're appended after the
//! last header when missing; every other cell is read-only to us.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::auth::AccessTokenSource;
use super::traits::{LogEntry, PROCESSED_MARKER, ResponseRow, RowStore, is_processed_marker};
use crate::config::{HTTP_TIMEOUT, SpreadsheetRef, StoreConfig, http_client};
use crate::error::StoreError;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com";

pub const PROCESSED_HEADER: &str = "Processed";
pub const SUMMARY_HEADER: &str = "Summary";

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// API roots; overridable so the store can talk to a local fake.
#[derive(Debug, Clone)]
pub struct SheetsEndpoints {
    pub sheets_base: String,
    pub drive_base: String,
}

impl Default for SheetsEndpoints {
    fn default() -> Self {
        Self {
            sheets_base: SHEETS_API_BASE.to_string(),
            drive_base: DRIVE_API_BASE.to_string(),
        }
    }
}

impl SheetsEndpoints {
    /// Both APIs served from one root (test fakes).
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            sheets_base: base.clone(),
            drive_base: base,
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

// ── Store ───────────────────────────────────────────────────────────

/// Form responses in a Google spreadsheet.
pub struct SheetsStore {
    http: reqwest::Client,
    auth: Arc<dyn AccessTokenSource>,
    endpoints: SheetsEndpoints,
    spreadsheet_id: String,
    sheet_title: String,
    processed_col: usize,
    summary_col: usize,
    log_sheet: Option<String>,
}

impl SheetsStore {
    /// Locate the spreadsheet and make sure the relay's columns and log sheet exist.
    pub async fn open(
        config: &StoreConfig,
        auth: Arc<dyn AccessTokenSource>,
        endpoints: SheetsEndpoints,
    ) -> Result<Self, StoreError> {
        let mut store = Self {
            http: http_client(HTTP_TIMEOUT),
            auth,
            endpoints,
            spreadsheet_id: String::new(),
            sheet_title: String::new(),
            processed_col: 0,
            summary_col: 0,
            log_sheet: config.log_sheet.clone(),
        };

        store.spreadsheet_id = match &config.spreadsheet {
            SpreadsheetRef::Id(id) => id.clone(),
            SpreadsheetRef::Name(name) => store.find_by_name(name).await?,
        };

        let titles = store.sheet_titles().await?;
        store.sheet_title = titles
            .first()
            .cloned()
            .ok_or_else(|| StoreError::unavailable("spreadsheet has no worksheets"))?;

        store.ensure_relay_columns().await?;

        if let Some(log_sheet) = store.log_sheet.clone()
            && !titles.iter().any(|t| t == &log_sheet)
        {
            store.create_log_sheet(&log_sheet).await?;
        }

        info!(
            spreadsheet = %store.spreadsheet_id,
            sheet = %store.sheet_title,
            processed_col = %column_letters(store.processed_col),
            summary_col = %column_letters(store.summary_col),
            "Opened response sheet"
        );
        Ok(store)
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn sheet_title(&self) -> &str {
        &self.sheet_title
    }

    async fn find_by_name(&self, name: &str) -> Result<String, StoreError> {
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let url = build_url(
            &self.endpoints.drive_base,
            &["drive", "v3", "files"],
            &[("q", query.as_str()), ("fields", "files(id,name)"), ("pageSize", "1")],
        )
        .map_err(StoreError::unavailable)?;

        let list: DriveFileList = self.get_json(url).await.map_err(StoreError::unavailable)?;
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| StoreError::unavailable(format!("no spreadsheet named '{name}'")))
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, StoreError> {
        let url = build_url(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", &self.spreadsheet_id],
            &[("fields", "sheets.properties(sheetId,title)")],
        )
        .map_err(StoreError::unavailable)?;

        let meta: SpreadsheetMeta = self.get_json(url).await.map_err(|e| {
            StoreError::unavailable(format!(
                "cannot open spreadsheet {}: {e}",
                self.spreadsheet_id
            ))
        })?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, String> {
        let url = build_url(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", &self.spreadsheet_id, "values", range],
            &[],
        )?;
        let body: ValueRange = self.get_json(url).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    /// Write several cell ranges in one request.
    async fn write_ranges(&self, data: Vec<(String, Vec<Vec<String>>)>) -> Result<(), String> {
        let url = build_url(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", &self.spreadsheet_id, "values:batchUpdate"],
            &[],
        )?;
        let data: Vec<Value> = data
            .into_iter()
            .map(|(range, values)| json!({ "range": range, "values": values }))
            .collect();
        self.post_json(url, &json!({ "valueInputOption": "RAW", "data": data }))
            .await
    }

    async fn ensure_relay_columns(&mut self) -> Result<(), StoreError> {
        let header_range = format!("{}!1:1", quote_sheet(&self.sheet_title));
        let header = self
            .read_range(&header_range)
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot read header row: {e}")))?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut next_col = header.len() + 1;
        let mut additions = Vec::new();
        let mut resolve = |name: &str| match find_column(&header, name) {
            Some(col) => col,
            None => {
                let col = next_col;
                next_col += 1;
                additions.push((col, name.to_string()));
                col
            }
        };
        self.processed_col = resolve(PROCESSED_HEADER);
        self.summary_col = resolve(SUMMARY_HEADER);

        if additions.is_empty() {
            return Ok(());
        }

        let data = additions
            .iter()
            .map(|(col, name)| (self.cell_range(*col, 1), vec![vec![name.clone()]]))
            .collect();
        self.write_ranges(data)
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot add relay columns: {e}")))?;

        info!(
            added = ?additions.iter().map(|(_, n)| n.as_str()).collect::<Vec<_>>(),
            "Added relay columns to header row"
        );
        Ok(())
    }

    async fn create_log_sheet(&self, title: &str) -> Result<(), StoreError> {
        let url = build_url(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", &format!("{}:batchUpdate", self.spreadsheet_id)],
            &[],
        )
        .map_err(StoreError::unavailable)?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.post_json(url, &body)
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot create sheet '{title}': {e}")))?;

        let header_range = format!("{}!A1:F1", quote_sheet(title));
        let header = vec![LogEntry::HEADERS.iter().map(|h| h.to_string()).collect()];
        self.write_ranges(vec![(header_range, header)])
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot write '{title}' header: {e}")))?;

        info!(sheet = %title, "Created processed log sheet");
        Ok(())
    }

    fn cell_range(&self, col: usize, row: u32) -> String {
        format!(
            "{}!{}{}",
            quote_sheet(&self.sheet_title),
            column_letters(col),
            row
        )
    }

    /// Turn the raw value grid (header first) into rows.
    fn rows_from_grid(&self, grid: Vec<Vec<String>>) -> Vec<ResponseRow> {
        let mut lines = grid.into_iter();
        let header = lines.next().unwrap_or_default();
        let relay_cols = [self.processed_col, self.summary_col];

        lines
            .enumerate()
            .map(|(i, cells)| {
                let cell = |col: usize| cells.get(col - 1).cloned().unwrap_or_default();
                let fields = header
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !relay_cols.contains(&(idx + 1)))
                    .map(|(idx, name)| (name.clone(), cell(idx + 1)))
                    .collect();
                ResponseRow {
                    row_index: (i + 2) as u32,
                    fields,
                    processed: is_processed_marker(&cell(self.processed_col)),
                    summary: cell(self.summary_col),
                }
            })
            .collect()
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    async fn bearer(&self) -> Result<String, String> {
        self.auth
            .access_token()
            .await
            .map(|t| t.expose_secret().to_string())
            .map_err(|e| e.to_string())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, String> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }
        response.json().await.map_err(|e| format!("malformed response: {e}"))
    }

    async fn post_json(&self, url: Url, body: &Value) -> Result<(), String> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }
        Ok(())
    }
}

#[async_trait]
impl RowStore for SheetsStore {
    async fn list_unprocessed(&self) -> Result<Vec<ResponseRow>, StoreError> {
        let grid = self
            .read_range(&quote_sheet(&self.sheet_title))
            .await
            .map_err(|e| StoreError::unavailable(format!("cannot read responses: {e}")))?;

        let rows: Vec<ResponseRow> = self
            .rows_from_grid(grid)
            .into_iter()
            .filter(|r| !r.processed && !r.is_blank())
            .collect();
        debug!(count = rows.len(), "Fetched unprocessed rows");
        Ok(rows)
    }

    async fn mark_processed(&self, row_index: u32, summary: &str) -> Result<(), StoreError> {
        let data = vec![
            (
                self.cell_range(self.processed_col, row_index),
                vec![vec![PROCESSED_MARKER.to_string()]],
            ),
            (
                self.cell_range(self.summary_col, row_index),
                vec![vec![summary.to_string()]],
            ),
        ];
        self.write_ranges(data)
            .await
            .map_err(|reason| StoreError::Write { row_index, reason })
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        let Some(ref log_sheet) = self.log_sheet else {
            return Ok(());
        };
        let range = format!("{}!A1:F1:append", quote_sheet(log_sheet));
        let url = build_url(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", &self.spreadsheet_id, "values", &range],
            &[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")],
        )
        .map_err(StoreError::Log)?;
        let row: Vec<&str> = entry.cells().to_vec();
        self.post_json(url, &json!({ "values": [row] }))
            .await
            .map_err(StoreError::Log)
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// 1-based column index → A1 letters (1 → A, 27 → AA).
pub fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quote a sheet title for use in an A1 range.
pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// 1-based index of a header, matched case-insensitively.
pub fn find_column(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .map(|i| i + 1)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn build_url(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("invalid base URL {base}: {e}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("base URL {base} cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
