//! `RowStore` trait: the single interface to the form-response store.
//!
//! The store is the only source of truth for idempotency: a row whose
//! processed flag is set is never handed out again by `list_unprocessed`.

use async_trait::async_trait;

use crate::error::StoreError;

/// Text written into the processed column when a row is marked.
pub const PROCESSED_MARKER: &str = "Yes";

/// One form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRow {
    /// 1-based row number in the store; the header occupies row 1.
    pub row_index: u32,
    /// Submitter columns in store order, excluding the processed/summary columns.
    pub fields: Vec<(String, String)>,
    pub processed: bool,
    pub summary: String,
}

impl ResponseRow {
    /// A fresh, unprocessed row.
    pub fn new<K, V>(row_index: u32, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            row_index,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            processed: false,
            summary: String::new(),
        }
    }

    /// Mark as already processed (for seeding stores).
    pub fn processed(mut self, summary: impl Into<String>) -> Self {
        self.processed = true;
        self.summary = summary.into();
        self
    }

    /// Look up a field by column name, ignoring case and surrounding whitespace.
    pub fn field(&self, column: &str) -> Option<&str> {
        let wanted = column.trim();
        self.fields
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    }

    /// True when every submitter cell is empty.
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.trim().is_empty())
    }
}

/// Does a processed-column cell count as "already handled"?
pub fn is_processed_marker(cell: &str) -> bool {
    matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "processed"
    )
}

/// One audit line in the processed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub name: String,
    pub email: String,
    pub summary: String,
    pub urgency: String,
    pub status: String,
}

impl LogEntry {
    pub const HEADERS: [&'static str; 6] =
        ["Timestamp", "Name", "Email", "Summary", "Urgency", "Status"];

    pub fn cells(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.name,
            &self.email,
            &self.summary,
            &self.urgency,
            &self.status,
        ]
    }
}

/// Backend-agnostic access to the form-response store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// All rows not yet processed, top to bottom.
    ///
    /// Fails with [`StoreError::Unavailable`] when the backing service can't be
    /// read; nothing can proceed in that case.
    async fn list_unprocessed(&self) -> Result<Vec<ResponseRow>, StoreError>;

    /// Set the processed flag and summary for one row in a single write.
    async fn mark_processed(&self, row_index: u32, summary: &str) -> Result<(), StoreError>;

    /// Append an audit line to the processed log.
    async fn append_log(&self, _entry: &LogEntry) -> Result<(), StoreError> {
        Ok(())
    }
}
