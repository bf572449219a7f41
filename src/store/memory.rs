//! In-process `RowStore` with failure injection.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{LogEntry, ResponseRow, RowStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<ResponseRow>,
    log: Vec<LogEntry>,
    fail_fetch: bool,
    failing_writes: HashSet<u32>,
    fetches: usize,
    writes: usize,
}

/// Row store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new(rows: Vec<ResponseRow>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                rows,
                ..MemoryState::default()
            }),
        }
    }

    /// Every `list_unprocessed` call fails with `Unavailable`.
    pub fn with_fetch_failure(self) -> Self {
        self.lock().fail_fetch = true;
        self
    }

    /// `mark_processed` for this row fails with `Write`.
    pub fn with_write_failure(self, row_index: u32) -> Self {
        self.lock().failing_writes.insert(row_index);
        self
    }

    /// Snapshot of every row, processed or not.
    pub fn rows(&self) -> Vec<ResponseRow> {
        self.lock().rows.clone()
    }

    pub fn row(&self, row_index: u32) -> Option<ResponseRow> {
        self.lock()
            .rows
            .iter()
            .find(|r| r.row_index == row_index)
            .cloned()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.lock().log.clone()
    }

    /// Number of `list_unprocessed` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    /// Number of committed `mark_processed` writes.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn list_unprocessed(&self) -> Result<Vec<ResponseRow>, StoreError> {
        let mut state = self.lock();
        state.fetches += 1;
        if state.fail_fetch {
            return Err(StoreError::unavailable("connection refused"));
        }
        Ok(state
            .rows
            .iter()
            .filter(|r| !r.processed && !r.is_blank())
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, row_index: u32, summary: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.failing_writes.contains(&row_index) {
            return Err(StoreError::Write {
                row_index,
                reason: "write rejected".into(),
            });
        }
        let row = state
            .rows
            .iter_mut()
            .find(|r| r.row_index == row_index)
            .ok_or_else(|| StoreError::Write {
                row_index,
                reason: "no such row".into(),
            })?;
        row.processed = true;
        row.summary = summary.to_string();
        state.writes += 1;
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> Result<(), StoreError> {
        self.lock().log.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        MemoryStore::new(vec![
            ResponseRow::new(2, [("Message", "first")]).processed("old"),
            ResponseRow::new(3, [("Message", "second")]),
            ResponseRow::new(4, [("Message", "")]),
            ResponseRow::new(5, [("Message", "third")]),
        ])
    }

    #[tokio::test]
    async fn lists_only_unprocessed_non_blank_rows_in_order() {
        let store = seeded();
        let rows = store.list_unprocessed().await.unwrap();
        let indexes: Vec<u32> = rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indexes, vec![3, 5]);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn mark_sets_flag_and_summary() {
        let store = seeded();
        store.mark_processed(3, "short").await.unwrap();
        let row = store.row(3).unwrap();
        assert!(row.processed);
        assert_eq!(row.summary, "short");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_store_errors() {
        let store = seeded().with_fetch_failure().with_write_failure(3);
        assert!(matches!(
            store.list_unprocessed().await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(
            store.mark_processed(3, "x").await,
            Err(StoreError::Write { row_index: 3, .. })
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn marking_unknown_row_fails() {
        let store = seeded();
        assert!(store.mark_processed(99, "x").await.is_err());
    }
}
