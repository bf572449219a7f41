//! Shared types for the inquiry pipeline.

use std::fmt;

use crate::error::{EXIT_OK, EXIT_STORE};
use crate::store::ResponseRow;

// ── Inquiry ─────────────────────────────────────────────────────────

const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "time", "date/time", "date"];
const NAME_ALIASES: &[&str] = &["name", "full name", "your name"];
const EMAIL_ALIASES: &[&str] = &["email", "e-mail", "mail", "your email", "email address"];
const MESSAGE_ALIASES: &[&str] = &[
    "inquiry",
    "symptoms",
    "message",
    "symptoms / message",
    "symptom details",
    "description",
    "issue",
    "problem",
    "notes",
    "details",
    "comments",
    "messages",
    "patient message",
    "question",
];
const URGENCY_ALIASES: &[&str] = &["urgency", "priority", "severity", "how urgent"];

/// A response row reduced to the fields the pipeline cares about.
///
/// Form question titles vary, so each field is found through an alias list.
/// A field with no matching column is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inquiry {
    pub row_index: u32,
    pub timestamp: String,
    pub name: String,
    pub email: String,
    /// The submitter's free text; this is what gets summarized.
    pub message: String,
    /// Urgency as reported by the submitter.
    pub urgency: String,
}

impl Inquiry {
    pub fn from_row(row: &ResponseRow) -> Self {
        let pick = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| row.field(alias))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            row_index: row.row_index,
            timestamp: pick(TIMESTAMP_ALIASES),
            name: pick(NAME_ALIASES),
            email: pick(EMAIL_ALIASES),
            message: pick(MESSAGE_ALIASES),
            urgency: pick(URGENCY_ALIASES),
        }
    }

    /// Name for log lines and subjects.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }
}

// ── Run bookkeeping ─────────────────────────────────────────────────

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Processing,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub row_index: u32,
    pub summary: String,
    pub summary_fell_back: bool,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub mark: MarkOutcome,
}

/// Write-back result for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// Left unprocessed by the mark policy; the next run picks it up again.
    Deferred,
    /// The store rejected the write.
    WriteFailed(String),
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunState,
    pub fetched: usize,
    pub marked: usize,
    pub left_unmarked: usize,
    pub mark_failures: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub summaries_fallback: usize,
    pub rows: Vec<RowOutcome>,
    /// Set when the run aborted.
    pub error: Option<String>,
}

impl RunReport {
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            status: RunState::Aborted,
            fetched: 0,
            marked: 0,
            left_unmarked: 0,
            mark_failures: 0,
            delivered: 0,
            delivery_failures: 0,
            summaries_fallback: 0,
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Tally row outcomes under the state the run finished in.
    pub(crate) fn from_rows(status: RunState, rows: Vec<RowOutcome>) -> Self {
        let count = |pred: fn(&RowOutcome) -> bool| rows.iter().filter(|r| pred(r)).count();
        Self {
            status,
            fetched: rows.len(),
            marked: count(|r| r.mark == MarkOutcome::Marked),
            left_unmarked: count(|r| r.mark == MarkOutcome::Deferred),
            mark_failures: count(|r| matches!(r.mark, MarkOutcome::WriteFailed(_))),
            delivered: rows.iter().map(|r| r.delivered).sum(),
            delivery_failures: rows.iter().map(|r| r.delivery_failures).sum(),
            summaries_fallback: count(|r| r.summary_fell_back),
            rows,
            error: None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status == RunState::Aborted
    }

    /// Process exit status: 1 for an aborted run, 0 otherwise. Row-level
    /// failures don't change it.
    pub fn exit_code(&self) -> u8 {
        if self.is_aborted() { EXIT_STORE } else { EXIT_OK }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_resolves_aliases_case_insensitively() {
        let row = ResponseRow::new(
            7,
            [
                ("Timestamp", "10/18/2026 09:12:00"),
                ("Full Name", "  Ada Lovelace "),
                ("E-mail", "ada@example.com"),
                ("Symptoms / Message", "Persistent cough"),
                ("How urgent", "High"),
            ],
        );
        let inquiry = Inquiry::from_row(&row);

        assert_eq!(inquiry.row_index, 7);
        assert_eq!(inquiry.name, "Ada Lovelace");
        assert_eq!(inquiry.email, "ada@example.com");
        assert_eq!(inquiry.message, "Persistent cough");
        assert_eq!(inquiry.urgency, "High");
        assert_eq!(inquiry.timestamp, "10/18/2026 09:12:00");
    }

    #[test]
    fn alias_order_prefers_earlier_entries() {
        let row = ResponseRow::new(2, [("Notes", "secondary"), ("Inquiry", "primary")]);
        assert_eq!(Inquiry::from_row(&row).message, "primary");
    }

    #[test]
    fn missing_columns_are_empty() {
        let row = ResponseRow::new(2, [("Inquiry", "How do I refill my prescription?")]);
        let inquiry = Inquiry::from_row(&row);
        assert_eq!(inquiry.message, "How do I refill my prescription?");
        assert!(inquiry.name.is_empty());
        assert_eq!(inquiry.display_name(), "Unknown");
    }

    #[test]
    fn report_counts_row_outcomes() {
        let outcome = |idx, mark, delivered, failures, fell_back| RowOutcome {
            row_index: idx,
            summary: String::new(),
            summary_fell_back: fell_back,
            delivered,
            delivery_failures: failures,
            mark,
        };
        let report = RunReport::from_rows(RunState::Done, vec![
            outcome(2, MarkOutcome::Marked, 1, 1, true),
            outcome(3, MarkOutcome::Deferred, 0, 2, false),
            outcome(4, MarkOutcome::WriteFailed("boom".into()), 2, 0, true),
        ]);

        assert_eq!(report.status, RunState::Done);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.marked, 1);
        assert_eq!(report.left_unmarked, 1);
        assert_eq!(report.mark_failures, 1);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.delivery_failures, 3);
        assert_eq!(report.summaries_fallback, 2);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn aborted_report_carries_error() {
        let report = RunReport::aborted("connection refused");
        assert!(report.is_aborted());
        assert_eq!(report.error.as_deref(), Some("connection refused"));
        assert_eq!(report.status.to_string(), "aborted");
        assert_eq!(report.exit_code(), 1);
    }
}
