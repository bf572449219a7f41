//! Inquiry processor: the per-run loop.
//!
//! **Core invariant: one bad row never blocks the rest of the batch.**
//! Only the initial fetch can abort a run. Summarizer fallbacks, delivery
//! failures and write-back failures are logged at row level and the loop
//! moves on.
//!
//! Flow per row:
//! 1. Summarize (best-effort, falls back to the raw text)
//! 2. Notify every channel slot
//! 3. Mark processed, subject to the [`MarkPolicy`]
//! 4. Append to the processed log (best-effort)
//!
//! Two runs started at the same time are not mutually exclusive: both can read
//! a row before either marks it, and that row is then notified twice.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channels::Notifier;
use crate::config::MarkPolicy;
use crate::pipeline::format::build_notification;
use crate::pipeline::summarizer::Summarizer;
use crate::pipeline::types::{Inquiry, MarkOutcome, RowOutcome, RunReport, RunState};
use crate::store::{LogEntry, ResponseRow, RowStore};

/// Drives one fetch → summarize → notify → mark pass over the store.
pub struct InquiryProcessor {
    store: Arc<dyn RowStore>,
    summarizer: Summarizer,
    notifier: Notifier,
    mark_policy: MarkPolicy,
}

impl InquiryProcessor {
    pub fn new(
        store: Arc<dyn RowStore>,
        summarizer: Summarizer,
        notifier: Notifier,
        mark_policy: MarkPolicy,
    ) -> Self {
        Self {
            store,
            summarizer,
            notifier,
            mark_policy,
        }
    }

    /// Run once over every unprocessed row.
    ///
    /// The report's status is `Aborted` only when the fetch fails; in that
    /// case nothing was summarized, sent or written.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let mut state = RunState::Idle;
        transition(&mut state, RunState::Fetching);

        let rows = match self.store.list_unprocessed().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(%run_id, error = %e, "Cannot fetch responses; aborting run");
                transition(&mut state, RunState::Aborted);
                return RunReport::aborted(e.to_string());
            }
        };

        if rows.is_empty() {
            info!(%run_id, "No new inquiries");
            transition(&mut state, RunState::Done);
            return RunReport::from_rows(state, Vec::new());
        }

        transition(&mut state, RunState::Processing);
        info!(
            %run_id,
            count = rows.len(),
            summarizer = self.summarizer.is_enabled(),
            channels = self.notifier.configured(),
            policy = self.mark_policy.label(),
            "Processing new inquiries"
        );

        let mut outcomes = Vec::with_capacity(rows.len());
        for row in &rows {
            outcomes.push(self.process_row(row).await);
        }

        transition(&mut state, RunState::Done);
        let report = RunReport::from_rows(state, outcomes);
        info!(
            %run_id,
            fetched = report.fetched,
            marked = report.marked,
            left_unmarked = report.left_unmarked,
            mark_failures = report.mark_failures,
            delivered = report.delivered,
            delivery_failures = report.delivery_failures,
            summaries_fallback = report.summaries_fallback,
            "Run complete"
        );
        report
    }

    /// Handle one row. Never fails; every error ends up in the outcome.
    async fn process_row(&self, row: &ResponseRow) -> RowOutcome {
        let inquiry = Inquiry::from_row(row);
        debug!(row = row.row_index, name = inquiry.display_name(), "Handling inquiry");

        let summary = self.summarizer.summarize(&inquiry).await;
        let notification = build_notification(&inquiry, &summary);
        let delivery = self.notifier.notify(&notification).await;

        if self.notifier.configured() > 0 && !delivery.any_delivered() {
            warn!(
                row = row.row_index,
                failures = delivery.failed(),
                "No channel delivered this inquiry"
            );
        }

        let should_mark = match self.mark_policy {
            MarkPolicy::MarkOnAttempt => true,
            MarkPolicy::MarkOnSuccess => delivery.any_delivered(),
        };

        let mark = if should_mark {
            match self.store.mark_processed(row.row_index, &summary.text).await {
                Ok(()) => {
                    info!(row = row.row_index, "Marked processed");
                    MarkOutcome::Marked
                }
                Err(e) => {
                    error!(row = row.row_index, error = %e, "Failed to mark row processed");
                    MarkOutcome::WriteFailed(e.to_string())
                }
            }
        } else {
            warn!(
                row = row.row_index,
                "Leaving row unprocessed until a channel delivers it"
            );
            MarkOutcome::Deferred
        };

        if mark != MarkOutcome::Deferred {
            let entry = LogEntry {
                timestamp: if inquiry.timestamp.is_empty() {
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    inquiry.timestamp.clone()
                },
                name: inquiry.name.clone(),
                email: inquiry.email.clone(),
                summary: summary.text.clone(),
                urgency: summary.urgency.clone(),
                status: match mark {
                    MarkOutcome::Marked => "Processed".to_string(),
                    _ => "Unconfirmed".to_string(),
                },
            };
            if let Err(e) = self.store.append_log(&entry).await {
                warn!(row = row.row_index, error = %e, "Failed to append processed log");
            }
        }

        RowOutcome {
            row_index: row.row_index,
            summary_fell_back: summary.fell_back(),
            summary: summary.text,
            delivered: delivery.delivered(),
            delivery_failures: delivery.failed(),
            mark,
        }
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "Run state");
    *state = next;
}
