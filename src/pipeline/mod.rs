//! Inquiry processing pipeline.
//!
//! Every unprocessed response row flows through:
//! 1. `Inquiry::from_row()`: column aliases → normalized fields
//! 2. `Summarizer::summarize()`: optional LLM summary, raw text on any failure
//! 3. `Notifier::notify()`: every configured channel, independently
//! 4. `RowStore::mark_processed()`: write-back per the mark policy

pub mod format;
pub mod processor;
pub mod summarizer;
pub mod types;

pub use processor::InquiryProcessor;
pub use summarizer::{Summarizer, Summary, SummarySource};
pub use types::{Inquiry, MarkOutcome, RowOutcome, RunReport, RunState};
