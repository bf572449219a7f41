//! Inquiry Relay: form responses in, summarized notifications out.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod startup;
pub mod store;
