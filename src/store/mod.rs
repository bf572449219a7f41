//! Form-response store: Google Sheets backed, with an in-memory variant.

pub mod auth;
pub mod memory;
pub mod sheets;
pub mod traits;

pub use auth::{AccessTokenSource, ServiceAccountAuth, StaticToken};
pub use memory::MemoryStore;
pub use sheets::{SheetsEndpoints, SheetsStore};
pub use traits::{LogEntry, ResponseRow, RowStore};
