//! Send history: which claims have been notified, and when.

pub mod libsql_backend;
pub mod memory;
pub mod traits;

pub use libsql_backend::LibSqlHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use traits::{AppendOutcome, HistoryEntry, HistoryStore, format_date_sent};
