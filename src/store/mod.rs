//! Record store persistence layer.
//!
//! Stores observation ("ot") records and append-only history entries in
//! SQLite for:
//! - Per-technician daily work sheets
//! - Audit trail of past actions
//! - Full-database backup and transfer via JSON dumps

mod records;
mod sqlite;

pub use records::{composite_key, Dump, HistoryEntry, Observation, KEY_SEPARATOR};
pub use sqlite::{SqliteStore, DEFAULT_HISTORY_LIMIT};
