//! Error types for fieldstore.

use thiserror::Error;

/// Errors from the record store.
///
/// Every operation surfaces the underlying storage error to its immediate
/// caller; there is no retry or masking in this layer. Multi-step operations
/// (bulk deletes, dump imports) report the first error and leave prior
/// writes in place.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or its schema could not be ensured.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// Record rejected at the boundary before touching storage.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Record payload could not be encoded or decoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("failed to read configuration: {0}")]
    ParseError(String),
}
