use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQLite's `SQLITE_RANGE` primary result code: bind or column index out of range.
pub const SQLITE_RANGE: i32 = 25;

/// Error code and message reported by a driver after executing a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverErrorInfo {
    pub code: i32,
    pub message: String,
}

impl DriverErrorInfo {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Bind/column index out of range. The session records these as notices instead of
    /// failing the call.
    #[must_use]
    pub fn is_index_out_of_range(&self) -> bool {
        self.code == SQLITE_RANGE
    }
}

impl fmt::Display for DriverErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.code, self.message)
    }
}

#[derive(Debug, Error)]
pub enum SqlSessionError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Clause error: {0}")]
    ClauseError(String),

    #[error("Driver error: {0}")]
    Driver(DriverErrorInfo),

    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl SqlSessionError {
    pub(crate) fn clause(msg: impl Into<String>) -> Self {
        SqlSessionError::ClauseError(msg.into())
    }
}

impl From<std::io::Error> for SqlSessionError {
    fn from(err: std::io::Error) -> Self {
        SqlSessionError::CacheIo(err.to_string())
    }
}
