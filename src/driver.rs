//! Backend capability interface the [`QueryEngine`](crate::engine::QueryEngine) drives.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;

use crate::clause::Escaper;
use crate::error::{DriverErrorInfo, SqlSessionError};
use crate::results::ColumnInfo;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

/// Connection parameters handed to [`Driver::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub dsn: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub options: BTreeMap<String, String>,
    /// File-based backends skip user/password validation.
    pub file_based: bool,
}

impl ConnectParams {
    #[must_use]
    pub fn file(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            file_based: true,
            ..Self::default()
        }
    }

    /// Credentials are present, or not required.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.file_based || (self.user.is_some() && self.password.is_some())
    }
}

/// How the caller classified the statement it hands to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// INSERT/DELETE/UPDATE/REPLACE/DROP/CREATE.
    Mutating,
    RowProducing,
}

/// Sequential, forward-only access to the rows of one execution.
pub trait Cursor: Send {
    fn column_count(&self) -> usize;

    /// Metadata for one column; `None` when the backend cannot describe it.
    fn column_meta(&self, index: usize) -> Option<ColumnInfo>;

    /// Next row, or `None` once exhausted.
    fn fetch_row(&mut self) -> Option<Vec<RowValues>>;
}

/// Cursor over rows already materialized by the driver.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<RowValues>>,
}

impl BufferedCursor {
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

impl Cursor for BufferedCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_meta(&self, index: usize) -> Option<ColumnInfo> {
        self.columns.get(index).cloned()
    }

    fn fetch_row(&mut self) -> Option<Vec<RowValues>> {
        self.rows.pop_front()
    }
}

/// What an execution produced.
pub enum Execution {
    Affected(u64),
    Cursor(Box<dyn Cursor>),
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Affected(rows) => f.debug_tuple("Affected").field(rows).finish(),
            Execution::Cursor(cursor) => f
                .debug_struct("Cursor")
                .field("columns", &cursor.column_count())
                .finish(),
        }
    }
}

/// One backend.
///
/// Drivers do not know about clauses, caching or session bookkeeping; the engine hands them
/// finished statement text, already in [`Driver::placeholder_style`].
#[async_trait]
pub trait Driver: Send {
    fn name(&self) -> &'static str;

    fn placeholder_style(&self) -> PlaceholderStyle;

    /// SQL expression for the backend's current date and time.
    fn sysdate(&self) -> &'static str {
        "NOW()"
    }

    /// # Errors
    /// Returns `SqlSessionError::ConnectionError` when the backend cannot be reached.
    async fn connect(&mut self, params: &ConnectParams) -> Result<(), SqlSessionError>;

    /// # Errors
    /// Returns an error if the backend fails to close cleanly.
    async fn disconnect(&mut self) -> Result<(), SqlSessionError>;

    fn is_connected(&self) -> bool;

    /// Backend-safe body of a string literal, without the surrounding quotes.
    fn escape(&self, raw: &str) -> String;

    /// # Errors
    /// Returns `SqlSessionError::Driver` with the backend's code and message.
    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError>;

    /// # Errors
    /// Returns `SqlSessionError::Driver` with the backend's code and message.
    async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[RowValues],
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError>;

    /// Id generated by the most recent INSERT/REPLACE.
    fn last_insert_id(&self) -> Option<i64>;

    /// Error reported by the most recent execution, if any.
    fn last_error_info(&self) -> Option<DriverErrorInfo>;
}

impl<D: Driver + ?Sized> Escaper for D {
    fn escape(&self, raw: &str) -> String {
        Driver::escape(self, raw)
    }
}
