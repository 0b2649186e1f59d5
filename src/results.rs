//! Normalized query results.
//!
//! A row-producing statement materializes into a [`ResultSet`]; a mutating statement reports an
//! affected-row count and, for INSERT/REPLACE, the backend's last insert id.

pub mod column;
pub mod projection;
pub mod result_set;
pub mod row;

pub use column::{ColumnAttr, ColumnInfo};
pub use projection::{AssocRow, Output, Projection, RowProjection};
pub use result_set::ResultSet;
pub use row::ResultRow;

/// Outcome of one executed statement, discriminated by statement classification.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// INSERT/UPDATE/DELETE/REPLACE/DROP/CREATE
    Affected {
        rows: u64,
        insert_id: Option<i64>,
    },
    /// Everything else.
    Rows(ResultSet),
}

impl QueryResult {
    /// Affected rows for mutating statements, fetched rows otherwise.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            QueryResult::Affected { rows, .. } => *rows,
            QueryResult::Rows(set) => set.len() as u64,
        }
    }

    #[must_use]
    pub fn insert_id(&self) -> Option<i64> {
        match self {
            QueryResult::Affected { insert_id, .. } => *insert_id,
            QueryResult::Rows(_) => None,
        }
    }

    #[must_use]
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Rows(set) => Some(set),
            QueryResult::Affected { .. } => None,
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryResult::Rows(set) => Some(set),
            QueryResult::Affected { .. } => None,
        }
    }
}
