use serde_json::Value as JsonValue;

use super::row::ResultRow;
use crate::error::SqlSessionError;
use crate::types::RowValues;

/// Associative row: `(column, value)` pairs in column order.
pub type AssocRow = Vec<(String, RowValues)>;

/// Shape requested for row-producing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    /// Row objects with name and index access.
    #[default]
    Object,
    /// Ordered `(column, value)` pairs per row.
    Associative,
    /// Values only, in column order.
    Positional,
    /// One JSON array holding an object per row.
    Json,
}

/// Rows projected into one of the [`Output`] shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Object(Vec<ResultRow>),
    Associative(Vec<AssocRow>),
    Positional(Vec<Vec<RowValues>>),
    Json(String),
}

impl Projection {
    /// Project already-fetched rows; nothing is re-queried.
    ///
    /// # Errors
    /// Returns `SqlSessionError::Json` if JSON encoding fails.
    pub fn from_rows(rows: &[ResultRow], output: Output) -> Result<Self, SqlSessionError> {
        Ok(match output {
            Output::Object => Projection::Object(rows.to_vec()),
            Output::Associative => Projection::Associative(
                rows.iter()
                    .map(|row| {
                        row.iter()
                            .map(|(name, value)| (name.to_string(), value.clone()))
                            .collect()
                    })
                    .collect(),
            ),
            Output::Positional => {
                Projection::Positional(rows.iter().map(|row| row.values.clone()).collect())
            }
            Output::Json => {
                let all = JsonValue::Array(rows.iter().map(ResultRow::to_json).collect());
                Projection::Json(serde_json::to_string(&all)?)
            }
        })
    }

    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Projection::Object(rows) => Some(rows.len()),
            Projection::Associative(rows) => Some(rows.len()),
            Projection::Positional(rows) => Some(rows.len()),
            Projection::Json(_) => None,
        }
    }
}

/// One row projected into one of the [`Output`] shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowProjection {
    Object(ResultRow),
    Associative(AssocRow),
    Positional(Vec<RowValues>),
    Json(String),
}

impl RowProjection {
    /// # Errors
    /// Returns `SqlSessionError::Json` if JSON encoding fails.
    pub fn from_row(row: &ResultRow, output: Output) -> Result<Self, SqlSessionError> {
        Ok(match output {
            Output::Object => RowProjection::Object(row.clone()),
            Output::Associative => RowProjection::Associative(
                row.iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect(),
            ),
            Output::Positional => RowProjection::Positional(row.values.clone()),
            Output::Json => RowProjection::Json(serde_json::to_string(&row.to_json())?),
        })
    }
}
