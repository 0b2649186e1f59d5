use std::sync::Arc;

use super::column::ColumnInfo;
use super::row::ResultRow;
use crate::types::RowValues;

/// Rows and column metadata materialized from a row-producing statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<ColumnInfo>,
    column_names: Arc<Vec<String>>,
    rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        let column_names = Arc::new(columns.iter().map(|c| c.name.clone()).collect());
        Self {
            columns,
            column_names,
            rows: Vec::new(),
        }
    }

    /// Rebuild a result set from column metadata and positional rows.
    #[must_use]
    pub fn from_parts(columns: Vec<ColumnInfo>, rows: Vec<Vec<RowValues>>) -> Self {
        let mut set = Self::new(columns);
        set.rows.reserve(rows.len());
        for values in rows {
            set.add_row_values(values);
        }
        set
    }

    /// Append a row in driver fetch order.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows
            .push(ResultRow::new(Arc::clone(&self.column_names), values));
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Positional values of every row, as stored in cache entries.
    #[must_use]
    pub fn positional_rows(&self) -> Vec<Vec<RowValues>> {
        self.rows.iter().map(|row| row.values.clone()).collect()
    }
}
