use super::QueryEngine;
use crate::error::SqlSessionError;
use crate::results::{ColumnAttr, Output, Projection, RowProjection};
use crate::types::RowValues;

impl QueryEngine {
    async fn run_if_given(&mut self, query: Option<&str>) -> Result<(), SqlSessionError> {
        if let Some(sql) = query {
            self.query(sql).await?;
        }
        Ok(())
    }

    /// One value from row `y`, column `x` of `query`'s result, or of the last result when
    /// `query` is `None`. SQL NULL reads as `None`.
    ///
    /// # Errors
    /// Returns the error of the executed query.
    pub async fn get_var(
        &mut self,
        query: Option<&str>,
        x: usize,
        y: usize,
    ) -> Result<Option<RowValues>, SqlSessionError> {
        self.state
            .log_call(format!("get_var(\"{}\", {x}, {y})", query.unwrap_or_default()));
        self.run_if_given(query).await?;
        Ok(self.value_at(x, y))
    }

    fn value_at(&self, x: usize, y: usize) -> Option<RowValues> {
        self.state
            .last_result
            .as_ref()
            .and_then(|set| set.rows().get(y))
            .and_then(|row| row.get_by_index(x))
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// Row `y` of the result in the requested shape.
    ///
    /// # Errors
    /// Returns the error of the executed query, or `SqlSessionError::Json` for JSON output.
    pub async fn get_row(
        &mut self,
        query: Option<&str>,
        output: Output,
        y: usize,
    ) -> Result<Option<RowProjection>, SqlSessionError> {
        self.state.log_call(format!(
            "get_row(\"{}\", {output:?}, {y})",
            query.unwrap_or_default()
        ));
        self.run_if_given(query).await?;
        self.state
            .last_result
            .as_ref()
            .and_then(|set| set.rows().get(y))
            .map(|row| RowProjection::from_row(row, output))
            .transpose()
    }

    /// Column `x` of every row; NULLs read as `None`.
    ///
    /// # Errors
    /// Returns the error of the executed query.
    pub async fn get_col(
        &mut self,
        query: Option<&str>,
        x: usize,
    ) -> Result<Vec<Option<RowValues>>, SqlSessionError> {
        self.state
            .log_call(format!("get_col(\"{}\", {x})", query.unwrap_or_default()));
        self.run_if_given(query).await?;
        let rows = self.state.last_result.as_ref().map_or(0, |set| set.len());
        Ok((0..rows).map(|y| self.value_at(x, y)).collect())
    }

    /// All rows of the result in the requested shape, derived from the rows already held.
    ///
    /// # Errors
    /// Returns the error of the executed query, or `SqlSessionError::Json` for JSON output.
    pub async fn get_results(
        &mut self,
        query: Option<&str>,
        output: Output,
    ) -> Result<Projection, SqlSessionError> {
        self.state.log_call(format!(
            "get_results(\"{}\", {output:?})",
            query.unwrap_or_default()
        ));
        self.run_if_given(query).await?;
        let rows = self
            .state
            .last_result
            .as_ref()
            .map(|set| set.rows())
            .unwrap_or_default();
        Projection::from_rows(rows, output)
    }

    /// One attribute of every column (`offset` `None`) or of the column at `offset`.
    /// Missing attributes read as `None`.
    #[must_use]
    pub fn get_col_info(&self, attr: ColumnAttr, offset: Option<usize>) -> Vec<Option<String>> {
        match offset {
            None => self
                .state
                .col_info
                .iter()
                .map(|col| col.attr(attr))
                .collect(),
            Some(idx) => self
                .state
                .col_info
                .get(idx)
                .map(|col| vec![col.attr(attr)])
                .unwrap_or_default(),
        }
    }
}
