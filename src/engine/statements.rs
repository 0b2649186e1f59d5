use super::QueryEngine;
use crate::clause::Condition;
use crate::error::SqlSessionError;
use crate::results::{QueryResult, ResultSet};
use crate::statement::StatementAssembler;
use crate::types::RowValues;

macro_rules! assemble {
    ($engine:ident, $method:ident ( $($arg:expr),* $(,)? )) => {{
        let built = StatementAssembler::new(&mut $engine.compiler, &*$engine.driver).$method($($arg),*);
        $engine.note_failure(built)
    }};
}

impl QueryEngine {
    /// Build a SELECT without running it. Bound values stay in the parameter store for the
    /// next [`Self::query`].
    ///
    /// # Errors
    /// Returns `SqlSessionError::ClauseError` for an empty table, a HAVING fragment without
    /// GROUP BY, or malformed conditions.
    pub fn select_sql<S: AsRef<str>>(
        &mut self,
        table: &str,
        columns: &[S],
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        assemble!(self, select(table, columns, args))
    }

    /// Build and run a SELECT.
    ///
    /// # Errors
    /// Clause errors as in [`Self::select_sql`], driver errors as in [`Self::query`].
    pub async fn selecting<S: AsRef<str>>(
        &mut self,
        table: &str,
        columns: &[S],
        args: &[Condition],
    ) -> Result<ResultSet, SqlSessionError> {
        let sql = assemble!(self, select(table, columns, args))?;
        let result = self.query(&sql).await?;
        Ok(result.into_rows().unwrap_or_default())
    }

    /// `CREATE TABLE new AS SELECT … FROM old`.
    ///
    /// # Errors
    /// Clause errors as in [`Self::select_sql`], driver errors as in [`Self::query`].
    pub async fn create_select<S: AsRef<str>>(
        &mut self,
        new_table: &str,
        columns: &[S],
        old_table: &str,
        args: &[Condition],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, create_select(new_table, columns, old_table, args))?;
        self.query(&sql).await
    }

    /// `SELECT … INTO new FROM old`.
    ///
    /// # Errors
    /// Clause errors as in [`Self::select_sql`], driver errors as in [`Self::query`].
    pub async fn select_into<S: AsRef<str>>(
        &mut self,
        new_table: &str,
        columns: &[S],
        old_table: &str,
        args: &[Condition],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, select_into(new_table, columns, old_table, args))?;
        self.query(&sql).await
    }

    /// INSERT one row; the result carries the new row's id.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table or column list, driver errors as in
    /// [`Self::query`].
    pub async fn insert(
        &mut self,
        table: &str,
        values: &[(String, RowValues)],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, insert(table, values))?;
        self.query(&sql).await
    }

    /// REPLACE one row.
    ///
    /// # Errors
    /// Same as [`Self::insert`].
    pub async fn replace(
        &mut self,
        table: &str,
        values: &[(String, RowValues)],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, replace(table, values))?;
        self.query(&sql).await
    }

    /// UPDATE matching rows. Matching nothing is a zero count, not an error.
    ///
    /// # Errors
    /// Same as [`Self::insert`], plus malformed conditions.
    pub async fn update(
        &mut self,
        table: &str,
        values: &[(String, RowValues)],
        conditions: &[Condition],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, update(table, values, conditions))?;
        self.query(&sql).await
    }

    /// DELETE matching rows.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table or malformed conditions, driver
    /// errors as in [`Self::query`].
    pub async fn delete(
        &mut self,
        table: &str,
        conditions: &[Condition],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(self, delete(table, conditions))?;
        self.query(&sql).await
    }

    /// `INSERT INTO to (cols) SELECT … FROM from`.
    ///
    /// # Errors
    /// Clause errors as in [`Self::select_sql`], driver errors as in [`Self::query`].
    pub async fn insert_select<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        to_table: &str,
        to_columns: &[S],
        from_table: &str,
        from_columns: &[T],
        args: &[Condition],
    ) -> Result<QueryResult, SqlSessionError> {
        let sql = assemble!(
            self,
            insert_select(to_table, to_columns, from_table, from_columns, args)
        )?;
        self.query(&sql).await
    }
}
