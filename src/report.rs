//! Plain-data snapshot of a session, for logs and debugging.

use std::fmt;

use serde::Serialize;

use crate::results::ColumnInfo;
use crate::types::RowValues;

/// State of one [`QueryEngine`](crate::engine::QueryEngine) at the time it was taken.
///
/// Rendering is up to the caller; [`fmt::Display`] gives a plain-text table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub driver: String,
    pub num_queries: u64,
    pub last_query: Option<String>,
    pub last_error: Option<String>,
    pub from_disk_cache: bool,
    pub func_call: Option<String>,
    pub all_func_calls: Vec<String>,
    pub col_info: Vec<ColumnInfo>,
    pub rows: Vec<Vec<RowValues>>,
    pub rows_affected: Option<u64>,
    /// Caller-supplied value for variable dumps.
    pub value: Option<DumpedValue>,
}

/// A value handed to `dump_var`, described by its type and debug rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpedValue {
    pub type_name: String,
    pub rendered: String,
}

impl DumpedValue {
    pub fn of<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Self {
            type_name: std::any::type_name::<T>().to_string(),
            rendered: format!("{value:?}"),
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] session report", self.driver)?;

        if let Some(value) = &self.value {
            writeln!(f, "Value: {}", value.rendered)?;
            writeln!(f, "Type: {}", value.type_name)?;
        }
        if let Some(err) = &self.last_error {
            writeln!(f, "Last error: {err}")?;
        }
        if self.from_disk_cache {
            writeln!(f, "Results retrieved from disk cache")?;
        }
        writeln!(
            f,
            "Query [{}]: {}",
            self.num_queries,
            self.last_query.as_deref().unwrap_or("NULL")
        )?;
        writeln!(
            f,
            "Last function call: {}",
            self.func_call.as_deref().unwrap_or("None")
        )?;
        if self.all_func_calls.len() > 1 {
            writeln!(f, "All function calls:")?;
            for call in &self.all_func_calls {
                writeln!(f, "  {call}")?;
            }
        }

        if let Some(affected) = self.rows_affected {
            return writeln!(f, "Rows affected: {affected}");
        }
        if self.col_info.is_empty() {
            return writeln!(f, "No results");
        }

        let header = self
            .col_info
            .iter()
            .map(|col| format!("{} ({})", col.name, col.native_type))
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(f, "{header}")?;
        if self.rows.is_empty() {
            return writeln!(f, "No rows returned");
        }
        for row in &self.rows {
            let line = row
                .iter()
                .map(|value| value.to_sql_text().into_owned())
                .collect::<Vec<_>>()
                .join(" | ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
