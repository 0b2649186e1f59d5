use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{BufferedCursor, ConnectParams, Driver, Execution, StatementKind};
use crate::error::{DriverErrorInfo, SQLITE_RANGE, SqlSessionError};
use crate::results::{ColumnInfo, column::UNDEFINED};
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

pub(crate) type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// DSN opening a private in-memory database.
pub const MEMORY_DSN: &str = ":memory:";

/// `rusqlite` backend. Every statement runs on the blocking pool against one connection.
#[derive(Debug, Default)]
pub struct SqliteDriver {
    conn: Option<SharedSqliteConnection>,
    last_insert_id: Option<i64>,
    last_error: Option<DriverErrorInfo>,
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self) -> Result<SharedSqliteConnection, SqlSessionError> {
        self.conn
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| SqlSessionError::ConnectionError("sqlite driver is not connected".into()))
    }

    async fn run(
        &mut self,
        sql: &str,
        params: &[RowValues],
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError> {
        self.last_error = None;
        let conn = self.handle()?;
        let sql = sql.to_string();
        let values: Vec<Value> = params.iter().map(row_value_to_sqlite_value).collect();

        let outcome = run_blocking(conn, move |conn| execute_on(conn, &sql, &values, kind)).await;
        match outcome {
            Ok(done) => {
                if let Some(id) = done.insert_id {
                    self.last_insert_id = Some(id);
                }
                self.last_error = done.skipped;
                Ok(done.execution)
            }
            Err(SqlSessionError::SqliteError(err)) => {
                let info = driver_error_info(&err);
                self.last_error = Some(info.clone());
                Err(SqlSessionError::Driver(info))
            }
            Err(other) => Err(other),
        }
    }
}

struct Completed {
    execution: Execution,
    insert_id: Option<i64>,
    skipped: Option<DriverErrorInfo>,
}

fn execute_on(
    conn: &mut rusqlite::Connection,
    sql: &str,
    values: &[Value],
    kind: StatementKind,
) -> Result<Completed, SqlSessionError> {
    let mut stmt = conn.prepare(sql)?;
    let expected = stmt.parameter_count();
    let skipped = (values.len() > expected).then(|| {
        DriverErrorInfo::new(
            SQLITE_RANGE,
            format!(
                "column index out of range: {} values bound, statement takes {expected}",
                values.len()
            ),
        )
    });
    for (idx, value) in values.iter().take(expected).enumerate() {
        stmt.raw_bind_parameter(idx + 1, value)?;
    }

    match kind {
        StatementKind::Mutating => {
            let affected = stmt.raw_execute()?;
            drop(stmt);
            Ok(Completed {
                execution: Execution::Affected(affected as u64),
                insert_id: Some(conn.last_insert_rowid()),
                skipped,
            })
        }
        StatementKind::RowProducing => {
            let columns: Vec<ColumnInfo> = stmt
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.decl_type().unwrap_or(UNDEFINED)))
                .collect();
            let width = columns.len();
            let mut rows = Vec::new();
            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(sqlite_extract_value(row, idx)?);
                }
                rows.push(values);
            }
            Ok(Completed {
                execution: Execution::Cursor(Box::new(BufferedCursor::new(columns, rows))),
                insert_id: None,
                skipped,
            })
        }
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlSessionError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlSessionError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlSessionError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlSessionError::SqliteError` if the column cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, SqlSessionError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Primary result code and message of a rusqlite error.
///
/// Errors that carry no SQLite result code (type conversions, invalid column names) report
/// `-1`.
#[must_use]
pub fn driver_error_info(err: &rusqlite::Error) -> DriverErrorInfo {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => DriverErrorInfo::new(
            failure.extended_code & 0xff,
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        // Prepare failures with a token offset, e.g. syntax errors.
        rusqlite::Error::SqlInputError { error, msg, .. } => {
            DriverErrorInfo::new(error.extended_code & 0xff, msg.clone())
        }
        other => DriverErrorInfo::new(-1, other.to_string()),
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    fn sysdate(&self) -> &'static str {
        "datetime('now')"
    }

    async fn connect(&mut self, params: &ConnectParams) -> Result<(), SqlSessionError> {
        let path = if params.dsn.trim().is_empty() {
            MEMORY_DSN.to_string()
        } else {
            params.dsn.clone()
        };
        let journal_mode = params.options.get("journal_mode").cloned();

        let opened = path.clone();
        let conn = tokio::task::spawn_blocking(move || rusqlite::Connection::open(opened))
            .await
            .map_err(|e| SqlSessionError::ConnectionError(format!("sqlite open join error: {e}")))?
            .map_err(|e| SqlSessionError::ConnectionError(format!("cannot open {path}: {e}")))?;
        let shared = Arc::new(Mutex::new(conn));

        if let Some(mode) = journal_mode {
            if !mode.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(SqlSessionError::ConfigError(format!(
                    "invalid sqlite journal_mode `{mode}`"
                )));
            }
            run_blocking(Arc::clone(&shared), move |conn| {
                conn.execute_batch(&format!("PRAGMA journal_mode = {mode};"))?;
                Ok(())
            })
            .await?;
        }

        info!(dsn = %path, "Connected sqlite driver");
        self.conn = Some(shared);
        self.last_error = None;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SqlSessionError> {
        if self.conn.take().is_some() {
            debug!("Closed sqlite connection");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }

    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError> {
        self.run(sql, &[], kind).await
    }

    async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[RowValues],
        kind: StatementKind,
    ) -> Result<Execution, SqlSessionError> {
        self.run(sql, params, kind).await
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    fn last_error_info(&self) -> Option<DriverErrorInfo> {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_driver() -> Result<SqliteDriver, SqlSessionError> {
        let mut driver = SqliteDriver::new();
        driver.connect(&ConnectParams::file(MEMORY_DSN)).await?;
        driver
            .execute(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
                StatementKind::Mutating,
            )
            .await?;
        Ok(driver)
    }

    #[tokio::test]
    async fn prepared_insert_reports_rowid() -> Result<(), Box<dyn std::error::Error>> {
        let mut driver = memory_driver().await?;
        let done = driver
            .execute_prepared(
                "INSERT INTO t (name) VALUES (?1)",
                &[RowValues::Text("a".into())],
                StatementKind::Mutating,
            )
            .await?;
        assert!(matches!(done, Execution::Affected(1)));
        assert_eq!(driver.last_insert_id(), Some(1));
        assert!(driver.last_error_info().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn cursor_carries_declared_types() -> Result<(), Box<dyn std::error::Error>> {
        let mut driver = memory_driver().await?;
        driver
            .execute("INSERT INTO t (name) VALUES ('x')", StatementKind::Mutating)
            .await?;
        let Execution::Cursor(mut cursor) = driver
            .execute("SELECT id, name, 1 + 1 AS two FROM t", StatementKind::RowProducing)
            .await?
        else {
            panic!("expected a cursor");
        };
        assert_eq!(cursor.column_count(), 3);
        assert_eq!(cursor.column_meta(0), Some(ColumnInfo::new("id", "INTEGER")));
        assert_eq!(cursor.column_meta(2), Some(ColumnInfo::new("two", UNDEFINED)));
        assert_eq!(
            cursor.fetch_row(),
            Some(vec![
                RowValues::Int(1),
                RowValues::Text("x".into()),
                RowValues::Int(2)
            ])
        );
        assert_eq!(cursor.fetch_row(), None);
        Ok(())
    }

    #[tokio::test]
    async fn surplus_values_are_reported_as_range_errors() -> Result<(), Box<dyn std::error::Error>> {
        let mut driver = memory_driver().await?;
        driver
            .execute_prepared(
                "INSERT INTO t (name) VALUES (?1)",
                &[RowValues::Text("a".into()), RowValues::Int(7)],
                StatementKind::Mutating,
            )
            .await?;
        let info = driver.last_error_info().expect("range notice");
        assert!(info.is_index_out_of_range());
        Ok(())
    }

    #[tokio::test]
    async fn syntax_errors_carry_sqlite_codes() -> Result<(), Box<dyn std::error::Error>> {
        let mut driver = memory_driver().await?;
        let err = driver
            .execute("SELEC nonsense", StatementKind::RowProducing)
            .await
            .unwrap_err();
        let SqlSessionError::Driver(info) = err else {
            panic!("expected a driver error");
        };
        assert_eq!(info.code, 1);
        assert!(info.message.contains("syntax error"));
        assert_eq!(driver.last_error_info(), Some(info));
        Ok(())
    }

    #[tokio::test]
    async fn constraint_failures_carry_primary_codes() -> Result<(), Box<dyn std::error::Error>> {
        let mut driver = memory_driver().await?;
        driver
            .execute("CREATE TABLE u (id INTEGER PRIMARY KEY)", StatementKind::Mutating)
            .await?;
        driver
            .execute("INSERT INTO u (id) VALUES (1)", StatementKind::Mutating)
            .await?;
        let err = driver
            .execute("INSERT INTO u (id) VALUES (1)", StatementKind::Mutating)
            .await
            .unwrap_err();
        let SqlSessionError::Driver(info) = err else {
            panic!("expected a driver error");
        };
        // SQLITE_CONSTRAINT, with the extended PRIMARYKEY bits masked off.
        assert_eq!(info.code, 19);
        Ok(())
    }

    #[test]
    fn input_errors_keep_their_sqlite_code() {
        let err = rusqlite::Error::SqlInputError {
            error: rusqlite::ffi::Error::new(1),
            msg: "near \"SELEC\": syntax error".into(),
            sql: "SELEC nonsense".into(),
            offset: 0,
        };
        let info = driver_error_info(&err);
        assert_eq!(info.code, 1);
        assert_eq!(info.message, "near \"SELEC\": syntax error");
    }

    #[test]
    fn errors_without_sqlite_codes_report_minus_one() {
        let info = driver_error_info(&rusqlite::Error::InvalidColumnName("nope".into()));
        assert_eq!(info.code, -1);
        assert!(info.message.contains("nope"));
    }

    #[tokio::test]
    async fn execute_without_connect_fails() {
        let mut driver = SqliteDriver::new();
        let err = driver
            .execute("SELECT 1", StatementKind::RowProducing)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlSessionError::ConnectionError(_)));
    }
}
