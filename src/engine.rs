//! The query session: clause compilation, cache lookup, driver dispatch and bookkeeping.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheLookup, ResultCache};
use crate::clause::{Clause, ClauseCompiler, Condition, ParameterStore};
use crate::config::{CacheConfig, SessionConfig, TraceConfig};
use crate::driver::{ConnectParams, Driver, Execution, StatementKind};
use crate::error::{DriverErrorInfo, SqlSessionError};
use crate::report::{DumpedValue, SessionReport};
use crate::results::{ColumnInfo, QueryResult, ResultSet};
use crate::translation::normalize_statement;
use crate::types::{DriverKind, RowValues};

mod classify;
mod readers;
mod state;
mod statements;

pub use classify::{captures_insert_id, classify};
pub use state::{CapturedError, LOG_CAPACITY, Notice, ProfileEntry};

use state::SessionState;

/// One logical session against one driver.
///
/// Every method takes `&mut self`: calls are strictly sequential and each one sees the state
/// left by the previous call. Values bound while compiling clauses wait in the session's
/// [`ParameterStore`] and are consumed (and cleared) by the next executed statement.
pub struct QueryEngine {
    driver: Box<dyn Driver>,
    connect_params: ConnectParams,
    compiler: ClauseCompiler,
    cache_config: CacheConfig,
    cache: Option<ResultCache>,
    trace: TraceConfig,
    state: SessionState,
    trace_log: Vec<SessionReport>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("driver", &self.driver.name())
            .field("connected", &self.driver.is_connected())
            .field("prepared", &self.compiler.is_prepared())
            .field("num_queries", &self.state.num_queries)
            .finish_non_exhaustive()
    }
}

impl QueryEngine {
    /// Session over an already-constructed driver.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConfigError` when required connection parameters are absent.
    pub fn new(driver: Box<dyn Driver>, config: &SessionConfig) -> Result<Self, SqlSessionError> {
        config.validate()?;
        let cache = config
            .cache
            .enabled
            .then(|| ResultCache::new(config.cache.directory.clone(), config.cache.ttl));
        Ok(Self {
            driver,
            connect_params: config.connect_params(),
            compiler: ClauseCompiler::new(config.prepared),
            cache_config: config.cache.clone(),
            cache,
            trace: config.trace.clone(),
            state: SessionState::default(),
            trace_log: Vec::new(),
        })
    }

    /// Session over the bundled driver for `config.driver`.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConfigError` when required connection parameters are absent
    /// or the driver is not compiled in.
    pub fn open(config: &SessionConfig) -> Result<Self, SqlSessionError> {
        let driver: Box<dyn Driver> = match config.driver {
            #[cfg(feature = "sqlite")]
            DriverKind::Sqlite => Box::new(crate::driver::SqliteDriver::new()),
            #[cfg(not(feature = "sqlite"))]
            DriverKind::Sqlite => {
                return Err(SqlSessionError::ConfigError(
                    "sqlite support is not enabled".into(),
                ));
            }
        };
        Self::new(driver, config)
    }

    #[must_use]
    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Connect with the stored parameters. Resets the per-connection query counter, as does
    /// [`Self::disconnect`].
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConnectionError` when the driver cannot connect; the failure
    /// is also recorded in the session error log.
    pub async fn connect(&mut self) -> Result<(), SqlSessionError> {
        let connected = self.connect_driver().await;
        if connected.is_ok() {
            self.state.conn_queries = 0;
        }
        self.note_failure(connected)
    }

    async fn connect_driver(&mut self) -> Result<(), SqlSessionError> {
        if !self.connect_params.has_credentials() {
            return Err(SqlSessionError::ConnectionError(
                "missing user or password".into(),
            ));
        }
        match self.driver.connect(&self.connect_params).await {
            Ok(()) => {
                info!(driver = self.driver.name(), "Session connected");
                Ok(())
            }
            Err(err @ SqlSessionError::ConnectionError(_)) => Err(err),
            Err(other) => Err(SqlSessionError::ConnectionError(other.to_string())),
        }
    }

    /// # Errors
    /// Returns the driver's error if it fails to close cleanly.
    pub async fn disconnect(&mut self) -> Result<(), SqlSessionError> {
        self.driver.disconnect().await?;
        self.state.conn_queries = 0;
        info!(driver = self.driver.name(), "Session disconnected");
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// Escape text for inline use through the driver.
    #[must_use]
    pub fn escape(&self, raw: &str) -> String {
        Driver::escape(&*self.driver, raw)
    }

    /// The driver's SQL expression for the current date and time.
    #[must_use]
    pub fn sysdate(&self) -> &'static str {
        self.driver.sysdate()
    }

    pub fn prepare_on(&mut self) {
        self.compiler.set_prepared(true);
    }

    pub fn prepare_off(&mut self) {
        self.compiler.set_prepared(false);
    }

    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.compiler.is_prepared()
    }

    pub fn show_errors(&mut self) {
        self.trace.show_errors = true;
    }

    pub fn hide_errors(&mut self) {
        self.trace.show_errors = false;
    }

    pub fn debug_on(&mut self) {
        self.trace.debug_all = true;
    }

    pub fn debug_off(&mut self) {
        self.trace.debug_all = false;
    }

    /// Enable the disk cache in `path` (or the configured directory) and create it.
    ///
    /// # Errors
    /// Returns `SqlSessionError::CacheIo` when the directory cannot be created.
    pub async fn create_cache(&mut self, path: Option<PathBuf>) -> Result<(), SqlSessionError> {
        if let Some(path) = path {
            self.cache_config.directory = path;
        }
        self.cache_config.enabled = true;
        let cache = ResultCache::new(self.cache_config.directory.clone(), self.cache_config.ttl);
        if let Err(err) = cache.ensure_directory().await {
            self.record_error(&err);
            return Err(err);
        }
        self.cache = Some(cache);
        Ok(())
    }

    /// Toggle caching of row-producing statements.
    pub fn cache_queries(&mut self, on: bool) {
        self.cache_config.cache_queries = on;
    }

    /// Toggle caching of mutating statements.
    pub fn cache_inserts(&mut self, on: bool) {
        self.cache_config.cache_inserts = on;
    }

    /// Forget the last result, call log and pending parameters.
    pub fn flush(&mut self) {
        self.state.reset_scratch();
        self.state.last_query = None;
        self.state.all_func_calls.clear();
        self.compiler.clear_params();
    }

    /// Compile a WHERE clause (or HAVING, right after [`Self::having`]) into the session's
    /// parameter store.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ClauseError` for malformed conditions; the store is cleared.
    pub fn where_clause(&mut self, conditions: &[Condition]) -> Result<Clause, SqlSessionError> {
        let compiled = self.compiler.where_clause(conditions, &*self.driver);
        self.note_failure(compiled)
    }

    /// Compile a HAVING clause.
    ///
    /// # Errors
    /// Same as [`Self::where_clause`].
    pub fn having(&mut self, conditions: &[Condition]) -> Result<Clause, SqlSessionError> {
        let compiled = self.compiler.having(conditions, &*self.driver);
        self.note_failure(compiled)
    }

    #[must_use]
    pub fn params(&self) -> &ParameterStore {
        self.compiler.params()
    }

    pub fn clear_params(&mut self) {
        self.compiler.clear_params();
    }

    /// Run a statement, binding whatever the parameter store holds.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConnectionError` when no connection can be made, and
    /// `SqlSessionError::Driver` for backend errors. Both are recorded with the statement.
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult, SqlSessionError> {
        self.state.log_call(format!("query(\"{sql}\")"));
        let params = self.compiler.take_params();
        self.run(sql, params).await
    }

    /// Run a statement with explicit values for its `?N` placeholders. Pending values in the
    /// parameter store are discarded.
    ///
    /// # Errors
    /// Same as [`Self::query`].
    pub async fn query_with(
        &mut self,
        sql: &str,
        params: Vec<RowValues>,
    ) -> Result<QueryResult, SqlSessionError> {
        self.state.log_call(format!("query_with(\"{sql}\", {} params)", params.len()));
        self.compiler.clear_params();
        self.run(sql, params).await
    }

    async fn run(
        &mut self,
        sql: &str,
        params: Vec<RowValues>,
    ) -> Result<QueryResult, SqlSessionError> {
        let statement = normalize_statement(sql, self.driver.placeholder_style());
        self.state.reset_scratch();
        self.state.last_query = Some(statement.clone());
        let timer = self.state.count_query();
        self.state.timer_start(timer);

        let cacheable = self
            .cache_config
            .stores(classify(&statement) == StatementKind::Mutating);
        let cache_text = cache_text(&statement, &params);
        if cacheable {
            if let Some(entry) = self.cache_lookup(&cache_text).await {
                let result = entry.into_result();
                self.state.absorb(&result);
                self.state.from_disk_cache = true;
                self.finish(timer, "cache");
                return Ok(result);
            }
        }

        let outcome = self.dispatch(&statement, &params).await;
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.record_error(&err);
                self.finish(timer, "driver");
                return Err(err);
            }
        };
        self.state.absorb(&result);
        if cacheable {
            self.cache_store(&cache_text, &result).await;
        }
        self.finish(timer, "driver");
        Ok(result)
    }

    async fn dispatch(
        &mut self,
        statement: &str,
        params: &[RowValues],
    ) -> Result<QueryResult, SqlSessionError> {
        if !self.driver.is_connected() {
            self.connect_driver().await?;
        }

        let kind = classify(statement);
        let execution = if params.is_empty() {
            self.driver.execute(statement, kind).await?
        } else {
            self.driver.execute_prepared(statement, params, kind).await?
        };

        if let Some(info) = self.driver.last_error_info() {
            if info.is_index_out_of_range() {
                self.record_notice(info);
            } else {
                return Err(SqlSessionError::Driver(info));
            }
        }

        Ok(match execution {
            Execution::Affected(rows) => QueryResult::Affected {
                rows,
                insert_id: if captures_insert_id(statement) {
                    self.driver.last_insert_id()
                } else {
                    None
                },
            },
            Execution::Cursor(mut cursor) => {
                let columns = (0..cursor.column_count())
                    .map(|idx| cursor.column_meta(idx).unwrap_or_else(ColumnInfo::undefined))
                    .collect();
                let mut set = ResultSet::new(columns);
                while let Some(row) = cursor.fetch_row() {
                    set.add_row_values(row);
                }
                QueryResult::Rows(set)
            }
        })
    }

    async fn cache_lookup(&mut self, text: &str) -> Option<CacheEntry> {
        let cache = self.cache.as_ref()?;
        match cache.lookup(text).await {
            Ok(CacheLookup::Hit(entry)) => Some(entry),
            Ok(CacheLookup::Miss | CacheLookup::Refresh) => None,
            Err(err) => {
                self.record_error(&err);
                None
            }
        }
    }

    async fn cache_store(&mut self, text: &str, result: &QueryResult) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.store(text, &CacheEntry::from_result(result)).await {
            self.record_error(&err);
        }
    }

    fn finish(&mut self, timer: u64, source: &'static str) {
        let elapsed: Duration = self.state.timer_update_global(timer, self.trace.profile);
        debug!(
            query = self.state.last_query.as_deref().unwrap_or_default(),
            elapsed = ?elapsed,
            source,
            "Statement finished"
        );
        if self.trace.use_trace_log || self.trace.debug_all {
            let report = self.debug();
            if self.trace.debug_all {
                debug!(report = %report, "Session report");
            }
            if self.trace.use_trace_log {
                self.trace_log.push(report);
            }
        }
    }

    fn note_failure<T>(&mut self, outcome: Result<T, SqlSessionError>) -> Result<T, SqlSessionError> {
        if let Err(err) = &outcome {
            self.record_error(err);
        }
        outcome
    }

    fn record_error(&mut self, err: &SqlSessionError) {
        let message = err.to_string();
        if self.trace.show_errors {
            warn!(error = %message, query = ?self.state.last_query, "Recorded session error");
        } else {
            debug!(error = %message, query = ?self.state.last_query, "Recorded session error");
        }
        self.state.capture_error(message);
    }

    fn record_notice(&mut self, info: DriverErrorInfo) {
        warn!(code = info.code, message = %info.message, "Ignoring out-of-range index error");
        self.state.notices.push(Notice {
            info,
            query: self.state.last_query.clone(),
        });
    }

    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.state.last_query.as_deref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn captured_errors(&self) -> impl Iterator<Item = &CapturedError> {
        self.state.captured_errors.iter()
    }

    /// Ignored driver errors from the most recent call.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.state.notices
    }

    #[must_use]
    pub fn col_info(&self) -> &[ColumnInfo] {
        &self.state.col_info
    }

    #[must_use]
    pub fn num_rows(&self) -> u64 {
        self.state.num_rows
    }

    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.state.rows_affected
    }

    #[must_use]
    pub fn insert_id(&self) -> Option<i64> {
        self.state.insert_id
    }

    #[must_use]
    pub fn from_disk_cache(&self) -> bool {
        self.state.from_disk_cache
    }

    /// Result of the most recent successful call.
    #[must_use]
    pub fn query_result(&self) -> Option<&QueryResult> {
        self.state.outcome.as_ref()
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&ResultSet> {
        self.state.last_result.as_ref()
    }

    /// Lifetime (`all`) or per-connection query count, optionally bumping both first.
    pub fn count(&mut self, all: bool, increase: bool) -> u64 {
        if increase {
            self.state.count_query();
        }
        if all {
            self.state.num_queries
        } else {
            self.state.conn_queries
        }
    }

    #[must_use]
    pub fn total_query_time(&self) -> Duration {
        self.state.total_query_time
    }

    #[must_use]
    pub fn profile_times(&self) -> &[ProfileEntry] {
        &self.state.profile_times
    }

    #[must_use]
    pub fn trace_log(&self) -> &[SessionReport] {
        &self.trace_log
    }

    #[must_use]
    pub fn func_call(&self) -> Option<&str> {
        self.state.func_call.as_deref()
    }

    pub fn all_func_calls(&self) -> impl Iterator<Item = &str> {
        self.state.all_func_calls.iter().map(String::as_str)
    }

    /// Snapshot of the session for display.
    #[must_use]
    pub fn debug(&self) -> SessionReport {
        SessionReport {
            driver: self.driver.name().to_string(),
            num_queries: self.state.num_queries,
            last_query: self.state.last_query.clone(),
            last_error: self.state.last_error.clone(),
            from_disk_cache: self.state.from_disk_cache,
            func_call: self.state.func_call.clone(),
            all_func_calls: self.state.all_func_calls.iter().cloned().collect(),
            col_info: self.state.col_info.clone(),
            rows: self
                .state
                .last_result
                .as_ref()
                .map(ResultSet::positional_rows)
                .unwrap_or_default(),
            rows_affected: match &self.state.outcome {
                Some(QueryResult::Affected { rows, .. }) => Some(*rows),
                _ => None,
            },
            value: None,
        }
    }

    /// [`Self::debug`] plus a description of `value`.
    #[must_use]
    pub fn dump_var<T: std::fmt::Debug + ?Sized>(&self, value: &T) -> SessionReport {
        SessionReport {
            value: Some(DumpedValue::of(value)),
            ..self.debug()
        }
    }
}

/// Text a cache entry is keyed on: the statement, plus its bound values when there are any.
fn cache_text(statement: &str, params: &[RowValues]) -> String {
    if params.is_empty() {
        return statement.to_string();
    }
    let values = params
        .iter()
        .map(|p| p.to_json().to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{statement}\n[{values}]")
}
