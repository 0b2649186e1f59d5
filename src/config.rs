use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::ConnectParams;
use crate::error::SqlSessionError;
use crate::types::DriverKind;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Disk result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub ttl: Duration,
    /// Cache row-producing statements.
    pub cache_queries: bool,
    /// Cache mutating statements.
    pub cache_inserts: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: std::env::temp_dir().join("sql-session-cache"),
            ttl: Duration::from_secs(24 * SECS_PER_HOUR),
            cache_queries: false,
            cache_inserts: false,
        }
    }
}

impl CacheConfig {
    /// Whether results of this statement class are written to disk.
    #[must_use]
    pub fn stores(&self, mutating: bool) -> bool {
        self.enabled
            && if mutating {
                self.cache_inserts
            } else {
                self.cache_queries
            }
    }
}

/// Debug and bookkeeping switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Log a session report after every call.
    pub debug_all: bool,
    /// Keep a session report per call in the trace log.
    pub use_trace_log: bool,
    /// Record `{query, elapsed}` for every call.
    pub profile: bool,
    /// Log recorded errors at `warn` instead of `debug`.
    pub show_errors: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            debug_all: false,
            use_trace_log: false,
            profile: false,
            show_errors: true,
        }
    }
}

/// Everything needed to open a [`QueryEngine`](crate::engine::QueryEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub driver: DriverKind,
    pub dsn: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub file_based: bool,
    #[serde(default = "prepared_default")]
    pub prepared: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

fn prepared_default() -> bool {
    true
}

impl SessionConfig {
    #[must_use]
    pub fn builder(driver: DriverKind, dsn: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(driver, dsn)
    }

    /// File-backed `SQLite` session at `path` (`:memory:` for an in-memory database).
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        SessionConfigBuilder::new(DriverKind::Sqlite, path)
            .file_based(true)
            .finish()
    }

    /// Parse a JSON document into a config.
    ///
    /// # Errors
    /// Returns `SqlSessionError::Json` for malformed input and
    /// `SqlSessionError::ConfigError` when the parsed config fails [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, SqlSessionError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Required connection parameters are present.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConfigError` naming the missing parameter.
    pub fn validate(&self) -> Result<(), SqlSessionError> {
        if self.dsn.trim().is_empty() {
            return Err(SqlSessionError::ConfigError(
                "a dsn (or database path) is required".into(),
            ));
        }
        if !self.file_based {
            if self.user.as_deref().is_none_or(str::is_empty) {
                return Err(SqlSessionError::ConfigError("user is required".into()));
            }
            if self.password.is_none() {
                return Err(SqlSessionError::ConfigError("password is required".into()));
            }
        }
        if self.cache.enabled && self.cache.directory.as_os_str().is_empty() {
            return Err(SqlSessionError::ConfigError(
                "cache directory is required when caching is enabled".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            dsn: self.dsn.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            options: self.options.clone(),
            file_based: self.file_based,
        }
    }
}

/// Fluent builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    #[must_use]
    pub fn new(driver: DriverKind, dsn: impl Into<String>) -> Self {
        Self {
            config: SessionConfig {
                driver,
                dsn: dsn.into(),
                user: None,
                password: None,
                options: BTreeMap::new(),
                file_based: false,
                prepared: true,
                cache: CacheConfig::default(),
                trace: TraceConfig::default(),
            },
        }
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn file_based(mut self, file_based: bool) -> Self {
        self.config.file_based = file_based;
        self
    }

    #[must_use]
    pub fn prepared(mut self, prepared: bool) -> Self {
        self.config.prepared = prepared;
        self
    }

    /// Enable the disk cache in `directory`.
    #[must_use]
    pub fn cache_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.cache.enabled = true;
        self.config.cache.directory = directory.into();
        self
    }

    #[must_use]
    pub fn cache_ttl_hours(mut self, hours: u64) -> Self {
        self.config.cache.ttl = Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR));
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.ttl = ttl;
        self
    }

    #[must_use]
    pub fn cache_queries(mut self, on: bool) -> Self {
        self.config.cache.cache_queries = on;
        self
    }

    #[must_use]
    pub fn cache_inserts(mut self, on: bool) -> Self {
        self.config.cache.cache_inserts = on;
        self
    }

    #[must_use]
    pub fn debug_all(mut self, on: bool) -> Self {
        self.config.trace.debug_all = on;
        self
    }

    #[must_use]
    pub fn trace_log(mut self, on: bool) -> Self {
        self.config.trace.use_trace_log = on;
        self
    }

    #[must_use]
    pub fn profile(mut self, on: bool) -> Self {
        self.config.trace.profile = on;
        self
    }

    #[must_use]
    pub fn show_errors(mut self, on: bool) -> Self {
        self.config.trace.show_errors = on;
        self
    }

    #[must_use]
    pub fn finish(self) -> SessionConfig {
        self.config
    }

    /// Finish and validate.
    ///
    /// # Errors
    /// Returns `SqlSessionError::ConfigError` when required parameters are missing.
    pub fn build(self) -> Result<SessionConfig, SqlSessionError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
