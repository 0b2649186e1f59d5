//! Disk-backed result cache keyed by a hash of the normalized statement text.
//!
//! One JSON file per statement inside the cache directory. A stale entry triggers one refresh:
//! the first caller to see it touches a sibling `<file>.updating` marker and misses, while
//! callers arriving within [`MARKER_WINDOW`] keep getting the stale entry. The marker is
//! advisory; two processes observing staleness at the same instant both refresh.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::SqlSessionError;
use crate::results::{ColumnInfo, QueryResult, ResultSet};
use crate::types::RowValues;

/// How long a refresh marker suppresses further refreshes of the same stale entry.
pub const MARKER_WINDOW: Duration = Duration::from_secs(60);

const MARKER_SUFFIX: &str = ".updating";

/// Serialized payload of one cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub col_info: Vec<ColumnInfo>,
    pub last_result: Vec<Vec<RowValues>>,
    pub num_rows: u64,
    pub return_value: u64,
    #[serde(default)]
    pub insert_id: Option<i64>,
    #[serde(default)]
    pub mutating: bool,
    pub stored_at: i64,
}

impl CacheEntry {
    #[must_use]
    pub fn from_result(result: &QueryResult) -> Self {
        let stored_at = chrono::Utc::now().timestamp();
        match result {
            QueryResult::Rows(set) => Self {
                col_info: set.columns().to_vec(),
                last_result: set.positional_rows(),
                num_rows: set.len() as u64,
                return_value: set.len() as u64,
                insert_id: None,
                mutating: false,
                stored_at,
            },
            QueryResult::Affected { rows, insert_id } => Self {
                col_info: Vec::new(),
                last_result: Vec::new(),
                num_rows: 0,
                return_value: *rows,
                insert_id: *insert_id,
                mutating: true,
                stored_at,
            },
        }
    }

    #[must_use]
    pub fn into_result(self) -> QueryResult {
        if self.mutating {
            QueryResult::Affected {
                rows: self.return_value,
                insert_id: self.insert_id,
            }
        } else {
            QueryResult::Rows(ResultSet::from_parts(self.col_info, self.last_result))
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    /// Entry is stale and this caller took the refresh marker.
    Refresh,
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    directory: PathBuf,
    ttl: Duration,
}

impl ResultCache {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            directory: directory.into(),
            ttl,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Hex SHA-256 of the exact statement text.
    #[must_use]
    pub fn key(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn entry_path(&self, query: &str) -> PathBuf {
        self.directory.join(Self::key(query))
    }

    fn marker_path(entry: &Path) -> PathBuf {
        let mut marker = entry.as_os_str().to_owned();
        marker.push(MARKER_SUFFIX);
        PathBuf::from(marker)
    }

    /// Create the cache directory if it is missing.
    ///
    /// # Errors
    /// Returns `SqlSessionError::CacheIo` when the directory cannot be created.
    pub async fn ensure_directory(&self) -> Result<(), SqlSessionError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                SqlSessionError::CacheIo(format!(
                    "cannot create cache directory {}: {e}",
                    self.directory.display()
                ))
            })
    }

    /// Look up a statement.
    ///
    /// # Errors
    /// Returns `SqlSessionError::CacheIo` if an existing entry cannot be read or the refresh
    /// marker cannot be written, and `SqlSessionError::Json` for an unreadable payload.
    pub async fn lookup(&self, query: &str) -> Result<CacheLookup, SqlSessionError> {
        let path = self.entry_path(query);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %Self::key(query), "Cache miss");
                return Ok(CacheLookup::Miss);
            }
            Err(e) => return Err(e.into()),
        };

        if age(metadata.modified()?) > self.ttl {
            let marker = Self::marker_path(&path);
            let marker_fresh = match tokio::fs::metadata(&marker).await {
                Ok(m) => age(m.modified()?) < MARKER_WINDOW,
                Err(_) => false,
            };
            if !marker_fresh {
                tokio::fs::write(&marker, b"").await?;
                debug!(path = ?path, "Cache entry stale, refreshing");
                return Ok(CacheLookup::Refresh);
            }
            debug!(path = ?path, "Cache entry stale, refresh in flight; serving stale entry");
        }

        let bytes = tokio::fs::read(&path).await?;
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        debug!(key = %Self::key(query), rows = entry.num_rows, "Cache hit");
        Ok(CacheLookup::Hit(entry))
    }

    /// Write an entry atomically (temp file then rename) and drop any refresh marker.
    ///
    /// # Errors
    /// Returns `SqlSessionError::CacheIo` when the directory or file cannot be written.
    pub async fn store(&self, query: &str, entry: &CacheEntry) -> Result<(), SqlSessionError> {
        self.ensure_directory().await?;
        let path = self.entry_path(query);
        let temp = path.with_extension("tmp");
        let payload = serde_json::to_vec(entry)?;

        tokio::fs::write(&temp, payload).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        let marker = Self::marker_path(&path);
        if let Err(e) = tokio::fs::remove_file(&marker).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?marker, error = %e, "Failed to remove cache refresh marker");
            }
        }
        debug!(path = ?path, rows = entry.num_rows, "Stored cache entry");
        Ok(())
    }
}

fn age(modified: SystemTime) -> Duration {
    modified.elapsed().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> QueryResult {
        QueryResult::Rows(ResultSet::from_parts(
            vec![ColumnInfo::new("id", "INTEGER"), ColumnInfo::new("name", "TEXT")],
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Null],
            ],
        ))
    }

    #[test]
    fn key_is_stable_hex_per_text() {
        let a = ResultCache::key("SELECT 1");
        assert_eq!(a, ResultCache::key("SELECT 1"));
        assert_ne!(a, ResultCache::key("SELECT  1"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn round_trip_within_ttl() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = ResultCache::new(dir.path().join("cache"), Duration::from_secs(3600));
        let query = "SELECT id, name FROM t";
        assert_eq!(cache.lookup(query).await?, CacheLookup::Miss);

        let result = sample();
        cache.store(query, &CacheEntry::from_result(&result)).await?;

        let CacheLookup::Hit(entry) = cache.lookup(query).await? else {
            panic!("expected a hit");
        };
        assert_eq!(entry.num_rows, 2);
        assert_eq!(entry.into_result(), result);
        Ok(())
    }

    fn backdate(path: &Path, by: Duration) -> std::io::Result<()> {
        std::fs::File::options()
            .write(true)
            .open(path)?
            .set_modified(SystemTime::now() - by)
    }

    #[tokio::test]
    async fn entries_younger_than_ttl_are_hits() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600));
        let query = "SELECT id, name FROM t";
        cache
            .store(query, &CacheEntry::from_result(&sample()))
            .await?;

        backdate(&cache.entry_path(query), Duration::from_secs(1800))?;
        assert!(matches!(cache.lookup(query).await?, CacheLookup::Hit(_)));
        assert!(!ResultCache::marker_path(&cache.entry_path(query)).exists());
        Ok(())
    }

    #[tokio::test]
    async fn stale_entry_refreshes_once_then_serves_until_stored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = ResultCache::new(dir.path(), Duration::from_secs(3600));
        let query = "SELECT id, name FROM t";
        cache
            .store(query, &CacheEntry::from_result(&sample()))
            .await?;
        backdate(&cache.entry_path(query), Duration::from_secs(7200))?;

        assert_eq!(cache.lookup(query).await?, CacheLookup::Refresh);
        let marker = ResultCache::marker_path(&cache.entry_path(query));
        assert!(marker.exists());

        assert!(matches!(cache.lookup(query).await?, CacheLookup::Hit(_)));

        cache
            .store(query, &CacheEntry::from_result(&sample()))
            .await?;
        assert!(!marker.exists());
        Ok(())
    }

    #[test]
    fn affected_entries_restore_counts() {
        let result = QueryResult::Affected {
            rows: 1,
            insert_id: Some(3),
        };
        let entry = CacheEntry::from_result(&result);
        assert!(entry.mutating);
        assert_eq!(entry.into_result(), result);
    }
}
