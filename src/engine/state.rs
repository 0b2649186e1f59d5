use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::DriverErrorInfo;
use crate::results::{ColumnInfo, QueryResult, ResultSet};

/// Errors and calls kept per session before the oldest are dropped.
pub const LOG_CAPACITY: usize = 100;

/// One recorded failure and the statement that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedError {
    pub message: String,
    pub query: Option<String>,
}

/// A driver error the session chose not to fail on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub info: DriverErrorInfo,
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub query: String,
    pub elapsed: Duration,
}

/// Mutable bookkeeping owned by one engine.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub last_query: Option<String>,
    pub last_error: Option<String>,
    pub captured_errors: VecDeque<CapturedError>,
    pub notices: Vec<Notice>,
    pub col_info: Vec<ColumnInfo>,
    pub last_result: Option<ResultSet>,
    pub outcome: Option<QueryResult>,
    pub num_rows: u64,
    pub rows_affected: u64,
    pub insert_id: Option<i64>,
    pub from_disk_cache: bool,
    pub func_call: Option<String>,
    pub all_func_calls: VecDeque<String>,
    pub num_queries: u64,
    pub conn_queries: u64,
    pub timers: HashMap<u64, Instant>,
    pub total_query_time: Duration,
    pub profile_times: Vec<ProfileEntry>,
}

impl SessionState {
    /// Drop everything the previous call produced.
    pub fn reset_scratch(&mut self) {
        self.col_info.clear();
        self.last_result = None;
        self.outcome = None;
        self.num_rows = 0;
        self.rows_affected = 0;
        self.insert_id = None;
        self.from_disk_cache = false;
        self.notices.clear();
    }

    pub fn log_call(&mut self, call: String) {
        if self.all_func_calls.len() == LOG_CAPACITY {
            self.all_func_calls.pop_front();
        }
        self.all_func_calls.push_back(call.clone());
        self.func_call = Some(call);
    }

    pub fn capture_error(&mut self, message: String) {
        if self.captured_errors.len() == LOG_CAPACITY {
            self.captured_errors.pop_front();
        }
        self.captured_errors.push_back(CapturedError {
            message: message.clone(),
            query: self.last_query.clone(),
        });
        self.last_error = Some(message);
    }

    /// Apply a finished result to the per-call fields.
    pub fn absorb(&mut self, result: &QueryResult) {
        match result {
            QueryResult::Affected { rows, insert_id } => {
                self.rows_affected = *rows;
                self.insert_id = *insert_id;
            }
            QueryResult::Rows(set) => {
                self.col_info = set.columns().to_vec();
                self.num_rows = set.len() as u64;
                self.last_result = Some(set.clone());
            }
        }
        self.outcome = Some(result.clone());
    }

    /// Bump both query counters and return the lifetime count.
    pub fn count_query(&mut self) -> u64 {
        self.num_queries += 1;
        self.conn_queries += 1;
        self.num_queries
    }

    pub fn timer_start(&mut self, id: u64) {
        self.timers.insert(id, Instant::now());
    }

    pub fn timer_elapsed(&self, id: u64) -> Duration {
        self.timers
            .get(&id)
            .map(Instant::elapsed)
            .unwrap_or_default()
    }

    /// Fold a finished timer into the totals (and the profile, when enabled).
    pub fn timer_update_global(&mut self, id: u64, profile: bool) -> Duration {
        let elapsed = self.timer_elapsed(id);
        self.timers.remove(&id);
        if profile {
            self.profile_times.push(ProfileEntry {
                query: self.last_query.clone().unwrap_or_default(),
                elapsed,
            });
        }
        self.total_query_time += elapsed;
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_is_bounded() {
        let mut state = SessionState::default();
        state.last_query = Some("SELECT 1".into());
        for i in 0..=LOG_CAPACITY {
            state.capture_error(format!("err {i}"));
        }
        assert_eq!(state.captured_errors.len(), LOG_CAPACITY);
        assert_eq!(state.captured_errors[0].message, "err 1");
        assert_eq!(state.last_error.as_deref(), Some("err 100"));
        assert_eq!(state.captured_errors[0].query.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn counters_and_profile() {
        let mut state = SessionState::default();
        let id = state.count_query();
        assert_eq!(id, 1);
        state.last_query = Some("SELECT 1".into());
        state.timer_start(id);
        state.timer_update_global(id, true);
        assert_eq!(state.profile_times.len(), 1);
        assert_eq!(state.profile_times[0].query, "SELECT 1");
        assert!(state.timers.is_empty());
    }
}
