#![forbid(unsafe_code)]

//! A single-session SQL query layer.
//!
//! A [`QueryEngine`] wraps one backend [`Driver`](driver::Driver) and adds the conveniences
//! around it: structured WHERE/HAVING clause compilation with bound parameters, SQL statement
//! assembly helpers, a TTL-based on-disk result cache, and per-session bookkeeping (last query,
//! captured errors, column metadata, timings).
//!
//! ```no_run
//! use sql_session::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlSessionError> {
//! let mut session = QueryEngine::open(&SessionConfig::sqlite(":memory:"))?;
//! session
//!     .query("CREATE TABLE unit_test (id INTEGER PRIMARY KEY, test_key TEXT)")
//!     .await?;
//! session
//!     .insert("unit_test", &assignments([("test_key", "test 1")]))
//!     .await?;
//! let rows = session
//!     .selecting("unit_test", &["*"], &[Condition::eq("test_key", "test 1")])
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clause;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod report;
pub mod results;
pub mod statement;
pub mod translation;
pub mod types;

pub use config::SessionConfig;
pub use engine::QueryEngine;
pub use error::SqlSessionError;
pub use types::RowValues;
