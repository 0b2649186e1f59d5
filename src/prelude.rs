//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::clause::{
    Clause, ClauseCompiler, ClauseKind, Combiner, Condition, Direction, Escaper, Operand,
    Operator, ParameterStore, StandardEscaper, Triple, group_by, order_by,
};
pub use crate::config::{CacheConfig, SessionConfig, SessionConfigBuilder, TraceConfig};
pub use crate::driver::{
    BufferedCursor, ConnectParams, Cursor, Driver, Execution, StatementKind,
};
pub use crate::engine::{CapturedError, Notice, QueryEngine};
pub use crate::error::{DriverErrorInfo, SqlSessionError};
pub use crate::registry::SessionRegistry;
pub use crate::report::SessionReport;
pub use crate::results::{
    ColumnAttr, ColumnInfo, Output, Projection, QueryResult, ResultRow, ResultSet, RowProjection,
};
pub use crate::statement::{Assignments, assignments};
pub use crate::translation::{PlaceholderStyle, translate_placeholders};
pub use crate::types::{DriverKind, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::driver::SqliteDriver;
