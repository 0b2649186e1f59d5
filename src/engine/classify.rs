use std::sync::LazyLock;

use regex::Regex;

use crate::driver::StatementKind;

static MUTATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(insert|delete|update|replace|drop|create)\s+")
        .expect("mutating keyword pattern is valid")
});

static RETURNS_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(insert|replace)\s+").expect("insert keyword pattern is valid")
});

/// Leading keyword decides: INSERT/DELETE/UPDATE/REPLACE/DROP/CREATE mutate, everything else
/// produces rows.
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    if MUTATING.is_match(sql) {
        StatementKind::Mutating
    } else {
        StatementKind::RowProducing
    }
}

/// INSERT/REPLACE capture the last insert id.
#[must_use]
pub fn captures_insert_id(sql: &str) -> bool {
    RETURNS_ID.is_match(sql)
}
