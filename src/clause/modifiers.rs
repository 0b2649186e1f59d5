use super::compiler::{Clause, ClauseKind};
use crate::error::SqlSessionError;

/// Sort direction for [`order_by`]. Unrecognized input falls back to ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl From<&str> for Direction {
    fn from(token: &str) -> Self {
        Direction::parse(token)
    }
}

fn column_list<S: AsRef<str>>(columns: &[S], kind: ClauseKind) -> Result<String, SqlSessionError> {
    let joined = columns
        .iter()
        .map(AsRef::as_ref)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        return Err(SqlSessionError::clause(format!(
            "{} needs at least one column",
            kind.keyword()
        )));
    }
    Ok(joined)
}

/// `GROUP BY a, b`.
///
/// # Errors
/// Returns `SqlSessionError::ClauseError` when no column is given.
pub fn group_by<S: AsRef<str>>(columns: &[S]) -> Result<Clause, SqlSessionError> {
    let cols = column_list(columns, ClauseKind::GroupBy)?;
    Ok(Clause::fragment(ClauseKind::GroupBy, format!("GROUP BY {cols}")))
}

/// `ORDER BY a, b ASC|DESC`.
///
/// # Errors
/// Returns `SqlSessionError::ClauseError` when no column is given.
pub fn order_by<S: AsRef<str>>(
    columns: &[S],
    direction: impl Into<Direction>,
) -> Result<Clause, SqlSessionError> {
    let cols = column_list(columns, ClauseKind::OrderBy)?;
    let direction = direction.into();
    Ok(Clause::fragment(
        ClauseKind::OrderBy,
        format!("ORDER BY {cols} {}", direction.as_str()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_by_joins_columns() {
        let clause = group_by(&["a", "b"]).unwrap();
        assert_eq!(clause.text(), "GROUP BY a, b");
        assert_eq!(clause.kind(), ClauseKind::GroupBy);
    }

    #[test]
    fn order_by_normalizes_direction() {
        assert_eq!(order_by(&["id"], "desc").unwrap().text(), "ORDER BY id DESC");
        assert_eq!(order_by(&["id"], "sideways").unwrap().text(), "ORDER BY id ASC");
        assert_eq!(
            order_by(&["a", "b"], Direction::Asc).unwrap().text(),
            "ORDER BY a, b ASC"
        );
    }

    #[test]
    fn empty_columns_fail() {
        let none: [&str; 0] = [];
        assert!(group_by(&none).is_err());
        assert!(order_by(&[" "], "asc").is_err());
    }
}
