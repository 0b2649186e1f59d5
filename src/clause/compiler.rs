use std::fmt;

use super::condition::{Combiner, Condition, Operator, Triple, fragment_kind};
use super::params::ParameterStore;
use crate::error::SqlSessionError;
use crate::types::RowValues;

/// Turns raw text into a backend-safe string literal body (without the surrounding quotes).
///
/// Only used in inline mode. Every [`Driver`](crate::driver::Driver) is an escaper.
pub trait Escaper {
    fn escape(&self, raw: &str) -> String;
}

/// ANSI escaping: doubles single quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEscaper;

impl Escaper for StandardEscaper {
    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    Where,
    Having,
    GroupBy,
    OrderBy,
}

impl ClauseKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ClauseKind::Where => "WHERE",
            ClauseKind::Having => "HAVING",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::OrderBy => "ORDER BY",
        }
    }
}

/// Compiled clause text plus the window of the session's [`ParameterStore`] it bound.
///
/// `text` is empty (no-op) or starts with the clause keyword. In prepared mode the text holds
/// exactly one placeholder per bound value, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    kind: ClauseKind,
    text: String,
    first_param: usize,
    param_count: usize,
}

impl Clause {
    pub(crate) fn fragment(kind: ClauseKind, text: String) -> Self {
        Self {
            kind,
            text,
            first_param: 0,
            param_count: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ClauseKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// The values this clause appended, read back from the store that compiled it.
    #[must_use]
    pub fn bound<'s>(&self, store: &'s ParameterStore) -> &'s [RowValues] {
        store
            .as_slice()
            .get(self.first_param..self.first_param + self.param_count)
            .unwrap_or_default()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Session-scoped WHERE/HAVING compiler.
///
/// Owns the [`ParameterStore`] and the binding mode. A failed compilation clears the store so
/// the next statement starts clean.
#[derive(Debug, Clone, Default)]
pub struct ClauseCompiler {
    prepared: bool,
    params: ParameterStore,
    next_is_having: bool,
}

impl ClauseCompiler {
    #[must_use]
    pub fn new(prepared: bool) -> Self {
        Self {
            prepared,
            params: ParameterStore::new(),
            next_is_having: false,
        }
    }

    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn set_prepared(&mut self, on: bool) {
        self.prepared = on;
    }

    #[must_use]
    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn clear_params(&mut self) {
        self.params.clear();
    }

    pub fn take_params(&mut self) -> Vec<RowValues> {
        self.params.take()
    }

    /// Compile conditions into a `WHERE` clause (or `HAVING`, once, after [`Self::having`]).
    ///
    /// # Errors
    /// Returns `SqlSessionError::ClauseError` for a missing or unknown operator, a `LIKE`
    /// pattern without wildcard, a `BETWEEN` without upper bound, an empty `IN` list, or a raw
    /// fragment that is not a complete WHERE/HAVING clause.
    pub fn where_clause<E: Escaper + ?Sized>(
        &mut self,
        conditions: &[Condition],
        escaper: &E,
    ) -> Result<Clause, SqlSessionError> {
        let kind = if std::mem::take(&mut self.next_is_having) {
            ClauseKind::Having
        } else {
            ClauseKind::Where
        };
        let first_param = self.params.len();

        match self.compile(kind, conditions, escaper) {
            Ok(text) => Ok(Clause {
                kind,
                text,
                first_param,
                param_count: self.params.len() - first_param,
            }),
            Err(err) => {
                self.params.clear();
                Err(err)
            }
        }
    }

    /// Compile conditions into a `HAVING` clause.
    ///
    /// # Errors
    /// Same as [`Self::where_clause`].
    pub fn having<E: Escaper + ?Sized>(
        &mut self,
        conditions: &[Condition],
        escaper: &E,
    ) -> Result<Clause, SqlSessionError> {
        self.next_is_having = true;
        self.where_clause(conditions, escaper)
    }

    fn compile<E: Escaper + ?Sized>(
        &mut self,
        kind: ClauseKind,
        conditions: &[Condition],
        escaper: &E,
    ) -> Result<String, SqlSessionError> {
        let Some(first) = conditions.first() else {
            return Ok(String::new());
        };

        if let Condition::Raw(fragment) = first {
            return match fragment_kind(fragment) {
                Some(ClauseKind::Where | ClauseKind::Having) if conditions.len() == 1 => {
                    Ok(fragment.clone())
                }
                _ => Err(SqlSessionError::clause(format!(
                    "fragment is not a lone WHERE/HAVING clause: {fragment}"
                ))),
            };
        }

        let mut text = String::from(kind.keyword());
        let mut pending: Option<Combiner> = None;
        for condition in conditions {
            let Condition::Triple(triple) = condition else {
                return Err(SqlSessionError::clause(
                    "raw fragments cannot be mixed with conditions",
                ));
            };
            let (fragment, combiner) = self.compile_triple(triple, escaper)?;
            if let Some(joiner) = pending {
                text.push(' ');
                text.push_str(joiner.as_str());
            }
            text.push(' ');
            text.push_str(&fragment);
            pending = Some(combiner);
        }
        Ok(text)
    }

    fn compile_triple<E: Escaper + ?Sized>(
        &mut self,
        triple: &Triple,
        escaper: &E,
    ) -> Result<(String, Combiner), SqlSessionError> {
        let key = triple.key.trim();
        if key.is_empty() {
            return Err(SqlSessionError::clause("condition without a key"));
        }
        let op_token = triple
            .operator
            .as_deref()
            .map(str::trim)
            .filter(|op| !op.is_empty())
            .ok_or_else(|| SqlSessionError::clause(format!("missing operator for `{key}`")))?;
        let op = Operator::parse(op_token).ok_or_else(|| {
            SqlSessionError::clause(format!("unsupported operator `{op_token}` for `{key}`"))
        })?;
        let combiner_token = triple.combiner.as_ref().and_then(RowValues::as_text);

        match op {
            Operator::Between | Operator::NotBetween => {
                let low = single_value(triple, key)?;
                let high = triple.combiner.as_ref().ok_or_else(|| {
                    SqlSessionError::clause(format!("{op} on `{key}` needs an upper bound"))
                })?;
                let next = Combiner::resolve(triple.extra.as_deref());
                let low = self.bind(low, escaper);
                let high = self.bind(high, escaper);
                Ok((format!("{key} {op} {low} AND {high}"), next))
            }
            Operator::In => {
                let values = triple.value.as_list();
                if values.is_empty() {
                    return Err(SqlSessionError::clause(format!("empty IN list for `{key}`")));
                }
                let list = values
                    .into_iter()
                    .map(|value| self.bind(value, escaper))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok((format!("{key} IN ({list})"), Combiner::resolve(combiner_token)))
            }
            _ => {
                let value = single_value(triple, key)?;
                let combiner = Combiner::resolve(combiner_token);
                if value.is_null_token() || matches!(op, Operator::Is | Operator::IsNot) {
                    let op = if op == Operator::IsNot {
                        Operator::IsNot
                    } else {
                        Operator::Is
                    };
                    return Ok((format!("{key} {op} NULL"), combiner));
                }
                if matches!(op, Operator::Like | Operator::NotLike)
                    && !value.to_sql_text().contains(['_', '%', '?'])
                {
                    return Err(SqlSessionError::clause(format!(
                        "{op} pattern for `{key}` has no wildcard"
                    )));
                }
                let bound = self.bind(value, escaper);
                Ok((format!("{key} {op} {bound}"), combiner))
            }
        }
    }

    /// Placeholder (prepared) or quoted escaped literal (inline) for one value.
    pub(crate) fn bind<E: Escaper + ?Sized>(&mut self, value: &RowValues, escaper: &E) -> String {
        if self.prepared {
            let position = self.params.push(value.clone());
            format!("?{position}")
        } else {
            format!("'{}'", escaper.escape(&value.to_sql_text()))
        }
    }
}

fn single_value<'t>(triple: &'t Triple, key: &str) -> Result<&'t RowValues, SqlSessionError> {
    triple
        .value
        .as_single()
        .ok_or_else(|| SqlSessionError::clause(format!("list value only allowed with IN (`{key}`)")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> ClauseCompiler {
        ClauseCompiler::new(true)
    }

    fn inline() -> ClauseCompiler {
        ClauseCompiler::new(false)
    }

    #[test]
    fn no_conditions_is_the_empty_clause() {
        let clause = prepared().where_clause(&[], &StandardEscaper).unwrap();
        assert!(clause.is_empty());
        assert_eq!(clause.param_count(), 0);
    }

    #[test]
    fn keyword_fragment_passes_through_unchanged() {
        let raw = " WHERE a = 1  ";
        let clause = prepared()
            .where_clause(&[Condition::raw(raw)], &StandardEscaper)
            .unwrap();
        assert_eq!(clause.text(), raw);
    }

    #[test]
    fn conditions_join_with_their_combiners() {
        let mut c = prepared();
        let clause = c
            .where_clause(
                &[
                    Condition::eq("a", 1).or(),
                    Condition::gt("b", 2).and_not(),
                    Condition::lt("c", 3).or(),
                ],
                &StandardEscaper,
            )
            .unwrap();
        assert_eq!(clause.text(), "WHERE a = ?1 OR b > ?2 AND NOT c < ?3");
        assert_eq!(
            clause.bound(c.params()),
            &[RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]
        );
    }

    #[test]
    fn in_list_binds_one_placeholder_per_value() {
        let mut c = prepared();
        let clause = c
            .where_clause(&[Condition::in_list("id", [1, 2, 3, 4])], &StandardEscaper)
            .unwrap();
        assert_eq!(clause.text(), "WHERE id IN (?1, ?2, ?3, ?4)");
        assert_eq!(c.params().len(), 4);

        let clause = inline()
            .where_clause(&[Condition::in_list("id", ["a", "b"])], &StandardEscaper)
            .unwrap();
        assert_eq!(clause.text(), "WHERE id IN ('a', 'b')");
    }

    #[test]
    fn between_binds_two_values_and_takes_next_combiner_from_extra() {
        let mut c = prepared();
        let clause = c
            .where_clause(
                &[
                    ("id", "between", 1, 5, "or").into(),
                    Condition::eq("flag", true),
                ],
                &StandardEscaper,
            )
            .unwrap();
        assert_eq!(clause.text(), "WHERE id BETWEEN ?1 AND ?2 OR flag = ?3");
        assert_eq!(c.params().len(), 3);

        let clause = inline()
            .where_clause(&[Condition::not_between("d", "a", "m")], &StandardEscaper)
            .unwrap();
        assert_eq!(clause.text(), "WHERE d NOT BETWEEN 'a' AND 'm'");
    }

    #[test]
    fn null_values_and_is_operators_emit_is_null() {
        let mut c = prepared();
        let clause = c
            .where_clause(
                &[
                    Condition::eq("a", "NULL"),
                    Condition::is_not_null("b"),
                    Condition::triple("c", "is", "anything"),
                ],
                &StandardEscaper,
            )
            .unwrap();
        assert_eq!(clause.text(), "WHERE a IS NULL AND b IS NOT NULL AND c IS NULL");
        assert!(c.params().is_empty());
    }

    #[test]
    fn like_without_wildcard_fails_and_clears_params() {
        let mut c = prepared();
        c.where_clause(&[Condition::eq("x", 1)], &StandardEscaper)
            .unwrap();
        assert_eq!(c.params().len(), 1);

        let err = c
            .where_clause(
                &[Condition::eq("a", 1), Condition::like("name", "bob")],
                &StandardEscaper,
            )
            .unwrap_err();
        assert!(matches!(err, SqlSessionError::ClauseError(_)));
        assert!(c.params().is_empty());

        for pattern in ["bo_", "%b", "b?"] {
            assert!(
                prepared()
                    .where_clause(&[Condition::not_like("name", pattern)], &StandardEscaper)
                    .is_ok()
            );
        }
    }

    #[test]
    fn missing_or_unknown_operator_fails() {
        let mut c = prepared();
        assert!(c.where_clause(&[Condition::parse("id")], &StandardEscaper).is_err());
        assert!(
            c.where_clause(&[Condition::triple("id", "===", 1)], &StandardEscaper)
                .is_err()
        );
        assert!(c.params().is_empty());
    }

    #[test]
    fn inline_mode_escapes_through_the_escaper() {
        let clause = inline()
            .where_clause(&[Condition::eq("name", "O'Brien")], &StandardEscaper)
            .unwrap();
        assert_eq!(clause.text(), "WHERE name = 'O''Brien'");
    }

    #[test]
    fn having_applies_to_exactly_one_call() {
        let mut c = inline();
        let having = c
            .having(&[Condition::gt("count(*)", 1)], &StandardEscaper)
            .unwrap();
        assert_eq!(having.text(), "HAVING count(*) > '1'");
        assert_eq!(having.kind(), ClauseKind::Having);

        let next = c.where_clause(&[Condition::gt("a", 1)], &StandardEscaper).unwrap();
        assert_eq!(next.text(), "WHERE a > '1'");
    }

    #[test]
    fn recompiling_after_clear_is_identical() {
        let conditions = [
            Condition::parse("test_key  =  test 3  and"),
            Condition::in_list("id", [3, 4]),
        ];
        let mut c = prepared();
        let first = c.where_clause(&conditions, &StandardEscaper).unwrap();
        let first_params = c.take_params();
        let second = c.where_clause(&conditions, &StandardEscaper).unwrap();
        assert_eq!(first.text(), second.text());
        assert_eq!(first_params, c.params().as_slice());
    }

    #[test]
    fn raw_fragment_must_be_a_lone_clause() {
        let mut c = prepared();
        assert!(
            c.where_clause(&[Condition::raw("a = 1")], &StandardEscaper)
                .is_err()
        );
        assert!(
            c.where_clause(
                &[Condition::eq("a", 1), Condition::raw("WHERE b = 2")],
                &StandardEscaper
            )
            .is_err()
        );
    }
}
