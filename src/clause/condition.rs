use std::fmt;

use super::compiler::{Clause, ClauseKind};
use crate::types::RowValues;

/// Comparison operators a condition may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Gt,
    Eq,
    NotEq,
    Gte,
    Lte,
    Diamond,
    In,
    Like,
    NotLike,
    Between,
    NotBetween,
    Is,
    IsNot,
}

impl Operator {
    /// Parse an operator token, case-insensitively. Unknown tokens yield `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.trim().to_ascii_uppercase().as_str() {
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "=" => Operator::Eq,
            "!=" => Operator::NotEq,
            ">=" => Operator::Gte,
            "<=" => Operator::Lte,
            "<>" => Operator::Diamond,
            "IN" => Operator::In,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            "IS" => Operator::Is,
            "IS NOT" => Operator::IsNot,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Diamond => "<>",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    #[must_use]
    pub fn is_range(self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean joiner placed after a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combiner {
    #[default]
    And,
    Or,
    Not,
    AndNot,
}

impl Combiner {
    /// Recognized combiner, or `AND` for anything else (including no combiner at all).
    #[must_use]
    pub fn resolve(token: Option<&str>) -> Self {
        match token.map(|t| t.trim().to_ascii_uppercase()).as_deref() {
            Some("OR") => Combiner::Or,
            Some("NOT") => Combiner::Not,
            Some("AND NOT") => Combiner::AndNot,
            _ => Combiner::And,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Combiner::And => "AND",
            Combiner::Or => "OR",
            Combiner::Not => "NOT",
            Combiner::AndNot => "AND NOT",
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(RowValues),
    List(Vec<RowValues>),
}

impl Operand {
    /// Values an `IN` list binds; a single value is a one-element list.
    #[must_use]
    pub fn as_list(&self) -> Vec<&RowValues> {
        match self {
            Operand::Single(v) => vec![v],
            Operand::List(values) => values.iter().collect(),
        }
    }

    #[must_use]
    pub fn as_single(&self) -> Option<&RowValues> {
        match self {
            Operand::Single(v) => Some(v),
            Operand::List(_) => None,
        }
    }
}

impl From<RowValues> for Operand {
    fn from(value: RowValues) -> Self {
        Operand::Single(value)
    }
}

impl From<Vec<RowValues>> for Operand {
    fn from(values: Vec<RowValues>) -> Self {
        Operand::List(values)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Single(value.into())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Single(value.into())
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Single(value.into())
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Single(value.into())
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Single(value.into())
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Single(value.into())
    }
}

/// `key operator value combiner extra`.
///
/// For `BETWEEN`/`NOT BETWEEN` the `combiner` slot carries the upper bound and `extra`
/// carries the combiner for the next condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    pub key: String,
    pub operator: Option<String>,
    pub value: Operand,
    pub combiner: Option<RowValues>,
    pub extra: Option<String>,
}

/// A condition handed to the clause compiler.
///
/// Built once at the API boundary, either from a pre-written fragment, a double-space
/// delimited string, a tuple, or one of the helper constructors:
/// ```rust
/// use sql_session::prelude::*;
///
/// let conditions = [
///     Condition::eq("test_key", "test 3"),
///     Condition::parse("test_value  =  testing string 3"),
///     ("id", ">", 0).into(),
///     Condition::between("id", 1, 10).or(),
/// ];
/// # let _ = conditions;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Pre-written SQL passed through untouched.
    Raw(String),
    Triple(Triple),
}

impl Condition {
    pub fn raw(fragment: impl Into<String>) -> Self {
        Condition::Raw(fragment.into())
    }

    /// Condition with an operator token validated only at compile time.
    pub fn triple(
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Operand>,
    ) -> Self {
        Condition::Triple(Triple {
            key: key.into(),
            operator: Some(operator.into()),
            value: value.into(),
            combiner: None,
            extra: None,
        })
    }

    /// Parse one condition string.
    ///
    /// Strings holding a clause keyword (`WHERE`, `HAVING`, `GROUP BY`, `ORDER BY`) stay raw
    /// fragments. Anything else is split on double spaces into
    /// `key  operator  value  combiner  extra`; for `IN` every part after the operator is a
    /// list value.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if fragment_kind(text).is_some() {
            return Condition::Raw(text.to_string());
        }

        let parts: Vec<&str> = text.split("  ").map(str::trim).collect();
        let key = parts.first().copied().unwrap_or_default().to_string();
        let operator = parts
            .get(1)
            .filter(|op| !op.is_empty())
            .map(|op| (*op).to_string());

        let is_in = operator
            .as_deref()
            .and_then(Operator::parse)
            .is_some_and(|op| op == Operator::In);

        if is_in {
            let values = parts
                .iter()
                .skip(2)
                .map(|v| RowValues::Text((*v).to_string()))
                .collect();
            return Condition::Triple(Triple {
                key,
                operator,
                value: Operand::List(values),
                combiner: None,
                extra: None,
            });
        }

        Condition::Triple(Triple {
            key,
            operator,
            value: Operand::Single(RowValues::Text(
                parts.get(2).copied().unwrap_or_default().to_string(),
            )),
            combiner: parts.get(3).map(|c| RowValues::Text((*c).to_string())),
            extra: parts.get(4).map(|e| (*e).to_string()),
        })
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, "=", value)
    }

    pub fn neq(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, "!=", value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, "<>", value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, "<", value)
    }

    pub fn lte(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, "<=", value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, ">", value)
    }

    pub fn gte(key: impl Into<String>, value: impl Into<Operand>) -> Self {
        Self::triple(key, ">=", value)
    }

    pub fn like(key: impl Into<String>, pattern: impl Into<Operand>) -> Self {
        Self::triple(key, "LIKE", pattern)
    }

    pub fn not_like(key: impl Into<String>, pattern: impl Into<Operand>) -> Self {
        Self::triple(key, "NOT LIKE", pattern)
    }

    pub fn is_null(key: impl Into<String>) -> Self {
        Self::triple(key, "IS", RowValues::Null)
    }

    pub fn is_not_null(key: impl Into<String>) -> Self {
        Self::triple(key, "IS NOT", RowValues::Null)
    }

    pub fn in_list<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let values: Vec<RowValues> = values.into_iter().map(Into::into).collect();
        Self::triple(key, "IN", values)
    }

    pub fn between(
        key: impl Into<String>,
        low: impl Into<RowValues>,
        high: impl Into<RowValues>,
    ) -> Self {
        Self::range("BETWEEN", key, low.into(), high.into())
    }

    pub fn not_between(
        key: impl Into<String>,
        low: impl Into<RowValues>,
        high: impl Into<RowValues>,
    ) -> Self {
        Self::range("NOT BETWEEN", key, low.into(), high.into())
    }

    fn range(op: &str, key: impl Into<String>, low: RowValues, high: RowValues) -> Self {
        Condition::Triple(Triple {
            key: key.into(),
            operator: Some(op.to_string()),
            value: Operand::Single(low),
            combiner: Some(high),
            extra: None,
        })
    }

    /// Set the combiner joining this condition to the next one.
    #[must_use]
    pub fn combine(self, combiner: Combiner) -> Self {
        match self {
            Condition::Triple(mut triple) => {
                let is_range = triple
                    .operator
                    .as_deref()
                    .and_then(Operator::parse)
                    .is_some_and(Operator::is_range);
                if is_range {
                    triple.extra = Some(combiner.as_str().to_string());
                } else {
                    triple.combiner = Some(RowValues::Text(combiner.as_str().to_string()));
                }
                Condition::Triple(triple)
            }
            raw @ Condition::Raw(_) => raw,
        }
    }

    #[must_use]
    pub fn and(self) -> Self {
        self.combine(Combiner::And)
    }

    #[must_use]
    pub fn or(self) -> Self {
        self.combine(Combiner::Or)
    }

    #[must_use]
    pub fn not(self) -> Self {
        self.combine(Combiner::Not)
    }

    #[must_use]
    pub fn and_not(self) -> Self {
        self.combine(Combiner::AndNot)
    }

    /// Clause keyword carried by a raw fragment, if any.
    #[must_use]
    pub fn fragment_kind(&self) -> Option<ClauseKind> {
        match self {
            Condition::Raw(text) => fragment_kind(text),
            Condition::Triple(_) => None,
        }
    }
}

/// Keyword detection by plain substring match, checked in WHERE, GROUP BY, HAVING,
/// ORDER BY order.
pub(crate) fn fragment_kind(text: &str) -> Option<ClauseKind> {
    if text.contains("WHERE") {
        Some(ClauseKind::Where)
    } else if text.contains("GROUP BY") {
        Some(ClauseKind::GroupBy)
    } else if text.contains("HAVING") {
        Some(ClauseKind::Having)
    } else if text.contains("ORDER BY") {
        Some(ClauseKind::OrderBy)
    } else {
        None
    }
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Condition::parse(text)
    }
}

impl From<String> for Condition {
    fn from(text: String) -> Self {
        Condition::parse(&text)
    }
}

impl From<Clause> for Condition {
    fn from(clause: Clause) -> Self {
        Condition::Raw(clause.into_text())
    }
}

impl From<&Clause> for Condition {
    fn from(clause: &Clause) -> Self {
        Condition::Raw(clause.text().to_string())
    }
}

impl<K, O, V> From<(K, O, V)> for Condition
where
    K: Into<String>,
    O: Into<String>,
    V: Into<Operand>,
{
    fn from((key, op, value): (K, O, V)) -> Self {
        Condition::triple(key, op, value)
    }
}

impl<K, O, V, C> From<(K, O, V, C)> for Condition
where
    K: Into<String>,
    O: Into<String>,
    V: Into<Operand>,
    C: Into<RowValues>,
{
    fn from((key, op, value, combiner): (K, O, V, C)) -> Self {
        let mut cond = Condition::triple(key, op, value);
        if let Condition::Triple(triple) = &mut cond {
            triple.combiner = Some(combiner.into());
        }
        cond
    }
}

impl<K, O, V, C, E> From<(K, O, V, C, E)> for Condition
where
    K: Into<String>,
    O: Into<String>,
    V: Into<Operand>,
    C: Into<RowValues>,
    E: Into<String>,
{
    fn from((key, op, value, combiner, extra): (K, O, V, C, E)) -> Self {
        let mut cond = Condition::triple(key, op, value);
        if let Condition::Triple(triple) = &mut cond {
            triple.combiner = Some(combiner.into());
            triple.extra = Some(extra.into());
        }
        cond
    }
}
