//! Full statement text built from identifiers plus compiled clauses.
//!
//! Identifiers are passed through as given. Values go through the session's
//! [`ClauseCompiler`], so in prepared mode the placeholders in the returned text line up with
//! the compiler's [`ParameterStore`](crate::clause::ParameterStore). Any failure clears that
//! store before returning.

use crate::clause::{ClauseCompiler, ClauseKind, Condition, Escaper};
use crate::error::SqlSessionError;
use crate::types::RowValues;

const TIMESTAMP_TOKENS: [&str; 3] = ["current_timestamp()", "date()", "now()"];

/// Column/value pairs for INSERT, REPLACE and UPDATE, in statement order.
///
/// A text value equal to `null` (any case) renders as `NULL`. One equal to `now()`, `date()`
/// or `current_timestamp()` renders as the call form `CURRENT_TIMESTAMP()`, which MySQL-style
/// backends accept. SQLite only knows the bare `CURRENT_TIMESTAMP` keyword and rejects the
/// call form with a syntax error, so on SQLite pass a [`RowValues::Timestamp`] instead.
pub type Assignments = Vec<(String, RowValues)>;

/// Collect `(column, value)` pairs into [`Assignments`].
pub fn assignments<I, K, V>(pairs: I) -> Assignments
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RowValues>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertVerb {
    Insert,
    Replace,
}

impl InsertVerb {
    fn as_str(self) -> &'static str {
        match self {
            InsertVerb::Insert => "INSERT",
            InsertVerb::Replace => "REPLACE",
        }
    }
}

enum SelectTarget<'t> {
    Plain,
    CreateAs { source: &'t str },
    Into { source: &'t str },
}

pub struct StatementAssembler<'a, E: Escaper + ?Sized> {
    compiler: &'a mut ClauseCompiler,
    escaper: &'a E,
}

impl<'a, E: Escaper + ?Sized> StatementAssembler<'a, E> {
    pub fn new(compiler: &'a mut ClauseCompiler, escaper: &'a E) -> Self {
        Self { compiler, escaper }
    }

    /// `SELECT cols FROM table [modifiers]`.
    ///
    /// `args` is either a list of keyword fragments (`WHERE …`, `GROUP BY …`, `HAVING …`,
    /// `ORDER BY …`) appended in order, or a list of conditions compiled into a WHERE clause.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table, a HAVING fragment without an earlier
    /// GROUP BY, or any compile failure.
    pub fn select<S: AsRef<str>>(
        &mut self,
        table: &str,
        columns: &[S],
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        self.guarded(|this| this.build_select(SelectTarget::Plain, table, columns, args))
    }

    /// `CREATE TABLE new AS SELECT cols FROM old [modifiers]`.
    ///
    /// # Errors
    /// Same as [`Self::select`], plus an empty source table.
    pub fn create_select<S: AsRef<str>>(
        &mut self,
        new_table: &str,
        columns: &[S],
        old_table: &str,
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        self.guarded(|this| {
            let source = required_table(old_table)?;
            this.build_select(SelectTarget::CreateAs { source }, new_table, columns, args)
        })
    }

    /// `SELECT cols INTO new FROM old [modifiers]`.
    ///
    /// # Errors
    /// Same as [`Self::create_select`].
    pub fn select_into<S: AsRef<str>>(
        &mut self,
        new_table: &str,
        columns: &[S],
        old_table: &str,
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        self.guarded(|this| {
            let source = required_table(old_table)?;
            this.build_select(SelectTarget::Into { source }, new_table, columns, args)
        })
    }

    /// `INSERT INTO table (cols) VALUES (vals)`.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table or empty assignment list.
    pub fn insert(&mut self, table: &str, values: &[(String, RowValues)]) -> Result<String, SqlSessionError> {
        self.guarded(|this| this.build_insert(InsertVerb::Insert, table, values))
    }

    /// `REPLACE INTO table (cols) VALUES (vals)`.
    ///
    /// # Errors
    /// Same as [`Self::insert`].
    pub fn replace(&mut self, table: &str, values: &[(String, RowValues)]) -> Result<String, SqlSessionError> {
        self.guarded(|this| this.build_insert(InsertVerb::Replace, table, values))
    }

    /// `UPDATE table SET col = val, … [WHERE …]`.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table, empty assignment list, or a compile
    /// failure in the conditions.
    pub fn update(
        &mut self,
        table: &str,
        values: &[(String, RowValues)],
        conditions: &[Condition],
    ) -> Result<String, SqlSessionError> {
        self.guarded(|this| {
            let table = required_table(table)?;
            require_values(values)?;
            let set = values
                .iter()
                .map(|(column, value)| format!("{column} = {}", this.render_value(value)))
                .collect::<Vec<_>>()
                .join(", ");
            let clause = this.compiler.where_clause(conditions, this.escaper)?;
            Ok(append(format!("UPDATE {table} SET {set}"), clause.text()))
        })
    }

    /// `DELETE FROM table [WHERE …]`.
    ///
    /// # Errors
    /// `SqlSessionError::ClauseError` for an empty table or a compile failure.
    pub fn delete(&mut self, table: &str, conditions: &[Condition]) -> Result<String, SqlSessionError> {
        self.guarded(|this| {
            let table = required_table(table)?;
            let clause = this.compiler.where_clause(conditions, this.escaper)?;
            Ok(append(format!("DELETE FROM {table}"), clause.text()))
        })
    }

    /// `INSERT INTO to (cols) SELECT from_cols FROM from [modifiers]`.
    ///
    /// An empty `to_columns` list, or `["*"]`, omits the target column list.
    ///
    /// # Errors
    /// Same as [`Self::select`] for either table.
    pub fn insert_select<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        to_table: &str,
        to_columns: &[S],
        from_table: &str,
        from_columns: &[T],
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        self.guarded(|this| {
            let to_table = required_table(to_table)?;
            let target = column_list(to_columns);
            let head = if target == "*" {
                format!("INSERT INTO {to_table}")
            } else {
                format!("INSERT INTO {to_table} ({target})")
            };
            let select = this.build_select(SelectTarget::Plain, from_table, from_columns, args)?;
            Ok(format!("{head} {select}"))
        })
    }

    fn guarded<F>(&mut self, build: F) -> Result<String, SqlSessionError>
    where
        F: FnOnce(&mut Self) -> Result<String, SqlSessionError>,
    {
        let built = build(self);
        if built.is_err() {
            self.compiler.clear_params();
        }
        built
    }

    fn build_select<S: AsRef<str>>(
        &mut self,
        target: SelectTarget<'_>,
        table: &str,
        columns: &[S],
        args: &[Condition],
    ) -> Result<String, SqlSessionError> {
        let table = required_table(table)?;
        let columns = column_list(columns);
        let head = match target {
            SelectTarget::Plain => format!("SELECT {columns} FROM {table}"),
            SelectTarget::CreateAs { source } => {
                format!("CREATE TABLE {table} AS SELECT {columns} FROM {source}")
            }
            SelectTarget::Into { source } => format!("SELECT {columns} INTO {table} FROM {source}"),
        };
        let tail = self.modifiers(args)?;
        Ok(append(head, &tail))
    }

    fn modifiers(&mut self, args: &[Condition]) -> Result<String, SqlSessionError> {
        let tagged = args.iter().any(|arg| arg.fragment_kind().is_some());
        if !tagged {
            return Ok(self.compiler.where_clause(args, self.escaper)?.into_text());
        }

        let mut parts: Vec<&str> = Vec::with_capacity(args.len());
        let mut group_by_seen = false;
        for arg in args {
            let Condition::Raw(text) = arg else {
                return Err(SqlSessionError::clause(
                    "keyword fragments cannot be mixed with conditions",
                ));
            };
            match arg.fragment_kind() {
                Some(ClauseKind::GroupBy) => group_by_seen = true,
                Some(ClauseKind::Having) if !group_by_seen => {
                    return Err(SqlSessionError::clause("HAVING requires an earlier GROUP BY"));
                }
                Some(_) => {}
                None => {
                    return Err(SqlSessionError::clause(format!(
                        "unrecognized select modifier: {text}"
                    )));
                }
            }
            parts.push(text.trim());
        }
        Ok(parts.join(" "))
    }

    fn build_insert(
        &mut self,
        verb: InsertVerb,
        table: &str,
        values: &[(String, RowValues)],
    ) -> Result<String, SqlSessionError> {
        let table = required_table(table)?;
        require_values(values)?;
        let columns = values
            .iter()
            .map(|(column, _)| column.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let rendered = values
            .iter()
            .map(|(_, value)| self.render_value(value))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} INTO {table} ({columns}) VALUES ({rendered})",
            verb.as_str()
        ))
    }

    fn render_value(&mut self, value: &RowValues) -> String {
        if value.is_null_token() {
            return "NULL".to_string();
        }
        let is_timestamp_token = value.as_text().is_some_and(|text| {
            TIMESTAMP_TOKENS
                .iter()
                .any(|token| text.trim().eq_ignore_ascii_case(token))
        });
        if is_timestamp_token {
            return "CURRENT_TIMESTAMP()".to_string();
        }
        self.compiler.bind(value, self.escaper)
    }
}

fn required_table(table: &str) -> Result<&str, SqlSessionError> {
    let table = table.trim();
    if table.is_empty() {
        return Err(SqlSessionError::clause("table name is required"));
    }
    Ok(table)
}

fn require_values(values: &[(String, RowValues)]) -> Result<(), SqlSessionError> {
    if values.is_empty() || values.iter().any(|(column, _)| column.trim().is_empty()) {
        return Err(SqlSessionError::clause(
            "assignments need at least one named column",
        ));
    }
    Ok(())
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    let joined = columns
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "*".to_string()
    } else {
        joined
    }
}

fn append(mut head: String, tail: &str) -> String {
    if !tail.is_empty() {
        head.push(' ');
        head.push_str(tail);
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{StandardEscaper, group_by, order_by};

    const ALL: [&str; 1] = ["*"];

    #[test]
    fn select_with_conditions_compiles_a_where_clause() {
        let mut compiler = ClauseCompiler::new(true);
        let sql = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .select("unit_test", &["id", "test_key"], &[Condition::eq("id", 2)])
            .unwrap();
        assert_eq!(sql, "SELECT id, test_key FROM unit_test WHERE id = ?1");
        assert_eq!(compiler.params().as_slice(), &[RowValues::Int(2)]);
    }

    #[test]
    fn select_without_args_selects_everything() {
        let mut compiler = ClauseCompiler::new(true);
        let sql = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .select("unit_test", &ALL, &[])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM unit_test");
    }

    #[test]
    fn select_appends_keyword_fragments_in_order() {
        let mut compiler = ClauseCompiler::new(false);
        let mut asm = StatementAssembler::new(&mut compiler, &StandardEscaper);
        let args = [
            Condition::raw("WHERE a = 1"),
            group_by(&["b"]).unwrap().into(),
            Condition::raw("HAVING count(*) > 1"),
            order_by(&["b"], "desc").unwrap().into(),
        ];
        let sql = asm.select("t", &["b"], &args).unwrap();
        assert_eq!(
            sql,
            "SELECT b FROM t WHERE a = 1 GROUP BY b HAVING count(*) > 1 ORDER BY b DESC"
        );
    }

    #[test]
    fn having_before_group_by_fails_and_clears_params() {
        let mut compiler = ClauseCompiler::new(true);
        compiler
            .where_clause(&[Condition::eq("x", 1)], &StandardEscaper)
            .unwrap();
        let err = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .select("t", &ALL, &[Condition::raw("HAVING count(*) > 1")])
            .unwrap_err();
        assert!(matches!(err, SqlSessionError::ClauseError(_)));
        assert!(compiler.params().is_empty());
    }

    #[test]
    fn create_select_and_select_into_forms() {
        let mut compiler = ClauseCompiler::new(true);
        let mut asm = StatementAssembler::new(&mut compiler, &StandardEscaper);
        assert_eq!(
            asm.create_select("new_t", &["a", "b"], "old_t", &[]).unwrap(),
            "CREATE TABLE new_t AS SELECT a, b FROM old_t"
        );
        assert_eq!(
            asm.select_into("new_t", &ALL, "old_t", &[Condition::gt("a", 3)])
                .unwrap(),
            "SELECT * INTO new_t FROM old_t WHERE a > ?1"
        );
        assert!(asm.create_select("new_t", &ALL, "", &[]).is_err());
    }

    #[test]
    fn insert_renders_null_and_timestamp_tokens_literally() {
        let mut compiler = ClauseCompiler::new(true);
        let values = assignments([
            ("id", RowValues::Int(9)),
            ("note", RowValues::from("null")),
            ("created", RowValues::from("NOW()")),
            ("name", RowValues::from("x")),
        ]);
        let sql = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .insert("t", &values)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO t (id, note, created, name) VALUES (?1, NULL, CURRENT_TIMESTAMP(), ?2)"
        );
        assert_eq!(compiler.params().len(), 2);
    }

    #[test]
    fn replace_inline_escapes_values() {
        let mut compiler = ClauseCompiler::new(false);
        let values = assignments([("name", "it's")]);
        let sql = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .replace("t", &values)
            .unwrap();
        assert_eq!(sql, "REPLACE INTO t (name) VALUES ('it''s')");
    }

    #[test]
    fn update_binds_set_values_before_where_values() {
        let mut compiler = ClauseCompiler::new(true);
        let values = assignments([("test_key", "the key string")]);
        let sql = StatementAssembler::new(&mut compiler, &StandardEscaper)
            .update(
                "unit_test",
                &values,
                &[Condition::parse("test_key  =  test 1")],
            )
            .unwrap();
        assert_eq!(sql, "UPDATE unit_test SET test_key = ?1 WHERE test_key = ?2");
        assert_eq!(
            compiler.params().as_slice(),
            &[
                RowValues::from("the key string"),
                RowValues::from("test 1")
            ]
        );
    }

    #[test]
    fn update_with_empty_values_or_table_fails() {
        let mut compiler = ClauseCompiler::new(true);
        let mut asm = StatementAssembler::new(&mut compiler, &StandardEscaper);
        assert!(asm.update("t", &[], &[]).is_err());
        assert!(asm.update(" ", &assignments([("a", 1)]), &[]).is_err());
        assert!(asm.delete("", &[]).is_err());
        assert!(compiler.params().is_empty());
    }

    #[test]
    fn delete_with_and_without_conditions() {
        let mut compiler = ClauseCompiler::new(true);
        let mut asm = StatementAssembler::new(&mut compiler, &StandardEscaper);
        assert_eq!(asm.delete("t", &[]).unwrap(), "DELETE FROM t");
        assert_eq!(
            asm.delete(
                "t",
                &[
                    Condition::eq("test_key", "test 3"),
                    Condition::eq("test_value", "testing string 3"),
                ]
            )
            .unwrap(),
            "DELETE FROM t WHERE test_key = ?1 AND test_value = ?2"
        );
    }

    #[test]
    fn insert_select_with_and_without_target_columns() {
        let mut compiler = ClauseCompiler::new(true);
        let mut asm = StatementAssembler::new(&mut compiler, &StandardEscaper);
        assert_eq!(
            asm.insert_select("dst", &ALL, "src", &ALL, &[]).unwrap(),
            "INSERT INTO dst SELECT * FROM src"
        );
        assert_eq!(
            asm.insert_select("dst", &["a", "b"], "src", &["x", "y"], &[Condition::lt("x", 5)])
                .unwrap(),
            "INSERT INTO dst (a, b) SELECT x, y FROM src WHERE x < ?1"
        );
    }
}
