//! Numbered placeholder rewriting between `?N` and `$N`.
//!
//! Clauses are compiled with `?N` markers; drivers that expect another style get the statement
//! rewritten here. Quoted strings, identifiers, comments and dollar-quoted bodies are left alone.

use std::borrow::Cow;

mod scanner;

use scanner::{State, closes_tag, dollar_quote_tag, scan_digits, starts_with_pair};

/// Placeholder style a driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    #[default]
    Sqlite,
}

impl PlaceholderStyle {
    fn marker(self) -> char {
        match self {
            PlaceholderStyle::Postgres => '$',
            PlaceholderStyle::Sqlite => '?',
        }
    }

    fn source_marker(self) -> u8 {
        match self {
            PlaceholderStyle::Postgres => b'?',
            PlaceholderStyle::Sqlite => b'$',
        }
    }
}

/// Rewrite numbered placeholders into `target` style.
///
/// Returns a borrowed `Cow` when nothing changes.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle) -> Cow<'_, str> {
    let bytes = sql.as_bytes();
    let source = target.source_marker();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if b == b'\'' {
                    state = State::SingleQuoted;
                } else if b == b'"' {
                    state = State::DoubleQuoted;
                } else if starts_with_pair(bytes, idx, *b"--") {
                    state = State::LineComment;
                    idx += 1;
                } else if starts_with_pair(bytes, idx, *b"/*") {
                    state = State::BlockComment(1);
                    idx += 1;
                } else if let Some((tag, close)) =
                    (b == b'$').then(|| dollar_quote_tag(bytes, idx)).flatten()
                {
                    state = State::DollarQuoted(tag);
                    idx = close;
                } else if b == source {
                    if let Some(end) = scan_digits(bytes, idx + 1) {
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                        buf.push_str(&sql[copied..idx]);
                        buf.push(target.marker());
                        buf.push_str(&sql[idx + 1..end]);
                        copied = end;
                        idx = end;
                        continue;
                    }
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if starts_with_pair(bytes, idx, *b"/*") {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if starts_with_pair(bytes, idx, *b"*/") {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && closes_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}

/// Statement text as the engine hashes and dispatches it: trimmed, placeholders in `target`
/// style.
#[must_use]
pub fn normalize_statement(sql: &str, target: PlaceholderStyle) -> String {
    translate_placeholders(sql.trim(), target).into_owned()
}
