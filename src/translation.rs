//! Placeholder rewriting for SQL Server.
//!
//! tiberius binds parameters positionally as `@P1..@Pn`. Callers write either
//! positional `?` markers ([`translate_positional`]) or statements built by this
//! crate carry named `@name` placeholders ([`bind_named`]). Both are rewritten
//! by one scanner that leaves string literals, quoted/bracketed identifiers and
//! comments alone.

use std::borrow::Cow;
use std::collections::HashMap;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_escaped_close, is_line_comment_start,
};
use scanner::{State, scan_word};

use crate::error::SqlMiddlewareDbError;

enum Mode<'n> {
    Positional,
    Named(&'n HashMap<&'n str, usize>),
}

struct Rewrite<'a> {
    sql: Cow<'a, str>,
    placeholders: usize,
}

/// Rewrite positional `?` markers into `@P1..@Pn`, left to right.
///
/// # Errors
/// Returns `SqlMiddlewareDbError::ParameterError` when the number of markers
/// differs from `param_count`.
pub fn translate_positional(
    sql: &str,
    param_count: usize,
) -> Result<Cow<'_, str>, SqlMiddlewareDbError> {
    let rewrite = rewrite(sql, &Mode::Positional);
    if rewrite.placeholders != param_count {
        return Err(SqlMiddlewareDbError::ParameterError(format!(
            "query has {} placeholder(s) but {} value(s) were supplied",
            rewrite.placeholders, param_count
        )));
    }
    Ok(rewrite.sql)
}

/// Rewrite named `@name` placeholders into `@P{n}` where `n - 1` is the index
/// of `name` in `names`. `@@globals` and names not in `names` (local
/// variables) are left as written.
#[must_use]
pub fn bind_named<'a>(sql: &'a str, names: &[&str]) -> Cow<'a, str> {
    if names.is_empty() {
        return Cow::Borrowed(sql);
    }
    let lookup: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i + 1))
        .collect();
    rewrite(sql, &Mode::Named(&lookup)).sql
}

fn rewrite<'a>(sql: &'a str, mode: &Mode<'_>) -> Rewrite<'a> {
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut placeholders = 0;
    let mut state = State::Normal;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'?' if matches!(mode, Mode::Positional) => {
                    placeholders += 1;
                    let buf = out.get_or_insert_with(String::new);
                    buf.push_str(&sql[copied_to..idx]);
                    buf.push_str("@P");
                    buf.push_str(&placeholders.to_string());
                    copied_to = idx + 1;
                }
                b'@' => {
                    if bytes.get(idx + 1) == Some(&b'@') {
                        // @@ROWCOUNT and friends
                        idx = scan_word(bytes, idx + 2);
                        continue;
                    }
                    let end = scan_word(bytes, idx + 1);
                    if let Mode::Named(lookup) = mode
                        && let Some(position) = lookup.get(&sql[idx + 1..end])
                    {
                        placeholders += 1;
                        let buf = out.get_or_insert_with(String::new);
                        buf.push_str(&sql[copied_to..idx]);
                        buf.push_str("@P");
                        buf.push_str(&position.to_string());
                        copied_to = end;
                    }
                    idx = end.max(idx + 1);
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if is_escaped_close(bytes, idx, b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if is_escaped_close(bytes, idx, b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if is_escaped_close(bytes, idx, b']') {
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
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    Rewrite { sql, placeholders }
}
