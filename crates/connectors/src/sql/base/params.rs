use crate::sql::base::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A named query parameter. The value is text and is converted to the type
/// the server infers for the placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlParameter {
    pub name: String,
    pub value: String,
}

impl SqlParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SqlParameter {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name without a leading `@`.
    pub fn bare_name(&self) -> &str {
        self.name.strip_prefix('@').unwrap_or(&self.name)
    }

    fn matches(&self, name: &str) -> bool {
        self.bare_name().eq_ignore_ascii_case(name)
    }
}

/// A query with `@name` references replaced by positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalQuery {
    pub sql: String,
    /// For placeholder `$n`, `order[n - 1]` is the index of the supplied parameter.
    pub order: Vec<usize>,
}

/// Rewrites `@name` references into `$1`, `$2`, ... in order of first use.
///
/// Names match supplied parameters ignoring case. References inside string
/// literals, quoted identifiers, dollar-quoted bodies and comments are left
/// alone, as is any `@word` that does not name a supplied parameter (so
/// operators such as `@>` keep working). Every supplied parameter must be
/// referenced at least once.
pub fn rewrite_named_parameters(
    sql: &str,
    parameters: &[SqlParameter],
) -> Result<PositionalQuery, QueryError> {
    for (i, param) in parameters.iter().enumerate() {
        if parameters[..i].iter().any(|p| p.matches(param.bare_name())) {
            return Err(QueryError::DuplicateParameter(param.bare_name().to_string()));
        }
    }

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<usize> = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => i = skip_quoted(bytes, i, quote),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|b| *b == b'\n')
                    .map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b'$' => i = dollar_quote_end(sql, i).unwrap_or(i + 1),
            b'@' if !follows_word(bytes, i) => {
                let start = i + 1;
                let end = identifier_end(bytes, start);
                if end == start || bytes[start].is_ascii_digit() {
                    i += 1;
                    continue;
                }

                if let Some(index) = parameters.iter().position(|p| p.matches(&sql[start..end])) {
                    let slot = match order.iter().position(|o| *o == index) {
                        Some(slot) => slot,
                        None => {
                            order.push(index);
                            order.len() - 1
                        }
                    };
                    out.push_str(&sql[copied..i]);
                    let _ = write!(out, "${}", slot + 1);
                    copied = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);

    if let Some(unused) = (0..parameters.len()).find(|idx| !order.contains(idx)) {
        return Err(QueryError::UnusedParameter(
            parameters[unused].bare_name().to_string(),
        ));
    }

    Ok(PositionalQuery { sql: out, order })
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn follows_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && (is_word_byte(bytes[i - 1]) || matches!(bytes[i - 1], b'@' | b'$'))
}

fn identifier_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|b| !is_word_byte(*b))
        .map_or(bytes.len(), |p| start + p)
}

/// Index just past the quoted run starting at `start`. A doubled quote is an
/// escaped quote, not the end of the run.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

/// End of a `$tag$ ... $tag$` body starting at `start`, if one starts there.
fn dollar_quote_end(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    if follows_word(bytes, start) {
        return None;
    }

    let tag_end = identifier_end(bytes, start + 1);
    if bytes.get(tag_end) != Some(&b'$') {
        return None;
    }
    if tag_end > start + 1 && bytes[start + 1].is_ascii_digit() {
        return None;
    }

    let tag = &sql[start..=tag_end];
    let body = tag_end + 1;
    Some(
        sql[body..]
            .find(tag)
            .map_or(sql.len(), |p| body + p + tag.len()),
    )
}
