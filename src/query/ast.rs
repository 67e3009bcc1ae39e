//! Query tree
//!
//! A parsed query is an immutable tree of [`Query`] nodes. Leaves name one
//! field; composites combine the document sets of their children.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean retrieval expression over exact terms
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Query {
    /// Documents whose `field` holds exactly `value`
    Term { field: String, value: String },
    /// Intersection of the children
    And(Vec<Query>),
    /// Union of the children
    Or(Vec<Query>),
    /// Documents holding any `field` term that starts with `prefix`
    Wildcard { field: String, prefix: String },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn wildcard(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Query::Wildcard {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    /// Conjunction; a single clause is returned as is
    pub fn and(mut clauses: Vec<Query>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Query::And(clauses)
        }
    }

    /// Disjunction; a single clause is returned as is
    pub fn or(mut clauses: Vec<Query>) -> Self {
        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Query::Or(clauses)
        }
    }

    /// Query type name for logging
    pub fn query_type(&self) -> &'static str {
        match self {
            Query::Term { .. } => "term",
            Query::And(_) => "and",
            Query::Or(_) => "or",
            Query::Wildcard { .. } => "wildcard",
        }
    }

    /// Field names referenced by the leaves, in first-seen order
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Query::Term { field, .. } | Query::Wildcard { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Query::And(children) | Query::Or(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

/// Characters the query lexer treats specially inside a bare term
fn is_special(ch: char) -> bool {
    ch.is_whitespace()
        || matches!(
            ch,
            ':' | '(' | ')' | '"' | '\\' | '*' | '?' | '[' | ']' | '{' | '}' | '~' | '^' | '&' | '|'
        )
}

fn is_keyword(s: &str) -> bool {
    matches!(s, "AND" | "OR" | "NOT" | "TO")
}

/// Write `s` as a bare term, backslash-escaping anything the lexer would
/// otherwise interpret.
fn write_bare(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for (i, ch) in s.chars().enumerate() {
        let escape = is_special(ch)
            || (i == 0 && (matches!(ch, '+' | '-' | '!') || is_keyword(s)));
        if escape {
            f.write_str("\\")?;
        }
        write!(f, "{}", ch)?;
    }
    Ok(())
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || is_keyword(value)
        || value.starts_with(|c: char| matches!(c, '+' | '-' | '!'))
        || value.chars().any(is_special)
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    if !needs_quotes(value) {
        return f.write_str(value);
    }
    f.write_str("\"")?;
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", ch)?;
    }
    f.write_str("\"")
}

/// Renders a canonical query string that parses back to an equal tree.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term { field, value } => {
                write_bare(f, field)?;
                f.write_str(":")?;
                write_value(f, value)
            }
            Query::Wildcard { field, prefix } => {
                write_bare(f, field)?;
                f.write_str(":")?;
                write_bare(f, prefix)?;
                f.write_str("*")
            }
            Query::And(children) | Query::Or(children) => {
                let op = if matches!(self, Query::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_clause_collapses() {
        let q = Query::or(vec![Query::term("name", "bob")]);
        assert_eq!(q, Query::term("name", "bob"));
        let q = Query::and(vec![Query::term("a", "1"), Query::term("b", "2")]);
        assert!(matches!(q, Query::And(ref c) if c.len() == 2));
    }

    #[test]
    fn test_display() {
        let q = Query::or(vec![Query::term("id", "salman"), Query::term("name", "salman")]);
        assert_eq!(q.to_string(), "(id:salman OR name:salman)");

        let q = Query::and(vec![
            Query::term("name", "bob"),
            Query::wildcard("address", "Pu"),
        ]);
        assert_eq!(q.to_string(), "(name:bob AND address:Pu*)");
    }

    #[test]
    fn test_display_quotes_and_escapes() {
        assert_eq!(
            Query::term("address", "12 Main St").to_string(),
            "address:\"12 Main St\""
        );
        assert_eq!(Query::term("name", "AND").to_string(), "name:\"AND\"");
        assert_eq!(Query::term("name", "").to_string(), "name:\"\"");
        assert_eq!(Query::term("id", "-5").to_string(), "id:\"-5\"");
        assert_eq!(
            Query::term("q", "say \"hi\"").to_string(),
            "q:\"say \\\"hi\\\"\""
        );
        assert_eq!(Query::wildcard("name", "a b").to_string(), "name:a\\ b*");
        assert_eq!(Query::wildcard("name", "").to_string(), "name:*");
    }

    #[test]
    fn test_fields() {
        let q = Query::or(vec![
            Query::term("id", "1"),
            Query::and(vec![Query::term("name", "x"), Query::term("id", "2")]),
        ]);
        assert_eq!(q.fields(), vec!["id", "name"]);
        assert_eq!(q.query_type(), "or");
    }
}
