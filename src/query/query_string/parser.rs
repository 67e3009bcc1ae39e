//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr EOF
//! or_expr     := and_expr ((OR | <adjacent>) and_expr)*
//! and_expr    := primary (AND primary)*
//! primary     := field_query | grouped | value
//! field_query := TERM COLON (value | grouped)
//! value       := TERM | TERM* | QUOTED
//! grouped     := '(' or_expr ')'
//! ```
//!
//! Adjacent clauses join with the default operator (OR unless configured),
//! at the level of that operator.

use super::lexer::{BareTerm, Lexer, Token};
use crate::config::{DefaultOperator, ParserConfig};
use crate::error::{Result, RowdexError};
use crate::query::ast::Query;

/// Deepest allowed nesting of parenthesised groups
const MAX_DEPTH: usize = 128;

/// Parser for keyword query strings over a list of default fields
#[derive(Clone, Debug)]
pub struct QueryParser {
    /// Fields an unscoped value is expanded over
    fields: Vec<String>,
    default_operator: DefaultOperator,
}

impl QueryParser {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            default_operator: DefaultOperator::default(),
        }
    }

    pub fn with_config(mut self, config: &ParserConfig) -> Self {
        self.default_operator = config.default_operator;
        self
    }

    /// Set the operator joining adjacent clauses
    pub fn with_default_operator(mut self, operator: DefaultOperator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Parse the query string into a query tree
    pub fn parse(&self, input: &str) -> Result<Query> {
        let mut state = ParseState::new(input, &self.fields, self.default_operator)?;
        state.parse()
    }
}

/// Parse `input` with the default configuration
pub fn parse_query<S: AsRef<str>>(input: &str, fields: &[S]) -> Result<Query> {
    QueryParser::new(fields.iter().map(|f| f.as_ref().to_string())).parse(input)
}

struct ParseState<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current_token: Token,
    fields: &'a [String],
    default_operator: DefaultOperator,
    depth: usize,
}

/// A value token before it is bound to a field
enum Value {
    Exact(String),
    Prefix(String),
}

impl Value {
    fn bind(&self, field: &str) -> Query {
        match self {
            Value::Exact(v) => Query::term(field, v.clone()),
            Value::Prefix(p) => Query::wildcard(field, p.clone()),
        }
    }
}

impl From<BareTerm> for Value {
    fn from(term: BareTerm) -> Self {
        if term.wildcard {
            Value::Prefix(term.text)
        } else {
            Value::Exact(term.text)
        }
    }
}

impl<'a> ParseState<'a> {
    fn new(input: &'a str, fields: &'a [String], default_operator: DefaultOperator) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Self {
            input,
            lexer,
            current_token,
            fields,
            default_operator,
            depth: 0,
        })
    }

    fn parse(&mut self) -> Result<Query> {
        if self.current_token == Token::Eof {
            return Err(self.error("empty query"));
        }

        let query = self.parse_or_expr(None)?;

        match &self.current_token {
            Token::Eof => Ok(query),
            Token::RightParen => Err(self.error("unmatched ')'")),
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Parse: or_expr := and_expr ((OR | <adjacent>) and_expr)*
    fn parse_or_expr(&mut self, scope: Option<&str>) -> Result<Query> {
        let mut clauses = vec![self.parse_and_expr(scope)?];

        loop {
            if self.current_token == Token::Or {
                self.advance()?;
                self.require_operand("OR")?;
                clauses.push(self.parse_and_expr(scope)?);
            } else if self.default_operator == DefaultOperator::Or && self.is_start_of_primary() {
                clauses.push(self.parse_and_expr(scope)?);
            } else {
                break;
            }
        }

        Ok(Query::or(clauses))
    }

    /// Parse: and_expr := primary (AND primary)*
    fn parse_and_expr(&mut self, scope: Option<&str>) -> Result<Query> {
        let mut clauses = vec![self.parse_primary(scope)?];

        loop {
            if self.current_token == Token::And {
                self.advance()?;
                self.require_operand("AND")?;
                clauses.push(self.parse_primary(scope)?);
            } else if self.default_operator == DefaultOperator::And && self.is_start_of_primary() {
                clauses.push(self.parse_primary(scope)?);
            } else {
                break;
            }
        }

        Ok(Query::and(clauses))
    }

    /// Parse: primary := field_query | grouped | value
    fn parse_primary(&mut self, scope: Option<&str>) -> Result<Query> {
        match std::mem::replace(&mut self.current_token, Token::Eof) {
            Token::LeftParen => {
                self.advance()?;
                self.parse_group(scope)
            }
            Token::Term(term) => {
                self.advance()?;
                if self.current_token == Token::Colon {
                    if term.wildcard {
                        return Err(self.error(format!(
                            "field name '{}*' cannot contain a wildcard",
                            term.text
                        )));
                    }
                    if term.text.is_empty() {
                        return Err(self.error("expected a field name before ':'"));
                    }
                    self.advance()?;
                    self.parse_field_value(&term.text)
                } else {
                    self.expand(scope, Value::from(term))
                }
            }
            Token::Quoted(text) => {
                self.advance()?;
                if self.current_token == Token::Colon {
                    return Err(self.error(format!("field name \"{}\" cannot be quoted", text)));
                }
                self.expand(scope, Value::Exact(text))
            }
            Token::Colon => Err(self.error("expected a field name before ':'")),
            Token::And => Err(self.error("expected a term before AND")),
            Token::Or => Err(self.error("expected a term before OR")),
            Token::RightParen => Err(self.error("unmatched ')'")),
            Token::Eof => Err(self.error("unexpected end of query")),
        }
    }

    /// Parse the value after `field:`
    fn parse_field_value(&mut self, field: &str) -> Result<Query> {
        match std::mem::replace(&mut self.current_token, Token::Eof) {
            Token::Term(term) => {
                self.advance()?;
                Ok(Value::from(term).bind(field))
            }
            Token::Quoted(text) => {
                self.advance()?;
                Ok(Query::term(field, text))
            }
            Token::LeftParen => {
                self.advance()?;
                self.parse_group(Some(field))
            }
            other => {
                self.current_token = other;
                Err(self.error(format!("expected a value after '{}:'", field)))
            }
        }
    }

    /// Parse: grouped := '(' or_expr ')' with the '(' already consumed
    fn parse_group(&mut self, scope: Option<&str>) -> Result<Query> {
        if self.current_token == Token::RightParen {
            return Err(self.error("empty group '()'"));
        }
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("query nests too deeply"));
        }

        let inner = self.parse_or_expr(scope)?;

        match &self.current_token {
            Token::RightParen => {
                self.advance()?;
                self.depth -= 1;
                Ok(inner)
            }
            Token::Eof => Err(self.error("missing closing ')'")),
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Bind an unscoped value to the scope field, or to every default field
    fn expand(&self, scope: Option<&str>, value: Value) -> Result<Query> {
        if let Some(field) = scope {
            return Ok(value.bind(field));
        }
        if self.fields.is_empty() {
            return Err(self.error("no default fields to search for an unscoped term"));
        }
        Ok(Query::or(
            self.fields.iter().map(|field| value.bind(field)).collect(),
        ))
    }

    fn require_operand(&self, operator: &str) -> Result<()> {
        match self.current_token {
            Token::Eof | Token::RightParen | Token::And | Token::Or => Err(self.error(format!(
                "expected a term after {}",
                operator
            ))),
            _ => Ok(()),
        }
    }

    fn is_start_of_primary(&self) -> bool {
        matches!(
            self.current_token,
            Token::Term(_) | Token::Quoted(_) | Token::LeftParen | Token::Colon
        )
    }

    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn error(&self, reason: impl Into<String>) -> RowdexError {
        RowdexError::malformed_query(self.input, reason)
    }
}
