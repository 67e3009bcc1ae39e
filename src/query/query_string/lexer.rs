//! Lexer for query string syntax
//!
//! Tokenizes keyword query strings into a stream of tokens.

use crate::error::{Result, RowdexError};

/// An unquoted word
#[derive(Debug, Clone, PartialEq)]
pub struct BareTerm {
    /// Text with escapes resolved and any trailing `*` removed
    pub text: String,
    /// The word ended in an unescaped `*`
    pub wildcard: bool,
}

/// Token types for query string parsing
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A term (unquoted word)
    Term(BareTerm),
    /// A quoted exact value
    Quoted(String),
    /// AND operator
    And,
    /// OR operator
    Or,
    /// Colon separator (field:value)
    Colon,
    /// Left parenthesis (grouping)
    LeftParen,
    /// Right parenthesis (grouping)
    RightParen,
    /// End of input
    Eof,
}

impl Token {
    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Term(t) if t.wildcard => format!("'{}*'", t.text),
            Token::Term(t) => format!("'{}'", t.text),
            Token::Quoted(s) => format!("\"{}\"", s),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Colon => "':'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Eof => "end of query".to_string(),
        }
    }
}

/// Lexer for tokenizing query strings
pub struct Lexer<'a> {
    source: &'a str,
    input: Vec<char>,
    position: usize,
    /// The previous token was a colon; a value may start with `+`, `-` or `!`
    after_colon: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input string
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.chars().collect(),
            position: 0,
            after_colon: false,
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        let token = self.scan()?;
        self.after_colon = token == Token::Colon;
        Ok(token)
    }

    /// Check if the lexer has reached the end of input
    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn scan(&mut self) -> Result<Token> {
        self.skip_whitespace();

        if self.is_eof() {
            return Ok(Token::Eof);
        }

        match self.current_char() {
            ':' => {
                self.advance();
                Ok(Token::Colon)
            }
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '"' => {
                self.advance();
                self.read_quoted_string()
            }
            ch @ ('+' | '-' | '!') if !self.after_colon => Err(self.error(format!(
                "unsupported operator '{}' at position {}",
                ch, self.position
            ))),
            _ => self.read_term(),
        }
    }

    fn read_term(&mut self) -> Result<Token> {
        let start = self.position;
        let mut text = String::new();
        let mut escaped_any = false;
        let mut wildcard = false;

        while !self.is_eof() {
            let ch = self.current_char();
            if ch.is_whitespace() || matches!(ch, ':' | '(' | ')' | '"') {
                break;
            }
            if wildcard {
                return Err(self.error(format!(
                    "wildcard '*' is only supported at the end of a term (position {})",
                    self.position - 1
                )));
            }

            match ch {
                '\\' => {
                    self.advance();
                    if self.is_eof() {
                        return Err(self.error("dangling escape '\\' at end of query"));
                    }
                    text.push(self.current_char());
                    escaped_any = true;
                    self.advance();
                }
                '*' => {
                    wildcard = true;
                    self.advance();
                }
                '?' => {
                    return Err(self.error(format!(
                        "single-character wildcard '?' is not supported (position {})",
                        self.position
                    )))
                }
                '[' | ']' | '{' | '}' | '~' | '^' => {
                    return Err(self.error(format!(
                        "unsupported operator '{}' at position {}",
                        ch, self.position
                    )))
                }
                '&' | '|' if self.peek() == Some(ch) => {
                    return Err(self.error(format!(
                        "unsupported operator '{}{}' at position {}",
                        ch, ch, self.position
                    )))
                }
                _ => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        debug_assert!(self.position > start);

        // Operators are case-sensitive; an escaped word is always a term
        if !escaped_any && !wildcard {
            match text.as_str() {
                "AND" => return Ok(Token::And),
                "OR" => return Ok(Token::Or),
                "NOT" | "TO" => {
                    return Err(self.error(format!(
                        "unsupported operator '{}' at position {}",
                        text, start
                    )))
                }
                _ => {}
            }
        }

        Ok(Token::Term(BareTerm { text, wildcard }))
    }

    fn read_quoted_string(&mut self) -> Result<Token> {
        let start = self.position - 1;
        let mut s = String::new();

        while !self.is_eof() {
            let ch = self.current_char();
            self.advance();
            match ch {
                '"' => return Ok(Token::Quoted(s)),
                '\\' => {
                    if self.is_eof() {
                        break;
                    }
                    s.push(self.current_char());
                    self.advance();
                }
                _ => s.push(ch),
            }
        }

        Err(self.error(format!(
            "unterminated quoted string starting at position {}",
            start
        )))
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, reason: impl Into<String>) -> RowdexError {
        RowdexError::malformed_query(self.source, reason)
    }
}
