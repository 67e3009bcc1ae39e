//! Keyword query string parser
//!
//! Supports syntax like:
//! - `salman` (matched exactly against every default field)
//! - `name:bob AND id:2`
//! - `name:(alice OR bob)`
//! - `address:"12 Main St"`
//! - `name:sal*`
//!
//! Values are never tokenized; each value is one exact term. `AND` and `OR`
//! are operators only in upper case.
//!
//! # Example
//!
//! ```rust
//! use rowdex::query::query_string::QueryParser;
//!
//! let parser = QueryParser::new(["id", "name"]);
//! let query = parser.parse("name:bob OR salman").unwrap();
//! assert_eq!(query.to_string(), "(name:bob OR (id:salman OR name:salman))");
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{BareTerm, Lexer, Token};
pub use parser::{parse_query, QueryParser};
