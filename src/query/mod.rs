//! Query model, parser and execution
//!
//! Queries are trees of exact-term leaves combined with AND and OR:
//! - Term queries (exact match of one field value)
//! - Wildcard queries (field terms starting with a prefix)
//! - Boolean conjunction and disjunction
//!
//! # Example
//!
//! ```rust
//! use rowdex::query::{Query, QueryParser};
//!
//! let query = QueryParser::new(["id", "name"]).parse("name:bob").unwrap();
//! assert_eq!(query, Query::term("name", "bob"));
//! ```

pub mod ast;
pub mod executor;
pub mod query_string;

pub use ast::Query;
pub use executor::{QueryExecutor, QueryResult, QueryStats};
pub use query_string::{parse_query, QueryParser};
