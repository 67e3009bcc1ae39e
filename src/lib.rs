pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod query;
pub mod schema;
pub mod segment;

pub use config::{DefaultOperator, IndexConfig, OpenMode, ParserConfig, SearchConfig};
pub use error::{ErrorKind, Result, RowdexError};
pub use index::{CommitStats, IndexReader, IndexSearcher, IndexSnapshot, IndexWriter};
pub use ingest::{build_index, ColumnMapping, JsonLinesCursor, RecordCursor, VecCursor};
pub use models::*;
pub use query::{parse_query, Query, QueryParser};
pub use schema::{FieldType, Schema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
