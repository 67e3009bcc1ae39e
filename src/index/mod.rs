//! Index lifecycle: the build session, committed snapshots and search
//!
//! - `IndexWriter`: exclusive build session; publishes at `commit`
//! - `IndexReader`: loads committed snapshots and reloads newer ones
//! - `IndexSearcher`: evaluates queries against one snapshot

mod reader;
mod searcher;
mod writer;

pub use reader::{IndexReader, IndexSnapshot};
pub use searcher::IndexSearcher;
pub use writer::{CommitStats, IndexWriter};
