//! Segment-based inverted index
//!
//! Immutable segment files written from a mutable buffer, listed by an
//! atomically replaced manifest.
//!
//! # Architecture
//!
//! - `MutableBuffer`: In-memory buffer for documents added since the last flush
//! - `SegmentWriter`: Turns a buffer into segment file contents
//! - `SegmentReader`: Immutable segment reader
//! - `IndexManifest`: Tracks committed segments, the schema and id counters
//! - `SegmentStore`: File layout, checksums and the atomic manifest swap

mod types;
mod buffer;
mod postings;
mod term_dict;
mod doc_store;
mod docvalues;
mod reader;
mod writer;
mod manifest;
mod store;
mod lock;

pub use types::*;
pub use buffer::*;
pub use postings::*;
pub use term_dict::*;
pub use doc_store::*;
pub use docvalues::*;
pub use reader::*;
pub use writer::*;
pub use manifest::*;
pub use store::*;
pub use lock::*;
