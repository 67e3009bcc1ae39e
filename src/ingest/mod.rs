//! Record ingestion: sources, column mapping and the build driver

mod build;
mod cursor;
mod mapping;

pub use build::{build_index, ingest, BuildStats};
pub use cursor::{CursorError, JsonLineError, JsonLinesCursor, Record, RecordCursor, RecordValue, VecCursor};
pub use mapping::{Column, ColumnMapping};
