pub mod document;
pub mod search;

pub use document::{DocId, Document, Field, FieldOptions, FieldValue, StoredDocument};
pub use search::{SearchHit, Sort, SortField, TopDocs};
