//! Schema and field type system
//!
//! Field types are fixed by first use and persisted with the index manifest.

mod field_type;
mod mapping;

pub use field_type::FieldType;
pub use mapping::{FieldEntry, Schema};
