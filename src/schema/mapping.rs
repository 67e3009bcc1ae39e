//! Index schema
//!
//! A schema maps field names to their type and flags. It grows as documents
//! introduce new fields and rejects a field whose type changes.

use super::field_type::FieldType;
use crate::error::{Result, RowdexError};
use crate::models::{Document, FieldOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-field schema entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub field_type: FieldType,
    /// Stored by at least one document
    pub stored: bool,
    /// Indexed by at least one document
    pub indexed: bool,
}

impl FieldEntry {
    pub fn new(field_type: FieldType, options: FieldOptions) -> Self {
        Self {
            field_type,
            stored: options.stored,
            indexed: options.indexed,
        }
    }
}

/// Field name to entry, ordered by name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: BTreeMap<String, FieldEntry>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldEntry> {
        self.fields.get(field)
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields.get(field).map(|e| e.field_type)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Names of fields any document indexed, in name order
    pub fn indexed_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, e)| e.indexed)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a document against this schema without changing it.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        let mut seen: BTreeMap<&str, FieldType> = BTreeMap::new();
        for field in doc.fields() {
            if field.name.is_empty() {
                return Err(RowdexError::InvalidDocument("empty field name".into()));
            }
            if field.name.contains('\0') {
                return Err(RowdexError::InvalidDocument(format!(
                    "field name {:?} contains a NUL byte",
                    field.name
                )));
            }
            let ty = field.value.field_type();
            let expected = seen
                .get(field.name.as_str())
                .copied()
                .or_else(|| self.field_type(&field.name));
            if let Some(expected) = expected {
                if expected != ty {
                    return Err(RowdexError::InvalidDocument(format!(
                        "field '{}' is {} but the value is {}",
                        field.name, expected, ty
                    )));
                }
            }
            seen.insert(field.name.as_str(), ty);
        }
        Ok(())
    }

    /// Record the fields of a validated document.
    pub fn observe(&mut self, doc: &Document) {
        for field in doc.fields() {
            let entry = self
                .fields
                .entry(field.name.clone())
                .or_insert_with(|| FieldEntry {
                    field_type: field.value.field_type(),
                    stored: false,
                    indexed: false,
                });
            entry.stored |= field.options.stored;
            entry.indexed |= field.options.indexed;
        }
    }

    /// Fold another schema into this one, failing on a type conflict.
    pub fn merge(&mut self, other: &Schema) -> Result<()> {
        for (name, theirs) in &other.fields {
            match self.fields.get_mut(name) {
                Some(ours) => {
                    if ours.field_type != theirs.field_type {
                        return Err(RowdexError::InvalidDocument(format!(
                            "field '{}' is {} in one segment and {} in another",
                            name, ours.field_type, theirs.field_type
                        )));
                    }
                    ours.stored |= theirs.stored;
                    ours.indexed |= theirs.indexed;
                }
                None => {
                    self.fields.insert(name.clone(), *theirs);
                }
            }
        }
        Ok(())
    }
}
