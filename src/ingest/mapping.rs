//! Column to field mapping for source records

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cursor::{Record, RecordValue};
use crate::models::{Document, Field, FieldOptions, FieldValue};
use crate::schema::FieldType;

/// How one source column becomes a document field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
    pub options: FieldOptions,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType, options: FieldOptions) -> Self {
        Self {
            name: name.into(),
            field_type,
            options,
        }
    }

    /// Convert a raw value to this column's type; `None` if it cannot be
    fn coerce(&self, value: &RecordValue) -> Option<FieldValue> {
        match (self.field_type, value) {
            (_, RecordValue::Null) => None,
            (FieldType::Integer, RecordValue::Integer(v)) => Some(FieldValue::Integer(*v)),
            (FieldType::Integer, RecordValue::Text(s)) => {
                s.trim().parse::<i64>().ok().map(FieldValue::Integer)
            }
            (FieldType::Keyword, RecordValue::Integer(v)) => Some(FieldValue::Keyword(v.to_string())),
            (FieldType::Keyword, RecordValue::Text(s)) => Some(FieldValue::Keyword(s.clone())),
        }
    }
}

/// Parses `name[:type[:flags]]`, e.g. `id:integer`, `notes:keyword:stored`.
///
/// Type is `integer` (or `int`) or `keyword` (default). Flags are
/// `stored`, `indexed` or `stored+indexed` (default).
impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(format!("column spec '{}' has no name", s));
        }

        let field_type = match parts.next().map(str::trim) {
            None | Some("") | Some("keyword") | Some("string") => FieldType::Keyword,
            Some("integer") | Some("int") => FieldType::Integer,
            Some(other) => return Err(format!("unknown column type '{}' in '{}'", other, s)),
        };

        let options = match parts.next().map(str::trim) {
            None | Some("") | Some("stored+indexed") | Some("indexed+stored") => {
                FieldOptions::STORED_INDEXED
            }
            Some("stored") => FieldOptions::STORED,
            Some("indexed") => FieldOptions::INDEXED,
            Some(other) => return Err(format!("unknown column flags '{}' in '{}'", other, s)),
        };

        if parts.next().is_some() {
            return Err(format!("too many ':' in column spec '{}'", s));
        }
        Ok(Column::new(name, field_type, options))
    }
}

/// Ordered list of columns to take from each record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: Vec<Column>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Stored and indexed integer column
    pub fn integer(self, name: impl Into<String>) -> Self {
        self.column(Column::new(name, FieldType::Integer, FieldOptions::STORED_INDEXED))
    }

    /// Stored and indexed keyword column
    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.column(Column::new(name, FieldType::Keyword, FieldOptions::STORED_INDEXED))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names of indexed columns, the natural default search fields
    pub fn indexed_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.options.indexed)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build the document for one record.
    ///
    /// Columns that are missing, null or not convertible are left out of the
    /// document; the record is still indexed.
    pub fn to_document(&self, record: &Record) -> Document {
        let mut doc = Document::new();
        for column in &self.columns {
            let raw = match record.get(&column.name) {
                Some(raw) => raw,
                None => {
                    debug!(column = %column.name, "Record has no value for column; skipping field");
                    continue;
                }
            };
            match column.coerce(raw) {
                Some(value) => doc.add(Field::new(column.name.clone(), value, column.options)),
                None => debug!(
                    column = %column.name,
                    value = ?raw,
                    expected = %column.field_type,
                    "Column value not usable; skipping field"
                ),
            }
        }
        doc
    }
}

impl FromStr for ColumnMapping {
    type Err = String;

    /// Comma-separated column specs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let columns = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Column>, _>>()?;
        Ok(Self { columns })
    }
}
