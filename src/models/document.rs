use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::schema::FieldType;

/// Index-wide document identifier.
///
/// Assigned by the writer in ingestion order, starting at 0 for a fresh
/// location and never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed field value
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    Integer(i64),
    Keyword(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Keyword(_) => FieldType::Keyword,
        }
    }

    /// The exact term this value is indexed under.
    ///
    /// Integers use their canonical decimal form, so `id:2` matches `Integer(2)`.
    pub fn term_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Integer(v) => Cow::Owned(v.to_string()),
            FieldValue::Keyword(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Keyword(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Keyword(s) => Some(s),
            FieldValue::Integer(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Keyword(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Keyword(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Keyword(s)
    }
}

/// Storage and indexing flags of a field instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Value is kept verbatim in the document store
    pub stored: bool,
    /// Value is searchable as one exact term
    pub indexed: bool,
}

impl FieldOptions {
    pub const STORED_INDEXED: FieldOptions = FieldOptions {
        stored: true,
        indexed: true,
    };
    pub const STORED: FieldOptions = FieldOptions {
        stored: true,
        indexed: false,
    };
    pub const INDEXED: FieldOptions = FieldOptions {
        stored: false,
        indexed: true,
    };
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self::STORED_INDEXED
    }
}

/// A named value with its flags
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub options: FieldOptions,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<FieldValue>, options: FieldOptions) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// Stored and indexed integer field
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, FieldValue::Integer(value), FieldOptions::STORED_INDEXED)
    }

    /// Stored and indexed keyword field
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FieldValue::Keyword(value.into()), FieldOptions::STORED_INDEXED)
    }

    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }
}

/// An ordered list of fields, as handed to the writer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First value of the named field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Field> for Document {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Stored projection of a document, in ingestion field order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    fields: Vec<(String, FieldValue)>,
}

impl StoredDocument {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Project the stored fields of a document
    pub fn from_document(doc: &Document) -> Self {
        Self {
            fields: doc
                .fields()
                .iter()
                .filter(|f| f.options.stored)
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// First value stored under `name`
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
