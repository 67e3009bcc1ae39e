//! DocValues for columnar sort access
//!
//! typed column stores, one value per docno:
//! - numeric: `Option<i64>` per docno
//! - keyword: dictionary sorted by byte order, ordinals per docno
//!
//! A field with several values in one document keeps its first value.

use std::collections::{BTreeMap, HashMap};
use std::io;

use serde::{Deserialize, Serialize};

use super::types::DocNo;
use crate::models::FieldValue;

/// A column value borrowed for comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnValue<'a> {
    Integer(i64),
    Keyword(&'a str),
}

/// Numeric column
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NumericColumn {
    /// Values indexed by docno (None for missing values)
    values: Vec<Option<i64>>,
}

impl NumericColumn {
    pub fn get(&self, docno: DocNo) -> Option<i64> {
        self.values.get(docno.as_usize()).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Keyword column with dictionary encoding
///
/// The dictionary is sorted, so ordinal order is byte-wise value order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeywordColumn {
    /// Dictionary: ordinal -> keyword
    dictionary: Vec<String>,
    /// Ordinals indexed by docno
    ordinals: Vec<Option<u32>>,
}

impl KeywordColumn {
    fn from_values(values: Vec<Option<String>>) -> Self {
        let mut dictionary: Vec<String> = values.iter().flatten().cloned().collect();
        dictionary.sort();
        dictionary.dedup();

        let ordinal_of: HashMap<&str, u32> = dictionary
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u32))
            .collect();
        let ordinals = values
            .iter()
            .map(|v| v.as_deref().and_then(|s| ordinal_of.get(s).copied()))
            .collect();

        Self {
            dictionary,
            ordinals,
        }
    }

    pub fn get(&self, docno: DocNo) -> Option<&str> {
        self.ordinal(docno)
            .and_then(|ord| self.dictionary.get(ord as usize))
            .map(|s| s.as_str())
    }

    pub fn ordinal(&self, docno: DocNo) -> Option<u32> {
        self.ordinals.get(docno.as_usize()).copied().flatten()
    }

    /// Get all unique keywords, sorted
    pub fn unique_keywords(&self) -> &[String] {
        &self.dictionary
    }

    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// All sort columns of a segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocValues {
    numeric_columns: BTreeMap<String, NumericColumn>,
    keyword_columns: BTreeMap<String, KeywordColumn>,
}

impl DocValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_numeric(&self, name: &str) -> Option<&NumericColumn> {
        self.numeric_columns.get(name)
    }

    pub fn get_keyword(&self, name: &str) -> Option<&KeywordColumn> {
        self.keyword_columns.get(name)
    }

    /// Value of `field` for `docno`, if the segment has one
    pub fn value(&self, field: &str, docno: DocNo) -> Option<ColumnValue<'_>> {
        if let Some(column) = self.numeric_columns.get(field) {
            return column.get(docno).map(ColumnValue::Integer);
        }
        self.keyword_columns
            .get(field)
            .and_then(|c| c.get(docno))
            .map(ColumnValue::Keyword)
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.numeric_columns.contains_key(field) || self.keyword_columns.contains_key(field)
    }

    /// Serialize all columns into `columns.bin` contents.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn deserialize(data: &[u8]) -> io::Result<Self> {
        bincode::deserialize(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Accumulates column values while a segment is buffered
#[derive(Debug, Default)]
pub struct DocValuesBuilder {
    numeric: BTreeMap<String, Vec<Option<i64>>>,
    keyword: BTreeMap<String, Vec<Option<String>>>,
    doc_count: usize,
}

impl DocValuesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the values of the next docno
    pub fn add_document<'a, I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (&'a str, &'a FieldValue)>,
    {
        let docno = self.doc_count;
        for (name, value) in values {
            match value {
                FieldValue::Integer(v) => {
                    let column = self.numeric.entry(name.to_string()).or_default();
                    if column.len() <= docno {
                        column.resize(docno + 1, None);
                        column[docno] = Some(*v);
                    }
                }
                FieldValue::Keyword(s) => {
                    let column = self.keyword.entry(name.to_string()).or_default();
                    if column.len() <= docno {
                        column.resize(docno + 1, None);
                        column[docno] = Some(s.clone());
                    }
                }
            }
        }
        self.doc_count += 1;
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn build(&self) -> DocValues {
        let doc_count = self.doc_count;
        let numeric_columns = self
            .numeric
            .iter()
            .map(|(name, values)| {
                let mut values = values.clone();
                values.resize(doc_count, None);
                (name.clone(), NumericColumn { values })
            })
            .collect();
        let keyword_columns = self
            .keyword
            .iter()
            .map(|(name, values)| {
                let mut values = values.clone();
                values.resize(doc_count, None);
                (name.clone(), KeywordColumn::from_values(values))
            })
            .collect();

        DocValues {
            numeric_columns,
            keyword_columns,
        }
    }
}
