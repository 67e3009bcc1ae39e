//! Field type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field data type
///
/// Both types are untokenized: the whole value is one term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 64-bit signed integer, indexed under its decimal text
    Integer,
    /// Exact match string
    Keyword,
}

impl FieldType {
    /// Sort comparison mode for this type
    pub fn sorts_numerically(&self) -> bool {
        matches!(self, FieldType::Integer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Keyword => "keyword",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
