//! Core types for the segment-based index

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier (monotonically increasing per index location)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Directory name of this segment inside the index location
    pub fn dir_name(&self) -> String {
        format!("seg_{}", self.0)
    }

    /// Inverse of [`SegmentId::dir_name`]
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix("seg_")?.parse().ok().map(Self)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg_{}", self.0)
    }
}

/// Dense document number within a segment (0..doc_count)
/// This is used internally for efficient posting list storage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocNo(pub u32);

impl DocNo {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Separator between field name and value in dictionary keys.
///
/// Field names never contain it, so every term of one field shares the
/// `field\0` prefix and the field's terms form one sorted key range.
pub const TERM_SEPARATOR: u8 = 0;

/// Dictionary key for a (field, value) term
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermKey(Vec<u8>);

impl TermKey {
    pub fn new(field: &str, value: &str) -> Self {
        let mut key = Self::field_prefix(field);
        key.extend_from_slice(value.as_bytes());
        Self(key)
    }

    /// Key prefix covering every term of `field` whose value starts with `value_prefix`
    pub fn prefix(field: &str, value_prefix: &str) -> Vec<u8> {
        Self::new(field, value_prefix).0
    }

    fn field_prefix(field: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(field.len() + 1);
        key.extend_from_slice(field.as_bytes());
        key.push(TERM_SEPARATOR);
        key
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Split back into (field, value)
    pub fn split(&self) -> Option<(&str, &str)> {
        let pos = self.0.iter().position(|&b| b == TERM_SEPARATOR)?;
        let field = std::str::from_utf8(&self.0[..pos]).ok()?;
        let value = std::str::from_utf8(&self.0[pos + 1..]).ok()?;
        Some((field, value))
    }
}

/// Block of postings
/// 128 docs per block
pub const BLOCK_SIZE: usize = 128;

/// Posting list metadata stored in the term dictionary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingListMeta {
    /// Offset in the postings file
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Document frequency (number of documents containing this term)
    pub doc_frequency: u32,
}

/// Seconds since the Unix epoch
pub(crate) fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
