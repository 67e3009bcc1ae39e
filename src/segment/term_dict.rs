//! Term dictionary using FST (Finite State Transducer)
//!
//! Keys are [`TermKey`] bytes (`field\0value`), so the terms of one field are
//! a contiguous sorted range and a value prefix is a key prefix.

use std::io;

use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use super::types::{PostingListMeta, TermKey};

/// Term dictionary backed by FST
///
/// The FST stores a u64 value which indexes into a metadata array.
pub struct TermDictionary {
    /// FST mapping term key -> index in metadata array
    fst: Map<Vec<u8>>,
    /// Metadata for each term (parallel to FST output values)
    metadata: Vec<PostingListMeta>,
}

impl TermDictionary {
    /// Create a term dictionary from FST data and metadata
    pub fn new(fst_data: Vec<u8>, metadata: Vec<PostingListMeta>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if fst.len() != metadata.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "term dictionary has {} keys but {} metadata entries",
                    fst.len(),
                    metadata.len()
                ),
            ));
        }
        Ok(Self { fst, metadata })
    }

    /// Look up a term and return its postings metadata
    pub fn get(&self, key: &TermKey) -> Option<&PostingListMeta> {
        self.fst
            .get(key.as_bytes())
            .and_then(|idx| self.metadata.get(idx as usize))
    }

    pub fn contains(&self, key: &TermKey) -> bool {
        self.fst.contains_key(key.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// All terms of `field` whose value starts with `value_prefix`, in key order
    pub fn prefix_search(&self, field: &str, value_prefix: &str) -> Vec<(TermKey, &PostingListMeta)> {
        let prefix = TermKey::prefix(field, value_prefix);
        // Field names and values are str, so the prefix is valid UTF-8
        let prefix = match std::str::from_utf8(&prefix) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };

        let matcher = Str::new(prefix).starts_with();
        let mut stream = self.fst.search(matcher).into_stream();
        let mut results = Vec::new();
        while let Some((key, idx)) = stream.next() {
            if let Some(meta) = self.metadata.get(idx as usize) {
                results.push((TermKey::from_bytes(key.to_vec()), meta));
            }
        }
        results
    }

    /// Get the raw FST data (for serialization)
    pub fn fst_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    /// Get the metadata array (for serialization)
    pub fn metadata(&self) -> &[PostingListMeta] {
        &self.metadata
    }
}

/// Builder for term dictionaries
pub struct TermDictionaryBuilder {
    terms: Vec<(TermKey, PostingListMeta)>,
}

impl TermDictionaryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Add a term with its postings metadata
    pub fn add(&mut self, key: TermKey, meta: PostingListMeta) {
        self.terms.push((key, meta));
    }

    /// Build the term dictionary
    pub fn build(mut self) -> io::Result<TermDictionary> {
        // FST requires sorted input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fst_builder = MapBuilder::memory();
        let mut metadata = Vec::with_capacity(self.terms.len());

        for (idx, (key, meta)) in self.terms.into_iter().enumerate() {
            fst_builder
                .insert(key.as_bytes(), idx as u64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            metadata.push(meta);
        }

        let fst_data = fst_builder
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        TermDictionary::new(fst_data, metadata)
    }
}

impl Default for TermDictionaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
