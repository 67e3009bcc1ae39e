//! Mutable buffer for in-memory writes
//!
//! Holds indexed data for documents added since the last flush, before it is
//! written to an immutable segment.

use std::collections::HashMap;

use super::docvalues::DocValuesBuilder;
use super::types::{DocNo, TermKey};
use crate::models::{DocId, Document, StoredDocument};

/// In-memory mutable buffer for recent writes
#[derive(Debug)]
pub struct MutableBuffer {
    /// Identifier of docno 0
    base_doc_id: DocId,
    /// Term to ascending docnos
    terms: HashMap<TermKey, Vec<DocNo>>,
    /// Stored projection per docno
    stored: Vec<StoredDocument>,
    /// Sort column values
    docvalues: DocValuesBuilder,
    /// Approximate size in bytes
    size_bytes: usize,
}

impl MutableBuffer {
    /// Create an empty buffer whose first document gets `base_doc_id`
    pub fn new(base_doc_id: DocId) -> Self {
        Self {
            base_doc_id,
            terms: HashMap::new(),
            stored: Vec::new(),
            docvalues: DocValuesBuilder::new(),
            size_bytes: 0,
        }
    }

    /// Index a validated document into the buffer
    ///
    /// Returns the assigned DocNo for this document.
    pub fn index_document(&mut self, doc: &Document) -> DocNo {
        let docno = DocNo(self.stored.len() as u32);

        for field in doc.fields().iter().filter(|f| f.options.indexed) {
            let key = TermKey::new(&field.name, &field.value.term_text());
            let postings = self.terms.entry(key).or_default();
            // a repeated value within one document is a single posting
            if postings.last() != Some(&docno) {
                postings.push(docno);
                self.size_bytes += std::mem::size_of::<DocNo>();
            }
        }

        self.docvalues
            .add_document(doc.fields().iter().map(|f| (f.name.as_str(), &f.value)));

        let stored = StoredDocument::from_document(doc);
        self.size_bytes += stored
            .iter()
            .map(|(name, value)| name.len() + value.term_text().len())
            .sum::<usize>();
        self.stored.push(stored);

        docno
    }

    pub fn base_doc_id(&self) -> DocId {
        self.base_doc_id
    }

    /// Identifier the next indexed document will receive
    pub fn next_doc_id(&self) -> DocId {
        DocId(self.base_doc_id.0 + self.stored.len() as u64)
    }

    /// Get postings for a term
    pub fn get_postings(&self, key: &TermKey) -> Option<&[DocNo]> {
        self.terms.get(key).map(|v| v.as_slice())
    }

    /// Term keys in sorted order
    pub fn sorted_terms(&self) -> Vec<&TermKey> {
        let mut keys: Vec<_> = self.terms.keys().collect();
        keys.sort();
        keys
    }

    pub fn stored_documents(&self) -> &[StoredDocument] {
        &self.stored
    }

    pub fn docvalues(&self) -> &DocValuesBuilder {
        &self.docvalues
    }

    pub fn doc_count(&self) -> u32 {
        self.stored.len() as u32
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, FieldOptions};

    #[test]
    fn test_index_document() {
        let mut buffer = MutableBuffer::new(DocId(10));
        let d0 = buffer.index_document(
            &Document::new()
                .with(Field::integer("id", 1))
                .with(Field::keyword("name", "alice")),
        );
        let d1 = buffer.index_document(
            &Document::new()
                .with(Field::integer("id", 2))
                .with(Field::keyword("name", "alice")),
        );

        assert_eq!((d0, d1), (DocNo(0), DocNo(1)));
        assert_eq!(buffer.doc_count(), 2);
        assert_eq!(buffer.next_doc_id(), DocId(12));
        assert_eq!(
            buffer.get_postings(&TermKey::new("name", "alice")),
            Some(&[DocNo(0), DocNo(1)][..])
        );
        assert_eq!(
            buffer.get_postings(&TermKey::new("id", "2")),
            Some(&[DocNo(1)][..])
        );
        assert_eq!(buffer.term_count(), 3);
    }

    #[test]
    fn test_repeated_value_posted_once() {
        let mut buffer = MutableBuffer::new(DocId(0));
        buffer.index_document(
            &Document::new()
                .with(Field::keyword("tag", "x"))
                .with(Field::keyword("tag", "x")),
        );
        assert_eq!(
            buffer.get_postings(&TermKey::new("tag", "x")).map(|p| p.len()),
            Some(1)
        );
        assert_eq!(buffer.stored_documents()[0].len(), 2);
    }

    #[test]
    fn test_flags_respected() {
        let mut buffer = MutableBuffer::new(DocId(0));
        buffer.index_document(
            &Document::new()
                .with(Field::keyword("hidden", "h").with_options(FieldOptions::INDEXED))
                .with(Field::keyword("note", "n").with_options(FieldOptions::STORED)),
        );
        assert!(buffer.get_postings(&TermKey::new("hidden", "h")).is_some());
        assert!(buffer.get_postings(&TermKey::new("note", "n")).is_none());

        let stored = &buffer.stored_documents()[0];
        assert!(stored.get("hidden").is_none());
        assert!(stored.get("note").is_some());
    }

    #[test]
    fn test_sorted_terms() {
        let mut buffer = MutableBuffer::new(DocId(0));
        buffer.index_document(&Document::new().with(Field::keyword("name", "bob")));
        buffer.index_document(&Document::new().with(Field::keyword("name", "alice")));
        buffer.index_document(&Document::new().with(Field::integer("id", 3)));
        let terms: Vec<_> = buffer
            .sorted_terms()
            .into_iter()
            .map(|k| k.split().unwrap().1.to_string())
            .collect();
        assert_eq!(terms, vec!["3", "alice", "bob"]);
    }
}
