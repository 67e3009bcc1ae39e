//! Immutable segment reader
//!
//! Each segment reader provides access to postings, the term dictionary,
//! stored records and sort columns of one committed segment.

use std::io;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use super::doc_store::DocStoreReader;
use super::docvalues::DocValues;
use super::postings::PostingsReader;
use super::term_dict::TermDictionary;
use super::types::{DocNo, PostingListMeta, SegmentId, TermKey};
use super::writer::SegmentWriteResult;
use crate::models::{DocId, StoredDocument};

/// Metadata for a segment stored in the manifest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Unique segment identifier
    pub id: SegmentId,
    /// Identifier of docno 0; docno `n` is `base_doc_id + n`
    pub base_doc_id: DocId,
    /// Number of documents in the segment
    pub doc_count: u32,
    /// Number of distinct terms
    pub term_count: u64,
    /// Size in bytes (all segment files combined)
    pub size_bytes: u64,
    /// Creation timestamp
    pub created_at: u64,
}

impl SegmentMeta {
    /// One past the last identifier in this segment
    pub fn end_doc_id(&self) -> DocId {
        DocId(self.base_doc_id.0 + self.doc_count as u64)
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        doc_id >= self.base_doc_id && doc_id < self.end_doc_id()
    }
}

/// Raw contents of the segment files
pub struct SegmentFiles {
    pub fst_data: Vec<u8>,
    pub term_meta_data: Vec<u8>,
    pub postings_data: Vec<u8>,
    pub stored_data: Vec<u8>,
    pub stored_index: Vec<u8>,
    pub columns_data: Vec<u8>,
}

/// Immutable segment reader backed by in-memory data
pub struct SegmentReader {
    meta: SegmentMeta,
    terms: TermDictionary,
    postings: PostingsReader,
    stored: DocStoreReader,
    docvalues: DocValues,
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("meta", &self.meta)
            .field("terms", &self.terms.len())
            .finish()
    }
}

impl SegmentReader {
    /// Decode a segment from its file contents
    pub fn open(meta: SegmentMeta, files: SegmentFiles) -> io::Result<Self> {
        let term_meta: Vec<PostingListMeta> = bincode::deserialize(&files.term_meta_data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let terms = TermDictionary::new(files.fst_data, term_meta)?;
        let stored = DocStoreReader::new(files.stored_data, &files.stored_index)?;
        let docvalues = DocValues::deserialize(&files.columns_data)?;

        if stored.doc_count() != meta.doc_count as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "segment {} lists {} documents but stores {}",
                    meta.id,
                    meta.doc_count,
                    stored.doc_count()
                ),
            ));
        }

        Ok(Self {
            meta,
            terms,
            postings: PostingsReader::new(files.postings_data),
            stored,
            docvalues,
        })
    }

    /// Open a reader over a freshly written segment without touching disk
    pub fn from_write_result(result: &SegmentWriteResult) -> io::Result<Self> {
        Self::open(
            result.meta.clone(),
            SegmentFiles {
                fst_data: result.fst_data.clone(),
                term_meta_data: result.term_meta_data.clone(),
                postings_data: result.postings_data.clone(),
                stored_data: result.stored_data.clone(),
                stored_index: result.stored_index.clone(),
                columns_data: result.columns_data.clone(),
            },
        )
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn id(&self) -> SegmentId {
        self.meta.id
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    /// Docnos holding exactly `value` in `field`; empty if the term is absent
    pub fn term_docs(&self, field: &str, value: &str) -> io::Result<RoaringBitmap> {
        match self.terms.get(&TermKey::new(field, value)) {
            Some(meta) => self.postings.read_docs(meta),
            None => Ok(RoaringBitmap::new()),
        }
    }

    /// Union of the postings of every `field` term starting with `prefix`
    pub fn prefix_docs(&self, field: &str, prefix: &str) -> io::Result<RoaringBitmap> {
        let mut docs = RoaringBitmap::new();
        for (_, meta) in self.terms.prefix_search(field, prefix) {
            docs |= self.postings.read_docs(meta)?;
        }
        Ok(docs)
    }

    /// Document frequency for a term
    pub fn doc_frequency(&self, field: &str, value: &str) -> u32 {
        self.terms
            .get(&TermKey::new(field, value))
            .map(|m| m.doc_frequency)
            .unwrap_or(0)
    }

    /// Global identifier of a docno
    pub fn doc_id(&self, docno: DocNo) -> DocId {
        DocId(self.meta.base_doc_id.0 + docno.0 as u64)
    }

    /// Docno of a global identifier, if this segment holds it
    pub fn docno_of(&self, doc_id: DocId) -> Option<DocNo> {
        if self.meta.contains(doc_id) {
            Some(DocNo((doc_id.0 - self.meta.base_doc_id.0) as u32))
        } else {
            None
        }
    }

    /// Stored fields of a docno
    pub fn stored(&self, docno: DocNo) -> io::Result<StoredDocument> {
        self.stored.get(docno)
    }

    pub fn docvalues(&self) -> &DocValues {
        &self.docvalues
    }

    pub fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Field};
    use crate::segment::buffer::MutableBuffer;
    use crate::segment::writer::SegmentWriter;

    fn segment() -> SegmentReader {
        let mut buffer = MutableBuffer::new(DocId(100));
        for name in ["sam", "salman", "alice", "sally"] {
            buffer.index_document(&Document::new().with(Field::keyword("name", name)));
        }
        let result = SegmentWriter::new(SegmentId(2))
            .write_from_buffer(&buffer)
            .unwrap();
        SegmentReader::from_write_result(&result).unwrap()
    }

    #[test]
    fn test_prefix_docs() {
        let reader = segment();
        let docs = reader.prefix_docs("name", "sal").unwrap();
        assert_eq!(docs.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(reader.prefix_docs("name", "").unwrap().len(), 4);
        assert!(reader.prefix_docs("address", "").unwrap().is_empty());
    }

    #[test]
    fn test_doc_id_mapping() {
        let reader = segment();
        assert_eq!(reader.doc_id(DocNo(3)), DocId(103));
        assert_eq!(reader.docno_of(DocId(101)), Some(DocNo(1)));
        assert_eq!(reader.docno_of(DocId(104)), None);
        assert_eq!(reader.docno_of(DocId(99)), None);
    }

    #[test]
    fn test_absent_term_is_empty() {
        let reader = segment();
        assert!(reader.term_docs("name", "zeta").unwrap().is_empty());
        assert_eq!(reader.doc_frequency("name", "zeta"), 0);
        assert_eq!(reader.doc_frequency("name", "sam"), 1);
    }

    #[test]
    fn test_doc_count_mismatch_rejected() {
        let mut buffer = MutableBuffer::new(DocId(0));
        buffer.index_document(&Document::new().with(Field::keyword("name", "x")));
        let mut result = SegmentWriter::new(SegmentId(0))
            .write_from_buffer(&buffer)
            .unwrap();
        result.meta.doc_count = 2;
        assert!(SegmentReader::from_write_result(&result).is_err());
    }
}
