//! Segment writer for creating new immutable segments
//!
//! When the buffer is flushed, a new immutable segment is produced:
//! postings + term dictionary + stored records + sort columns.

use std::io;

use crc32fast::Hasher;
use tracing::debug;

use super::buffer::MutableBuffer;
use super::doc_store::DocStoreWriter;
use super::postings::PostingsWriter;
use super::reader::SegmentMeta;
use super::term_dict::TermDictionaryBuilder;
use super::types::{current_timestamp, SegmentId};

pub const TERMS_FST_FILE: &str = "terms.fst";
pub const TERMS_META_FILE: &str = "terms.meta";
pub const POSTINGS_FILE: &str = "postings.bin";
pub const STORED_FILE: &str = "stored.bin";
pub const STORED_INDEX_FILE: &str = "stored.idx";
pub const COLUMNS_FILE: &str = "columns.bin";

/// Result of writing a segment
pub struct SegmentWriteResult {
    pub meta: SegmentMeta,
    /// Term dictionary FST data
    pub fst_data: Vec<u8>,
    /// Term metadata (bincode)
    pub term_meta_data: Vec<u8>,
    pub postings_data: Vec<u8>,
    pub stored_data: Vec<u8>,
    pub stored_index: Vec<u8>,
    pub columns_data: Vec<u8>,
}

impl SegmentWriteResult {
    /// Segment files in a fixed order: (file name, contents)
    pub fn files(&self) -> [(&'static str, &[u8]); 6] {
        [
            (TERMS_FST_FILE, self.fst_data.as_slice()),
            (TERMS_META_FILE, self.term_meta_data.as_slice()),
            (POSTINGS_FILE, self.postings_data.as_slice()),
            (STORED_FILE, self.stored_data.as_slice()),
            (STORED_INDEX_FILE, self.stored_index.as_slice()),
            (COLUMNS_FILE, self.columns_data.as_slice()),
        ]
    }

    /// CRC32 over every segment file, in [`SegmentWriteResult::files`] order.
    ///
    /// The manifest records this value and readers verify it on open.
    pub fn checksum(&self) -> u64 {
        let files = self.files();
        segment_checksum(files.iter().map(|(_, data)| *data))
    }
}

/// CRC32 over a segment's file contents in canonical order
pub fn segment_checksum<'a, I>(files: I) -> u64
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Hasher::new();
    for data in files {
        hasher.update(&(data.len() as u64).to_le_bytes());
        hasher.update(data);
    }
    hasher.finalize() as u64
}

/// Writer for creating new segments from a mutable buffer
pub struct SegmentWriter {
    segment_id: SegmentId,
}

impl SegmentWriter {
    pub fn new(segment_id: SegmentId) -> Self {
        Self { segment_id }
    }

    /// Write a segment from a mutable buffer
    pub fn write_from_buffer(&self, buffer: &MutableBuffer) -> io::Result<SegmentWriteResult> {
        let terms = buffer.sorted_terms();

        let mut postings_writer = PostingsWriter::new();
        let mut term_builder = TermDictionaryBuilder::with_capacity(terms.len());

        for key in terms {
            if let Some(postings) = buffer.get_postings(key) {
                postings_writer.start_posting_list();
                for &docno in postings {
                    postings_writer.add(docno);
                }
                let meta = postings_writer.finish_posting_list(postings.len() as u32);
                term_builder.add(key.clone(), meta);
            }
        }

        let postings_data = postings_writer.into_data();
        let term_dict = term_builder.build()?;
        let fst_data = term_dict.fst_bytes().to_vec();
        let term_meta_data = bincode::serialize(term_dict.metadata())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut doc_store = DocStoreWriter::new();
        for stored in buffer.stored_documents() {
            doc_store.append(stored)?;
        }
        let (stored_data, stored_index) = doc_store.finish();

        let columns_data = buffer.docvalues().build().serialize()?;

        let size_bytes = (fst_data.len()
            + term_meta_data.len()
            + postings_data.len()
            + stored_data.len()
            + stored_index.len()
            + columns_data.len()) as u64;

        let meta = SegmentMeta {
            id: self.segment_id,
            base_doc_id: buffer.base_doc_id(),
            doc_count: buffer.doc_count(),
            term_count: term_dict.len() as u64,
            size_bytes,
            created_at: current_timestamp(),
        };

        debug!(
            segment = %meta.id,
            docs = meta.doc_count,
            terms = meta.term_count,
            bytes = meta.size_bytes,
            "Built segment"
        );

        Ok(SegmentWriteResult {
            meta,
            fst_data,
            term_meta_data,
            postings_data,
            stored_data,
            stored_index,
            columns_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocId, Document, Field};
    use crate::segment::reader::SegmentReader;
    use crate::segment::types::DocNo;

    fn buffer() -> MutableBuffer {
        let mut buffer = MutableBuffer::new(DocId(5));
        for (id, name) in [(1, "alice"), (2, "salman"), (3, "bob")] {
            buffer.index_document(
                &Document::new()
                    .with(Field::integer("id", id))
                    .with(Field::keyword("name", name)),
            );
        }
        buffer
    }

    #[test]
    fn test_write_from_buffer() {
        let result = SegmentWriter::new(SegmentId(4))
            .write_from_buffer(&buffer())
            .unwrap();

        assert_eq!(result.meta.id, SegmentId(4));
        assert_eq!(result.meta.base_doc_id, DocId(5));
        assert_eq!(result.meta.doc_count, 3);
        assert_eq!(result.meta.term_count, 6);

        let reader = SegmentReader::from_write_result(&result).unwrap();
        let docs = reader.term_docs("name", "salman").unwrap();
        assert_eq!(docs.iter().collect::<Vec<_>>(), vec![1]);
        assert_eq!(reader.doc_id(DocNo(1)), DocId(6));
        let stored = reader.stored(DocNo(2)).unwrap();
        assert_eq!(stored.get("name").and_then(|v| v.as_str()), Some("bob"));
    }

    #[test]
    fn test_checksum_covers_every_file() {
        let mut result = SegmentWriter::new(SegmentId(0))
            .write_from_buffer(&buffer())
            .unwrap();
        let original = result.checksum();

        result.columns_data.push(0);
        assert_ne!(result.checksum(), original);
    }

    #[test]
    fn test_empty_buffer_writes_empty_segment() {
        let result = SegmentWriter::new(SegmentId(1))
            .write_from_buffer(&MutableBuffer::new(DocId(0)))
            .unwrap();
        assert_eq!(result.meta.doc_count, 0);
        let reader = SegmentReader::from_write_result(&result).unwrap();
        assert!(reader.term_docs("name", "x").unwrap().is_empty());
    }
}
