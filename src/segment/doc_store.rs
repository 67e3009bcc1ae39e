//! Stored-field records of a segment
//!
//! `stored.bin` is a sequence of records:
//! - u32 length (little endian)
//! - u32 crc32 of payload
//! - bincode-encoded [`StoredDocument`]
//!
//! `stored.idx` holds one little-endian u64 record offset per docno.

use std::io;

use crc32fast::Hasher;

use super::types::DocNo;
use crate::models::StoredDocument;

const RECORD_HEADER_LEN: usize = 8;

/// Pointer to a record inside `stored.bin`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPointer {
    pub offset: u64,
    pub len: u32,
    pub crc32: u32,
}

/// Appends stored documents in docno order
#[derive(Debug, Default)]
pub struct DocStoreWriter {
    data: Vec<u8>,
    offsets: Vec<u64>,
}

impl DocStoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record for the next docno
    pub fn append(&mut self, doc: &StoredDocument) -> io::Result<RecordPointer> {
        let payload =
            bincode::serialize(doc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let offset = self.data.len() as u64;
        let len = payload.len() as u32;

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc32 = hasher.finalize();

        self.data.extend_from_slice(&len.to_le_bytes());
        self.data.extend_from_slice(&crc32.to_le_bytes());
        self.data.extend_from_slice(&payload);
        self.offsets.push(offset);

        Ok(RecordPointer { offset, len, crc32 })
    }

    pub fn doc_count(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `(stored.bin, stored.idx)` contents
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        let mut index = Vec::with_capacity(self.offsets.len() * 8);
        for offset in &self.offsets {
            index.extend_from_slice(&offset.to_le_bytes());
        }
        (self.data, index)
    }
}

/// Random access to the stored records of one segment
pub struct DocStoreReader {
    data: Vec<u8>,
    offsets: Vec<u64>,
}

impl DocStoreReader {
    pub fn new(data: Vec<u8>, index: &[u8]) -> io::Result<Self> {
        if index.len() % 8 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "stored.idx length is not a multiple of 8",
            ));
        }
        let mut offsets = Vec::with_capacity(index.len() / 8);
        for chunk in index.chunks_exact(8) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            let offset = u64::from_le_bytes(bytes);
            if offset as usize + RECORD_HEADER_LEN > data.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("stored record offset {} beyond data", offset),
                ));
            }
            offsets.push(offset);
        }
        Ok(Self { data, offsets })
    }

    pub fn doc_count(&self) -> usize {
        self.offsets.len()
    }

    /// Read and verify the record for `docno`
    pub fn get(&self, docno: DocNo) -> io::Result<StoredDocument> {
        let offset = *self.offsets.get(docno.as_usize()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no stored record for docno {}", docno.0),
            )
        })? as usize;

        let header = &self.data[offset..offset + RECORD_HEADER_LEN];
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let stored_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + RECORD_HEADER_LEN;
        let payload = self.data.get(start..start + len).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "truncated stored record")
        })?;

        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != stored_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stored record checksum mismatch for docno {}", docno.0),
            ));
        }

        bincode::deserialize(payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

    fn record(id: i64, name: &str) -> StoredDocument {
        let mut doc = StoredDocument::new();
        doc.push("id", FieldValue::Integer(id));
        doc.push("name", FieldValue::Keyword(name.to_string()));
        doc
    }

    #[test]
    fn test_write_then_read() {
        let mut writer = DocStoreWriter::new();
        let first = writer.append(&record(1, "alice")).unwrap();
        let second = writer.append(&record(2, "salman")).unwrap();
        assert_eq!(first.offset, 0);
        assert!(second.offset > first.offset);
        assert_eq!(writer.doc_count(), 2);

        let (data, index) = writer.finish();
        let reader = DocStoreReader::new(data, &index).unwrap();
        assert_eq!(reader.doc_count(), 2);
        assert_eq!(reader.get(DocNo(1)).unwrap(), record(2, "salman"));
        assert_eq!(reader.get(DocNo(0)).unwrap(), record(1, "alice"));
        assert_eq!(
            reader.get(DocNo(2)).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_empty_document_round_trips() {
        let mut writer = DocStoreWriter::new();
        writer.append(&StoredDocument::new()).unwrap();
        let (data, index) = writer.finish();
        let reader = DocStoreReader::new(data, &index).unwrap();
        assert!(reader.get(DocNo(0)).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_payload_detected() {
        let mut writer = DocStoreWriter::new();
        writer.append(&record(3, "bob")).unwrap();
        let (mut data, index) = writer.finish();
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        let reader = DocStoreReader::new(data, &index).unwrap();
        let err = reader.get(DocNo(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_bad_index_rejected() {
        assert!(DocStoreReader::new(vec![0; 4], &[1, 2, 3]).is_err());
        assert!(DocStoreReader::new(vec![0; 4], &100u64.to_le_bytes()).is_err());
    }
}
