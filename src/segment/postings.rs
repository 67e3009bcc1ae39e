//! Postings format with block-based compression
//!
//! A posting list is a block count followed by blocks of up to
//! [`BLOCK_SIZE`] document numbers. Each block stores its length and the
//! bitpacked deltas from the previous document number.

use std::io;

use roaring::RoaringBitmap;

use super::types::{DocNo, PostingListMeta, BLOCK_SIZE};

/// Variable-byte encoding for integers (commonly used in search engines)
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // Set high bit to indicate last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Decode a variable-byte encoded integer
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    loop {
        let byte = *input.get(*pos).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "Unexpected end of vbyte")
        })?;
        *pos += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 != 0 {
            return Ok(result);
        }

        shift += 7;
        if shift > 28 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "VByte value too large",
            ));
        }
    }
}

/// Simple bitpacking for a block of integers
/// Uses the minimum number of bits needed to represent the max value
pub fn bitpack_encode(values: &[u32], output: &mut Vec<u8>) {
    let max_val = values.iter().copied().max().unwrap_or(0);
    if max_val == 0 {
        output.push(0); // 0 bits needed
        return;
    }

    let bits_needed = (32 - max_val.leading_zeros()) as u8;
    output.push(bits_needed);

    let mut current: u64 = 0;
    let mut bits_in_current = 0;

    for &value in values {
        current |= (value as u64) << bits_in_current;
        bits_in_current += bits_needed as u32;

        while bits_in_current >= 8 {
            output.push(current as u8);
            current >>= 8;
            bits_in_current -= 8;
        }
    }

    // Flush remaining bits
    if bits_in_current > 0 {
        output.push(current as u8);
    }
}

/// Decode bitpacked integers
pub fn bitpack_decode(input: &[u8], pos: &mut usize, count: usize) -> io::Result<Vec<u32>> {
    let bits_needed = *input.get(*pos).ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "Unexpected end of bitpack")
    })? as u32;
    *pos += 1;

    if bits_needed == 0 {
        return Ok(vec![0; count]);
    }
    if bits_needed > 32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Bitpack width exceeds 32 bits",
        ));
    }

    let total_bits = count as u64 * bits_needed as u64;
    let bytes_needed = ((total_bits + 7) / 8) as usize;

    if *pos + bytes_needed > input.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Not enough bytes for bitpack",
        ));
    }

    let mut values = Vec::with_capacity(count);
    let mut current: u64 = 0;
    let mut bits_available = 0;
    let mask = (1u64 << bits_needed) - 1;
    let end = *pos + bytes_needed;

    for _ in 0..count {
        while bits_available < bits_needed {
            current |= (input[*pos] as u64) << bits_available;
            *pos += 1;
            bits_available += 8;
        }

        values.push((current & mask) as u32);
        current >>= bits_needed;
        bits_available -= bits_needed;
    }
    *pos = end;

    Ok(values)
}

/// Writer for posting lists
pub struct PostingsWriter {
    /// Encoded blocks of the current list
    block_data: Vec<u8>,
    block_count: u32,
    /// Current block being built
    current_block: Vec<DocNo>,
    /// Last docno written to a finished block
    last_docno: Option<DocNo>,
    /// Final output data
    data: Vec<u8>,
}

impl PostingsWriter {
    pub fn new() -> Self {
        Self {
            block_data: Vec::new(),
            block_count: 0,
            current_block: Vec::with_capacity(BLOCK_SIZE),
            last_docno: None,
            data: Vec::new(),
        }
    }

    /// Start writing a new posting list
    pub fn start_posting_list(&mut self) {
        self.block_data.clear();
        self.block_count = 0;
        self.current_block.clear();
        self.last_docno = None;
    }

    /// Add a docno to the current list. Docnos must be strictly ascending.
    pub fn add(&mut self, docno: DocNo) {
        debug_assert!(
            self.current_block.last().or(self.last_docno.as_ref()).map_or(true, |&last| last < docno),
            "postings must be added in ascending order"
        );
        self.current_block.push(docno);

        if self.current_block.len() >= BLOCK_SIZE {
            self.flush_block();
        }
    }

    /// Finish writing a posting list and return metadata
    pub fn finish_posting_list(&mut self, doc_frequency: u32) -> PostingListMeta {
        if !self.current_block.is_empty() {
            self.flush_block();
        }

        let offset = self.data.len() as u64;
        encode_vbyte(self.block_count, &mut self.data);
        self.data.extend_from_slice(&self.block_data);
        let length = self.data.len() as u64 - offset;

        PostingListMeta {
            offset,
            length,
            doc_frequency,
        }
    }

    /// Take the data (consuming the writer)
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn flush_block(&mut self) {
        if self.current_block.is_empty() {
            return;
        }

        encode_vbyte(self.current_block.len() as u32, &mut self.block_data);

        // The first delta of a block is relative to the previous block's last docno
        let mut deltas = Vec::with_capacity(self.current_block.len());
        let mut prev = self.last_docno.map(|d| d.0);
        for docno in &self.current_block {
            deltas.push(match prev {
                Some(p) => docno.0 - p,
                None => docno.0,
            });
            prev = Some(docno.0);
        }
        bitpack_encode(&deltas, &mut self.block_data);

        self.last_docno = self.current_block.last().copied();
        self.block_count += 1;
        self.current_block.clear();
    }
}

impl Default for PostingsWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for posting lists
pub struct PostingsReader {
    data: Vec<u8>,
}

impl PostingsReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Decode one posting list into a docno set
    pub fn read_docs(&self, meta: &PostingListMeta) -> io::Result<RoaringBitmap> {
        let start = meta.offset as usize;
        let end = meta.offset.saturating_add(meta.length) as usize;

        if end > self.data.len() || start > end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Posting list extends beyond data",
            ));
        }

        let data = &self.data[start..end];
        let mut pos = 0;
        let block_count = decode_vbyte(data, &mut pos)?;
        let mut docs = RoaringBitmap::new();
        let mut last: Option<u32> = None;

        for _ in 0..block_count {
            let count = decode_vbyte(data, &mut pos)? as usize;
            for delta in bitpack_decode(data, &mut pos, count)? {
                let docno = match last {
                    Some(prev) => prev.checked_add(delta).ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidData, "Docno overflow in postings")
                    })?,
                    None => delta,
                };
                docs.insert(docno);
                last = Some(docno);
            }
        }

        if docs.len() != meta.doc_frequency as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Posting list decoded {} docs, dictionary says {}",
                    docs.len(),
                    meta.doc_frequency
                ),
            ));
        }

        Ok(docs)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
