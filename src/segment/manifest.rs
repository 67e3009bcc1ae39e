//! Index manifest: the list of committed segments
//!
//! Commit protocol:
//! 1. Write new segment files → fsync
//! 2. Write index.manifest.tmp → fsync
//! 3. Atomic rename to index.manifest → fsync directory
//! 4. Only then delete segment files the new manifest no longer lists

use std::io;

use serde::{Deserialize, Serialize};

use super::reader::SegmentMeta;
use super::types::{current_timestamp, SegmentId};
use crate::models::DocId;
use crate::schema::Schema;

/// Manifest entry for a segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub meta: SegmentMeta,
    /// Checksum of segment files
    pub checksum: u64,
}

/// The manifest tracks all committed segments of an index location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Manifest version (for format upgrades)
    pub version: u32,
    /// Generation number (incremented on each commit)
    pub generation: u64,
    /// Next document identifier to assign; never decreases
    pub next_doc_id: DocId,
    /// Next segment ID to allocate
    pub next_segment_id: SegmentId,
    /// Field types and flags of every committed field
    pub schema: Schema,
    /// Committed segments in ascending identifier order
    pub segments: Vec<ManifestEntry>,
    /// Timestamp of last update
    pub updated_at: u64,
}

impl IndexManifest {
    /// Current manifest format version
    pub const VERSION: u32 = 1;

    /// Create a new empty manifest
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            generation: 0,
            next_doc_id: DocId(0),
            next_segment_id: SegmentId::new(0),
            schema: Schema::new(),
            segments: Vec::new(),
            updated_at: 0,
        }
    }

    /// Allocate a new segment ID
    pub fn allocate_segment_id(&mut self) -> SegmentId {
        let id = self.next_segment_id;
        self.next_segment_id = id.next();
        id
    }

    /// Add a written segment to the manifest
    pub fn add_segment(&mut self, meta: SegmentMeta, checksum: u64) {
        if meta.end_doc_id() > self.next_doc_id {
            self.next_doc_id = meta.end_doc_id();
        }
        self.segments.push(ManifestEntry { meta, checksum });
    }

    /// Drop every segment, keeping identifier counters and nothing else
    pub fn clear_segments(&mut self) -> Vec<ManifestEntry> {
        self.schema = Schema::new();
        std::mem::take(&mut self.segments)
    }

    /// Mark this manifest as the next committed generation
    pub fn advance_generation(&mut self) {
        self.generation += 1;
        self.updated_at = current_timestamp();
    }

    /// Get total document count across all segments
    pub fn total_doc_count(&self) -> u64 {
        self.segments.iter().map(|e| e.meta.doc_count as u64).sum()
    }

    /// Get total size in bytes
    pub fn total_size_bytes(&self) -> u64 {
        self.segments.iter().map(|e| e.meta.size_bytes).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get segment entry by ID
    pub fn get_segment(&self, segment_id: SegmentId) -> Option<&ManifestEntry> {
        self.segments.iter().find(|e| e.meta.id == segment_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.segments.iter()
    }

    /// Check that segment identifier ranges are ascending, disjoint and
    /// below `next_doc_id`, and that segment ids are unique.
    pub fn validate(&self) -> io::Result<()> {
        let mut prev_end = DocId(0);
        let mut prev_id: Option<SegmentId> = None;
        for entry in &self.segments {
            let meta = &entry.meta;
            if meta.base_doc_id < prev_end {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("segment {} overlaps the previous segment's identifiers", meta.id),
                ));
            }
            if prev_id.map_or(false, |p| meta.id <= p) || meta.id >= self.next_segment_id {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("segment {} is out of order", meta.id),
                ));
            }
            prev_end = meta.end_doc_id();
            prev_id = Some(meta.id);
        }
        if prev_end > self.next_doc_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "segments reach identifier {} beyond next_doc_id {}",
                    prev_end, self.next_doc_id
                ),
            ));
        }
        Ok(())
    }

    /// Serialize the manifest to JSON (debug dumps)
    pub fn to_json(&self) -> io::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Serialize the manifest to bincode (on-disk form)
    pub fn to_bincode(&self) -> io::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Deserialize and validate a manifest from bincode
    pub fn from_bincode(data: &[u8]) -> io::Result<Self> {
        let manifest: Self = bincode::deserialize(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if manifest.version != Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported manifest version {}", manifest.version),
            ));
        }
        manifest.validate()?;
        Ok(manifest)
    }
}

impl Default for IndexManifest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: SegmentId, base: u64, doc_count: u32) -> SegmentMeta {
        SegmentMeta {
            id,
            base_doc_id: DocId(base),
            doc_count,
            term_count: 0,
            size_bytes: 1024,
            created_at: 0,
        }
    }

    #[test]
    fn test_manifest_basic() {
        let mut manifest = IndexManifest::new();
        assert!(manifest.is_empty());

        let id = manifest.allocate_segment_id();
        assert_eq!(id, SegmentId::new(0));
        manifest.add_segment(meta(id, 0, 1000), 7);

        assert_eq!(manifest.segment_count(), 1);
        assert_eq!(manifest.total_doc_count(), 1000);
        assert_eq!(manifest.next_doc_id, DocId(1000));
        assert_eq!(manifest.get_segment(id).map(|e| e.checksum), Some(7));
        manifest.validate().unwrap();
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut manifest = IndexManifest::new();
        let id = manifest.allocate_segment_id();
        manifest.add_segment(meta(id, 0, 3), 0);

        let removed = manifest.clear_segments();
        assert_eq!(removed.len(), 1);
        assert!(manifest.is_empty());
        assert_eq!(manifest.next_doc_id, DocId(3));
        assert_eq!(manifest.allocate_segment_id(), SegmentId(1));
    }

    #[test]
    fn test_manifest_serialization() {
        let mut manifest = IndexManifest::new();
        let id = manifest.allocate_segment_id();
        manifest.add_segment(meta(id, 0, 1000), 42);
        manifest.advance_generation();

        let json = manifest.to_json().unwrap();
        assert!(String::from_utf8(json).unwrap().contains("\"generation\": 1"));

        let bytes = manifest.to_bincode().unwrap();
        let restored = IndexManifest::from_bincode(&bytes).unwrap();
        assert_eq!(restored.generation, 1);
        assert_eq!(restored.segments, manifest.segments);
    }

    #[test]
    fn test_overlapping_segments_rejected() {
        let mut manifest = IndexManifest::new();
        let a = manifest.allocate_segment_id();
        let b = manifest.allocate_segment_id();
        manifest.add_segment(meta(a, 0, 10), 0);
        manifest.add_segment(meta(b, 5, 10), 0);
        assert!(manifest.validate().is_err());

        let bytes = manifest.to_bincode().unwrap();
        assert!(IndexManifest::from_bincode(&bytes).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(IndexManifest::from_bincode(b"not a manifest").is_err());
    }
}
