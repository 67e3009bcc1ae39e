//! On-disk layout of an index location
//!
//! ```text
//! <index_dir>/
//!   write.lock
//!   index.manifest
//!   doc_ids.reserved
//!   seg_<n>/{terms.fst, terms.meta, postings.bin, stored.bin, stored.idx, columns.bin}
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::manifest::{IndexManifest, ManifestEntry};
use super::reader::{SegmentFiles, SegmentReader};
use super::types::SegmentId;
use super::writer::{
    segment_checksum, SegmentWriteResult, COLUMNS_FILE, POSTINGS_FILE, STORED_FILE,
    STORED_INDEX_FILE, TERMS_FST_FILE, TERMS_META_FILE,
};
use crate::error::{Result, RowdexError, StorageContext};
use crate::models::DocId;

pub const MANIFEST_FILE: &str = "index.manifest";
const MANIFEST_TMP_FILE: &str = "index.manifest.tmp";
pub const RESERVATION_FILE: &str = "doc_ids.reserved";
const RESERVATION_TMP_FILE: &str = "doc_ids.reserved.tmp";

/// Persistent storage for segment files and manifest.
#[derive(Clone, Debug)]
pub struct SegmentStore {
    base_dir: PathBuf,
}

impl SegmentStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create the index directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .storage_context(|| format!("creating index directory {}", self.base_dir.display()))
    }

    pub fn segment_dir(&self, id: SegmentId) -> PathBuf {
        self.base_dir.join(id.dir_name())
    }

    /// Write every file of a segment, fsyncing them when `sync` is set.
    pub fn write_segment(&self, result: &SegmentWriteResult, sync: bool) -> Result<()> {
        let dir = self.segment_dir(result.meta.id);
        if dir.exists() {
            // leftover from an aborted session that never reached the manifest
            fs::remove_dir_all(&dir)
                .storage_context(|| format!("clearing stale {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).storage_context(|| format!("creating {}", dir.display()))?;

        for (name, data) in result.files() {
            let path = dir.join(name);
            write_file(&path, data, sync)
                .storage_context(|| format!("writing {}", path.display()))?;
        }
        if sync {
            sync_dir(&dir);
            sync_dir(&self.base_dir);
        }

        debug!(segment = %result.meta.id, dir = %dir.display(), "Wrote segment files");
        Ok(())
    }

    /// Load a committed segment and verify its checksum.
    pub fn read_segment(&self, entry: &ManifestEntry) -> Result<Arc<SegmentReader>> {
        let dir = self.segment_dir(entry.meta.id);
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read(&path).storage_context(|| format!("reading {}", path.display()))
        };

        let files = SegmentFiles {
            fst_data: read(TERMS_FST_FILE)?,
            term_meta_data: read(TERMS_META_FILE)?,
            postings_data: read(POSTINGS_FILE)?,
            stored_data: read(STORED_FILE)?,
            stored_index: read(STORED_INDEX_FILE)?,
            columns_data: read(COLUMNS_FILE)?,
        };

        let checksum = segment_checksum([
            files.fst_data.as_slice(),
            files.term_meta_data.as_slice(),
            files.postings_data.as_slice(),
            files.stored_data.as_slice(),
            files.stored_index.as_slice(),
            files.columns_data.as_slice(),
        ]);
        if checksum != entry.checksum {
            return Err(RowdexError::corrupt(
                format!("opening segment {}", entry.meta.id),
                format!(
                    "checksum mismatch: manifest has {:#x}, files hash to {:#x}",
                    entry.checksum, checksum
                ),
            ));
        }

        let reader = SegmentReader::open(entry.meta.clone(), files)
            .storage_context(|| format!("decoding segment {}", entry.meta.id))?;
        debug!(segment = %entry.meta.id, docs = reader.doc_count(), "Loaded segment");
        Ok(Arc::new(reader))
    }

    /// Delete a segment directory. A missing directory is not an error.
    pub fn remove_segment(&self, id: SegmentId) -> Result<()> {
        let dir = self.segment_dir(id);
        match fs::remove_dir_all(&dir) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(RowdexError::storage(format!("removing {}", dir.display()), e))
            }
            _ => Ok(()),
        }
    }

    /// Segment directories present on disk, in id order
    pub fn list_segments(&self) -> Result<Vec<SegmentId>> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RowdexError::storage(
                    format!("listing {}", self.base_dir.display()),
                    e,
                ))
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.storage_context(|| format!("listing {}", self.base_dir.display()))?;
            if let Some(id) = entry.file_name().to_str().and_then(SegmentId::parse_dir_name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn has_manifest(&self) -> bool {
        self.base_dir.join(MANIFEST_FILE).is_file()
    }

    /// Atomically replace the manifest: temp file, fsync, rename, fsync dir.
    pub fn save_manifest(&self, manifest: &IndexManifest, sync: bool) -> Result<()> {
        let bytes = manifest
            .to_bincode()
            .storage_context(|| "encoding manifest")?;
        let tmp = self.base_dir.join(MANIFEST_TMP_FILE);
        let path = self.base_dir.join(MANIFEST_FILE);

        write_file(&tmp, &bytes, sync)
            .storage_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).storage_context(|| format!("publishing {}", path.display()))?;
        if sync {
            sync_dir(&self.base_dir);
        }
        Ok(())
    }

    /// Read the committed manifest, or `None` if nothing was ever committed.
    pub fn load_manifest(&self) -> Result<Option<IndexManifest>> {
        let path = self.base_dir.join(MANIFEST_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RowdexError::storage(format!("reading {}", path.display()), e))
            }
        };
        IndexManifest::from_bincode(&bytes)
            .map(Some)
            .storage_context(|| format!("decoding {}", path.display()))
    }

    /// Persist the first document identifier no writer session may hand out
    /// again. Replaced atomically like the manifest.
    pub fn save_reservation(&self, next_free: DocId, sync: bool) -> Result<()> {
        let bytes = bincode::serialize(&next_free)?;
        let tmp = self.base_dir.join(RESERVATION_TMP_FILE);
        let path = self.base_dir.join(RESERVATION_FILE);

        write_file(&tmp, &bytes, sync)
            .storage_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).storage_context(|| format!("publishing {}", path.display()))?;
        if sync {
            sync_dir(&self.base_dir);
        }
        Ok(())
    }

    /// Identifier reservation left by earlier sessions, if any
    pub fn load_reservation(&self) -> Result<Option<DocId>> {
        let path = self.base_dir.join(RESERVATION_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RowdexError::storage(format!("reading {}", path.display()), e))
            }
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| RowdexError::corrupt(format!("decoding {}", path.display()), e.to_string()))
    }
}

fn write_file(path: &Path, data: &[u8], sync: bool) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

/// fsync a directory so renames and new entries are durable.
/// Not every platform can open a directory; failures are ignored.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocId, Document, Field};
    use crate::segment::buffer::MutableBuffer;
    use crate::segment::types::DocNo;
    use crate::segment::writer::SegmentWriter;
    use tempfile::TempDir;

    fn write_one(store: &SegmentStore, manifest: &mut IndexManifest) -> ManifestEntry {
        let mut buffer = MutableBuffer::new(manifest.next_doc_id);
        buffer.index_document(
            &Document::new()
                .with(Field::integer("id", 2))
                .with(Field::keyword("name", "salman")),
        );
        let id = manifest.allocate_segment_id();
        let result = SegmentWriter::new(id).write_from_buffer(&buffer).unwrap();
        store.write_segment(&result, true).unwrap();
        manifest.add_segment(result.meta.clone(), result.checksum());
        manifest.segments.last().cloned().unwrap()
    }

    #[test]
    fn test_segment_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());
        store.ensure_dir().unwrap();
        let mut manifest = IndexManifest::new();
        let entry = write_one(&store, &mut manifest);

        let reader = store.read_segment(&entry).unwrap();
        assert_eq!(reader.doc_id(DocNo(0)), DocId(0));
        assert_eq!(reader.term_docs("id", "2").unwrap().len(), 1);
        assert_eq!(store.list_segments().unwrap(), vec![entry.meta.id]);
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());
        store.ensure_dir().unwrap();
        assert!(store.load_manifest().unwrap().is_none());

        let mut manifest = IndexManifest::new();
        write_one(&store, &mut manifest);
        manifest.advance_generation();
        store.save_manifest(&manifest, true).unwrap();

        assert!(store.has_manifest());
        assert!(!dir.path().join(MANIFEST_TMP_FILE).exists());
        let loaded = store.load_manifest().unwrap().unwrap();
        assert_eq!(loaded.generation, 1);
        assert_eq!(loaded.segments, manifest.segments);
    }

    #[test]
    fn test_corrupt_segment_detected() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());
        store.ensure_dir().unwrap();
        let mut manifest = IndexManifest::new();
        let entry = write_one(&store, &mut manifest);

        let path = store.segment_dir(entry.meta.id).join(STORED_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0x01;
        fs::write(&path, bytes).unwrap();

        let err = store.read_segment(&entry).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StorageFailure);
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_remove_segment_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());
        store.ensure_dir().unwrap();
        let mut manifest = IndexManifest::new();
        let entry = write_one(&store, &mut manifest);

        store.remove_segment(entry.meta.id).unwrap();
        store.remove_segment(entry.meta.id).unwrap();
        assert!(store.list_segments().unwrap().is_empty());
    }

    #[test]
    fn test_reservation_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path());
        assert_eq!(store.load_reservation().unwrap(), None);

        store.save_reservation(DocId(1024), true).unwrap();
        store.save_reservation(DocId(2048), false).unwrap();
        assert_eq!(store.load_reservation().unwrap(), Some(DocId(2048)));
        assert!(store.list_segments().unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_has_no_manifest() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path().join("nowhere"));
        assert!(!store.has_manifest());
        assert!(store.load_manifest().unwrap().is_none());
        assert!(store.list_segments().unwrap().is_empty());
    }
}
