//! Single-writer build session over an index location
//!
//! Documents go into a mutable buffer, spill to uncommitted segments when the
//! buffer fills, and become visible only when `commit` publishes a new
//! manifest.
//!
//! Identifiers are reserved on disk in blocks ahead of use, so a session
//! that dies before committing cannot cause a later one to hand the same
//! identifier out again.

use std::io;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{IndexConfig, OpenMode};
use crate::error::{Result, RowdexError, StorageContext};
use crate::models::{DocId, Document};
use crate::schema::Schema;
use crate::segment::{IndexManifest, MutableBuffer, SegmentId, SegmentStore, SegmentWriter, WriteLock};

/// Identifiers reserved per write of the reservation file
const ID_RESERVATION_BLOCK: u64 = 1024;

/// Outcome of a successful commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    /// Documents made visible by this commit
    pub docs_committed: u64,
    /// Documents visible after this commit
    pub total_docs: u64,
    pub generation: u64,
}

/// Exclusive writer for one index location.
///
/// Holds the location's write lock until closed or dropped.
pub struct IndexWriter {
    config: IndexConfig,
    store: SegmentStore,
    /// Last published manifest
    committed: IndexManifest,
    /// Manifest the next commit publishes: committed state plus spilled segments
    working: IndexManifest,
    buffer: MutableBuffer,
    /// Documents added since the last commit
    uncommitted_docs: u64,
    /// Discard committed segments at the next commit
    truncate: bool,
    /// First identifier not covered by the on-disk reservation
    reserved: DocId,
    closed: bool,
    _lock: WriteLock,
}

impl IndexWriter {
    /// Open a build session, taking the location's write lock.
    pub fn open(config: IndexConfig) -> Result<Self> {
        let store = SegmentStore::new(&config.index_dir);

        if config.open_mode == OpenMode::Append && !config.index_dir.is_dir() {
            return Err(no_index(&config));
        }
        store.ensure_dir()?;
        let lock = WriteLock::acquire(&config.index_dir)?;

        let loaded = store.load_manifest()?;
        let truncate = match (config.open_mode, loaded.is_some()) {
            (OpenMode::Append, false) => return Err(no_index(&config)),
            (OpenMode::Create, true) => true,
            _ => false,
        };
        let committed = loaded.unwrap_or_else(IndexManifest::new);

        collect_orphans(&store, &committed)?;
        let reserved = store.load_reservation()?.unwrap_or_default();

        let mut working = committed.clone();
        if truncate {
            working.clear_segments();
        }
        if reserved > working.next_doc_id {
            debug!(
                committed = %working.next_doc_id,
                reserved = %reserved,
                "Skipping identifiers reserved by an earlier session"
            );
            working.next_doc_id = reserved;
        }
        let buffer = MutableBuffer::new(working.next_doc_id);

        debug!(
            dir = %config.index_dir.display(),
            mode = ?config.open_mode,
            generation = committed.generation,
            committed_docs = committed.total_doc_count(),
            "Opened index writer"
        );

        Ok(Self {
            config,
            store,
            committed,
            working,
            buffer,
            uncommitted_docs: 0,
            truncate,
            reserved,
            closed: false,
            _lock: lock,
        })
    }

    /// Add a document and return its identifier.
    ///
    /// Fails with `InvalidDocument` on an empty field name or a field whose
    /// type disagrees with earlier documents. On any error the document is
    /// not added and consumes no identifier.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        self.working.schema.validate(doc)?;

        if self.buffer.doc_count() as usize >= self.spill_threshold() {
            self.spill()?;
        }
        let doc_id = self.buffer.next_doc_id();
        if doc_id >= self.reserved {
            self.reserve_from(doc_id)?;
        }

        self.working.schema.observe(doc);
        self.buffer.index_document(doc);
        self.uncommitted_docs += 1;
        Ok(doc_id)
    }

    /// Publish everything added since the last commit.
    pub fn commit(&mut self) -> Result<CommitStats> {
        self.spill()?;

        let mut next = self.working.clone();
        next.advance_generation();
        self.store.save_manifest(&next, self.config.sync_on_commit)?;

        // The new manifest is durable; segments it no longer lists can go
        for entry in self.committed.iter() {
            if next.get_segment(entry.meta.id).is_none() {
                if let Err(e) = self.store.remove_segment(entry.meta.id) {
                    warn!(segment = %entry.meta.id, error = %e, "Failed to remove superseded segment");
                }
            }
        }

        let stats = CommitStats {
            docs_committed: self.uncommitted_docs,
            total_docs: next.total_doc_count(),
            generation: next.generation,
        };
        info!(
            generation = stats.generation,
            total_docs = stats.total_docs,
            "{} records indexed",
            stats.docs_committed
        );

        self.committed = next.clone();
        self.working = next;
        self.uncommitted_docs = 0;
        self.truncate = false;
        Ok(stats)
    }

    /// Discard everything added since the last commit.
    ///
    /// Identifiers handed out to discarded documents stay consumed.
    pub fn rollback(&mut self) -> Result<()> {
        let discarded = self.uncommitted_docs;
        let high_water = self.buffer.next_doc_id();
        let next_segment_id = self.working.next_segment_id;
        self.discard_pending()?;

        self.working = self.committed.clone();
        if self.truncate {
            self.working.clear_segments();
        }
        self.working.next_doc_id = high_water;
        self.working.next_segment_id = next_segment_id;
        self.buffer = MutableBuffer::new(high_water);
        self.uncommitted_docs = 0;

        debug!(discarded, "Rolled back uncommitted documents");
        Ok(())
    }

    /// End the session and release the write lock.
    ///
    /// Uncommitted documents are discarded. Dropping the writer does the same
    /// but can only log a failure.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    /// Identifier the next added document receives
    pub fn next_doc_id(&self) -> DocId {
        self.buffer.next_doc_id()
    }

    /// Documents added since the last commit
    pub fn uncommitted_docs(&self) -> u64 {
        self.uncommitted_docs
    }

    /// Documents visible to searchers opened now
    pub fn committed_docs(&self) -> u64 {
        self.committed.total_doc_count()
    }

    pub fn generation(&self) -> u64 {
        self.committed.generation
    }

    /// Schema including fields of uncommitted documents
    pub fn schema(&self) -> &Schema {
        &self.working.schema
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn spill_threshold(&self) -> usize {
        self.config.max_buffered_docs.clamp(1, u32::MAX as usize)
    }

    /// Extend the on-disk reservation past `next`
    fn reserve_from(&mut self, next: DocId) -> Result<()> {
        let mark = DocId(next.0 + ID_RESERVATION_BLOCK);
        self.store.save_reservation(mark, self.config.sync_on_commit)?;
        self.reserved = mark;
        Ok(())
    }

    /// Write the buffer to an uncommitted segment.
    ///
    /// The buffer is only replaced once the segment is on disk, so a failed
    /// spill keeps every buffered document for the next attempt.
    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let segment_id = self.working.allocate_segment_id();
        let written = SegmentWriter::new(segment_id)
            .write_from_buffer(&self.buffer)
            .storage_context(|| format!("building segment {}", segment_id))
            .and_then(|result| {
                self.store.write_segment(&result, self.config.sync_on_commit)?;
                Ok(result)
            });
        let result = match written {
            Ok(result) => result,
            Err(e) => {
                warn!(segment = %segment_id, error = %e, "Failed to spill buffered documents");
                if let Err(cleanup) = self.store.remove_segment(segment_id) {
                    debug!(segment = %segment_id, error = %cleanup, "Could not remove partial segment");
                }
                return Err(e);
            }
        };

        self.working.add_segment(result.meta.clone(), result.checksum());
        self.buffer = MutableBuffer::new(self.buffer.next_doc_id());

        debug!(
            segment = %segment_id,
            docs = result.meta.doc_count,
            "Spilled buffered documents"
        );
        Ok(())
    }

    /// Discard pending work and shrink the reservation to what was handed out
    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.uncommitted_docs > 0 {
            warn!(
                docs = self.uncommitted_docs,
                dir = %self.config.index_dir.display(),
                "Closing writer with uncommitted documents; they are discarded"
            );
        }
        self.discard_pending()?;

        let high_water = self.buffer.next_doc_id();
        if self.reserved > high_water {
            self.store.save_reservation(high_water, self.config.sync_on_commit)?;
            self.reserved = high_water;
        }
        Ok(())
    }

    /// Remove segments written since the last commit
    fn discard_pending(&mut self) -> Result<()> {
        let pending: Vec<SegmentId> = self
            .working
            .iter()
            .map(|e| e.meta.id)
            .filter(|id| self.committed.get_segment(*id).is_none())
            .collect();
        for id in pending {
            self.store.remove_segment(id)?;
        }
        Ok(())
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(
                dir = %self.config.index_dir.display(),
                error = %e,
                "Failed to clean up dropped writer; leftovers are removed on next open"
            );
        }
    }
}

fn no_index(config: &IndexConfig) -> RowdexError {
    RowdexError::storage(
        format!("opening {} for append", config.index_dir.display()),
        io::Error::new(io::ErrorKind::NotFound, "no committed index at this location"),
    )
}

/// Delete segment directories the committed manifest does not list
fn collect_orphans(store: &SegmentStore, committed: &IndexManifest) -> Result<()> {
    for id in store.list_segments()? {
        if committed.get_segment(id).is_none() {
            warn!(segment = %id, "Removing orphaned segment from an uncommitted session");
            store.remove_segment(id)?;
        }
    }
    Ok(())
}
