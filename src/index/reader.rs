//! Committed snapshots and the reader that hands them out

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::searcher::IndexSearcher;
use crate::config::SearchConfig;
use crate::error::{Result, RowdexError};
use crate::models::DocId;
use crate::schema::Schema;
use crate::segment::{IndexManifest, SegmentId, SegmentReader, SegmentStore};

/// One committed generation of an index, immutable once loaded
#[derive(Debug)]
pub struct IndexSnapshot {
    manifest: IndexManifest,
    segments: Vec<Arc<SegmentReader>>,
}

impl IndexSnapshot {
    pub fn new(manifest: IndexManifest, segments: Vec<Arc<SegmentReader>>) -> Self {
        Self { manifest, segments }
    }

    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }

    pub fn schema(&self) -> &Schema {
        &self.manifest.schema
    }

    /// Segments in ascending document id order
    pub fn segments(&self) -> &[Arc<SegmentReader>] {
        &self.segments
    }

    pub fn num_docs(&self) -> u64 {
        self.manifest.total_doc_count()
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Segment holding `doc_id`, if any
    pub fn segment_for(&self, doc_id: DocId) -> Option<&Arc<SegmentReader>> {
        let idx = self
            .segments
            .partition_point(|s| s.meta().end_doc_id() <= doc_id);
        self.segments.get(idx).filter(|s| s.meta().contains(doc_id))
    }
}

/// Reader over an index location.
///
/// Holds the latest loaded snapshot; `reload` swaps in newer commits for
/// searchers created afterwards.
pub struct IndexReader {
    store: SegmentStore,
    config: SearchConfig,
    current: ArcSwap<IndexSnapshot>,
    reload_lock: Mutex<()>,
}

impl IndexReader {
    /// Open the committed index at `index_dir`.
    ///
    /// Fails with `InvalidSearchState` if nothing was ever committed there.
    pub fn open<P: AsRef<Path>>(index_dir: P) -> Result<Self> {
        Self::open_with_config(index_dir, SearchConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(index_dir: P, config: SearchConfig) -> Result<Self> {
        let store = SegmentStore::new(index_dir);
        let snapshot = load_snapshot(&store, &config, &HashMap::new())?;
        Ok(Self {
            store,
            config,
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    /// Snapshot searchers created now would see
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    /// Searcher over the current snapshot
    pub fn searcher(&self) -> IndexSearcher {
        IndexSearcher::new(self.snapshot())
    }

    /// Pick up the latest commit. Returns true if the snapshot changed.
    ///
    /// Already-open searchers keep their snapshot.
    pub fn reload(&self) -> Result<bool> {
        let _guard = self.reload_lock.lock();
        let current = self.current.load_full();

        match self.store.load_manifest()? {
            Some(m) if m.generation == current.generation() => return Ok(false),
            None => {
                return Err(RowdexError::InvalidSearchState(format!(
                    "index at {} no longer has a committed manifest",
                    self.store.base_dir().display()
                )))
            }
            Some(_) => {}
        }

        // Segments are immutable, so loaded readers carry over between generations
        let cached: HashMap<SegmentId, Arc<SegmentReader>> = current
            .segments()
            .iter()
            .map(|s| (s.id(), Arc::clone(s)))
            .collect();
        let snapshot = load_snapshot(&self.store, &self.config, &cached)?;
        debug!(
            from = current.generation(),
            to = snapshot.generation(),
            "Reloaded index snapshot"
        );
        self.current.store(Arc::new(snapshot));
        Ok(true)
    }
}

/// Load the committed manifest and its segments.
///
/// A commit that lands between reading the manifest and opening its segments
/// can delete them; the manifest is re-read a bounded number of times.
fn load_snapshot(
    store: &SegmentStore,
    config: &SearchConfig,
    cached: &HashMap<SegmentId, Arc<SegmentReader>>,
) -> Result<IndexSnapshot> {
    let mut attempt = 0;
    loop {
        let manifest = store.load_manifest()?.ok_or_else(|| {
            RowdexError::InvalidSearchState(format!(
                "no committed index at {}",
                store.base_dir().display()
            ))
        })?;

        match load_segments(store, &manifest, cached) {
            Ok(segments) => return Ok(IndexSnapshot::new(manifest, segments)),
            Err(e) if attempt < config.open_retries && is_not_found(&e) => {
                attempt += 1;
                warn!(
                    attempt,
                    generation = manifest.generation,
                    error = %e,
                    "Segment vanished while opening snapshot; re-reading manifest"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

fn load_segments(
    store: &SegmentStore,
    manifest: &IndexManifest,
    cached: &HashMap<SegmentId, Arc<SegmentReader>>,
) -> Result<Vec<Arc<SegmentReader>>> {
    manifest
        .iter()
        .map(|entry| match cached.get(&entry.meta.id) {
            Some(reader) => Ok(Arc::clone(reader)),
            None => store.read_segment(entry),
        })
        .collect()
}

fn is_not_found(err: &RowdexError) -> bool {
    matches!(err, RowdexError::StorageFailure { source, .. } if source.kind() == io::ErrorKind::NotFound)
}
