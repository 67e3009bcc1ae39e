//! Query evaluation against one fixed snapshot

use std::path::Path;
use std::sync::Arc;

use super::reader::{IndexReader, IndexSnapshot};
use crate::error::{Result, RowdexError, StorageContext};
use crate::models::{DocId, Sort, StoredDocument, TopDocs};
use crate::query::{Query, QueryExecutor, QueryResult};

/// Searcher bound to the snapshot it was opened on.
///
/// Later commits are invisible to it. Cheap to clone; clones share the
/// snapshot but are closed independently.
#[derive(Clone, Debug)]
pub struct IndexSearcher {
    snapshot: Option<Arc<IndexSnapshot>>,
}

impl IndexSearcher {
    /// Open the latest committed snapshot at `index_dir`
    pub fn open<P: AsRef<Path>>(index_dir: P) -> Result<Self> {
        Ok(IndexReader::open(index_dir)?.searcher())
    }

    pub fn new(snapshot: Arc<IndexSnapshot>) -> Self {
        Self {
            snapshot: Some(snapshot),
        }
    }

    /// Matching documents in `sort` order, at most `limit` of them, with the
    /// total number of matches.
    pub fn search(&self, query: &Query, sort: &Sort, limit: usize) -> Result<TopDocs> {
        Ok(self.search_with_stats(query, sort, limit)?.top_docs)
    }

    pub fn search_with_stats(&self, query: &Query, sort: &Sort, limit: usize) -> Result<QueryResult> {
        let snapshot = self.snapshot()?;
        if let Sort::Field(sort_field) = sort {
            if !snapshot.schema().contains(&sort_field.field) {
                return Err(RowdexError::InvalidSearchState(format!(
                    "cannot sort on field '{}': not in the index schema",
                    sort_field.field
                )));
            }
        }
        QueryExecutor::execute(query, snapshot.segments(), sort, limit)
    }

    /// Number of matching documents
    pub fn count(&self, query: &Query) -> Result<u64> {
        QueryExecutor::count(query, self.snapshot()?.segments())
    }

    /// Stored fields of one document, `None` if the snapshot lacks it
    pub fn doc(&self, doc_id: DocId) -> Result<Option<StoredDocument>> {
        let snapshot = self.snapshot()?;
        let segment = match snapshot.segment_for(doc_id) {
            Some(segment) => segment,
            None => return Ok(None),
        };
        let docno = match segment.docno_of(doc_id) {
            Some(docno) => docno,
            None => return Ok(None),
        };
        segment
            .stored(docno)
            .map(Some)
            .storage_context(|| format!("reading document {} from {}", doc_id, segment.id()))
    }

    /// Documents visible to this searcher
    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.snapshot()?.num_docs())
    }

    pub fn snapshot(&self) -> Result<&Arc<IndexSnapshot>> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| RowdexError::InvalidSearchState("searcher is closed".to_string()))
    }

    /// Release the snapshot. Every later call fails with `InvalidSearchState`.
    pub fn close(&mut self) {
        self.snapshot = None;
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.is_none()
    }
}
