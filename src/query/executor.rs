//! Query executor for running queries against segment snapshots
//!
//! Each segment evaluates the query tree into a docno bitmap. Hits are then
//! collected across segments in the requested order and only the surviving
//! page is projected from the document store.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StorageContext};
use crate::models::{DocId, SearchHit, Sort, TopDocs};
use crate::query::ast::Query;
use crate::segment::{ColumnValue, DocNo, SegmentReader};

/// Execution statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub docs_matched: u64,
    pub segments_searched: usize,
    /// Posting lists decoded while evaluating leaves
    pub postings_read: u64,
    pub execution_time_us: u64,
}

/// Query execution result
#[derive(Debug)]
pub struct QueryResult {
    pub top_docs: TopDocs,
    pub stats: QueryStats,
}

/// Query executor for running queries
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a query over the segments of one snapshot.
    ///
    /// Segments must be in ascending document id order. The total counts
    /// every match; at most `limit` hits are returned.
    pub fn execute(
        query: &Query,
        segments: &[Arc<SegmentReader>],
        sort: &Sort,
        limit: usize,
    ) -> Result<QueryResult> {
        let start = Instant::now();
        let mut postings_read = 0u64;

        let mut matches = Vec::with_capacity(segments.len());
        for segment in segments {
            let docs = Self::evaluate(query, segment, &mut postings_read)?;
            matches.push(docs);
        }
        let total_hits: u64 = matches.iter().map(|m| m.len()).sum();

        let ranked = match sort {
            Sort::IndexOrder => Self::collect_index_order(segments, &matches, limit),
            Sort::Field(sf) => Self::collect_sorted(segments, &matches, &sf.field, sf.reverse, limit),
        };

        let mut hits = Vec::with_capacity(ranked.len());
        for (segment_idx, docno) in ranked {
            let segment = &segments[segment_idx];
            let fields = segment
                .stored(docno)
                .storage_context(|| format!("reading stored fields of {}", segment.id()))?;
            hits.push(SearchHit {
                doc_id: segment.doc_id(docno),
                fields,
            });
        }

        let stats = QueryStats {
            docs_matched: total_hits,
            segments_searched: segments.len(),
            postings_read,
            execution_time_us: start.elapsed().as_micros() as u64,
        };
        debug!(
            query_type = query.query_type(),
            total_hits,
            returned = hits.len(),
            postings_read,
            elapsed_us = stats.execution_time_us,
            "Query executed"
        );

        Ok(QueryResult {
            top_docs: TopDocs { total_hits, hits },
            stats,
        })
    }

    /// Count matches without collecting hits
    pub fn count(query: &Query, segments: &[Arc<SegmentReader>]) -> Result<u64> {
        let mut postings_read = 0u64;
        let mut total = 0u64;
        for segment in segments {
            total += Self::evaluate(query, segment, &mut postings_read)?.len();
        }
        Ok(total)
    }

    /// Evaluate the query tree against one segment
    pub fn evaluate(
        query: &Query,
        segment: &SegmentReader,
        postings_read: &mut u64,
    ) -> Result<RoaringBitmap> {
        match query {
            Query::Term { field, value } => {
                *postings_read += 1;
                segment
                    .term_docs(field, value)
                    .storage_context(|| format!("reading postings of {}", segment.id()))
            }
            Query::Wildcard { field, prefix } => {
                *postings_read += 1;
                segment
                    .prefix_docs(field, prefix)
                    .storage_context(|| format!("reading postings of {}", segment.id()))
            }
            Query::Or(children) => {
                let mut docs = RoaringBitmap::new();
                for child in children {
                    docs |= Self::evaluate(child, segment, postings_read)?;
                }
                Ok(docs)
            }
            Query::And(children) => {
                if children.is_empty() {
                    return Ok(RoaringBitmap::new());
                }
                // Cheapest clause first so an empty intersection stops early
                let mut ordered: Vec<&Query> = children.iter().collect();
                ordered.sort_by_key(|child| Self::estimate_cost(child, segment));

                let mut iter = ordered.into_iter();
                let mut docs = match iter.next() {
                    Some(first) => Self::evaluate(first, segment, postings_read)?,
                    None => return Ok(RoaringBitmap::new()),
                };
                for child in iter {
                    if docs.is_empty() {
                        break;
                    }
                    docs &= Self::evaluate(child, segment, postings_read)?;
                }
                Ok(docs)
            }
        }
    }

    /// Upper bound on the number of matches of a clause in a segment
    fn estimate_cost(query: &Query, segment: &SegmentReader) -> u64 {
        match query {
            Query::Term { field, value } => segment.doc_frequency(field, value) as u64,
            Query::Wildcard { .. } => segment.doc_count() as u64,
            Query::Or(children) => children
                .iter()
                .map(|c| Self::estimate_cost(c, segment))
                .sum::<u64>()
                .min(segment.doc_count() as u64),
            Query::And(children) => children
                .iter()
                .map(|c| Self::estimate_cost(c, segment))
                .min()
                .unwrap_or(0),
        }
    }

    /// First `limit` matches by ascending document id
    fn collect_index_order(
        segments: &[Arc<SegmentReader>],
        matches: &[RoaringBitmap],
        limit: usize,
    ) -> Vec<(usize, DocNo)> {
        // Segments cover ascending disjoint id ranges and docnos ascend with ids
        debug_assert_eq!(segments.len(), matches.len());
        matches
            .iter()
            .enumerate()
            .flat_map(|(idx, docs)| docs.iter().map(move |docno| (idx, DocNo(docno))))
            .take(limit)
            .collect()
    }

    /// Top `limit` matches ordered by the column value of `field`
    fn collect_sorted(
        segments: &[Arc<SegmentReader>],
        matches: &[RoaringBitmap],
        field: &str,
        reverse: bool,
        limit: usize,
    ) -> Vec<(usize, DocNo)> {
        if limit == 0 {
            return Vec::new();
        }

        // Max-heap on the sort order: the root is the worst hit kept so far
        let mut heap: BinaryHeap<SortEntry<'_>> = BinaryHeap::with_capacity(limit + 1);

        for (segment_idx, (segment, docs)) in segments.iter().zip(matches).enumerate() {
            let docvalues = segment.docvalues();
            for docno in docs.iter() {
                let docno = DocNo(docno);
                let entry = SortEntry {
                    value: docvalues.value(field, docno),
                    doc_id: segment.doc_id(docno),
                    reverse,
                    segment: segment_idx,
                    docno,
                };

                if heap.len() < limit {
                    heap.push(entry);
                } else if let Some(worst) = heap.peek() {
                    if entry < *worst {
                        heap.pop();
                        heap.push(entry);
                    }
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|e| (e.segment, e.docno))
            .collect()
    }
}

/// A candidate hit ordered by sort value, then ascending document id.
///
/// Missing values sort before present ones; `reverse` flips the value order
/// but never the id tie-break.
#[derive(Debug)]
struct SortEntry<'a> {
    value: Option<ColumnValue<'a>>,
    doc_id: DocId,
    reverse: bool,
    segment: usize,
    docno: DocNo,
}

impl PartialEq for SortEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortEntry<'_> {}

impl PartialOrd for SortEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = if self.reverse {
            other.value.cmp(&self.value)
        } else {
            self.value.cmp(&other.value)
        };
        by_value.then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Field, FieldOptions, FieldValue};
    use crate::segment::{MutableBuffer, SegmentId, SegmentWriter};

    fn segment(id: u64, base: u64, rows: &[(i64, &str)]) -> Arc<SegmentReader> {
        let mut buffer = MutableBuffer::new(DocId(base));
        for (key, name) in rows {
            buffer.index_document(
                &Document::new()
                    .with(Field::integer("id", *key))
                    .with(Field::keyword("name", *name)),
            );
        }
        let result = SegmentWriter::new(SegmentId(id))
            .write_from_buffer(&buffer)
            .unwrap();
        Arc::new(SegmentReader::from_write_result(&result).unwrap())
    }

    fn students() -> Vec<Arc<SegmentReader>> {
        vec![
            segment(0, 0, &[(1, "alice"), (2, "salman")]),
            segment(1, 2, &[(3, "bob"), (4, "salman"), (5, "sally")]),
        ]
    }

    fn names(top: &TopDocs) -> Vec<String> {
        top.hits
            .iter()
            .map(|h| h.fields.get("name").map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    fn run(query: &Query, sort: &Sort, limit: usize) -> TopDocs {
        QueryExecutor::execute(query, &students(), sort, limit)
            .unwrap()
            .top_docs
    }

    #[test]
    fn test_term_across_segments() {
        let top = run(&Query::term("name", "salman"), &Sort::IndexOrder, 10);
        assert_eq!(top.total_hits, 2);
        assert_eq!(top.doc_ids(), vec![DocId(1), DocId(3)]);
        assert_eq!(top.hits[1].fields.get("id"), Some(&FieldValue::Integer(4)));
    }

    #[test]
    fn test_integer_term_matches_decimal_text() {
        let top = run(&Query::term("id", "3"), &Sort::IndexOrder, 10);
        assert_eq!(names(&top), vec!["bob"]);
        assert_eq!(run(&Query::term("id", "03"), &Sort::IndexOrder, 10).total_hits, 0);
    }

    #[test]
    fn test_boolean_composition() {
        let or = Query::or(vec![Query::term("name", "bob"), Query::term("id", "1")]);
        assert_eq!(run(&or, &Sort::IndexOrder, 10).doc_ids(), vec![DocId(0), DocId(2)]);

        let and = Query::and(vec![Query::term("name", "salman"), Query::term("id", "4")]);
        assert_eq!(run(&and, &Sort::IndexOrder, 10).doc_ids(), vec![DocId(3)]);

        let disjoint = Query::and(vec![Query::term("name", "bob"), Query::term("id", "1")]);
        assert_eq!(run(&disjoint, &Sort::IndexOrder, 10).total_hits, 0);

        assert_eq!(run(&Query::And(vec![]), &Sort::IndexOrder, 10).total_hits, 0);
        assert_eq!(run(&Query::Or(vec![]), &Sort::IndexOrder, 10).total_hits, 0);
    }

    #[test]
    fn test_wildcard() {
        let top = run(&Query::wildcard("name", "sal"), &Sort::by("name"), 10);
        assert_eq!(names(&top), vec!["sally", "salman", "salman"]);

        let all = run(&Query::wildcard("name", ""), &Sort::IndexOrder, 10);
        assert_eq!(all.total_hits, 5);
    }

    #[test]
    fn test_limit_keeps_total() {
        let top = run(&Query::wildcard("name", ""), &Sort::IndexOrder, 2);
        assert_eq!(top.total_hits, 5);
        assert_eq!(top.doc_ids(), vec![DocId(0), DocId(1)]);

        let none = run(&Query::wildcard("name", ""), &Sort::by("id"), 0);
        assert_eq!(none.total_hits, 5);
        assert!(none.is_empty());
    }

    #[test]
    fn test_sort_by_keyword_breaks_ties_by_id() {
        let top = run(&Query::wildcard("name", ""), &Sort::by("name"), 10);
        assert_eq!(names(&top), vec!["alice", "bob", "sally", "salman", "salman"]);
        assert_eq!(top.hits[3].doc_id, DocId(1));
        assert_eq!(top.hits[4].doc_id, DocId(3));
    }

    #[test]
    fn test_sort_reverse_keeps_id_tie_break() {
        let top = run(&Query::wildcard("name", ""), &Sort::by("name").reverse(), 3);
        assert_eq!(names(&top), vec!["salman", "salman", "sally"]);
        assert_eq!(top.hits[0].doc_id, DocId(1));
        assert_eq!(top.hits[1].doc_id, DocId(3));
    }

    #[test]
    fn test_sort_integer_numerically() {
        let segments = vec![segment(0, 0, &[(10, "a"), (9, "b"), (100, "c"), (-1, "d")])];
        let top = QueryExecutor::execute(&Query::wildcard("name", ""), &segments, &Sort::by("id"), 10)
            .unwrap()
            .top_docs;
        assert_eq!(names(&top), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_missing_sort_values_first() {
        let mut buffer = MutableBuffer::new(DocId(0));
        buffer.index_document(
            &Document::new()
                .with(Field::keyword("name", "x"))
                .with(Field::integer("rank", 2)),
        );
        buffer.index_document(&Document::new().with(Field::keyword("name", "y")));
        buffer.index_document(
            &Document::new()
                .with(Field::keyword("name", "z"))
                .with(Field::integer("rank", 1).with_options(FieldOptions::INDEXED)),
        );
        let result = SegmentWriter::new(SegmentId(0)).write_from_buffer(&buffer).unwrap();
        let segments = vec![Arc::new(SegmentReader::from_write_result(&result).unwrap())];

        let top = QueryExecutor::execute(&Query::wildcard("name", ""), &segments, &Sort::by("rank"), 10)
            .unwrap()
            .top_docs;
        assert_eq!(names(&top), vec!["y", "z", "x"]);
        // unstored field still sorts, but is not projected
        assert!(top.hits[1].fields.get("rank").is_none());
    }

    #[test]
    fn test_count_and_stats() {
        let segments = students();
        let query = Query::term("name", "salman");
        assert_eq!(QueryExecutor::count(&query, &segments).unwrap(), 2);

        let result = QueryExecutor::execute(&query, &segments, &Sort::IndexOrder, 1).unwrap();
        assert_eq!(result.stats.docs_matched, 2);
        assert_eq!(result.stats.segments_searched, 2);
        assert_eq!(result.stats.postings_read, 2);
    }
}
