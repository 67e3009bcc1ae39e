use std::fs;
use std::io;

use tempfile::TempDir;

use rowdex::error::ErrorKind;
use rowdex::ingest::{build_index, ColumnMapping, CursorError, Record, RecordCursor, RecordValue};
use rowdex::models::{Document, Field, Sort};
use rowdex::segment::{SegmentId, SegmentStore, POSTINGS_FILE};
use rowdex::{IndexConfig, IndexSearcher, IndexWriter, OpenMode, Query, RowdexError};

fn config(tmp: &TempDir) -> IndexConfig {
    IndexConfig::new(tmp.path()).with_sync_on_commit(false)
}

fn named(name: &str) -> Document {
    Document::new().with(Field::keyword("name", name))
}

fn commit_names(tmp: &TempDir, mode: OpenMode, names: &[&str]) {
    let mut writer = IndexWriter::open(config(tmp).with_open_mode(mode)).unwrap();
    for name in names {
        writer.add_document(&named(name)).unwrap();
    }
    writer.commit().unwrap();
    writer.close().unwrap();
}

fn count_all(tmp: &TempDir) -> u64 {
    IndexSearcher::open(tmp.path())
        .unwrap()
        .count(&Query::wildcard("name", ""))
        .unwrap()
}

#[test]
fn test_uncommitted_documents_are_invisible() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["alice"]);

    let mut writer = IndexWriter::open(config(&tmp).with_max_buffered_docs(1)).unwrap();
    writer.add_document(&named("bob")).unwrap();
    writer.add_document(&named("carol")).unwrap();
    assert_eq!(count_all(&tmp), 1);

    // dropping without commit keeps the previous state
    drop(writer);
    assert_eq!(count_all(&tmp), 1);

    commit_names(&tmp, OpenMode::Append, &["dave"]);
    let searcher = IndexSearcher::open(tmp.path()).unwrap();
    let top = searcher
        .search(&Query::wildcard("name", ""), &Sort::by("name"), 10)
        .unwrap();
    let names: Vec<String> = top
        .hits
        .iter()
        .map(|h| h.fields.get("name").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["alice", "dave"]);
}

#[test]
fn test_identifiers_never_reused() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["a", "b"]);

    // rolled back and abandoned sessions still consume their identifiers
    let mut writer = IndexWriter::open(config(&tmp)).unwrap();
    let lost = writer.add_document(&named("lost")).unwrap();
    writer.rollback().unwrap();
    let kept = writer.add_document(&named("kept")).unwrap();
    assert!(kept > lost);
    let dropped = writer.add_document(&named("dropped")).unwrap();
    drop(writer);

    let mut writer = IndexWriter::open(config(&tmp).with_open_mode(OpenMode::Create)).unwrap();
    let id = writer.add_document(&named("c")).unwrap();
    assert!(id > dropped);
    assert_eq!(id.as_u64(), 5);
    writer.commit().unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(tmp.path()).unwrap();
    assert_eq!(searcher.num_docs().unwrap(), 1);
    for gone in [0, 2, 3, 4] {
        assert!(searcher.doc(rowdex::DocId(gone)).unwrap().is_none());
    }
    let doc = searcher.doc(id).unwrap().unwrap();
    assert_eq!(doc.get("name").unwrap().to_string(), "c");
}

#[test]
fn test_create_replaces_only_at_commit() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["alice", "bob"]);

    let mut writer = IndexWriter::open(config(&tmp).with_open_mode(OpenMode::Create)).unwrap();
    writer.add_document(&named("zed")).unwrap();
    assert_eq!(count_all(&tmp), 2);

    writer.commit().unwrap();
    assert_eq!(count_all(&tmp), 1);
    writer.close().unwrap();
}

#[test]
fn test_append_to_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let err = IndexWriter::open(config(&tmp).with_open_mode(OpenMode::Append))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    match err {
        RowdexError::StorageFailure { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_searcher_on_uncommitted_location() {
    let tmp = TempDir::new().unwrap();
    let err = IndexSearcher::open(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSearchState);
}

#[test]
fn test_lock_contention() {
    let tmp = TempDir::new().unwrap();
    let writer = IndexWriter::open(config(&tmp)).unwrap();

    let err = IndexWriter::open(config(&tmp)).err().unwrap();
    assert!(err.is_retriable());
    assert_eq!(err.kind(), ErrorKind::LockContention);

    writer.close().unwrap();
    let writer = IndexWriter::open(config(&tmp)).unwrap();
    drop(writer);
    IndexWriter::open(config(&tmp)).unwrap();
}

#[test]
fn test_corrupted_segment_detected() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["alice", "bob"]);

    let store = SegmentStore::new(tmp.path());
    let path = store.segment_dir(SegmentId(0)).join(POSTINGS_FILE);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let err = IndexSearcher::open(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
    assert!(err.to_string().contains("checksum mismatch"));
}

#[test]
fn test_missing_segment_reported() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["alice"]);
    fs::remove_dir_all(SegmentStore::new(tmp.path()).segment_dir(SegmentId(0))).unwrap();

    let err = IndexSearcher::open(tmp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
}

struct BrokenCursor {
    rows: Vec<&'static str>,
}

impl RecordCursor for BrokenCursor {
    fn next_record(&mut self) -> Result<Option<Record>, CursorError> {
        match self.rows.pop() {
            Some(name) => {
                let mut record = Record::new();
                record.insert("name".to_string(), RecordValue::from(name));
                Ok(Some(record))
            }
            None => Err(Box::new(io::Error::new(io::ErrorKind::ConnectionReset, "source went away"))),
        }
    }
}

#[test]
fn test_cursor_failure_keeps_previous_commit() {
    let tmp = TempDir::new().unwrap();
    commit_names(&tmp, OpenMode::Create, &["alice"]);

    let err = build_index(
        config(&tmp).with_open_mode(OpenMode::Create),
        &ColumnMapping::new().keyword("name"),
        BrokenCursor {
            rows: vec!["x", "y"],
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceFailure);

    assert_eq!(count_all(&tmp), 1);
    // lock was released on the failure path
    IndexWriter::open(config(&tmp)).unwrap();
}
