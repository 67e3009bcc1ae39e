use std::io::Cursor;

use tempfile::TempDir;

use rowdex::ingest::{build_index, ColumnMapping, JsonLinesCursor};
use rowdex::models::{FieldValue, Sort, TopDocs};
use rowdex::{DefaultOperator, IndexConfig, IndexSearcher, ParserConfig, QueryParser};

const ROWS: &str = r#"{"id": 1, "name": "alice", "address": "12 Main St", "details": "first year"}
{"id": 2, "name": "salman", "address": "Pune", "details": "hostel"}
{"id": 3, "name": "bob", "address": null, "details": "hostel"}
{"id": "4", "name": "sally", "address": "Pune"}
"#;

fn build() -> (TempDir, ColumnMapping) {
    let tmp = TempDir::new().unwrap();
    let mapping: ColumnMapping = "id:integer,name,address,details".parse().unwrap();
    let stats = build_index(
        IndexConfig::new(tmp.path()).with_sync_on_commit(false),
        &mapping,
        JsonLinesCursor::new(Cursor::new(ROWS)),
    )
    .unwrap();
    assert_eq!(stats.records_read, 4);
    (tmp, mapping)
}

fn run(tmp: &TempDir, parser: &QueryParser, text: &str) -> TopDocs {
    let query = parser.parse(text).unwrap();
    IndexSearcher::open(tmp.path())
        .unwrap()
        .search(&query, &Sort::by("name"), 100)
        .unwrap()
}

fn ids(top: &TopDocs) -> Vec<i64> {
    top.hits
        .iter()
        .map(|h| h.fields.get("id").and_then(FieldValue::as_i64).unwrap())
        .collect()
}

#[test]
fn test_queries_over_ingested_rows() {
    let (tmp, mapping) = build();
    let parser = QueryParser::new(mapping.indexed_columns());

    assert_eq!(ids(&run(&tmp, &parser, "salman")), vec![2]);
    assert_eq!(ids(&run(&tmp, &parser, "hostel")), vec![3, 2]);
    assert_eq!(ids(&run(&tmp, &parser, "address:\"12 Main St\"")), vec![1]);
    assert_eq!(ids(&run(&tmp, &parser, "Pune AND hostel")), vec![2]);
    assert_eq!(ids(&run(&tmp, &parser, "name:sal*")), vec![4, 2]);
    // coerced from the string "4"
    assert_eq!(ids(&run(&tmp, &parser, "id:4")), vec![4]);
    // values are exact terms, not tokenized
    assert!(run(&tmp, &parser, "Main").is_empty());
    assert!(run(&tmp, &parser, "pune").is_empty());
}

#[test]
fn test_missing_columns_are_skipped() {
    let (tmp, mapping) = build();
    let parser = QueryParser::new(mapping.indexed_columns());

    let top = run(&tmp, &parser, "bob");
    assert_eq!(top.total_hits, 1);
    let fields = &top.hits[0].fields;
    assert!(fields.get("address").is_none());
    assert_eq!(fields.get("details"), Some(&FieldValue::from("hostel")));
}

#[test]
fn test_default_and_operator() {
    let (tmp, mapping) = build();
    let parser = QueryParser::new(mapping.indexed_columns()).with_config(&ParserConfig {
        default_operator: DefaultOperator::And,
    });

    assert_eq!(ids(&run(&tmp, &parser, "Pune hostel")), vec![2]);
    assert_eq!(ids(&run(&tmp, &parser, "Pune hostel OR alice")), vec![1, 2]);
}

#[test]
fn test_rendered_query_finds_the_same_documents() {
    let (tmp, mapping) = build();
    let parser = QueryParser::new(mapping.indexed_columns());

    for text in ["salman", "name:(bob OR sal*) AND hostel", "address:\"12 Main St\" OR 3"] {
        let query = parser.parse(text).unwrap();
        let rendered = parser.parse(&query.to_string()).unwrap();
        assert_eq!(query, rendered);
        assert_eq!(ids(&run(&tmp, &parser, text)), ids(&run(&tmp, &parser, &query.to_string())));
    }
}
