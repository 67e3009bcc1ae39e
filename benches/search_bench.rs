use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use rowdex::models::{Document, Field, Sort};
use rowdex::{IndexConfig, IndexSearcher, IndexWriter, OpenMode, QueryParser};

const FIELDS: [&str; 4] = ["id", "name", "address", "details"];

struct BenchEnv {
    _tmp: TempDir,
    searcher: IndexSearcher,
}

fn make_row(i: i64) -> Document {
    Document::new()
        .with(Field::integer("id", i))
        .with(Field::keyword("name", format!("student{:05}", (i * 7919) % 100_000)))
        .with(Field::keyword("address", format!("city{}", i % 50)))
        .with(Field::keyword("details", if i % 3 == 0 { "hostel" } else { "day" }))
}

fn build_env(doc_count: usize) -> BenchEnv {
    let tmp = TempDir::new().unwrap();
    let config = IndexConfig::new(tmp.path())
        .with_open_mode(OpenMode::Create)
        .with_max_buffered_docs(4_096)
        .with_sync_on_commit(false);

    let mut writer = IndexWriter::open(config).unwrap();
    for i in 0..doc_count as i64 {
        writer.add_document(&make_row(i)).unwrap();
    }
    writer.commit().unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(tmp.path()).unwrap();
    BenchEnv { _tmp: tmp, searcher }
}

fn bench_term_search(c: &mut Criterion) {
    let counts = [1_000usize, 10_000, 50_000];
    let envs: Vec<(usize, BenchEnv)> = counts.iter().map(|&n| (n, build_env(n))).collect();
    let query = QueryParser::new(FIELDS).parse("city7 AND hostel").unwrap();

    let mut group = c.benchmark_group("term_search");
    for (count, env) in envs.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), env, |b, env| {
            b.iter(|| {
                black_box(env.searcher.search(&query, &Sort::by("name"), 100).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_wildcard_search(c: &mut Criterion) {
    let counts = [1_000usize, 10_000, 50_000];
    let envs: Vec<(usize, BenchEnv)> = counts.iter().map(|&n| (n, build_env(n))).collect();
    let query = QueryParser::new(FIELDS).parse("name:student1*").unwrap();

    let mut group = c.benchmark_group("wildcard_search");
    for (count, env) in envs.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), env, |b, env| {
            b.iter(|| {
                black_box(env.searcher.search(&query, &Sort::by("id").reverse(), 10).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");
    group.sample_size(10);
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(build_env(count)));
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let parser = QueryParser::new(FIELDS);
    c.bench_function("parse_query", |b| {
        b.iter(|| {
            black_box(
                parser
                    .parse(black_box("name:(alice OR sal*) AND address:\"12 Main St\" OR 42"))
                    .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_term_search,
    bench_wildcard_search,
    bench_indexing,
    bench_parse
);
criterion_main!(benches);
