use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rowdex::ingest::build_index;
use rowdex::{
    ColumnMapping, DefaultOperator, FieldType, IndexConfig, IndexReader, IndexSearcher,
    JsonLinesCursor, OpenMode, ParserConfig, QueryParser, SearchConfig, Sort, TopDocs,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "rowdex")]
#[command(about = "Keyword index and multi-field search for tabular records", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, env = "ROWDEX_INDEX_DIR", default_value = "./index", global = true)]
    index_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index from a JSON-lines row dump
    Index(IndexArgs),
    /// Run a keyword query against a committed index
    Search(SearchArgs),
    /// Show the committed manifest, schema and segments
    Inspect(InspectArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// JSON-lines file, one object per row; `-` reads stdin
    input: PathBuf,

    /// create, append or create-or-append
    #[arg(long, env = "ROWDEX_OPEN_MODE", default_value = "create")]
    open_mode: OpenMode,

    /// Comma-separated column specs: name[:integer|keyword[:stored|indexed]]
    #[arg(
        long,
        env = "ROWDEX_COLUMNS",
        default_value = "id:integer,name,address,details"
    )]
    columns: ColumnMapping,

    /// Spill to a segment after this many buffered rows
    #[arg(long, env = "ROWDEX_MAX_BUFFERED_DOCS", default_value_t = 50_000)]
    max_buffered_docs: usize,

    /// Skip fsync on commit
    #[arg(long)]
    no_sync: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text, e.g. `salman`, `name:bob OR 2`, `sal*`
    query: String,

    /// Fields searched by unscoped terms
    #[arg(
        long,
        env = "ROWDEX_SEARCH_FIELDS",
        value_delimiter = ',',
        default_value = "id,name,address,details"
    )]
    fields: Vec<String>,

    /// Sort field; results are in index order when omitted
    #[arg(long, env = "ROWDEX_SORT_FIELD", default_value = "name")]
    sort: Option<String>,

    /// Sort descending
    #[arg(long)]
    reverse: bool,

    /// Maximum number of records to print
    #[arg(long, env = "ROWDEX_LIMIT")]
    limit: Option<usize>,

    /// Operator between adjacent terms (or, and)
    #[arg(long, env = "ROWDEX_DEFAULT_OPERATOR", default_value = "or")]
    default_operator: DefaultOperator,

    /// Print hits as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Dump the raw manifest as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Index(args) => run_index(cli.index_dir, args),
        Command::Search(args) => run_search(cli.index_dir, args),
        Command::Inspect(args) => run_inspect(cli.index_dir, args),
    }
}

fn run_index(index_dir: PathBuf, args: IndexArgs) -> Result<()> {
    println!("-- Indexing --");

    let config = IndexConfig::new(&index_dir)
        .with_open_mode(args.open_mode)
        .with_max_buffered_docs(args.max_buffered_docs)
        .with_sync_on_commit(!args.no_sync);

    let stats = if args.input.as_os_str() == "-" {
        let cursor = JsonLinesCursor::new(io::stdin().lock());
        build_index(config, &args.columns, cursor)?
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?;
        build_index(config, &args.columns, JsonLinesCursor::new(BufReader::new(file)))?
    };

    println!("{} record indexed", stats.records_read);
    info!(
        dir = %index_dir.display(),
        generation = stats.commit.generation,
        total_docs = stats.commit.total_docs,
        "Index committed"
    );
    Ok(())
}

fn run_search(index_dir: PathBuf, args: SearchArgs) -> Result<()> {
    println!("-- Searching --");

    let parser = QueryParser::new(args.fields.iter().map(|f| f.trim().to_string()))
        .with_config(&ParserConfig {
            default_operator: args.default_operator,
        });
    let query = parser.parse(&args.query)?;
    println!("query >> {}", query);

    let sort = match args.sort.as_deref().map(str::trim) {
        Some(field) if !field.is_empty() => {
            let sort = Sort::by(field);
            if args.reverse {
                sort.reverse()
            } else {
                sort
            }
        }
        _ => Sort::IndexOrder,
    };
    let limit = args.limit.unwrap_or(SearchConfig::default().default_limit);

    let searcher = IndexSearcher::open(&index_dir)
        .with_context(|| format!("opening index at {}", index_dir.display()))?;
    let top = searcher.search(&query, &sort, limit)?;

    println!("Results found >> {}", top.total_hits);
    if args.json {
        print_json(&top)?;
    } else {
        print_records(&top);
    }
    Ok(())
}

fn run_inspect(index_dir: PathBuf, args: InspectArgs) -> Result<()> {
    let reader = IndexReader::open(&index_dir)
        .with_context(|| format!("opening index at {}", index_dir.display()))?;
    let snapshot = reader.snapshot();
    let manifest = snapshot.manifest();

    if args.json {
        let json = manifest.to_json().context("encoding manifest")?;
        println!("{}", String::from_utf8_lossy(&json));
        return Ok(());
    }

    println!("generation    : {}", manifest.generation);
    println!("documents     : {}", manifest.total_doc_count());
    println!("next doc id   : {}", manifest.next_doc_id);
    println!("size on disk  : {} bytes", manifest.total_size_bytes());

    println!("fields:");
    for name in snapshot.schema().field_names() {
        if let Some(entry) = snapshot.schema().get(name) {
            println!(
                "  {} ({}{}{})",
                name,
                entry.field_type,
                if entry.stored { ", stored" } else { "" },
                if entry.indexed { ", indexed" } else { "" }
            );
        }
    }

    println!("segments:");
    for segment in snapshot.segments() {
        let meta = segment.meta();
        println!(
            "  {}: ids {}..{}, {} docs, {} terms, {} bytes",
            meta.id,
            meta.base_doc_id,
            meta.end_doc_id(),
            meta.doc_count,
            meta.term_count,
            meta.size_bytes
        );
        for name in snapshot.schema().field_names() {
            let is_keyword = snapshot.schema().field_type(name) == Some(FieldType::Keyword);
            if let Some(column) = segment.docvalues().get_keyword(name).filter(|_| is_keyword) {
                println!("    {}: {} distinct values", name, column.unique_keywords().len());
            }
        }
    }
    Ok(())
}

fn print_records(top: &TopDocs) {
    for (i, hit) in top.hits.iter().enumerate() {
        println!("=========={} : Start Record=========", i + 1);
        for (name, value) in hit.fields.iter() {
            println!("{} :: {}", name, value);
        }
        println!("==========End Record=========\n");
    }
}

fn print_json(top: &TopDocs) -> Result<()> {
    for hit in &top.hits {
        let mut object = serde_json::Map::new();
        object.insert("_id".to_string(), hit.doc_id.as_u64().into());
        for (name, value) in hit.fields.iter() {
            let json = match value {
                rowdex::FieldValue::Integer(v) => serde_json::Value::from(*v),
                rowdex::FieldValue::Keyword(s) => serde_json::Value::from(s.as_str()),
            };
            object.insert(name.to_string(), json);
        }
        println!("{}", serde_json::to_string(&object)?);
    }
    Ok(())
}
