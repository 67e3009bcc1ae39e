use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How an [`IndexWriter`](crate::index::IndexWriter) treats existing content
/// at the target location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Start from an empty index; previously committed documents are dropped
    /// when the session commits.
    Create,
    /// Add to an existing committed index. Fails if there is none.
    Append,
    /// Append when a committed index exists, otherwise create one.
    #[default]
    CreateOrAppend,
}

impl std::str::FromStr for OpenMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(OpenMode::Create),
            "append" => Ok(OpenMode::Append),
            "create-or-append" | "create_or_append" => Ok(OpenMode::CreateOrAppend),
            other => Err(format!("unknown open mode '{}'", other)),
        }
    }
}

/// Writer-side configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the manifest, the write lock and segment directories
    pub index_dir: PathBuf,
    pub open_mode: OpenMode,
    /// Spill buffered documents to an uncommitted segment once this many are held
    pub max_buffered_docs: usize,
    /// fsync segment files and the manifest on commit
    pub sync_on_commit: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./index"),
            open_mode: OpenMode::default(),
            max_buffered_docs: 50_000,
            sync_on_commit: true,
        }
    }
}

impl IndexConfig {
    /// Create a configuration for the given index directory
    pub fn new(index_dir: impl AsRef<Path>) -> Self {
        Self {
            index_dir: index_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }

    /// Clamped to `1..=u32::MAX`, the most documents one segment holds
    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs.clamp(1, u32::MAX as usize);
        self
    }

    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }
}

/// Default boolean operator between adjacent query clauses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperator {
    #[default]
    Or,
    And,
}

impl std::str::FromStr for DefaultOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Ok(DefaultOperator::Or),
            "and" => Ok(DefaultOperator::And),
            other => Err(format!("unknown default operator '{}'", other)),
        }
    }
}

/// Query parser configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    pub default_operator: DefaultOperator,
}

/// Search-side configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller does not pass one
    pub default_limit: usize,
    /// How many times a reader re-reads the manifest when a concurrent commit
    /// removes segment files underneath it
    pub open_retries: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            open_retries: 3,
        }
    }
}
