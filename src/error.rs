use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rowdex operations
#[derive(Error, Debug)]
pub enum RowdexError {
    #[error("Storage failure while {context}: {source}")]
    StorageFailure {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Malformed query {input:?}: {reason}")]
    MalformedQuery { input: String, reason: String },

    #[error("Invalid search state: {0}")]
    InvalidSearchState(String),

    #[error("Index at {} is locked by another writer", .path.display())]
    LockContention { path: PathBuf },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Record cursor failed after {records_read} records: {source}")]
    CursorFailure {
        records_read: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for rowdex operations
pub type Result<T> = std::result::Result<T, RowdexError>;

/// Coarse classification of [`RowdexError`] for callers that only need to
/// decide how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    StorageFailure,
    MalformedQuery,
    InvalidSearchState,
    LockContention,
    InvalidInput,
    SourceFailure,
}

impl RowdexError {
    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        RowdexError::StorageFailure {
            context: context.into(),
            source,
        }
    }

    /// Storage failure for data that was read successfully but does not decode.
    pub fn corrupt(context: impl Into<String>, detail: impl Into<String>) -> Self {
        RowdexError::StorageFailure {
            context: context.into(),
            source: io::Error::new(io::ErrorKind::InvalidData, detail.into()),
        }
    }

    pub fn malformed_query(input: &str, reason: impl Into<String>) -> Self {
        RowdexError::MalformedQuery {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RowdexError::StorageFailure { .. } | RowdexError::Serialization(_) => {
                ErrorKind::StorageFailure
            }
            RowdexError::MalformedQuery { .. } => ErrorKind::MalformedQuery,
            RowdexError::InvalidSearchState(_) => ErrorKind::InvalidSearchState,
            RowdexError::LockContention { .. } => ErrorKind::LockContention,
            RowdexError::InvalidDocument(_) => ErrorKind::InvalidInput,
            RowdexError::CursorFailure { .. } => ErrorKind::SourceFailure,
        }
    }

    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(self, RowdexError::LockContention { .. })
    }
}

/// Attach an operation description to raw I/O results.
pub(crate) trait StorageContext<T> {
    fn storage_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> StorageContext<T> for std::result::Result<T, io::Error> {
    fn storage_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| RowdexError::storage(context(), source))
    }
}
