//! Drive a record cursor into an index

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cursor::RecordCursor;
use super::mapping::ColumnMapping;
use crate::config::IndexConfig;
use crate::error::{Result, RowdexError};
use crate::index::{CommitStats, IndexWriter};

/// Outcome of a completed build
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub records_read: u64,
    pub commit: CommitStats,
}

/// Add every record of `cursor` to `writer` without committing.
///
/// Returns the number of records added. A cursor failure stops ingestion
/// with `CursorFailure`; documents already added stay uncommitted.
pub fn ingest<C: RecordCursor>(
    writer: &mut IndexWriter,
    mapping: &ColumnMapping,
    mut cursor: C,
) -> Result<u64> {
    let mut records_read = 0u64;
    loop {
        let record = match cursor.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(records_read),
            Err(source) => {
                return Err(RowdexError::CursorFailure {
                    records_read,
                    source,
                })
            }
        };
        writer.add_document(&mapping.to_document(&record))?;
        records_read += 1;
    }
}

/// Open a writer, ingest the whole cursor, commit and close.
///
/// Nothing is committed if the cursor or the writer fails; the previously
/// committed index stays as it was.
pub fn build_index<C: RecordCursor>(
    config: IndexConfig,
    mapping: &ColumnMapping,
    cursor: C,
) -> Result<BuildStats> {
    let mut writer = IndexWriter::open(config)?;

    let records_read = match ingest(&mut writer, mapping, cursor) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Build aborted; discarding uncommitted documents");
            if let Err(close_err) = writer.close() {
                warn!(error = %close_err, "Failed to clean up after aborted build");
            }
            return Err(e);
        }
    };

    let commit = writer.commit()?;
    writer.close()?;

    info!(records = records_read, generation = commit.generation, "Index build complete");
    Ok(BuildStats {
        records_read,
        commit,
    })
}
