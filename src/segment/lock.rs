//! Exclusive write lock for an index location

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, RowdexError};

pub const LOCK_FILE: &str = "write.lock";

/// OS-level exclusive lock on `<index_dir>/write.lock`.
///
/// Released when dropped, including when the owning process dies.
#[derive(Debug)]
pub struct WriteLock {
    file: File,
    path: PathBuf,
}

impl WriteLock {
    /// Take the lock without blocking. Fails with `LockContention` if held.
    pub fn acquire(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| RowdexError::storage(format!("opening {}", path.display()), e))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "Acquired write lock");
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(RowdexError::LockContention {
                    path: index_dir.to_path_buf(),
                })
            }
            Err(e) => Err(RowdexError::storage(format!("locking {}", path.display()), e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "Released write lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_contends() {
        let dir = TempDir::new().unwrap();
        let first = WriteLock::acquire(dir.path()).unwrap();
        assert!(first.path().ends_with(LOCK_FILE));

        let err = WriteLock::acquire(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockContention);
        assert!(err.is_retriable());

        drop(first);
        WriteLock::acquire(dir.path()).unwrap();
    }
}
