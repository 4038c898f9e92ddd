//! Lock file protocol for the output index.
//!
//! New contents are written to `<path>.lock` (created with
//! O_CREAT|O_EXCL) and atomically renamed over the target on commit. An
//! uncommitted lock is removed on drop, so a failed conversion never
//! leaves a partial output behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::ConvertError;

const LOCK_SUFFIX: &str = ".lock";

pub(crate) struct LockFile {
    path: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// Acquire a lock on the given path. Fails if another process holds
    /// the lock.
    pub fn acquire(path: &Path) -> Result<Self, ConvertError> {
        let lock_path = PathBuf::from(format!("{}{}", path.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    ConvertError::LockFailed {
                        path: lock_path.clone(),
                    }
                } else {
                    ConvertError::Io(e)
                }
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data),
            None => Err(io::Error::other("lock file already closed")),
        }
    }

    /// Flush, close, and atomically rename the lock over the target.
    pub fn commit(mut self) -> Result<(), ConvertError> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
            file.sync_all()?;
        }
        // The handle must be closed before the rename
        self.file.take();

        fs::rename(&self.lock_path, &self.path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
