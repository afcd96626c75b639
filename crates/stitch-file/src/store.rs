//! One-file-per-key storage.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use stitch_core::{Storage, StorageError};
use tracing::{debug, instrument};
use uuid::Uuid;

const LOCK_FILE: &str = ".lock";

/// [`Storage`] that keeps each key in a file under a root directory.
///
/// Writers in different processes are serialized through a lock file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a key into a filesystem-safe file name.
    ///
    /// Letters, digits, `-`, `_` and `.` are kept; every other byte is
    /// written as `%XX`, which keeps distinct keys distinct.
    fn file_name(key: &str) -> String {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                    name.push(char::from(byte))
                }
                other => name.push_str(&format!("%{:02X}", other)),
            }
        }
        // Dot files are reserved for the lock and temporary files.
        if name.starts_with('.') {
            name.replace_range(0..1, "%2E");
        }
        name
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(Self::file_name(key))
    }

    /// Run `f` while holding the exclusive writer lock.
    fn with_lock<T>(&self, f: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
        fs::create_dir_all(&self.root)?;
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.root.join(LOCK_FILE))?;
        lock_file.lock_exclusive()?;
        let result = f();
        lock_file.unlock()?;
        result
    }
}

impl Storage for FileStorage {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    #[instrument(skip(self, value), fields(root = %self.root.display()))]
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", Self::file_name(key), Uuid::new_v4().simple()));

        self.with_lock(|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        })
        .map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::Write {
                key: key.to_string(),
                message: e.to_string(),
            }
        })?;

        debug!(bytes = value.len(), "Stored value");
        Ok(())
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        self.with_lock(|| match fs::remove_file(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        })
        .map_err(|e| StorageError::Remove {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        debug!("Removed value");
        Ok(())
    }
}
