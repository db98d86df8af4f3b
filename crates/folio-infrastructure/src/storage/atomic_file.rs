//! Atomic file operations for persisted key-value entries.
//!
//! Provides a thin layer for safe access to the raw string values folio
//! persists (the credential and the conversation collection).

use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

/// Errors that can occur during atomic file operations.
#[derive(Debug)]
pub enum AtomicFileError {
    /// File I/O error.
    IoError(std::io::Error),
    /// File locking error.
    LockError(String),
}

impl std::fmt::Display for AtomicFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicFileError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicFileError::LockError(e) => write!(f, "Lock error: {}", e),
        }
    }
}

impl std::error::Error for AtomicFileError {}

impl From<std::io::Error> for AtomicFileError {
    fn from(e: std::io::Error) -> Self {
        AtomicFileError::IoError(e)
    }
}

impl From<AtomicFileError> for folio_core::FolioError {
    fn from(e: AtomicFileError) -> Self {
        match e {
            AtomicFileError::IoError(io) => folio_core::FolioError::from(io),
            AtomicFileError::LockError(msg) => folio_core::FolioError::data_access(msg),
        }
    }
}

/// A handle to one durably stored string value.
///
/// Provides:
/// - **Atomicity**: writes are all-or-nothing via tmp file + atomic rename
/// - **Isolation**: file locking serializes concurrent writers
/// - **Durability**: explicit fsync before rename
pub struct AtomicFile {
    path: PathBuf,
}

impl AtomicFile {
    /// Creates a new atomic file handle.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the stored value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(String))`: the stored value
    /// - `Ok(None)`: file doesn't exist or is empty
    /// - `Err`: failed to read the file
    pub fn load(&self) -> Result<Option<String>, AtomicFileError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(content))
    }

    /// Saves a value atomically, replacing any previous one.
    ///
    /// Uses a temporary file + atomic rename so readers never observe a
    /// partial write. The entry file is created with 600 permissions on
    /// Unix because credential material is stored through this path.
    pub fn save(&self, value: &str) -> Result<(), AtomicFileError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // Serialize concurrent writers; two unguarded saves could collide
        // on the shared tmp name below
        let _lock = self.acquire_lock()?;

        // Write to temporary file in the same directory
        let tmp_path = self.get_temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(value.as_bytes())?;

        // Ensure data is written to disk
        tmp_file.sync_all()?;
        drop(tmp_file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        // Atomic rename
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Removes the stored value. Removing an absent value is a no-op.
    pub fn remove(&self) -> Result<(), AtomicFileError> {
        let _lock = self.acquire_lock()?;

        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }

        Ok(())
    }

    /// Gets a temporary file path for atomic writes.
    fn get_temp_path(&self) -> Result<PathBuf, AtomicFileError> {
        let parent = self.path.parent().ok_or_else(|| {
            AtomicFileError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            ))
        })?;

        let file_name = self.path.file_name().ok_or_else(|| {
            AtomicFileError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no file name",
            ))
        })?;

        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(parent.join(tmp_name))
    }

    /// Acquires an exclusive file lock.
    ///
    /// Returns a lock guard that automatically releases the lock when dropped.
    fn acquire_lock(&self) -> Result<FileLock, AtomicFileError> {
        FileLock::acquire(&self.path)
    }
}

/// A file lock guard that automatically releases the lock when dropped.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquires an exclusive lock on the given path.
    fn acquire(path: &Path) -> Result<Self, AtomicFileError> {
        // Create lock file path
        let lock_path = path.with_extension("lock");

        // Ensure parent directory exists
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // Open or create lock file
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&lock_path)?;

        // Try to acquire exclusive lock with fs2
        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| AtomicFileError::LockError(format!("Failed to acquire lock: {}", e)))?;
        }

        #[cfg(not(unix))]
        {
            // On non-Unix systems, we don't have file locking
            // This is acceptable for single-user desktop apps
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock is automatic when the file handle is dropped
        // Try to remove lock file (best effort)
        let _ = fs::remove_file(&self.lock_path);
    }
}
