//! File-backed byte store for index journals.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A byte store backed by a single file.
///
/// The journal of one repository index lives in one `FileBackend`. Data
/// survives process restarts.
///
/// # Durability
///
/// - `flush()` pushes buffered bytes to the OS (`File::flush`)
/// - `sync()` forces data and metadata to disk (`File::sync_all`)
///
/// # Example
///
/// ```no_run
/// use artindex_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut journal = FileBackend::open_with_create_dirs(Path::new("repo/.index/entries.journal")).unwrap();
/// journal.append(b"record").unwrap();
/// journal.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: RwLock::new(size),
        })
    }

    /// Opens or creates the file, creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut size = self.size.write();
        if data.is_empty() {
            return Ok(*size);
        }

        let mut file = self.file.lock();
        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        if let Err(err) = file.write_all(data) {
            // Drop whatever part of the record reached the file. Should that
            // fail too, the next append still starts at `offset` and
            // overwrites the partial bytes.
            if let Err(rollback) = file.set_len(offset) {
                tracing::warn!(
                    offset,
                    error = %rollback,
                    "failed to roll back partial append"
                );
            }
            return Err(err.into());
        }
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: *size,
            });
        }

        let file = self.file.lock();
        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_empty_journal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entries.journal");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn appended_records_read_back_at_their_offsets() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("entries.journal")).unwrap();

        let first = backend.append(b"upsert").unwrap();
        let second = backend.append(b"remove").unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 6);

        assert_eq!(backend.read_at(second, 6).unwrap(), b"remove");
        assert_eq!(backend.read_at(0, 12).unwrap(), b"upsertremove");
    }

    #[test]
    fn append_overwrites_bytes_left_past_the_tracked_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entries.journal");
        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"abc").unwrap();

        // Leftovers of a partial write whose rollback failed.
        let mut stale = OpenOptions::new().append(true).open(&path).unwrap();
        stale.write_all(b"XYZW").unwrap();

        assert_eq!(backend.append(b"de").unwrap(), 3);
        assert_eq!(backend.size().unwrap(), 5);
        assert_eq!(backend.read_at(0, 5).unwrap(), b"abcde");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("entries.journal")).unwrap();
        backend.append(b"short").unwrap();

        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn journal_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entries.journal");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persisted entry").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_at(0, 15).unwrap(), b"persisted entry");
    }

    #[test]
    fn truncate_drops_torn_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("entries.journal")).unwrap();
        backend.append(b"complete").unwrap();
        backend.append(b"torn").unwrap();

        backend.truncate(8).unwrap();
        assert_eq!(backend.size().unwrap(), 8);

        // Appends continue right after the cut.
        assert_eq!(backend.append(b"next").unwrap(), 8);
        assert_eq!(backend.read_at(0, 12).unwrap(), b"completenext");
    }

    #[test]
    fn truncate_beyond_size_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("entries.journal")).unwrap();
        backend.append(b"abc").unwrap();

        assert!(matches!(
            backend.truncate(10),
            Err(StorageError::InvalidTruncate {
                requested: 10,
                size: 3
            })
        ));
    }

    #[test]
    fn nested_index_directory_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage0").join("releases").join(".index").join("entries.journal");

        let mut backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert!(path.exists());
        assert!(backend.flush().is_ok());
        assert!(backend.sync().is_ok());
    }
}
