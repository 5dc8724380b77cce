use std::collections::HashSet;
use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, trace};

use crate::storage::errors::{io_to_storage_error, StorageError, StorageResult};
use crate::storage::keys::{DataType, StorageKey};
use crate::storage::traits::{check_writable, StorageBackend};

/// Represents a file-based persistent storage implementation.
///
/// Every key is one file directly under the root directory. The file name
/// is the key's wire form with the data type byte shifted into printable
/// ASCII (`0x30` added), so node code for `root` lives in `1root` and the
/// state of session `abc` in `@abc.state`.
///
/// Lookups that miss fall back to the plain names a content author writes
/// by hand: `<name>.bin` for code, `<name>.txt` for static content and
/// `<name>` for templates. `dump` lists written keys only.
#[derive(Debug)]
pub struct FileStorage {
    /// Root path for all storage
    root_path: PathBuf,
    locked: HashSet<DataType>,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory
    pub fn new<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        create_dir_all(&root).map_err(|e| io_to_storage_error("create storage root", e))?;
        Ok(FileStorage {
            root_path: root,
            locked: HashSet::new(),
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn validate(key: &StorageKey) -> StorageResult<()> {
        let name = key.scoped_name();
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey {
                key: name,
                details: "not usable as a file name".to_string(),
            });
        }
        Ok(())
    }

    /// Path a key is written to
    pub fn key_path(&self, key: &StorageKey) -> PathBuf {
        let prefix = char::from(key.data_type.code() + 0x30);
        self.root_path.join(format!("{}{}", prefix, key.scoped_name()))
    }

    /// Hand-written path checked when `key_path` is missing. Only authored
    /// content has one.
    pub fn legacy_path(&self, key: &StorageKey) -> Option<PathBuf> {
        let name = key.scoped_name();
        let file = match key.data_type {
            DataType::Bin => format!("{}.bin", name),
            DataType::StaticLoad => format!("{}.txt", name),
            DataType::Template => name,
            _ => return None,
        };
        Some(self.root_path.join(file))
    }

    fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        file.lock_shared()?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        file.unlock()?;
        Ok(bytes)
    }
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        Self::validate(key)?;
        for path in std::iter::once(self.key_path(key)).chain(self.legacy_path(key)) {
            match Self::read_file(&path) {
                Ok(bytes) => {
                    trace!("read {} from {}", key, path.display());
                    return Ok(bytes);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(io_to_storage_error("read", e)),
            }
        }
        Err(StorageError::NotFound {
            key: key.to_string(),
        })
    }

    fn put(&mut self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()> {
        check_writable(self, key)?;
        Self::validate(key)?;
        let path = self.key_path(key);

        // Open without truncating so the lock is held before the old content goes
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_to_storage_error("open", e))?;
        file.lock_exclusive()
            .map_err(|e| io_to_storage_error("lock", e))?;
        file.set_len(0)
            .map_err(|e| io_to_storage_error("truncate", e))?;
        file.write_all(&value)
            .map_err(|e| io_to_storage_error("write", e))?;
        file.unlock()
            .map_err(|e| io_to_storage_error("unlock", e))?;
        debug!("wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn contains(&self, key: &StorageKey) -> StorageResult<bool> {
        Self::validate(key)?;
        Ok(self.key_path(key).exists() || self.legacy_path(key).is_some_and(|p| p.exists()))
    }

    fn dump(&self, data_type: DataType, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let type_prefix = char::from(data_type.code() + 0x30);
        let dir = fs::read_dir(&self.root_path).map_err(|e| io_to_storage_error("list", e))?;
        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| io_to_storage_error("list", e))?;
            let file_name = entry.file_name();
            let name = match file_name.to_str().and_then(|n| n.strip_prefix(type_prefix)) {
                Some(name) if name.starts_with(prefix) => name.to_string(),
                _ => continue,
            };
            if !entry.path().is_file() {
                continue;
            }
            let value = Self::read_file(&entry.path()).map_err(|e| io_to_storage_error("read", e))?;
            entries.push((name, value));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(
            "dump {:?} '{}' from {}: {} entries",
            data_type,
            prefix,
            self.root_path.display(),
            entries.len()
        );
        Ok(entries)
    }

    fn lock(&mut self, data_type: DataType) {
        self.locked.insert(data_type);
    }

    fn is_locked(&self, data_type: DataType) -> bool {
        self.locked.contains(&data_type)
    }
}

impl FileStorage {
    /// Remove a stored key; missing keys are not an error
    pub fn remove(&mut self, key: &StorageKey) -> StorageResult<()> {
        check_writable(self, key)?;
        Self::validate(key)?;
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_to_storage_error("remove", e)),
        }
    }
}
