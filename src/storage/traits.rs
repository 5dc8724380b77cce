use log::trace;
use serde::{de::DeserializeOwned, Serialize};

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::keys::{DataType, StorageKey};

/// Byte-level key-value store used by the engine
pub trait StorageBackend {
    /// Value stored under exactly `key`
    fn get(&self, key: &StorageKey) -> StorageResult<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous value.
    /// Fails with `ReadOnly` when the key's data type is locked.
    fn put(&mut self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()>;

    /// Check if a key exists
    fn contains(&self, key: &StorageKey) -> StorageResult<bool>;

    /// Every stored entry of `data_type` whose scoped name starts with
    /// `prefix`, sorted by name
    fn dump(&self, data_type: DataType, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Make a data type read-only for the rest of this backend's life
    fn lock(&mut self, data_type: DataType);

    fn is_locked(&self, data_type: DataType) -> bool;

    /// Lock every content type (code, menus, templates, static content)
    fn seal(&mut self) {
        for data_type in DataType::ALL.into_iter().filter(|t| t.is_content()) {
            self.lock(data_type);
        }
    }
}

/// Read-only check shared by backends
pub fn check_writable<S: StorageBackend + ?Sized>(store: &S, key: &StorageKey) -> StorageResult<()> {
    if store.is_locked(key.data_type) {
        return Err(StorageError::ReadOnly {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Convenience methods available on every backend
pub trait StorageExtensions: StorageBackend {
    /// Look up the language variant first, then the plain key
    fn get_translated(&self, key: &StorageKey) -> StorageResult<Vec<u8>>;

    /// Like `get_translated`, mapping a missing key to `None`
    fn find(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>>;

    fn get_json<T: DeserializeOwned>(&self, key: &StorageKey) -> StorageResult<T>;

    fn put_json<T: Serialize>(&mut self, key: &StorageKey, value: &T) -> StorageResult<()>;

    /// Entries of a session-scoped type belonging to `session`, named
    /// without the session prefix
    fn dump_session(&self, data_type: DataType, session: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;
}

impl<S: StorageBackend> StorageExtensions for S {
    fn get_translated(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        for candidate in key.candidates() {
            match self.get(&candidate) {
                Ok(bytes) => return Ok(bytes),
                Err(StorageError::NotFound { .. }) => {
                    trace!("no value at {}", candidate);
                }
                Err(e) => return Err(e),
            }
        }
        Err(StorageError::NotFound {
            key: key.to_string(),
        })
    }

    fn find(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        match self.get_translated(key) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, key: &StorageKey) -> StorageResult<T> {
        let bytes = self.get(key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn put_json<T: Serialize>(&mut self, key: &StorageKey, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes)
    }

    fn dump_session(&self, data_type: DataType, session: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        if !data_type.is_sessioned() || session.is_empty() {
            return Err(StorageError::InvalidKey {
                key: format!("{:?}:{}", data_type, session),
                details: "not a session scope".to_string(),
            });
        }
        let prefix = format!("{}.", session);
        Ok(self
            .dump(data_type, &prefix)?
            .into_iter()
            .map(|(name, value)| (name[prefix.len()..].to_string(), value))
            .collect())
    }
}
