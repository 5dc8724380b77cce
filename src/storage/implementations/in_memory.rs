use std::collections::{HashMap, HashSet};

use log::debug;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::keys::{DataType, StorageKey};
use crate::storage::traits::{check_writable, StorageBackend};

/// An in-memory implementation of the `StorageBackend` trait.
/// Suitable for testing and demos.
#[derive(Default, Debug, Clone)]
pub struct InMemoryStorage {
    // wire key -> value
    data: HashMap<Vec<u8>, Vec<u8>>,
    locked: HashSet<DataType>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Delete `key`, returning the value it held
    pub fn remove(&mut self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        check_writable(self, key)?;
        Ok(self.data.remove(&key.to_bytes()))
    }
}

impl StorageBackend for InMemoryStorage {
    fn get(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        self.data
            .get(&key.to_bytes())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn put(&mut self, key: &StorageKey, value: Vec<u8>) -> StorageResult<()> {
        check_writable(self, key)?;
        debug!("put {} ({} bytes)", key, value.len());
        self.data.insert(key.to_bytes(), value);
        Ok(())
    }

    fn contains(&self, key: &StorageKey) -> StorageResult<bool> {
        Ok(self.data.contains_key(&key.to_bytes()))
    }

    fn dump(&self, data_type: DataType, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut entries: Vec<(String, Vec<u8>)> = self
            .data
            .iter()
            .filter(|(key, _)| key.first() == Some(&data_type.code()))
            .filter_map(|(key, value)| {
                let name = std::str::from_utf8(&key[1..]).ok()?;
                name.starts_with(prefix)
                    .then(|| (name.to_string(), value.clone()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!("dump {:?} '{}': {} entries", data_type, prefix, entries.len());
        Ok(entries)
    }

    fn lock(&mut self, data_type: DataType) {
        self.locked.insert(data_type);
    }

    fn is_locked(&self, data_type: DataType) -> bool {
        self.locked.contains(&data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::StorageExtensions;

    #[test]
    fn test_put_get() {
        let mut store = InMemoryStorage::new();
        let key = StorageKey::new(DataType::Template, "root");
        store.put(&key, b"hello".to_vec()).unwrap();
        assert_eq!(store.get(&key).unwrap(), b"hello");
        assert!(store.contains(&key).unwrap());
        assert!(matches!(
            store.get(&StorageKey::new(DataType::Template, "nope")),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_translation_fallback() {
        let mut store = InMemoryStorage::new();
        let plain = StorageKey::new(DataType::Menu, "back");
        store.put(&plain, b"back".to_vec()).unwrap();

        let nor = plain.clone().with_language(Some("nor"));
        assert_eq!(store.get_translated(&nor).unwrap(), b"back");
        store.put(&nor, b"tilbake".to_vec()).unwrap();
        assert_eq!(store.get_translated(&nor).unwrap(), b"tilbake");
        assert_eq!(store.find(&StorageKey::new(DataType::Menu, "x")).unwrap(), None);
    }

    #[test]
    fn test_sealed_content_is_read_only() {
        let mut store = InMemoryStorage::new();
        store.seal();
        let bin = StorageKey::new(DataType::Bin, "root");
        assert!(matches!(
            store.put(&bin, vec![0, 7]),
            Err(StorageError::ReadOnly { .. })
        ));
        let state = StorageKey::new(DataType::State, "state").with_session("s1");
        store.put_json(&state, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = store.get_json(&state).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_dump_by_prefix() {
        let mut store = InMemoryStorage::new();
        for (session, name) in [("a", "name"), ("a", "age"), ("b", "name")] {
            let key = StorageKey::new(DataType::UserData, name).with_session(session);
            store.put(&key, format!("{}-{}", session, name).into_bytes()).unwrap();
        }
        store
            .put(&StorageKey::new(DataType::Template, "a.name"), b"tpl".to_vec())
            .unwrap();

        let names: Vec<String> = store
            .dump(DataType::UserData, "a.")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a.age", "a.name"]);

        let entries = store.dump_session(DataType::UserData, "b").unwrap();
        assert_eq!(entries, vec![("name".to_string(), b"b-name".to_vec())]);
        assert!(store.dump_session(DataType::Template, "a").is_err());
    }

    #[test]
    fn test_sessions_are_separate() {
        let mut store = InMemoryStorage::new();
        let a = StorageKey::new(DataType::UserData, "name").with_session("a");
        let b = StorageKey::new(DataType::UserData, "name").with_session("b");
        store.put(&a, b"alice".to_vec()).unwrap();
        assert!(!store.contains(&b).unwrap());
    }
}
