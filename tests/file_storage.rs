use std::fs;

use menuvm::storage::{
    DataType, FileStorage, StorageBackend, StorageError, StorageExtensions, StorageKey, StorageResult,
};
use tempfile::TempDir;

use test_helpers::write_demo_dir;

#[test]
fn test_reads_hand_written_layout() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    write_demo_dir(dir.path());
    let store = FileStorage::new(dir.path())?;

    assert!(store.contains(&StorageKey::new(DataType::Bin, "root"))?);
    assert_eq!(
        store.get(&StorageKey::new(DataType::Template, "root"))?,
        b"hello world"
    );
    assert_eq!(
        store.get(&StorageKey::new(DataType::StaticLoad, "inky"))?,
        b"one"
    );
    assert!(!store.contains(&StorageKey::new(DataType::Menu, "root"))?);
    Ok(())
}

#[test]
fn test_written_keys_take_precedence() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    write_demo_dir(dir.path());
    let mut store = FileStorage::new(dir.path())?;

    let key = StorageKey::new(DataType::Template, "root");
    store.put(&key, b"replaced".to_vec())?;
    assert!(dir.path().join("4root").exists());
    assert_eq!(store.get(&key)?, b"replaced");
    assert_eq!(fs::read(dir.path().join("root")).unwrap(), b"hello world");
    Ok(())
}

#[test]
fn test_translation_fallback() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    let mut store = FileStorage::new(dir.path())?;
    let plain = StorageKey::new(DataType::Menu, "back");
    store.put(&plain, b"back".to_vec())?;
    store.put(&plain.clone().with_language(Some("nor")), b"tilbake".to_vec())?;
    assert!(dir.path().join("2back_nor").exists());

    let nor = StorageKey::new(DataType::Menu, "back").with_language(Some("nor"));
    let eng = StorageKey::new(DataType::Menu, "back").with_language(Some("eng"));
    assert_eq!(store.get_translated(&nor)?, b"tilbake");
    assert_eq!(store.get_translated(&eng)?, b"back");
    assert_eq!(store.find(&StorageKey::new(DataType::Menu, "nope"))?, None);
    Ok(())
}

#[test]
fn test_sealed_content_rejects_writes() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    let mut store = FileStorage::new(dir.path())?;
    store.seal();

    let result = store.put(&StorageKey::new(DataType::Bin, "root"), vec![0, 7]);
    assert!(matches!(result, Err(StorageError::ReadOnly { .. })));
    assert!(!dir.path().join("1root").exists());

    // session data stays writable
    let key = StorageKey::new(DataType::UserData, "name").with_session("s1");
    store.put_json(&key, &vec!["a", "b"])?;
    assert!(dir.path().join("Ps1.name").exists());
    let back: Vec<String> = store.get_json(&key)?;
    assert_eq!(back, vec!["a", "b"]);
    Ok(())
}

#[test]
fn test_missing_key() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    let store = FileStorage::new(dir.path())?;
    let result = store.get(&StorageKey::new(DataType::Bin, "ghost"));
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
    Ok(())
}

#[test]
fn test_dump_lists_written_keys() -> StorageResult<()> {
    let dir = TempDir::new().unwrap();
    write_demo_dir(dir.path());
    let mut store = FileStorage::new(dir.path())?;

    store.put(&StorageKey::new(DataType::UserData, "name").with_session("s1"), b"ann".to_vec())?;
    store.put(&StorageKey::new(DataType::UserData, "age").with_session("s1"), b"41".to_vec())?;
    store.put(&StorageKey::new(DataType::UserData, "name").with_session("s10"), b"bo".to_vec())?;
    store.put(&StorageKey::new(DataType::Template, "extra"), b"x".to_vec())?;

    assert_eq!(
        store.dump_session(DataType::UserData, "s1")?,
        vec![
            ("age".to_string(), b"41".to_vec()),
            ("name".to_string(), b"ann".to_vec()),
        ]
    );
    let all: Vec<String> = store
        .dump(DataType::UserData, "")?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(all, vec!["s1.age", "s1.name", "s10.name"]);

    // hand-written templates are not listed, only written keys
    let templates = store.dump(DataType::Template, "")?;
    assert_eq!(templates, vec![("extra".to_string(), b"x".to_vec())]);
    assert!(store.dump(DataType::State, "s1.")?.is_empty());
    Ok(())
}
