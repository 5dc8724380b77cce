use menuvm::config::Config;
use menuvm::engine::{run_loop, Engine, EngineError};
use menuvm::storage::{DataType, FileStorage, InMemoryStorage, StorageBackend, StorageKey};
use menuvm::vm::{Resolved, VMError, FLAG_USERSTART};
use tempfile::TempDir;

use test_helpers::{demo_storage, write_demo_dir};

const ROOT_DISPLAY: &str = "hello world\n1:do the foo\n2:go to the bar\n3:see long";

fn engine() -> Engine<InMemoryStorage> {
    let mut en = Engine::new(Config::default(), demo_storage()).unwrap();
    en.init().unwrap();
    en
}

#[test]
fn test_demo_tree_walk() {
    let mut en = engine();
    assert_eq!(en.render().unwrap(), ROOT_DISPLAY);

    assert!(en.exec(b"1").unwrap());
    assert_eq!(
        en.render().unwrap(),
        "this is in foo\n\nit has more lines\n0:to foo\n1:go baz"
    );

    assert!(!en.exec(b"1").unwrap());
    assert_eq!(
        en.render().unwrap(),
        "this is baz which uses the var one in the template."
    );
    assert_eq!(en.state().stack().nodes(), &["root", "foo", "baz"]);
}

#[test]
fn test_back_and_top() {
    let mut en = engine();
    en.exec(b"1").unwrap();
    en.exec(b"0").unwrap();
    assert_eq!(en.state().current(), Some("root"));
    assert_eq!(en.render().unwrap(), ROOT_DISPLAY);

    en.exec(b"2").unwrap();
    assert_eq!(en.state().current(), Some("bar"));
    assert_eq!(en.state().symbols().get("pinky"), Some("two"));
    en.exec(b"anything at all").unwrap();
    assert_eq!(en.state().current(), Some("root"));
}

#[test]
fn test_paging() {
    let mut en = engine();
    en.exec(b"3").unwrap();
    let first = en.render().unwrap();
    assert!(first.starts_with("data\nINKY 12\n"));
    assert!(first.ends_with("0:back\n00:nexxt"));

    en.exec(b"00").unwrap();
    assert_eq!(en.state().page(), 1);
    assert!(en.render().unwrap().ends_with("0:back\n00:nexxt\n11:prevvv"));

    en.exec(b"11").unwrap();
    assert_eq!(en.state().page(), 0);
    // previous from the first page is ignored
    en.exec(b"11").unwrap();
    assert_eq!(en.state().page(), 0);
    assert_eq!(en.state().current(), Some("long"));
}

#[test]
fn test_invalid_choice_shows_catch_node() {
    let mut en = engine();
    en.exec(b"42").unwrap();
    assert_eq!(en.state().current(), Some("_catch"));
    assert_eq!(en.render().unwrap(), "invalid input\n0:back");
    en.exec(b"0").unwrap();
    assert_eq!(en.render().unwrap(), ROOT_DISPLAY);
}

#[test]
fn test_rejected_input_changes_nothing() {
    let mut en = engine();
    let before = en.state().clone();
    for input in [&b""[..], &b"\x7f"[..], &b" 1"[..]] {
        assert!(matches!(
            en.exec(input),
            Err(EngineError::VM(VMError::InvalidInput(_)))
        ));
    }
    assert_eq!(en.state(), &before);

    let long = vec![b'1'; 256];
    assert!(matches!(
        en.exec(&long),
        Err(EngineError::VM(VMError::InputTooLong(256)))
    ));
    assert_eq!(en.state(), &before);
}

#[test]
fn test_custom_input_class() {
    let mut en = engine();
    en.classifier_mut().register(7, r"^\x01$").unwrap();
    // accepted by the classifier, then matched by nothing
    assert!(en.exec(b"\x01").unwrap());
    assert_eq!(en.state().current(), Some("_catch"));
}

#[test]
fn test_function_sets_user_flag_for_catch() {
    let mut store = demo_storage();
    let code = menuvm::compiler::assemble_to_vec(
        "LOAD account 32\nCATCH blocked 8 0\nMAP account\nHALT\n",
    )
    .unwrap();
    store.put(&StorageKey::new(DataType::Bin, "foo"), code).unwrap();
    let code = menuvm::compiler::assemble_to_vec("HALT\n").unwrap();
    store.put(&StorageKey::new(DataType::Bin, "blocked"), code).unwrap();
    store
        .put(&StorageKey::new(DataType::Template, "blocked"), b"account blocked".to_vec())
        .unwrap();

    let config = Config {
        flag_count: 8,
        ..Config::default()
    };
    let mut en = Engine::new(config, store).unwrap();
    en.register("account", |_, _| {
        Ok(Resolved::new("closed").with_flag_set(FLAG_USERSTART))
    });
    en.init().unwrap();
    en.exec(b"1").unwrap();
    assert_eq!(en.state().current(), Some("blocked"));
    assert_eq!(en.render().unwrap(), "account blocked");
    assert_eq!(en.state().stack().nodes(), &["root", "foo", "blocked"]);
}

#[test]
fn test_translated_labels_and_templates() {
    let mut store = demo_storage();
    store
        .put(
            &StorageKey::new(DataType::Template, "root").with_language(Some("nor")),
            b"hei verden".to_vec(),
        )
        .unwrap();
    store
        .put(
            &StorageKey::new(DataType::Menu, "do the foo").with_language(Some("nor")),
            "gjør foo".as_bytes().to_vec(),
        )
        .unwrap();
    let config = Config {
        language: Some("nor".to_string()),
        ..Config::default()
    };
    let mut en = Engine::new(config, store).unwrap();
    en.init().unwrap();
    assert_eq!(
        en.render().unwrap(),
        "hei verden\n1:gjør foo\n2:go to the bar\n3:see long"
    );
}

#[test]
fn test_output_size_limit() {
    let config = Config {
        output_size: 20,
        ..Config::default()
    };
    let mut en = Engine::new(config, demo_storage()).unwrap();
    en.init().unwrap();
    assert!(matches!(en.render(), Err(EngineError::Render(_))));
}

#[test]
fn test_session_survives_process_restart() {
    let dir = TempDir::new().unwrap();
    write_demo_dir(dir.path());
    let config = Config {
        session_id: "s1".to_string(),
        ..Config::default()
    };

    let mut store = FileStorage::new(dir.path()).unwrap();
    store.seal();
    let mut en = Engine::new(config.clone(), store).unwrap();
    en.init().unwrap();
    en.exec(b"1").unwrap();
    drop(en);

    assert!(dir.path().join("@s1.session").exists());

    let mut en = Engine::new(config, FileStorage::new(dir.path()).unwrap()).unwrap();
    assert_eq!(en.state().current(), Some("foo"));
    assert_eq!(
        en.render().unwrap(),
        "this is in foo\n\nit has more lines\n0:to foo\n1:go baz"
    );
    assert!(!en.exec(b"1").unwrap());
    assert_eq!(en.state().current(), Some("baz"));
}

#[test]
fn test_run_loop_reports_invalid_input() {
    let mut en = Engine::new(Config::default(), demo_storage()).unwrap();
    let mut out = Vec::new();
    run_loop(&mut en, &b" bad\n1\n1\n"[..], &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with(ROOT_DISPLAY));
    assert!(text.contains("Invalid input: 20626164"));
    assert!(text.ends_with("this is baz which uses the var one in the template.\n"));
}
