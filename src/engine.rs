//! Session driver
//!
//! The engine owns one session: its navigation state, the VM that runs
//! node code against it and the storage the code comes from. Each turn
//! feeds one line of user input through the code suspended at the last
//! HALT, loads node code for wherever the turn ended up, and persists the
//! result so the session can continue in a later process.

use std::io::{BufRead, Write};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::{BytecodeError, Instruction};
use crate::config::{Config, ConfigError};
use crate::render::{RenderError, Renderer};
use crate::resource::Resource;
use crate::storage::{DataType, StorageBackend, StorageError, StorageExtensions, StorageKey};
use crate::vm::{InputClassifier, PendingOutput, Resolved, ResolveError, RunError, RunOutcome, State, VMError, VM};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("VM error: {0}")]
    VM(#[from] VMError),

    #[error("Run failed: {0}")]
    Run(#[from] RunError),

    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Turn kept loading node code without settling
    #[error("Node loading did not settle after {0} loads")]
    ReloadLimit(usize),

    /// Input given to a session that has nothing left to run
    #[error("Session has ended")]
    SessionEnded,

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// What is persisted between turns
#[derive(Debug, Serialize, Deserialize)]
struct Session {
    state: State,
    output: PendingOutput,
}

pub struct Engine<S: StorageBackend> {
    config: Config,
    state: State,
    vm: VM<Resource<S>>,
    classifier: InputClassifier,
    renderer: Renderer,
}

impl<S: StorageBackend> Engine<S> {
    /// Create an engine over `store`, resuming the configured session when
    /// a saved one exists
    pub fn new(config: Config, store: S) -> Result<Self, EngineError> {
        config.validate()?;
        let key = session_key(&config);
        let saved = if store.contains(&key)? {
            Some(store.get_json::<Session>(&key)?)
        } else {
            None
        };

        let mut resource = Resource::new(store);
        let (state, output) = match saved {
            Some(session) => {
                info!(
                    "resuming session '{}' at {}",
                    config.session_id,
                    session.state.stack().format_stack()
                );
                (session.state, session.output)
            }
            None => {
                let mut state = State::with_cache_size(config.flag_count, config.cache_size);
                state.set_language(config.language.clone());
                (state, PendingOutput::new())
            }
        };
        resource.set_language(state.language().map(str::to_string));

        let mut vm = VM::new(resource);
        vm.set_pending(output);

        Ok(Self {
            renderer: Renderer::new(config.output_size),
            config,
            state,
            vm,
            classifier: InputClassifier::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn pending(&self) -> &PendingOutput {
        self.vm.pending()
    }

    pub fn resource(&self) -> &Resource<S> {
        self.vm.resolver()
    }

    pub fn resource_mut(&mut self) -> &mut Resource<S> {
        self.vm.resolver_mut()
    }

    /// Register a function answering LOAD/RELOAD for `sym`
    pub fn register<F>(&mut self, sym: &str, f: F)
    where
        F: Fn(&str, &[u8]) -> Result<Resolved, ResolveError> + 'static,
    {
        self.resource_mut().register(sym, f);
    }

    pub fn classifier_mut(&mut self) -> &mut InputClassifier {
        &mut self.classifier
    }

    /// Switch the display language for this session
    pub fn set_language(&mut self, language: Option<String>) {
        self.state.set_language(language.clone());
        self.resource_mut().set_language(language);
    }

    /// Enter the root node of a new session. Does nothing for a session
    /// that has already moved.
    ///
    /// Returns whether the session expects input.
    pub fn init(&mut self) -> Result<bool, EngineError> {
        if self.state.moves() > 0 {
            debug!("session already started");
            return Ok(self.state.waiting() && !self.state.terminated());
        }
        let snapshot = self.state.clone();
        match self.enter_root() {
            Ok(alive) => {
                self.persist()?;
                Ok(alive)
            }
            Err(e) => {
                self.state = snapshot;
                self.vm.reset();
                Err(e)
            }
        }
    }

    fn enter_root(&mut self) -> Result<bool, EngineError> {
        self.state.set_input(&[])?;
        let code = Instruction::Move {
            sym: self.config.root.clone(),
        }
        .to_bytes()?;
        info!("entering {}", self.config.root);
        let outcome = self.vm.run(&code, &mut self.state)?;
        let alive = self.settle(outcome, false)?;
        self.state.clear_input();
        Ok(alive)
    }

    /// Process one line of user input.
    ///
    /// Returns `false` once the session has ended. On error the state is
    /// left exactly as it was before the call.
    pub fn exec(&mut self, input: &[u8]) -> Result<bool, EngineError> {
        if self.state.moves() == 0 {
            self.init()?;
        }
        let class = self.classifier.classify(input)?;
        debug!("input '{}' in class {}", String::from_utf8_lossy(input), class);

        let snapshot = self.state.clone();
        let output = self.vm.pending().clone();
        match self.turn(input) {
            Ok(alive) => {
                self.persist()?;
                Ok(alive)
            }
            Err(e) => {
                warn!("turn failed, state restored: {}", e);
                self.state = snapshot;
                self.vm.set_pending(output);
                Err(e)
            }
        }
    }

    fn turn(&mut self, input: &[u8]) -> Result<bool, EngineError> {
        if self.state.terminated() || self.state.code().is_empty() {
            return Err(EngineError::SessionEnded);
        }
        self.state.set_input(input)?;
        let code = self.state.take_code();
        let outcome = self.vm.run(&code, &mut self.state)?;
        let alive = self.settle(outcome, true)?;
        self.state.clear_input();
        Ok(alive)
    }

    /// Load node code until a run suspends at a HALT or the session ends
    fn settle(&mut self, mut outcome: RunOutcome, mut from_input: bool) -> Result<bool, EngineError> {
        let mut loads = 0;
        loop {
            if self.state.terminated() {
                info!("session terminated at {}", self.state.stack().format_stack());
                self.state.set_code(Vec::new());
                return Ok(false);
            }
            if outcome.halted {
                let alive = !outcome.remainder.is_empty();
                self.state.set_code(outcome.remainder);
                if alive {
                    self.state.wait();
                }
                return Ok(alive);
            }

            if !self.state.is_dirty() {
                if !from_input {
                    debug!("code ran out without halting");
                    self.state.set_code(Vec::new());
                    return Ok(false);
                }
                if self.state.matched() {
                    self.state.stay();
                } else {
                    self.catch_input()?;
                }
            }

            loads += 1;
            if loads > self.config.max_reloads {
                return Err(EngineError::ReloadLimit(self.config.max_reloads));
            }
            self.state.clear_dirty();
            if self.state.current().is_none() {
                self.state.push_move(&self.config.root);
                self.state.clear_dirty();
            }
            let node = self.state.current().unwrap_or(self.config.root.as_str()).to_string();
            let code = self.vm.resolver().get_code(&node)?;
            debug!("loading {} ({} bytes)", node, code.len());
            self.vm.reset();
            outcome = self.vm.run(&code, &mut self.state)?;
            from_input = false;
        }
    }

    /// Input matched no choice: show the catch node if there is one,
    /// otherwise the current node again
    fn catch_input(&mut self) -> Result<(), EngineError> {
        let catch = self.config.catch_node.clone();
        let here = self.state.current().map(str::to_string);
        if here.as_deref() != Some(catch.as_str()) && self.vm.resolver().has_code(&catch)? {
            info!("no match for input, moving to {}", catch);
            self.state.push_move(&catch);
        } else {
            debug!("no match for input, reloading current node");
            self.state.stay();
        }
        Ok(())
    }

    /// Render the display of the current node
    pub fn render(&self) -> Result<String, EngineError> {
        let node = self.state.current().unwrap_or(self.config.root.as_str());
        Ok(self
            .renderer
            .render(node, &self.state, self.vm.pending(), self.vm.resolver())?)
    }

    /// Write the display of the current node, returning the bytes written
    pub fn write_result<W: Write>(&self, w: &mut W) -> Result<usize, EngineError> {
        let output = self.render()?;
        w.write_all(output.as_bytes())?;
        Ok(output.len())
    }

    /// Save state and pending output under the session key
    pub fn persist(&mut self) -> Result<(), EngineError> {
        let key = session_key(&self.config);
        let session = Session {
            state: self.state.clone(),
            output: self.vm.pending().clone(),
        };
        self.resource_mut().store_mut().put_json(&key, &session)?;
        debug!("persisted session under {}", key);
        Ok(())
    }

    /// Persist and hand back the storage
    pub fn finish(mut self) -> Result<S, EngineError> {
        self.persist()?;
        Ok(self.vm.into_resolver().into_store())
    }
}

fn session_key(config: &Config) -> StorageKey {
    StorageKey::new(DataType::State, "session").with_session(&config.session_id)
}

/// Drive a whole session over line-oriented I/O.
///
/// Writes the display after every turn and stops when the session ends or
/// the input runs out. Invalid input is reported on `output` and the same
/// display is shown again.
pub fn run_loop<S, R, W>(engine: &mut Engine<S>, input: R, output: &mut W) -> Result<(), EngineError>
where
    S: StorageBackend,
    R: BufRead,
    W: Write,
{
    let mut alive = engine.init()?;
    engine.write_result(output)?;
    writeln!(output)?;

    let mut lines = input.lines();
    while alive {
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let line = line.trim_end_matches('\r');
        match engine.exec(line.as_bytes()) {
            Ok(more) => alive = more,
            Err(EngineError::VM(e @ VMError::InvalidInput(_))) => {
                writeln!(output, "{}", e)?;
            }
            Err(e) => return Err(e),
        }
        engine.write_result(output)?;
        writeln!(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::assemble_to_vec;
    use crate::storage::InMemoryStorage;
    use crate::vm::FLAG_TERMINATE;

    fn put(store: &mut InMemoryStorage, data_type: DataType, name: &str, value: &str) {
        store
            .put(&StorageKey::new(data_type, name), value.as_bytes().to_vec())
            .unwrap();
    }

    fn node(store: &mut InMemoryStorage, name: &str, source: &str, template: &str) {
        let code = assemble_to_vec(source).unwrap();
        store.put(&StorageKey::new(DataType::Bin, name), code).unwrap();
        put(store, DataType::Template, name, template);
    }

    fn fixture() -> InMemoryStorage {
        let mut store = InMemoryStorage::new();
        node(
            &mut store,
            "root",
            "MOUT 1 \"do the foo\"\nMOUT 2 \"go to the bar\"\nHALT\nINCMP 1 foo\nINCMP 2 bar\n",
            "hello world",
        );
        node(
            &mut store,
            "foo",
            "MOUT 0 \"to foo\"\nMOUT 1 \"go bar\"\nLOAD inky 20\nHALT\nINCMP 0 _\nINCMP 1 baz\n",
            "this is in foo",
        );
        node(&mut store, "bar", "LOAD pinky 0\nHALT\nINCMP * ^\n", "this is bar");
        node(&mut store, "baz", "MAP inky\nHALT\n", "baz uses {{.inky}}");
        node(
            &mut store,
            "_catch",
            "MOUT 0 \"back\"\nHALT\nINCMP * _\n",
            "invalid input",
        );
        put(&mut store, DataType::StaticLoad, "inky", "one");
        put(&mut store, DataType::StaticLoad, "pinky", "two");
        store
    }

    fn engine() -> Engine<InMemoryStorage> {
        Engine::new(Config::default(), fixture()).unwrap()
    }

    #[test]
    fn test_init_renders_root() {
        let mut en = engine();
        assert!(en.init().unwrap());
        assert_eq!(en.state().current(), Some("root"));
        assert_eq!(en.render().unwrap(), "hello world\n1:do the foo\n2:go to the bar");
        // a second init is a no-op
        assert!(en.init().unwrap());
        assert_eq!(en.state().moves(), 1);
    }

    #[test]
    fn test_walk_down_and_up() {
        let mut en = engine();
        en.init().unwrap();
        assert!(en.exec(b"1").unwrap());
        assert_eq!(en.state().current(), Some("foo"));
        assert_eq!(en.state().symbols().get("inky"), Some("one"));
        assert_eq!(en.render().unwrap(), "this is in foo\n0:to foo\n1:go bar");

        assert!(en.exec(b"0").unwrap());
        assert_eq!(en.state().current(), Some("root"));
    }

    #[test]
    fn test_input_does_not_outlive_its_turn() {
        let mut en = engine();
        en.init().unwrap();
        assert!(en.state().waiting());
        assert!(!en.state().has_input());

        en.exec(b"2").unwrap();
        assert_eq!(en.state().current(), Some("bar"));
        assert!(en.state().input().is_empty());
        assert!(!en.state().has_input());
        assert!(en.state().waiting());

        // bar's wildcard sees only the next input
        en.exec(b"1").unwrap();
        assert_eq!(en.state().current(), Some("root"));
    }

    #[test]
    fn test_any_input_returns_to_top() {
        let mut en = engine();
        en.init().unwrap();
        en.exec(b"2").unwrap();
        assert_eq!(en.state().current(), Some("bar"));
        assert!(en.exec(b"whatever").unwrap());
        assert_eq!(en.state().current(), Some("root"));
        assert_eq!(en.state().depth(), 1);
    }

    #[test]
    fn test_leaf_node_ends_session() {
        let mut en = engine();
        en.init().unwrap();
        en.exec(b"1").unwrap();
        assert!(!en.exec(b"1").unwrap());
        assert_eq!(en.state().current(), Some("baz"));
        assert_eq!(en.render().unwrap(), "baz uses one");
        assert!(matches!(en.exec(b"1"), Err(EngineError::SessionEnded)));
    }

    #[test]
    fn test_unmatched_input_goes_to_catch() {
        let mut en = engine();
        en.init().unwrap();
        assert!(en.exec(b"9").unwrap());
        assert_eq!(en.state().current(), Some("_catch"));
        assert_eq!(en.render().unwrap(), "invalid input\n0:back");
        en.exec(b"0").unwrap();
        assert_eq!(en.state().current(), Some("root"));
    }

    #[test]
    fn test_unmatched_input_without_catch_reloads() {
        let mut store = fixture();
        store.remove(&StorageKey::new(DataType::Bin, "_catch")).unwrap();
        let mut en = Engine::new(Config::default(), store).unwrap();
        en.init().unwrap();
        assert!(en.exec(b"9").unwrap());
        assert_eq!(en.state().current(), Some("root"));
        assert_eq!(en.render().unwrap(), "hello world\n1:do the foo\n2:go to the bar");
    }

    #[test]
    fn test_invalid_input_keeps_state() {
        let mut en = engine();
        en.init().unwrap();
        let before = en.state().clone();
        assert!(matches!(
            en.exec(b"\x01bad"),
            Err(EngineError::VM(VMError::InvalidInput(_)))
        ));
        assert_eq!(en.state(), &before);
    }

    #[test]
    fn test_failed_turn_restores_snapshot() {
        let mut store = fixture();
        node(&mut store, "root", "HALT\nINCMP 1 broken\n", "root");
        node(&mut store, "broken", "MOVE deeper\n", "broken");
        let mut en = Engine::new(Config::default(), store).unwrap();
        en.init().unwrap();
        let before = en.state().clone();
        let err = en.exec(b"1").unwrap_err();
        assert!(matches!(err, EngineError::Storage(StorageError::NotFound { .. })));
        assert_eq!(en.state(), &before);
    }

    #[test]
    fn test_reload_limit() {
        let mut store = fixture();
        node(&mut store, "root", "MOVE loop\n", "root");
        node(&mut store, "loop", "MOVE loop\n", "loop");
        let err = Engine::new(Config::default(), store).unwrap().init().unwrap_err();
        assert!(matches!(err, EngineError::ReloadLimit(16)));
    }

    #[test]
    fn test_terminate_flag_ends_session() {
        let mut store = fixture();
        node(&mut store, "root", "HALT\nINCMP 1 quit\n", "root");
        node(&mut store, "quit", "LOAD bye 0\nMAP bye\nHALT\nINCMP * ^\n", "{{.bye}}");
        let mut en = Engine::new(Config::default(), store).unwrap();
        en.register("bye", |_, _| {
            Ok(Resolved::new("quitter!").with_flag_set(FLAG_TERMINATE))
        });
        en.init().unwrap();
        assert!(!en.exec(b"1").unwrap());
        assert!(en.state().terminated());
        assert!(en.state().code().is_empty());
    }

    #[test]
    fn test_session_resumes_from_storage() {
        let config = Config {
            session_id: "abc".to_string(),
            ..Config::default()
        };
        let mut en = Engine::new(config.clone(), fixture()).unwrap();
        en.init().unwrap();
        en.exec(b"1").unwrap();
        let store = en.finish().unwrap();
        assert!(store
            .contains(&StorageKey::new(DataType::State, "session").with_session("abc"))
            .unwrap());

        let mut en = Engine::new(config, store).unwrap();
        assert_eq!(en.state().current(), Some("foo"));
        assert_eq!(en.render().unwrap(), "this is in foo\n0:to foo\n1:go bar");
        en.exec(b"1").unwrap();
        assert_eq!(en.state().current(), Some("baz"));
    }

    #[test]
    fn test_run_loop() {
        let mut en = engine();
        let mut out = Vec::new();
        run_loop(&mut en, &b"1\n1\n"[..], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "hello world\n1:do the foo\n2:go to the bar\nthis is in foo\n0:to foo\n1:go bar\nbaz uses one\n"
        );
    }
}
