//! Content resolution
//!
//! `Resource` is the resolver the engine runs with. LOAD and RELOAD are
//! answered by registered functions first, then by static content kept in
//! storage. It also serves node code, templates and menu labels to the
//! session driver and the renderer.

use log::debug;

use crate::storage::{DataType, StorageBackend, StorageError, StorageExtensions, StorageKey, StorageResult};
use crate::vm::{FuncResolver, ResolveError, Resolved, Resolver};

pub struct Resource<S: StorageBackend> {
    store: S,
    funcs: FuncResolver,
    language: Option<String>,
}

impl<S: StorageBackend> Resource<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            funcs: FuncResolver::new(),
            language: None,
        }
    }

    /// Register a function that answers LOAD/RELOAD for `sym`
    pub fn register<F>(&mut self, sym: &str, f: F)
    where
        F: Fn(&str, &[u8]) -> Result<Resolved, ResolveError> + 'static,
    {
        self.funcs.register(sym, f);
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn content_key(&self, data_type: DataType, name: &str) -> StorageKey {
        StorageKey::new(data_type, name).with_language(self.language.as_deref())
    }

    /// Compiled code of `node`
    pub fn get_code(&self, node: &str) -> StorageResult<Vec<u8>> {
        self.store.get(&StorageKey::new(DataType::Bin, node))
    }

    pub fn has_code(&self, node: &str) -> StorageResult<bool> {
        self.store.contains(&StorageKey::new(DataType::Bin, node))
    }

    /// Display template of `node`, if it has one
    pub fn get_template(&self, node: &str) -> StorageResult<Option<String>> {
        let bytes = self.store.find(&self.content_key(DataType::Template, node))?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    /// Translated menu label, or the label itself when there is no entry
    pub fn get_menu(&self, label: &str) -> StorageResult<String> {
        match self.store.find(&self.content_key(DataType::Menu, label)) {
            Ok(Some(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(None) => Ok(label.to_string()),
            Err(StorageError::InvalidKey { .. }) => Ok(label.to_string()),
            Err(e) => Err(e),
        }
    }
}

impl<S: StorageBackend> Resolver for Resource<S> {
    fn resolve(&self, sym: &str, input: &[u8]) -> Result<Resolved, ResolveError> {
        if self.funcs.contains(sym) {
            return self.funcs.resolve(sym, input);
        }
        match self.store.find(&self.content_key(DataType::StaticLoad, sym)) {
            Ok(Some(bytes)) => {
                debug!("{} resolved from static content", sym);
                Ok(Resolved::new(String::from_utf8_lossy(&bytes)))
            }
            Ok(None) => Err(ResolveError::NoResolver(sym.to_string())),
            Err(e) => Err(ResolveError::Failed {
                sym: sym.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
