//! Resolution collaborator contract
//!
//! LOAD and RELOAD ask a `Resolver` for a symbol's value. A resolver never
//! touches the navigation state; it may instead ask for flags to be set or
//! cleared, and the VM applies those requests after a successful resolve.

use std::collections::HashMap;

use crate::vm::errors::ResolveError;

/// Value produced for a symbol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub content: String,
    /// Flags the VM should set after storing the value
    pub flag_set: Vec<u32>,
    /// Flags the VM should clear after storing the value
    pub flag_reset: Vec<u32>,
}

impl Resolved {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_flag_set(mut self, flag: u32) -> Self {
        self.flag_set.push(flag);
        self
    }

    pub fn with_flag_reset(mut self, flag: u32) -> Self {
        self.flag_reset.push(flag);
        self
    }
}

/// Supplies values for LOAD and RELOAD by symbol name
pub trait Resolver {
    /// Produce the value of `sym`. `input` is the raw input of the current turn.
    fn resolve(&self, sym: &str, input: &[u8]) -> Result<Resolved, ResolveError>;
}

/// Boxed resolver callback
pub type ResolveFn = Box<dyn Fn(&str, &[u8]) -> Result<Resolved, ResolveError>>;

/// Resolver backed by registered closures
#[derive(Default)]
pub struct FuncResolver {
    funcs: HashMap<String, ResolveFn>,
}

impl FuncResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, sym: &str, f: F)
    where
        F: Fn(&str, &[u8]) -> Result<Resolved, ResolveError> + 'static,
    {
        self.funcs.insert(sym.to_string(), Box::new(f));
    }

    pub fn contains(&self, sym: &str) -> bool {
        self.funcs.contains_key(sym)
    }
}

impl Resolver for FuncResolver {
    fn resolve(&self, sym: &str, input: &[u8]) -> Result<Resolved, ResolveError> {
        let f = self
            .funcs
            .get(sym)
            .ok_or_else(|| ResolveError::NoResolver(sym.to_string()))?;
        f(sym, input)
    }
}

impl std::fmt::Debug for FuncResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.funcs.keys().collect();
        names.sort();
        f.debug_struct("FuncResolver").field("funcs", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_function() {
        let mut resolver = FuncResolver::new();
        resolver.register("echo", |_, input| {
            Ok(Resolved::new(String::from_utf8_lossy(input)).with_flag_set(8))
        });
        let resolved = resolver.resolve("echo", b"hi").unwrap();
        assert_eq!(resolved.content, "hi");
        assert_eq!(resolved.flag_set, vec![8]);
    }

    #[test]
    fn test_missing_function() {
        let resolver = FuncResolver::new();
        assert_eq!(
            resolver.resolve("nope", b""),
            Err(ResolveError::NoResolver("nope".to_string()))
        );
    }
}
