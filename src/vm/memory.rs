//! Symbol table
//!
//! Flat name -> value storage populated by LOAD and RELOAD. Each entry keeps
//! the byte size it was declared with; the table as a whole may be bounded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vm::errors::VMError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub value: String,
    /// Declared maximum size in bytes, 0 for unbounded
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
    /// Total bytes allowed across all values, 0 for unbounded
    capacity: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Bytes currently held by all values
    pub fn used(&self) -> usize {
        self.entries.values().map(|e| e.value.len()).sum()
    }

    fn check_capacity(&self, sym: &str, requested: usize, freed: usize) -> Result<(), VMError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let available = self.capacity - (self.used() - freed).min(self.capacity);
        if requested > available {
            return Err(VMError::CapacityExceeded {
                sym: sym.to_string(),
                requested,
                available,
            });
        }
        Ok(())
    }

    fn check_size(sym: &str, value: &str, size: u32) -> Result<(), VMError> {
        if size > 0 && value.len() > size as usize {
            return Err(VMError::ValueTooLarge {
                sym: sym.to_string(),
                size,
                len: value.len(),
            });
        }
        Ok(())
    }

    /// Add a new symbol. Returns `false` without touching the table when
    /// the symbol is already present.
    pub fn add(&mut self, sym: &str, value: String, size: u32) -> Result<bool, VMError> {
        if self.entries.contains_key(sym) {
            return Ok(false);
        }
        Self::check_size(sym, &value, size)?;
        self.check_capacity(sym, value.len(), 0)?;
        self.entries
            .insert(sym.to_string(), SymbolEntry { value, size });
        Ok(true)
    }

    /// Replace the value of an existing symbol, keeping its declared size
    pub fn update(&mut self, sym: &str, value: String) -> Result<(), VMError> {
        let entry = self
            .entries
            .get(sym)
            .ok_or_else(|| VMError::VariableNotFound(sym.to_string()))?;
        Self::check_size(sym, &value, entry.size)?;
        self.check_capacity(sym, value.len(), entry.value.len())?;
        if let Some(entry) = self.entries.get_mut(sym) {
            entry.value = value;
        }
        Ok(())
    }

    pub fn get(&self, sym: &str) -> Option<&str> {
        self.entries.get(sym).map(|e| e.value.as_str())
    }

    /// Look up a symbol, failing if it was never loaded
    pub fn load(&self, sym: &str) -> Result<&SymbolEntry, VMError> {
        self.entries
            .get(sym)
            .ok_or_else(|| VMError::VariableNotFound(sym.to_string()))
    }

    pub fn contains(&self, sym: &str) -> bool {
        self.entries.contains_key(sym)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format the table for display, sorted by name
    pub fn format_memory(&self) -> String {
        if self.entries.is_empty() {
            return "Symbols: {}".to_string();
        }
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        let items: Vec<String> = names
            .into_iter()
            .map(|name| format!("{}: {:?}", name, self.entries[name].value))
            .collect();
        format!("Symbols: {{{}}}", items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut table = SymbolTable::new();
        assert!(table.add("inky", "one".to_string(), 10).unwrap());
        assert_eq!(table.get("inky"), Some("one"));
        assert_eq!(table.load("inky").unwrap().size, 10);
    }

    #[test]
    fn test_add_existing_keeps_value() {
        let mut table = SymbolTable::new();
        table.add("inky", "one".to_string(), 0).unwrap();
        assert!(!table.add("inky", "two".to_string(), 0).unwrap());
        assert_eq!(table.get("inky"), Some("one"));
    }

    #[test]
    fn test_size_bound() {
        let mut table = SymbolTable::new();
        let result = table.add("inky", "toolong".to_string(), 3);
        assert!(matches!(result, Err(VMError::ValueTooLarge { size: 3, len: 7, .. })));
        assert!(!table.contains("inky"));

        table.add("pinky", "abc".to_string(), 3).unwrap();
        assert!(table.update("pinky", "abcd".to_string()).is_err());
        assert_eq!(table.get("pinky"), Some("abc"));
    }

    #[test]
    fn test_update_missing() {
        let mut table = SymbolTable::new();
        let result = table.update("nope", "x".to_string());
        assert_eq!(result, Err(VMError::VariableNotFound("nope".to_string())));
    }

    #[test]
    fn test_capacity() {
        let mut table = SymbolTable::with_capacity(8);
        table.add("a", "12345".to_string(), 0).unwrap();
        let result = table.add("b", "1234".to_string(), 0);
        assert!(matches!(
            result,
            Err(VMError::CapacityExceeded { requested: 4, available: 3, .. })
        ));
        // replacing a value frees its old bytes first
        table.update("a", "12345678".to_string()).unwrap();
        assert_eq!(table.used(), 8);
    }

    #[test]
    fn test_format_memory() {
        let mut table = SymbolTable::new();
        assert_eq!(table.format_memory(), "Symbols: {}");
        table.add("b", "2".to_string(), 0).unwrap();
        table.add("a", "1".to_string(), 0).unwrap();
        assert_eq!(table.format_memory(), "Symbols: {a: \"1\", b: \"2\"}");
    }
}
