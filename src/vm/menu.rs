//! Pending output collected while a node's code runs
//!
//! MOUT, MNEXT and MPREV append menu items here and MAP marks symbols
//! visible to rendering. The renderer consumes the whole set once per turn.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuKind {
    /// Ordinary choice from MOUT
    Choice,
    /// Next-page choice from MNEXT
    Next,
    /// Previous-page choice from MPREV
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub kind: MenuKind,
    pub selector: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOutput {
    items: Vec<MenuItem>,
    mapped: Vec<String>,
}

impl PendingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: MenuKind, selector: &str, text: &str) {
        self.items.push(MenuItem {
            kind,
            selector: selector.to_string(),
            text: text.to_string(),
        });
    }

    /// Mark a symbol visible to rendering; mapping twice is harmless
    pub fn map(&mut self, sym: &str) {
        if !self.is_mapped(sym) {
            self.mapped.push(sym.to_string());
        }
    }

    pub fn is_mapped(&self, sym: &str) -> bool {
        self.mapped.iter().any(|m| m == sym)
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn mapped(&self) -> &[String] {
        &self.mapped
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.mapped.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.mapped.clear();
    }
}
