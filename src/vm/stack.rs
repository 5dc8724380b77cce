//! Position stack
//!
//! The ordered list of nodes a session has descended through. The bottom
//! element is the root node; the top is the current node.

use crate::vm::errors::VMError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStack {
    nodes: Vec<String>,
}

impl NodeStack {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: &str) {
        self.nodes.push(node.to_string());
    }

    /// Pop the current node
    pub fn pop(&mut self, op_name: &str) -> Result<String, VMError> {
        self.nodes.pop().ok_or_else(|| VMError::StackUnderflow {
            op_name: op_name.to_string(),
        })
    }

    /// Current node, if any
    pub fn top(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }

    /// Drop everything above the root node
    pub fn truncate_to_root(&mut self) {
        self.nodes.truncate(1);
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Format the stack as a path for display
    pub fn format_stack(&self) -> String {
        if self.nodes.is_empty() {
            return "Stack: []".to_string();
        }
        format!("Stack: [{}]", self.nodes.join(" > "))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
