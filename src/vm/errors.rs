//! Error types for VM operations
//!
//! This module defines the error conditions raised while running bytecode
//! against a navigation state, and the errors a resolver may report.

use crate::bytecode::BytecodeError;
use thiserror::Error;

/// Errors reported by a resolution collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    /// Nothing is registered for the symbol
    #[error("No resolver registered for symbol: {0}")]
    NoResolver(String),

    /// The resolver ran but could not produce a value
    #[error("Resolving {sym} failed: {reason}")]
    Failed { sym: String, reason: String },
}

/// Error variants that can occur during VM execution
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VMError {
    /// Moving up from an empty position stack
    #[error("Stack underflow during {op_name}")]
    StackUnderflow { op_name: String },

    /// Symbol is not present in the symbol table
    #[error("Symbol not loaded: {0}")]
    VariableNotFound(String),

    /// Flag index outside the register width
    #[error("Flag index {index} out of range (register width {width})")]
    FlagOutOfRange { index: u32, width: u32 },

    /// Stored flag register whose bytes do not match its width
    #[error("Corrupt flag register: {width} flags in {len} bytes")]
    CorruptFlags { width: u32, len: usize },

    /// Malformed or unusable navigation target
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Input matched no classifier pattern
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input longer than the state can hold
    #[error("Input too long: {0} bytes (max 255)")]
    InputTooLong(usize),

    /// Classifier pattern that does not compile
    #[error("Invalid input pattern '{pattern}': {details}")]
    InvalidPattern { pattern: String, details: String },

    /// Resolved value exceeds its declared size
    #[error("Value for {sym} is {len} bytes, declared size is {size}")]
    ValueTooLarge { sym: String, size: u32, len: usize },

    /// Symbol table capacity exhausted
    #[error("Symbol table full: adding {sym} needs {requested} bytes, {available} available")]
    CapacityExceeded {
        sym: String,
        requested: usize,
        available: usize,
    },

    /// Resolution collaborator failure
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Bytecode could not be decoded
    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),
}

/// A failed run, carrying the code that was not executed
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{error} (after {executed} instructions)")]
pub struct RunError {
    /// Code starting at the instruction that failed
    pub remainder: Vec<u8>,
    /// Instructions that completed before the failure
    pub executed: usize,
    #[source]
    pub error: VMError,
}
