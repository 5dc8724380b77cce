//! Instruction codec for the menu VM
//!
//! This module defines the binary form every program takes between the
//! assembler and the execution engine:
//!
//! - `Opcode`: the fixed opcode table and operand families
//! - `Instruction`: a decoded instruction with typed operands
//! - `codec`: big-endian field primitives and whole-instruction encode/decode
//! - `disassemble`: renders bytecode back to assembler text
//!
//! Layout, big-endian with no padding: a 2-byte opcode followed by the
//! operand fields of its family. Symbols carry a 1-byte length prefix,
//! numbers a 1-byte width prefix (1 to 4) and flags are a single raw byte.

pub mod codec;
pub mod disasm;
pub mod instruction;
pub mod opcode;

pub use codec::{decode_all, Reader};
pub use disasm::disassemble;
pub use instruction::Instruction;
pub use opcode::{OperandFamily, Opcode, OPCODE_TABLE};

use thiserror::Error;

/// Longest symbol or text field the codec can carry
pub const MAX_SYMBOL_LEN: usize = 255;

/// Widest numeric field the codec can carry, in bytes
pub const MAX_NUMBER_WIDTH: usize = 4;

/// Errors raised while encoding or decoding instructions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BytecodeError {
    /// Symbol or text field longer than the length prefix can express
    #[error("Symbol too long: {0} bytes (max 255)")]
    SymbolTooLong(usize),

    /// Numeric value that needs more than four bytes
    #[error("Number too large: {0} does not fit in 4 bytes")]
    NumberTooLarge(u64),

    /// Buffer ended before a field was complete
    #[error("Truncated bytecode: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Two-byte code with no entry in the opcode table
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u16),

    /// Numeric width prefix outside 1..=4
    #[error("Invalid number width: {0}")]
    InvalidNumberWidth(u8),

    /// Symbol bytes that are not valid UTF-8
    #[error("Symbol is not valid UTF-8")]
    InvalidUtf8,
}
