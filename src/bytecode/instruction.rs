//! Decoded instructions
//!
//! `Instruction` carries typed operands per opcode family. Its `Display`
//! impl is the disassembly syntax, which the assembler accepts back.

use super::Opcode;
use std::fmt;

/// A single VM instruction with its operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Noop,

    /// Push `target` and end the run if flag `flag` (xor `invert`) is set
    Catch {
        target: String,
        flag: u32,
        invert: bool,
    },

    /// Reset to root and end the run if flag `flag` (xor `invert`) is set
    Croak { flag: u32, invert: bool },

    /// Resolve `sym` into the symbol table, bounded to `size` bytes (0 = unbounded)
    Load { sym: String, size: u32 },

    Reload { sym: String },

    Map { sym: String },

    Move { sym: String },

    Halt,

    /// Move to `target` if the input equals `selector`
    InCmp { selector: String, target: String },

    MOut { selector: String, text: String },

    MNext { selector: String, text: String },

    MPrev { selector: String, text: String },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Noop => Opcode::Noop,
            Instruction::Catch { .. } => Opcode::Catch,
            Instruction::Croak { .. } => Opcode::Croak,
            Instruction::Load { .. } => Opcode::Load,
            Instruction::Reload { .. } => Opcode::Reload,
            Instruction::Map { .. } => Opcode::Map,
            Instruction::Move { .. } => Opcode::Move,
            Instruction::Halt => Opcode::Halt,
            Instruction::InCmp { .. } => Opcode::InCmp,
            Instruction::MOut { .. } => Opcode::MOut,
            Instruction::MNext { .. } => Opcode::MNext,
            Instruction::MPrev { .. } => Opcode::MPrev,
        }
    }
}

/// Quote display text so that the assembler reads it back unchanged
fn quote(text: &str) -> String {
    let delim = if text.contains('"') && !text.contains('\'') {
        '\''
    } else {
        '"'
    };
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(delim);
    for c in text.chars() {
        if c == delim || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push(delim);
    quoted
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            Instruction::Noop | Instruction::Halt => write!(f, "{}", op),
            Instruction::Catch {
                target,
                flag,
                invert,
            } => write!(
                f,
                "{} {} {} {} # invertmatch={}",
                op, target, flag, *invert as u8, invert
            ),
            Instruction::Croak { flag, invert } => write!(
                f,
                "{} {} {} # invertmatch={}",
                op, flag, *invert as u8, invert
            ),
            Instruction::Load { sym, size } => write!(f, "{} {} {}", op, sym, size),
            Instruction::Reload { sym } | Instruction::Map { sym } | Instruction::Move { sym } => {
                write!(f, "{} {}", op, sym)
            }
            Instruction::InCmp { selector, target } => {
                write!(f, "{} {} {}", op, selector, target)
            }
            Instruction::MOut { selector, text }
            | Instruction::MNext { selector, text }
            | Instruction::MPrev { selector, text } => {
                write!(f, "{} {} {}", op, selector, quote(text))
            }
        }
    }
}
