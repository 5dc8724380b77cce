//! Assembler for the menu VM mini-language
//!
//! One instruction per line:
//!
//! ```text
//! LOAD user_name 32       # comment
//! MAP user_name
//! MOUT 1 "do the foo"
//! HALT
//! INCMP 1 foo
//! ```
//!
//! Assembly runs in two phases. [`parse`] turns the whole source into
//! [`SourceLine`]s and reports syntax errors before any byte is produced.
//! [`assemble`] then lowers line by line and writes each instruction to the
//! output as soon as it is encoded, so a lowering error leaves the bytes of
//! earlier lines in the sink. Callers discard a failed unit as a whole.
//!
//! Menu lines (`DOWN`, `UP`, `NEXT`, `PREVIOUS`, or a line starting with a
//! lowercase node name) are collected by the [`Batcher`] and written as one
//! block when the next real instruction or the end of input is reached.

use std::io::Write;

use log::debug;
use thiserror::Error;

use crate::bytecode::BytecodeError;

pub mod batcher;
pub mod common;
pub mod line_parser;
pub mod lower;

pub use batcher::{BatchKind, Batcher, MenuEntry};
pub use line_parser::{parse_line, Args, LineOp, SourceLine, Token};
pub use lower::lower_instruction;

/// Errors that can occur while assembling source text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerError {
    /// Uppercase mnemonic missing from the opcode table
    #[error("Unknown opcode: {0} at line {1}, column {2}")]
    UnknownOpcode(String, usize, usize),

    /// Token that fits no remaining argument slot
    #[error("Unexpected token: {0} at line {1}, column {2}")]
    UnexpectedToken(String, usize, usize),

    /// Quoted description without a closing quote
    #[error("Unterminated quote at line {0}, column {1}")]
    UnterminatedQuote(usize, usize),

    /// Number that does not parse
    #[error("Invalid number: {0} at line {1}, column {2}")]
    InvalidNumber(String, usize, usize),

    /// Arguments whose shape does not fit the opcode
    #[error("Operands do not fit {0}: got {1} at line {2}")]
    OperandMismatch(String, String, usize),

    /// Flag byte above 255
    #[error("Flag value {0} does not fit a byte at line {1}")]
    InvalidFlag(u64, usize),

    /// Menu line without a destination node
    #[error("Missing target for {0} at line {1}")]
    MissingTarget(String, usize),

    /// Menu line without a selector
    #[error("Missing selector for {0} at line {1}")]
    MissingSelector(String, usize),

    /// Menu line without display text
    #[error("Missing description for {0} at line {1}")]
    MissingDescription(String, usize),

    /// Field rejected by the codec
    #[error("Encoding error at line {line}: {source}")]
    Encode { line: usize, source: BytecodeError },

    /// The output sink failed
    #[error("Output error: {0}")]
    OutputError(String),
}

/// Source position information for error reporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Parse the whole source. Blank and comment-only lines are dropped.
pub fn parse(source: &str) -> Result<Vec<SourceLine>, CompilerError> {
    let mut lines = Vec::new();
    for (idx, text) in source.lines().enumerate() {
        if let Some(line) = parse_line(text, SourcePosition::new(idx + 1, 1))? {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn emit<W: Write>(w: &mut W, bytes: &[u8]) -> Result<usize, CompilerError> {
    w.write_all(bytes)
        .map_err(|e| CompilerError::OutputError(e.to_string()))?;
    Ok(bytes.len())
}

/// Assemble `source` into `w`, returning the number of bytes written.
pub fn assemble<W: Write>(source: &str, w: &mut W) -> Result<usize, CompilerError> {
    let lines = parse(source)?;
    let mut batcher = Batcher::new();
    let mut written = 0;

    for line in &lines {
        match &line.op {
            LineOp::Batch { kind, target } => {
                batcher.add(*kind, target.as_deref(), &line.args, line.pos.line)?;
            }
            LineOp::Instruction(op) => {
                written += emit(w, &batcher.flush()?)?;
                let instruction = lower_instruction(*op, &line.args, line.pos.line)?;
                let mut bytes = Vec::new();
                instruction
                    .encode(&mut bytes)
                    .map_err(|source| CompilerError::Encode {
                        line: line.pos.line,
                        source,
                    })?;
                debug!("line {}: {} ({} bytes)", line.pos.line, instruction, bytes.len());
                written += emit(w, &bytes)?;
            }
        }
    }
    written += emit(w, &batcher.flush()?)?;
    Ok(written)
}

/// Assemble into a fresh buffer
pub fn assemble_to_vec(source: &str) -> Result<Vec<u8>, CompilerError> {
    let mut out = Vec::new();
    assemble(source, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{decode_all, disassemble, Instruction};

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let lines = parse("# header\n\n   \nHALT # done\n").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].pos.line, 4);
    }

    #[test]
    fn test_assemble_root_node() {
        let source = r#"
MOUT 1 "do the foo"
MOUT 2 "go to the bar"
HALT
INCMP 1 foo
INCMP 2 bar
"#;
        let code = assemble_to_vec(source).unwrap();
        assert_eq!(
            decode_all(&code).unwrap(),
            vec![
                Instruction::MOut {
                    selector: s("1"),
                    text: s("do the foo")
                },
                Instruction::MOut {
                    selector: s("2"),
                    text: s("go to the bar")
                },
                Instruction::Halt,
                Instruction::InCmp {
                    selector: s("1"),
                    target: s("foo")
                },
                Instruction::InCmp {
                    selector: s("2"),
                    target: s("bar")
                },
            ]
        );
    }

    #[test]
    fn test_disassembly_reassembles() {
        let source = "CATCH xyzzy 13 1\nCROAK 13 0\nLOAD foo 10\nRELOAD foo\nMAP foo\nMOVE bar\nINCMP * ^\nMNEXT 00 \"more\"\nHALT\n";
        let code = assemble_to_vec(source).unwrap();
        let listing = disassemble(&code).unwrap();
        assert_eq!(assemble_to_vec(&listing).unwrap(), code);
    }

    #[test]
    fn test_syntax_error_writes_nothing() {
        let mut out = Vec::new();
        let err = assemble("MOVE foo\nFOO bar\n", &mut out).unwrap_err();
        assert_eq!(err, CompilerError::UnknownOpcode(s("FOO"), 2, 1));
        assert!(out.is_empty());
    }

    #[test]
    fn test_lowering_error_keeps_prefix() {
        let mut out = Vec::new();
        let source = format!("MOVE foo\nMOVE {}\n", "x".repeat(256));
        let err = assemble(&source, &mut out).unwrap_err();
        assert_eq!(
            err,
            CompilerError::Encode {
                line: 2,
                source: BytecodeError::SymbolTooLong(256)
            }
        );
        assert_eq!(
            out,
            Instruction::Move { sym: s("foo") }.to_bytes().unwrap()
        );
    }

    #[test]
    fn test_number_too_large() {
        let err = assemble_to_vec("LOAD foo 4294967296").unwrap_err();
        assert_eq!(
            err,
            CompilerError::Encode {
                line: 1,
                source: BytecodeError::NumberTooLarge(4294967296)
            }
        );
        assert!(assemble_to_vec("LOAD foo 4294967295").is_ok());
    }

    #[test]
    fn test_batch_flushes_before_next_instruction() {
        let source = r#"
LOAD inky 20
DOWN foo 1 "do the foo"
UP 0 "back"
MOVE after
"#;
        let code = assemble_to_vec(source).unwrap();
        let listing = disassemble(&code).unwrap();
        assert_eq!(
            listing,
            "LOAD inky 20\nMOUT 1 \"do the foo\"\nMOUT 0 \"back\"\nHALT\nINCMP 1 foo\nINCMP 0 _\nMOVE after\n"
        );
    }
}
