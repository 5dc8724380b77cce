//! Bytecode disassembler

use super::{codec::decode_all, BytecodeError};

/// Render bytecode as assembler text, one instruction per line
pub fn disassemble(code: &[u8]) -> Result<String, BytecodeError> {
    let mut result = String::new();
    for instruction in decode_all(code)? {
        result.push_str(&instruction.to_string());
        result.push('\n');
    }
    Ok(result)
}
