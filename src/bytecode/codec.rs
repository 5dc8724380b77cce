//! Field primitives and whole-instruction encode/decode
//!
//! Every operand goes through the `write_*` / `Reader::read_*` pairs below
//! so the wire format lives in one place.

use super::{BytecodeError, Instruction, OperandFamily, Opcode, MAX_NUMBER_WIDTH, MAX_SYMBOL_LEN};
use log::trace;

/// Minimal big-endian width of `value`, never less than one byte
pub fn number_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

pub fn write_opcode(out: &mut Vec<u8>, op: Opcode) {
    out.extend_from_slice(&op.code().to_be_bytes());
}

pub fn write_sym(out: &mut Vec<u8>, sym: &str) -> Result<(), BytecodeError> {
    let len = sym.len();
    if len > MAX_SYMBOL_LEN {
        return Err(BytecodeError::SymbolTooLong(len));
    }
    out.push(len as u8);
    out.extend_from_slice(sym.as_bytes());
    Ok(())
}

pub fn write_number(out: &mut Vec<u8>, value: u64) -> Result<(), BytecodeError> {
    let width = number_width(value);
    if width > MAX_NUMBER_WIDTH {
        return Err(BytecodeError::NumberTooLarge(value));
    }
    out.push(width as u8);
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    Ok(())
}

pub fn write_flag(out: &mut Vec<u8>, flag: u8) {
    out.push(flag);
}

/// Cursor over a bytecode buffer
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BytecodeError> {
        let available = self.buf.len() - self.pos;
        if n > available {
            return Err(BytecodeError::Truncated {
                needed: n,
                available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16, BytecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_opcode(&mut self) -> Result<Opcode, BytecodeError> {
        Opcode::try_from(self.read_u16()?)
    }

    pub fn read_sym(&mut self) -> Result<String, BytecodeError> {
        let len = self.take(1)?[0] as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BytecodeError::InvalidUtf8)
    }

    pub fn read_number(&mut self) -> Result<u32, BytecodeError> {
        let width = self.take(1)?[0];
        if width == 0 || width as usize > MAX_NUMBER_WIDTH {
            return Err(BytecodeError::InvalidNumberWidth(width));
        }
        let bytes = self.take(width as usize)?;
        Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
    }

    pub fn read_flag(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.take(1)?[0])
    }
}

impl Instruction {
    /// Append the encoded instruction to `out`, returning the bytes written.
    ///
    /// Fields are encoded into a scratch buffer first; on error `out` is
    /// left exactly as it was.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<usize, BytecodeError> {
        let mut scratch = Vec::with_capacity(16);
        write_opcode(&mut scratch, self.opcode());
        match self {
            Instruction::Noop | Instruction::Halt => {}
            Instruction::Catch {
                target,
                flag,
                invert,
            } => {
                write_sym(&mut scratch, target)?;
                write_number(&mut scratch, u64::from(*flag))?;
                write_flag(&mut scratch, u8::from(*invert));
            }
            Instruction::Croak { flag, invert } => {
                write_number(&mut scratch, u64::from(*flag))?;
                write_flag(&mut scratch, u8::from(*invert));
            }
            Instruction::Load { sym, size } => {
                write_sym(&mut scratch, sym)?;
                write_number(&mut scratch, u64::from(*size))?;
            }
            Instruction::Reload { sym } | Instruction::Map { sym } | Instruction::Move { sym } => {
                write_sym(&mut scratch, sym)?;
            }
            Instruction::InCmp { selector, target } => {
                write_sym(&mut scratch, selector)?;
                write_sym(&mut scratch, target)?;
            }
            Instruction::MOut { selector, text }
            | Instruction::MNext { selector, text }
            | Instruction::MPrev { selector, text } => {
                write_sym(&mut scratch, selector)?;
                write_sym(&mut scratch, text)?;
            }
        }
        out.extend_from_slice(&scratch);
        Ok(scratch.len())
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, BytecodeError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode the instruction at the head of `code`, returning it with the
    /// bytes that follow it.
    pub fn decode(code: &[u8]) -> Result<(Instruction, &[u8]), BytecodeError> {
        let mut r = Reader::new(code);
        let op = r.read_opcode()?;
        let instruction = match op.family() {
            OperandFamily::None => match op {
                Opcode::Halt => Instruction::Halt,
                _ => Instruction::Noop,
            },
            OperandFamily::NameOnly => {
                let sym = r.read_sym()?;
                match op {
                    Opcode::Map => Instruction::Map { sym },
                    Opcode::Reload => Instruction::Reload { sym },
                    _ => Instruction::Move { sym },
                }
            }
            OperandFamily::Sized => {
                let sym = r.read_sym()?;
                let size = r.read_number()?;
                Instruction::Load { sym, size }
            }
            OperandFamily::SignalWithSymbol => {
                let target = r.read_sym()?;
                let flag = r.read_number()?;
                let invert = r.read_flag()? != 0;
                Instruction::Catch {
                    target,
                    flag,
                    invert,
                }
            }
            OperandFamily::Signal => {
                let flag = r.read_number()?;
                let invert = r.read_flag()? != 0;
                Instruction::Croak { flag, invert }
            }
            OperandFamily::TwoSymbol => {
                let selector = r.read_sym()?;
                let target = r.read_sym()?;
                Instruction::InCmp { selector, target }
            }
            OperandFamily::Description => {
                let selector = r.read_sym()?;
                let text = r.read_sym()?;
                match op {
                    Opcode::MNext => Instruction::MNext { selector, text },
                    Opcode::MPrev => Instruction::MPrev { selector, text },
                    _ => Instruction::MOut { selector, text },
                }
            }
        };
        trace!("decoded {} ({} bytes left)", instruction, r.rest().len());
        Ok((instruction, r.rest()))
    }
}

/// Decode a whole buffer into its instruction list
pub fn decode_all(mut code: &[u8]) -> Result<Vec<Instruction>, BytecodeError> {
    let mut instructions = Vec::new();
    while !code.is_empty() {
        let (instruction, rest) = Instruction::decode(code)?;
        instructions.push(instruction);
        code = rest;
    }
    Ok(instructions)
}
