//! Lowering of parsed lines to instructions
//!
//! The argument shape is decided first, independent of the opcode, in this
//! order: a description makes a description line, a selector makes a
//! two-symbol line, a number makes a sized line (a signal line when a flag
//! byte follows), a lone symbol makes a name-only line, and nothing at all
//! is a no-operand line. The shape must then fit the opcode's family.

use super::line_parser::{Args, Number};
use super::CompilerError;
use crate::bytecode::{BytecodeError, Instruction, Opcode, OperandFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Description,
    TwoSymbol,
    Sized,
    Signal,
    NameOnly,
    None,
}

fn shape_of(args: &Args) -> Shape {
    if args.desc.is_some() {
        Shape::Description
    } else if args.selector.is_some() {
        Shape::TwoSymbol
    } else if args.size.is_some() {
        if args.flag.is_some() {
            Shape::Signal
        } else {
            Shape::Sized
        }
    } else if args.sym.is_some() {
        Shape::NameOnly
    } else {
        Shape::None
    }
}

fn number_u32(n: &Number, line: usize) -> Result<u32, CompilerError> {
    u32::try_from(n.value).map_err(|_| CompilerError::Encode {
        line,
        source: BytecodeError::NumberTooLarge(n.value),
    })
}

/// Turn one parsed instruction line into an `Instruction`
pub fn lower_instruction(op: Opcode, args: &Args, line: usize) -> Result<Instruction, CompilerError> {
    let mismatch = || CompilerError::OperandMismatch(op.mnemonic().to_string(), args.shape(), line);
    let shape = shape_of(args);

    let instruction = match (op.family(), shape) {
        (OperandFamily::None, Shape::None) => match op {
            Opcode::Halt => Instruction::Halt,
            _ => Instruction::Noop,
        },

        (OperandFamily::NameOnly, Shape::NameOnly) => {
            let sym = args.sym.clone().ok_or_else(mismatch)?;
            match op {
                Opcode::Map => Instruction::Map { sym },
                Opcode::Reload => Instruction::Reload { sym },
                _ => Instruction::Move { sym },
            }
        }

        (OperandFamily::Sized, Shape::Sized) => {
            let sym = args.sym.clone().ok_or_else(mismatch)?;
            let size = number_u32(args.size.as_ref().ok_or_else(mismatch)?, line)?;
            Instruction::Load { sym, size }
        }

        (OperandFamily::SignalWithSymbol, Shape::Signal) | (OperandFamily::Signal, Shape::Signal) => {
            let flag = number_u32(args.size.as_ref().ok_or_else(mismatch)?, line)?;
            let modifier = args.flag.as_ref().ok_or_else(mismatch)?.value;
            if modifier > u64::from(u8::MAX) {
                return Err(CompilerError::InvalidFlag(modifier, line));
            }
            let invert = modifier != 0;
            match (op.family(), &args.sym) {
                (OperandFamily::SignalWithSymbol, Some(target)) => Instruction::Catch {
                    target: target.clone(),
                    flag,
                    invert,
                },
                (OperandFamily::Signal, None) => Instruction::Croak { flag, invert },
                _ => return Err(mismatch()),
            }
        }

        (OperandFamily::TwoSymbol, Shape::TwoSymbol) => {
            let target = args.selector.clone().ok_or_else(mismatch)?;
            let selector = match (&args.size, &args.sym) {
                (Some(n), None) => n.raw.clone(),
                (None, Some(sym)) => sym.clone(),
                _ => return Err(mismatch()),
            };
            if args.flag.is_some() {
                return Err(mismatch());
            }
            Instruction::InCmp { selector, target }
        }

        (OperandFamily::Description, Shape::Description) => {
            let text = args.desc.clone().ok_or_else(mismatch)?;
            let candidates: Vec<String> = args
                .size
                .iter()
                .map(|n| n.raw.clone())
                .chain(args.sym.clone())
                .chain(args.selector.clone())
                .collect();
            if candidates.len() != 1 || args.flag.is_some() {
                return Err(mismatch());
            }
            let selector = candidates[0].clone();
            match op {
                Opcode::MNext => Instruction::MNext { selector, text },
                Opcode::MPrev => Instruction::MPrev { selector, text },
                _ => Instruction::MOut { selector, text },
            }
        }

        _ => return Err(mismatch()),
    };
    Ok(instruction)
}
