//! Opcode table
//!
//! The mapping between mnemonics and two-byte codes is a constant table.
//! The assembler and the engine both read it; nothing registers opcodes
//! at runtime.

use super::BytecodeError;
use std::fmt;

/// Instruction kinds understood by the VM
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Does nothing
    Noop = 0,
    /// Move to a node when a flag matches, ending the run
    Catch = 1,
    /// Return to root when a flag matches, ending the run
    Croak = 2,
    /// Resolve a symbol into the symbol table
    Load = 3,
    /// Re-resolve a loaded symbol
    Reload = 4,
    /// Expose a loaded symbol to rendering
    Map = 5,
    /// Push a node onto the position stack
    Move = 6,
    /// Suspend until the next input
    Halt = 7,
    /// Compare input against a selector and move on match
    InCmp = 8,
    /// Add a menu choice to the pending output
    MOut = 10,
    /// Add a next-page choice to the pending output
    MNext = 11,
    /// Add a previous-page choice to the pending output
    MPrev = 12,
}

/// Operand layout shared by a group of opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFamily {
    /// No operands
    None,
    /// One symbol
    NameOnly,
    /// Symbol, then number
    Sized,
    /// Symbol, number, flag byte
    SignalWithSymbol,
    /// Number, flag byte
    Signal,
    /// Selector symbol, then target symbol
    TwoSymbol,
    /// Selector symbol, then display text
    Description,
}

/// Every registered opcode with its mnemonic
pub const OPCODE_TABLE: &[(Opcode, &str)] = &[
    (Opcode::Noop, "NOOP"),
    (Opcode::Catch, "CATCH"),
    (Opcode::Croak, "CROAK"),
    (Opcode::Load, "LOAD"),
    (Opcode::Reload, "RELOAD"),
    (Opcode::Map, "MAP"),
    (Opcode::Move, "MOVE"),
    (Opcode::Halt, "HALT"),
    (Opcode::InCmp, "INCMP"),
    (Opcode::MOut, "MOUT"),
    (Opcode::MNext, "MNEXT"),
    (Opcode::MPrev, "MPREV"),
];

impl Opcode {
    /// Two-byte wire code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Assembler mnemonic
    pub fn mnemonic(self) -> &'static str {
        OPCODE_TABLE
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
            .unwrap_or("NOOP")
    }

    /// Look up an opcode by its exact (uppercase) mnemonic
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        OPCODE_TABLE
            .iter()
            .find(|(_, mnemonic)| *mnemonic == name)
            .map(|(op, _)| *op)
    }

    pub fn family(self) -> OperandFamily {
        match self {
            Opcode::Noop | Opcode::Halt => OperandFamily::None,
            Opcode::Move | Opcode::Map | Opcode::Reload => OperandFamily::NameOnly,
            Opcode::Load => OperandFamily::Sized,
            Opcode::Catch => OperandFamily::SignalWithSymbol,
            Opcode::Croak => OperandFamily::Signal,
            Opcode::InCmp => OperandFamily::TwoSymbol,
            Opcode::MOut | Opcode::MNext | Opcode::MPrev => OperandFamily::Description,
        }
    }
}

impl TryFrom<u16> for Opcode {
    type Error = BytecodeError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        OPCODE_TABLE
            .iter()
            .map(|(op, _)| *op)
            .find(|op| op.code() == code)
            .ok_or(BytecodeError::UnknownOpcode(code))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_consistent() {
        for (op, name) in OPCODE_TABLE {
            assert_eq!(Opcode::from_mnemonic(name), Some(*op));
            assert_eq!(Opcode::try_from(op.code()), Ok(*op));
            assert_eq!(op.mnemonic(), *name);
        }
    }

    #[test]
    fn test_gap_in_codes_is_unknown() {
        assert_eq!(Opcode::try_from(9), Err(BytecodeError::UnknownOpcode(9)));
        assert_eq!(Opcode::try_from(0x0100), Err(BytecodeError::UnknownOpcode(256)));
    }

    #[test]
    fn test_mnemonics_are_case_sensitive() {
        assert_eq!(Opcode::from_mnemonic("HALT"), Some(Opcode::Halt));
        assert_eq!(Opcode::from_mnemonic("halt"), None);
        assert_eq!(Opcode::from_mnemonic("MSINK"), None);
    }

    #[test]
    fn test_families() {
        assert_eq!(Opcode::InCmp.family(), OperandFamily::TwoSymbol);
        assert_eq!(Opcode::Croak.family(), OperandFamily::Signal);
        assert_eq!(Opcode::MPrev.family(), OperandFamily::Description);
    }
}
