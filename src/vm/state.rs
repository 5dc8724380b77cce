//! Navigation state
//!
//! Everything a session carries between turns: the position stack, the
//! flag register, the move counter, the pagination cursor, the last input,
//! the unexecuted code remainder and the symbol table. The whole struct is
//! serializable so a driver can persist it after every turn.
//!
//! The low eight flags are reserved for the VM and the session driver;
//! user flags start at [`FLAG_USERSTART`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::vm::errors::VMError;
use crate::vm::memory::SymbolTable;
use crate::vm::stack::NodeStack;

/// Input was set for this turn
pub const FLAG_READIN: u32 = 0;
/// Input-match latch; set by the first matching INCMP, cleared by HALT
pub const FLAG_INMATCH: u32 = 1;
/// Session has ended
pub const FLAG_TERMINATE: u32 = 2;
/// Position changed since the current node's code was last loaded
pub const FLAG_DIRTY: u32 = 3;
/// Waiting for input
pub const FLAG_WAIT: u32 = 4;
/// The last LOAD or RELOAD failed
pub const FLAG_LOADFAIL: u32 = 5;
/// First flag index available to programs
pub const FLAG_USERSTART: u32 = 8;

/// Longest raw input a state will hold
pub const MAX_INPUT_LEN: usize = 255;

/// Fixed-width bit register
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFlagRegister")]
pub struct FlagRegister {
    width: u32,
    #[serde(with = "serde_bytes")]
    bits: Vec<u8>,
}

/// Unchecked wire form of a [`FlagRegister`]
#[derive(Deserialize)]
struct RawFlagRegister {
    width: u32,
    #[serde(with = "serde_bytes")]
    bits: Vec<u8>,
}

impl TryFrom<RawFlagRegister> for FlagRegister {
    type Error = VMError;

    fn try_from(raw: RawFlagRegister) -> Result<Self, Self::Error> {
        if raw.width < FLAG_USERSTART || raw.bits.len() != raw.width.div_ceil(8) as usize {
            return Err(VMError::CorruptFlags {
                width: raw.width,
                len: raw.bits.len(),
            });
        }
        Ok(Self {
            width: raw.width,
            bits: raw.bits,
        })
    }
}

impl FlagRegister {
    /// Register with the reserved flags plus `user_flags` more
    pub fn new(user_flags: u32) -> Self {
        let width = FLAG_USERSTART + user_flags;
        Self {
            width,
            bits: vec![0; width.div_ceil(8) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    fn locate(&self, index: u32) -> Result<(usize, u8), VMError> {
        if index >= self.width {
            return Err(VMError::FlagOutOfRange {
                index,
                width: self.width,
            });
        }
        Ok(((index / 8) as usize, 1 << (index % 8)))
    }

    pub fn get(&self, index: u32) -> Result<bool, VMError> {
        let (byte, mask) = self.locate(index)?;
        Ok(self.bits[byte] & mask != 0)
    }

    /// Set a flag, returning whether it changed
    pub fn set(&mut self, index: u32) -> Result<bool, VMError> {
        let (byte, mask) = self.locate(index)?;
        let changed = self.bits[byte] & mask == 0;
        self.bits[byte] |= mask;
        Ok(changed)
    }

    /// Clear a flag, returning whether it changed
    pub fn reset(&mut self, index: u32) -> Result<bool, VMError> {
        let (byte, mask) = self.locate(index)?;
        let changed = self.bits[byte] & mask != 0;
        self.bits[byte] &= !mask;
        Ok(changed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    stack: NodeStack,
    flags: FlagRegister,
    moves: u32,
    page: u32,
    #[serde(with = "serde_bytes")]
    input: Vec<u8>,
    #[serde(with = "serde_bytes")]
    code: Vec<u8>,
    symbols: SymbolTable,
    language: Option<String>,
}

impl State {
    /// Fresh state with `user_flags` program flags and an unbounded symbol table
    pub fn new(user_flags: u32) -> Self {
        Self::with_cache_size(user_flags, 0)
    }

    pub fn with_cache_size(user_flags: u32, cache_size: usize) -> Self {
        Self {
            stack: NodeStack::new(),
            flags: FlagRegister::new(user_flags),
            moves: 0,
            page: 0,
            input: Vec::new(),
            code: Vec::new(),
            symbols: SymbolTable::with_capacity(cache_size),
            language: None,
        }
    }

    // reserved flags always fit the register
    fn raise(&mut self, index: u32) {
        let _ = self.flags.set(index);
    }

    fn lower(&mut self, index: u32) {
        let _ = self.flags.reset(index);
    }

    fn moved(&mut self) {
        self.moves += 1;
        self.page = 0;
        self.raise(FLAG_DIRTY);
        debug!("position now {}", self.stack.format_stack());
    }

    /// Descend into `node`
    pub fn push_move(&mut self, node: &str) {
        self.stack.push(node);
        self.moved();
    }

    /// Return to the parent node, yielding the node that was left
    pub fn up(&mut self) -> Result<String, VMError> {
        let left = self.stack.pop("up")?;
        self.moved();
        Ok(left)
    }

    /// Drop back to the root node, keeping it on the stack
    pub fn top(&mut self) {
        self.stack.truncate_to_root();
        self.moved();
    }

    /// Empty the position stack entirely
    pub fn reset_to_root(&mut self) {
        self.stack.clear();
        self.moved();
    }

    /// Re-enter the current node without changing position
    pub fn stay(&mut self) {
        self.page = 0;
        self.raise(FLAG_DIRTY);
    }

    pub fn current(&self) -> Option<&str> {
        self.stack.top()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stack(&self) -> &NodeStack {
        &self.stack
    }

    pub fn moves(&self) -> u32 {
        self.moves
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn next_page(&mut self) {
        self.page += 1;
        self.raise(FLAG_DIRTY);
    }

    /// Step the pagination cursor back. Returns `false` on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.page -= 1;
        self.raise(FLAG_DIRTY);
        true
    }

    pub fn set_flag(&mut self, index: u32) -> Result<bool, VMError> {
        self.flags.set(index)
    }

    pub fn reset_flag(&mut self, index: u32) -> Result<bool, VMError> {
        self.flags.reset(index)
    }

    pub fn get_flag(&self, index: u32) -> Result<bool, VMError> {
        self.flags.get(index)
    }

    /// The CATCH/CROAK predicate: the flag's value, inverted when `invert` is set
    pub fn match_flag(&self, index: u32, invert: bool) -> Result<bool, VMError> {
        Ok(self.flags.get(index)? != invert)
    }

    pub fn flags(&self) -> &FlagRegister {
        &self.flags
    }

    pub fn matched(&self) -> bool {
        self.flags.get(FLAG_INMATCH).unwrap_or(false)
    }

    pub fn set_matched(&mut self) {
        self.raise(FLAG_INMATCH);
    }

    pub fn clear_matched(&mut self) {
        self.lower(FLAG_INMATCH);
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.get(FLAG_DIRTY).unwrap_or(false)
    }

    pub fn clear_dirty(&mut self) {
        self.lower(FLAG_DIRTY);
    }

    pub fn terminated(&self) -> bool {
        self.flags.get(FLAG_TERMINATE).unwrap_or(false)
    }

    pub fn set_input(&mut self, input: &[u8]) -> Result<(), VMError> {
        if input.len() > MAX_INPUT_LEN {
            return Err(VMError::InputTooLong(input.len()));
        }
        self.input = input.to_vec();
        self.raise(FLAG_READIN);
        self.lower(FLAG_WAIT);
        Ok(())
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// Whether input was set for this turn
    pub fn has_input(&self) -> bool {
        self.flags.get(FLAG_READIN).unwrap_or(false)
    }

    /// Forget the input once a turn is done with it
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.lower(FLAG_READIN);
    }

    /// Mark the session as suspended until the next input
    pub fn wait(&mut self) {
        self.raise(FLAG_WAIT);
    }

    pub fn waiting(&self) -> bool {
        self.flags.get(FLAG_WAIT).unwrap_or(false)
    }

    /// Unexecuted code carried to the next turn
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn set_code(&mut self, code: Vec<u8>) {
        self.code = code;
    }

    pub fn take_code(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.code)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }
}
