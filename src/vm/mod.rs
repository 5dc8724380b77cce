//! Execution engine and navigation state
//!
//! The VM decodes one instruction at a time from a borrowed buffer and
//! applies it to a borrowed `State`. A run ends when the buffer is
//! exhausted, at a HALT (the suspend point, whose remainder the caller
//! persists for the next turn) or at the first error.

mod errors;
mod execution;
mod input;
mod memory;
mod menu;
mod stack;
mod state;

pub use errors::{ResolveError, RunError, VMError};
pub use execution::{FuncResolver, ResolveFn, Resolved, Resolver};
pub use input::{check_target, InputClassifier, Target, CLASS_MENU, CLASS_PHONE};
pub use memory::{SymbolEntry, SymbolTable};
pub use menu::{MenuItem, MenuKind, PendingOutput};
pub use stack::NodeStack;
pub use state::{
    FlagRegister, State, FLAG_DIRTY, FLAG_INMATCH, FLAG_LOADFAIL, FLAG_READIN, FLAG_TERMINATE,
    FLAG_USERSTART, FLAG_WAIT, MAX_INPUT_LEN,
};

// Main VM struct that drives a run
mod vm;
pub use vm::{RunOutcome, VM};
