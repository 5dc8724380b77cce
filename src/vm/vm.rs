use log::{debug, info, trace, warn};

use crate::bytecode::Instruction;
use crate::vm::errors::{RunError, VMError};
use crate::vm::execution::{Resolved, Resolver};
use crate::vm::input::Target;
use crate::vm::menu::{MenuKind, PendingOutput};
use crate::vm::state::{State, FLAG_LOADFAIL};

/// What a single instruction asks the run loop to do next
enum Flow {
    Continue,
    /// Suspend, keeping the rest of the buffer
    Halt,
    /// Stop, discarding the rest of the buffer
    Truncate,
}

/// Result of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Code still to execute on the next turn; empty when the buffer ran out
    pub remainder: Vec<u8>,
    /// Instructions executed, HALT included
    pub executed: usize,
    /// Whether the run stopped at a HALT
    pub halted: bool,
}

/// Interprets bytecode against a navigation state.
///
/// The VM owns only its resolver and the output collected so far. State
/// and code are borrowed per call to [`VM::run`], so one VM can serve any
/// number of consecutive runs of the same session.
///
/// Runs are not transactional: when an instruction fails, mutations made
/// by the instructions before it stay applied. Callers that need
/// all-or-nothing turns clone the state before running.
#[derive(Debug)]
pub struct VM<R: Resolver> {
    resolver: R,
    pending: PendingOutput,
}

impl<R: Resolver> VM<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            pending: PendingOutput::new(),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn into_resolver(self) -> R {
        self.resolver
    }

    /// Output collected since the last reset
    pub fn pending(&self) -> &PendingOutput {
        &self.pending
    }

    /// Drop collected output before a node's code is loaded
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Replace collected output, e.g. with a copy saved before a failed turn
    pub fn set_pending(&mut self, pending: PendingOutput) {
        self.pending = pending;
    }

    /// Execute `code` against `st` until it runs out, halts or fails.
    ///
    /// On failure the returned remainder starts at the instruction that
    /// failed; earlier instructions keep their effects.
    pub fn run(&mut self, code: &[u8], st: &mut State) -> Result<RunOutcome, RunError> {
        debug!("run {} bytes: {}", code.len(), hex::encode(code));
        let mut rest = code;
        let mut executed = 0;
        while !rest.is_empty() {
            let fail = |error: VMError| RunError {
                remainder: rest.to_vec(),
                executed,
                error,
            };
            let (instruction, tail) = Instruction::decode(rest).map_err(|e| fail(e.into()))?;
            trace!("exec {}", instruction);
            let flow = self.dispatch(&instruction, st).map_err(fail)?;
            executed += 1;
            match flow {
                Flow::Continue => rest = tail,
                Flow::Halt => {
                    debug!("halt with {} bytes remaining", tail.len());
                    return Ok(RunOutcome {
                        remainder: tail.to_vec(),
                        executed,
                        halted: true,
                    });
                }
                Flow::Truncate => {
                    return Ok(RunOutcome {
                        remainder: Vec::new(),
                        executed,
                        halted: false,
                    });
                }
            }
        }
        Ok(RunOutcome {
            remainder: Vec::new(),
            executed,
            halted: false,
        })
    }

    fn dispatch(&mut self, instruction: &Instruction, st: &mut State) -> Result<Flow, VMError> {
        match instruction {
            Instruction::Noop => {}

            Instruction::Catch {
                target,
                flag,
                invert,
            } => {
                if st.match_flag(*flag, *invert)? {
                    info!("catch at flag {}, moving to {}", flag, target);
                    self.go_to(target, st)?;
                    return Ok(Flow::Truncate);
                }
            }

            Instruction::Croak { flag, invert } => {
                if st.match_flag(*flag, *invert)? {
                    info!("croak at flag {}, returning to root", flag);
                    st.reset_to_root();
                    return Ok(Flow::Truncate);
                }
            }

            Instruction::Load { sym, size } => {
                if st.symbols().contains(sym) {
                    debug!("{} already loaded", sym);
                } else {
                    let resolved = self.refresh(sym, st)?;
                    st.symbols_mut().add(sym, resolved, *size)?;
                }
            }

            Instruction::Reload { sym } => {
                st.symbols().load(sym)?;
                let resolved = self.refresh(sym, st)?;
                st.symbols_mut().update(sym, resolved)?;
            }

            Instruction::Map { sym } => {
                st.symbols().load(sym)?;
                self.pending.map(sym);
            }

            Instruction::Move { sym } => st.push_move(sym),

            Instruction::Halt => {
                st.clear_matched();
                return Ok(Flow::Halt);
            }

            Instruction::InCmp { selector, target } => self.in_cmp(selector, target, st)?,

            Instruction::MOut { selector, text } => {
                self.pending.push(MenuKind::Choice, selector, text)
            }
            Instruction::MNext { selector, text } => {
                self.pending.push(MenuKind::Next, selector, text)
            }
            Instruction::MPrev { selector, text } => {
                self.pending.push(MenuKind::Previous, selector, text)
            }
        }
        Ok(Flow::Continue)
    }

    fn in_cmp(&mut self, selector: &str, target: &str, st: &mut State) -> Result<(), VMError> {
        if st.matched() {
            trace!("skip {} -> {}, input already matched", selector, target);
            return Ok(());
        }
        if !st.has_input() {
            return Ok(());
        }
        let input = st.input();
        let hit = if selector == "*" {
            !input.is_empty()
        } else {
            input == selector.as_bytes()
        };
        if hit {
            debug!("input matched {}, target {}", selector, target);
            st.set_matched();
            self.go_to(target, st)?;
        }
        Ok(())
    }

    fn go_to(&mut self, sym: &str, st: &mut State) -> Result<(), VMError> {
        let target = Target::parse(sym)?;
        if target.check(st)? {
            target.apply(st)
        } else {
            warn!("target {} not available from here", sym);
            Ok(())
        }
    }

    /// Resolve `sym` and apply the flag requests that came with it
    fn refresh(&mut self, sym: &str, st: &mut State) -> Result<String, VMError> {
        let Resolved {
            content,
            flag_set,
            flag_reset,
        } = match self.resolver.resolve(sym, st.input()) {
            Ok(resolved) => resolved,
            Err(e) => {
                st.set_flag(FLAG_LOADFAIL)?;
                return Err(e.into());
            }
        };
        st.reset_flag(FLAG_LOADFAIL)?;
        for flag in flag_set {
            st.set_flag(flag)?;
        }
        for flag in flag_reset {
            st.reset_flag(flag)?;
        }
        Ok(content)
    }
}
