//! Input classification and navigation targets
//!
//! `InputClassifier` decides whether raw user input may be handed to the
//! engine at all. Registered patterns are tried in registration order
//! before the built-in phone and menu classes.
//!
//! `Target` interprets the reserved symbols that CATCH and INCMP use as
//! move destinations.

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::vm::errors::VMError;
use crate::vm::state::State;

/// Class of input that looks like a phone number
pub const CLASS_PHONE: i32 = -1;
/// Class of ordinary menu or text input
pub const CLASS_MENU: i32 = 0;

static PHONE_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+\d+$").expect("phone pattern compiles"));

static MENU_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][^\x00-\x1F\x7F]*$").expect("menu pattern compiles")
});

/// Ordered set of input patterns
#[derive(Debug, Clone, Default)]
pub struct InputClassifier {
    validators: Vec<(Regex, i32)>,
}

impl InputClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern that maps matching input to `class`
    pub fn register(&mut self, class: i32, pattern: &str) -> Result<(), VMError> {
        let re = Regex::new(pattern).map_err(|e| VMError::InvalidPattern {
            pattern: pattern.to_string(),
            details: e.to_string(),
        })?;
        debug!("registered input class {} for {:?}", class, pattern);
        self.validators.push((re, class));
        Ok(())
    }

    /// Classify `input`, failing when nothing accepts it
    pub fn classify(&self, input: &[u8]) -> Result<i32, VMError> {
        for (re, class) in &self.validators {
            if re.is_match(input) {
                trace!("input matched registered class {}", class);
                return Ok(*class);
            }
        }
        if PHONE_INPUT.is_match(input) {
            return Ok(CLASS_PHONE);
        }
        if MENU_INPUT.is_match(input) {
            return Ok(CLASS_MENU);
        }
        Err(VMError::InvalidInput(hex::encode(input)))
    }
}

/// A move destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `_`
    Up,
    /// `^`
    Top,
    /// `.`
    Stay,
    /// `*`
    Wildcard,
    /// `>`
    Next,
    /// `<`
    Previous,
    Node(String),
}

fn invalid(target: &str, reason: &str) -> VMError {
    VMError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

fn is_node_name(sym: &str) -> bool {
    sym.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl Target {
    pub fn parse(sym: &str) -> Result<Target, VMError> {
        let target = match sym {
            "" => return Err(invalid(sym, "empty target")),
            "_" => Target::Up,
            "^" => Target::Top,
            "." => Target::Stay,
            "*" => Target::Wildcard,
            ">" => Target::Next,
            "<" => Target::Previous,
            _ if is_node_name(sym) => Target::Node(sym.to_string()),
            _ => return Err(invalid(sym, "unrecognized symbol")),
        };
        Ok(target)
    }

    /// Whether the target can be taken from `st`. Errors mark targets that
    /// can never be taken from this position; `false` means "skip".
    pub fn check(&self, st: &State) -> Result<bool, VMError> {
        match self {
            Target::Up if st.depth() == 0 => Err(invalid("_", "already at top")),
            Target::Next => Ok(st.depth() > 0),
            Target::Previous => Ok(st.page() > 0),
            _ => Ok(true),
        }
    }

    /// Move `st` to this target
    pub fn apply(&self, st: &mut State) -> Result<(), VMError> {
        match self {
            Target::Up => {
                st.up()?;
            }
            Target::Top => st.top(),
            Target::Stay | Target::Wildcard => st.stay(),
            Target::Next => st.next_page(),
            Target::Previous => {
                st.prev_page();
            }
            Target::Node(node) => st.push_move(node),
        }
        Ok(())
    }
}

/// Parse and check a target symbol against the current state
pub fn check_target(sym: &str, st: &State) -> Result<bool, VMError> {
    Target::parse(sym)?.check(st)
}
