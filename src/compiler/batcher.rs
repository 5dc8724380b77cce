//! Menu batching
//!
//! Menu lines describe one choice each. The batcher collects consecutive
//! menu lines and lowers them as a block: every display instruction first,
//! then HALT, then one INCMP per choice so the next turn's input is
//! dispatched against the menu that was just shown.

use log::debug;

use super::line_parser::Args;
use super::CompilerError;
use crate::bytecode::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// Choice that descends into a named node
    Down,
    /// Choice that returns to the parent node
    Up,
    /// Choice that shows the next page
    Next,
    /// Choice that shows the previous page
    Previous,
}

impl BatchKind {
    /// Keyword lookup, case-insensitive
    pub fn from_keyword(word: &str) -> Option<BatchKind> {
        match word.to_ascii_uppercase().as_str() {
            "DOWN" => Some(BatchKind::Down),
            "UP" => Some(BatchKind::Up),
            "NEXT" => Some(BatchKind::Next),
            "PREVIOUS" => Some(BatchKind::Previous),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BatchKind::Down => "DOWN",
            BatchKind::Up => "UP",
            BatchKind::Next => "NEXT",
            BatchKind::Previous => "PREVIOUS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub kind: BatchKind,
    pub selector: String,
    pub text: String,
    /// Destination; only set for `Down`
    pub target: Option<String>,
    pub line: usize,
}

impl MenuEntry {
    fn display(&self) -> Instruction {
        let selector = self.selector.clone();
        let text = self.text.clone();
        match self.kind {
            BatchKind::Next => Instruction::MNext { selector, text },
            BatchKind::Previous => Instruction::MPrev { selector, text },
            BatchKind::Down | BatchKind::Up => Instruction::MOut { selector, text },
        }
    }

    fn dispatch(&self) -> Instruction {
        let target = match self.kind {
            BatchKind::Up => "_".to_string(),
            BatchKind::Next => ">".to_string(),
            BatchKind::Previous => "<".to_string(),
            BatchKind::Down => self.target.clone().unwrap_or_default(),
        };
        Instruction::InCmp {
            selector: self.selector.clone(),
            target,
        }
    }
}

/// Collects menu lines until the block is flushed
#[derive(Debug, Default)]
pub struct Batcher {
    entries: Vec<MenuEntry>,
}

impl Batcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add one menu line. `target` is the node name a line started with,
    /// if it did not start with a keyword.
    pub fn add(
        &mut self,
        kind: BatchKind,
        target: Option<&str>,
        args: &Args,
        line: usize,
    ) -> Result<(), CompilerError> {
        let mismatch = || {
            CompilerError::OperandMismatch(kind.keyword().to_string(), args.shape(), line)
        };
        let text = args
            .desc
            .clone()
            .ok_or_else(|| CompilerError::MissingDescription(kind.keyword().to_string(), line))?;
        if args.flag.is_some() {
            return Err(mismatch());
        }

        // candidate selectors, in slot order
        let mut symbols: Vec<String> = Vec::new();
        symbols.extend(args.sym.clone());
        let size = args.size.as_ref().map(|n| n.raw.clone());

        let (target, selector) = match (kind, target) {
            (BatchKind::Down, Some(t)) => {
                symbols.extend(args.selector.clone());
                (Some(t.to_string()), pick_selector(size, symbols))
            }
            (BatchKind::Down, None) => {
                let target = args
                    .sym
                    .clone()
                    .ok_or_else(|| CompilerError::MissingTarget(kind.keyword().to_string(), line))?;
                let rest = args.selector.clone().into_iter().collect();
                (Some(target), pick_selector(size, rest))
            }
            (_, _) => {
                symbols.extend(args.selector.clone());
                (None, pick_selector(size, symbols))
            }
        };
        let selector = match selector {
            Selector::One(s) => s,
            Selector::None => {
                return Err(CompilerError::MissingSelector(
                    kind.keyword().to_string(),
                    line,
                ))
            }
            Selector::Many => return Err(mismatch()),
        };

        debug!("menu {} '{}' '{}' {:?}", kind.keyword(), selector, text, target);
        self.entries.push(MenuEntry {
            kind,
            selector,
            text,
            target,
            line,
        });
        Ok(())
    }

    /// Lower collected entries to bytecode and empty the batcher.
    /// An empty batcher yields no bytes.
    pub fn flush(&mut self) -> Result<Vec<u8>, CompilerError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let entries = std::mem::take(&mut self.entries);
        let mut block = Vec::new();
        let encode = |instruction: Instruction, line: usize, block: &mut Vec<u8>| {
            instruction
                .encode(block)
                .map(|_| ())
                .map_err(|source| CompilerError::Encode { line, source })
        };
        for entry in &entries {
            encode(entry.display(), entry.line, &mut block)?;
        }
        let halt_line = entries.last().map(|e| e.line).unwrap_or_default();
        encode(Instruction::Halt, halt_line, &mut block)?;
        for entry in &entries {
            encode(entry.dispatch(), entry.line, &mut block)?;
        }
        Ok(block)
    }
}

enum Selector {
    None,
    One(String),
    Many,
}

fn pick_selector(size: Option<String>, symbols: Vec<String>) -> Selector {
    let mut all: Vec<String> = size.into_iter().chain(symbols).collect();
    match all.len() {
        0 => Selector::None,
        1 => Selector::One(all.remove(0)),
        _ => Selector::Many,
    }
}
