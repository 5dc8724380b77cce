use std::fmt;

use super::batcher::BatchKind;
use super::{common, CompilerError, SourcePosition};
use crate::bytecode::Opcode;

/// Lexical unit of an assembly line
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or reserved navigation symbol
    Sym(String),
    /// Decimal digits, kept as written so `00` stays distinct from `0`
    Number(String),
    /// Text between matching quotes
    Quoted(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Sym(s) | Token::Number(s) => f.write_str(s),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A numeric argument with its source spelling
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub value: u64,
    pub raw: String,
}

/// Arguments of one line, matched in the order sym, size, flag, selector, desc
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub sym: Option<String>,
    pub size: Option<Number>,
    pub flag: Option<Number>,
    pub selector: Option<String>,
    pub desc: Option<String>,
}

impl Args {
    /// Short description of which slots are filled, for error messages
    pub fn shape(&self) -> String {
        let mut parts = Vec::new();
        if self.sym.is_some() {
            parts.push("symbol");
        }
        if self.size.is_some() {
            parts.push("number");
        }
        if self.flag.is_some() {
            parts.push("flag");
        }
        if self.selector.is_some() {
            parts.push("selector");
        }
        if self.desc.is_some() {
            parts.push("description");
        }
        if parts.is_empty() {
            return "no operands".to_string();
        }
        parts.join(", ")
    }

    fn assign(&mut self, slot: usize, token: Token) -> Result<(), String> {
        match (slot, token) {
            (0, Token::Sym(s)) => self.sym = Some(s),
            (1, Token::Number(raw)) => self.size = Some(parse_number(raw)?),
            (2, Token::Number(raw)) => self.flag = Some(parse_number(raw)?),
            (3, Token::Sym(s)) => self.selector = Some(s),
            (4, Token::Quoted(s)) => self.desc = Some(s),
            (_, token) => return Err(token.to_string()),
        }
        Ok(())
    }
}

fn parse_number(raw: String) -> Result<Number, String> {
    match raw.parse::<u64>() {
        Ok(value) => Ok(Number { value, raw }),
        Err(_) => Err(raw),
    }
}

fn accepts(slot: usize, token: &Token) -> bool {
    matches!(
        (slot, token),
        (0, Token::Sym(_))
            | (1, Token::Number(_))
            | (2, Token::Number(_))
            | (3, Token::Sym(_))
            | (4, Token::Quoted(_))
    )
}

/// What a line does
#[derive(Debug, Clone, PartialEq)]
pub enum LineOp {
    /// A real instruction
    Instruction(Opcode),
    /// A menu line for the batcher; `target` is set when the line starts
    /// with a node name instead of a keyword
    Batch {
        kind: BatchKind,
        target: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub pos: SourcePosition,
    pub op: LineOp,
    pub args: Args,
}

/// Text up to the closing `delim`, with `\x` read as `x`. Returns the
/// text and the number of chars consumed before the closing quote.
fn quoted_text(chars: &[char], delim: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == delim => return Some((text, i)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    None
}

/// Split a line into tokens, stopping at a `#` outside quotes
pub fn tokenize(line: &str, pos: SourcePosition) -> Result<Vec<(Token, SourcePosition)>, CompilerError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let at = common::adjusted_position(pos, i);
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if common::is_quote(c) {
            let (text, len) = quoted_text(&chars[i + 1..], c)
                .ok_or(CompilerError::UnterminatedQuote(at.line, at.column))?;
            tokens.push((Token::Quoted(text), at));
            i += len + 2;
            continue;
        }
        if common::is_sym_char(c) {
            let len = chars[i..].iter().take_while(|&&c| common::is_sym_char(c)).count();
            let word: String = chars[i..i + len].iter().collect();
            let token = if word.chars().all(|c| c.is_ascii_digit()) {
                Token::Number(word)
            } else if common::is_sym_start(c) {
                Token::Sym(word)
            } else {
                return Err(CompilerError::UnexpectedToken(word, at.line, at.column));
            };
            tokens.push((token, at));
            i += len;
            continue;
        }
        if common::RESERVED_SYMBOLS.contains(&c) {
            tokens.push((Token::Sym(c.to_string()), at));
            i += 1;
            continue;
        }
        return Err(CompilerError::UnexpectedToken(c.to_string(), at.line, at.column));
    }
    Ok(tokens)
}

fn line_op(word: &str, at: SourcePosition) -> Result<LineOp, CompilerError> {
    if let Some(opcode) = Opcode::from_mnemonic(word) {
        return Ok(LineOp::Instruction(opcode));
    }
    if let Some(kind) = BatchKind::from_keyword(word) {
        return Ok(LineOp::Batch { kind, target: None });
    }
    if common::is_upper_ident(word) {
        return Err(CompilerError::UnknownOpcode(word.to_string(), at.line, at.column));
    }
    if !word.starts_with(common::is_sym_start) {
        return Err(CompilerError::UnexpectedToken(word.to_string(), at.line, at.column));
    }
    Ok(LineOp::Batch {
        kind: BatchKind::Down,
        target: Some(word.to_string()),
    })
}

/// Parse a single line. Returns `None` for blank and comment-only lines.
pub fn parse_line(line: &str, pos: SourcePosition) -> Result<Option<SourceLine>, CompilerError> {
    let mut tokens = tokenize(line, pos)?.into_iter();
    let (first, at) = match tokens.next() {
        Some(t) => t,
        None => return Ok(None),
    };
    let word = match first {
        Token::Sym(word) => word,
        other => {
            return Err(CompilerError::UnexpectedToken(
                other.to_string(),
                at.line,
                at.column,
            ))
        }
    };
    let op = line_op(&word, at)?;

    let mut args = Args::default();
    let mut next_slot = 0;
    for (token, tpos) in tokens {
        let slot = (next_slot..5)
            .find(|&slot| accepts(slot, &token))
            .ok_or_else(|| CompilerError::UnexpectedToken(token.to_string(), tpos.line, tpos.column))?;
        args.assign(slot, token)
            .map_err(|raw| CompilerError::InvalidNumber(raw, tpos.line, tpos.column))?;
        next_slot = slot + 1;
    }

    Ok(Some(SourceLine { pos, op, args }))
}
