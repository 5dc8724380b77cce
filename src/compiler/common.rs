use super::SourcePosition;

/// Symbols with navigation meaning that may stand in for a node name
pub const RESERVED_SYMBOLS: &[char] = &['^', '.', '>', '<', '*'];

/// First character of a symbol token
pub fn is_sym_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_sym_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// A token with uppercase letters and no lowercase ones, like a mnemonic
pub fn is_upper_ident(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_uppercase()) && !token.chars().any(|c| c.is_ascii_lowercase())
}

/// Position of the character at `offset` (in chars) within a line starting at `pos`
pub fn adjusted_position(pos: SourcePosition, offset: usize) -> SourcePosition {
    SourcePosition::new(pos.line, pos.column + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_ident() {
        assert!(is_upper_ident("HALT"));
        assert!(is_upper_ident("FOO_BAR"));
        assert!(!is_upper_ident("Foo"));
        assert!(!is_upper_ident("foo"));
        assert!(!is_upper_ident("_"));
    }

    #[test]
    fn test_adjusted_position() {
        let pos = adjusted_position(SourcePosition::new(3, 1), 5);
        assert_eq!(pos, SourcePosition::new(3, 6));
    }
}
