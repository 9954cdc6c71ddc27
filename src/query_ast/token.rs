//! Token types produced by the lexer, plus the shared keyword table.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::errors::Position;

/// A single lexical unit. `text` preserves the original spelling;
/// keyword matching is case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    /// Double-quoted identifier; `text` holds the unescaped content.
    QuotedIdentifier,
    /// Single-quoted string; `text` holds the unescaped content.
    String,
    Number,
    Operator,
    Punct,
    /// Positional placeholder such as `$1`; `text` holds the index digits.
    Parameter,
    Eof,
}

impl Token {
    /// Case-insensitive keyword check.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(word)
    }

    /// Human-readable description used in parse errors.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::String => format!("string '{}'", self.text),
            _ => format!("'{}'", self.text),
        }
    }
}

/// Reserved words recognized by the lexer. Built once, never mutated,
/// so concurrent tokenize calls share it without locking.
pub static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "SELECT", "DISTINCT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER",
        "LIMIT", "OFFSET", "AS", "ON", "JOIN", "INNER", "LEFT", "RIGHT", "FULL",
        "OUTER", "CROSS", "UNION", "INTERSECT", "EXCEPT", "ALL", "AND", "OR",
        "NOT", "IN", "IS", "NULL", "TRUE", "FALSE", "BETWEEN", "LIKE", "ILIKE",
        "EXISTS", "CASE", "WHEN", "THEN", "ELSE", "END", "CAST", "INSERT",
        "INTO", "VALUES", "UPDATE", "SET", "DELETE", "RETURNING", "EXPLAIN",
        "ANALYZE", "VERBOSE", "FORMAT", "ASC", "DESC", "NULLS", "FIRST", "LAST",
        "WITH", "MERGE", "USING", "NATURAL", "OVER", "CREATE", "DROP", "ALTER",
        "TRUNCATE", "GRANT", "REVOKE",
    ]
    .into_iter()
    .collect()
});

/// Whether an identifier can be rendered without quotes: simple shape
/// and no keyword collision.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !KEYWORDS.contains(name.to_ascii_uppercase().as_str())
}
