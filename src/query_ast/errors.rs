//! Error types for the SQL pipeline and the plan-text parser.

use std::fmt;

/// Source location attached to lexer/parser errors. Offsets are in
/// characters; line and column are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Self { offset: 0, line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    #[error("lex error at {position}: {message}")]
    Lex { position: Position, message: String },
    #[error("parse error at {position}: expected {expected}, found {found}")]
    Parse { position: Position, expected: String, found: String },
    #[error("query nesting exceeds the limit of {limit} levels")]
    TooDeep { limit: usize },
    #[error("unsupported SQL construct: {construct}")]
    Unsupported { construct: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("unrecognized plan line {line_number}: {raw_line:?}")]
    Format { line_number: usize, raw_line: String },
}
