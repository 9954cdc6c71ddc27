//! SQL tokenizing, parsing, formatting, and analysis.
//!
//! The pipeline is lexer -> parser -> AST, with the formatter and the
//! analyzer both consuming the AST. Parsing is fail-fast: the first
//! error aborts the statement, there is no recovery.

pub mod analyzer;
pub mod ast;
pub mod errors;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod token;

pub use analyzer::{analyze_statement, QueryMetrics};
pub use ast::Statement;
pub use errors::{Position, SqlError};
pub use formatter::format_statement;
pub use lexer::tokenize;
pub use parser::{parse, parse_statements, Parser, DEFAULT_MAX_DEPTH};
pub use token::{Token, TokenKind};
