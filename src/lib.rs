//! SQL parsing, canonical formatting, and structural analysis, plus a
//! parser for textual `EXPLAIN` plan reports.
//!
//! Every entry point is a pure, synchronous transform of an input
//! string: no I/O, no shared state, safe to call from any thread.
//!
//! ```
//! let stmt = sqlens::parse("select id from users where age > 18").unwrap();
//! let text = sqlens::format_statement(&stmt);
//! assert_eq!(text, "SELECT id\nFROM users\nWHERE age > 18");
//! ```

pub mod explain;
pub mod query_ast;

pub use explain::{is_explain, parse_plan, parse_plan_report, PlanNode, PlanReport};
pub use query_ast::analyzer::{analyze_statement, QueryMetrics};
pub use query_ast::ast::Statement;
pub use query_ast::errors::{PlanError, Position, SqlError};
pub use query_ast::formatter::format_statement;
pub use query_ast::parser::{parse, parse_statements, Parser, DEFAULT_MAX_DEPTH};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parses `sql` and renders it back in canonical form.
pub fn format(sql: &str) -> Result<String, SqlError> {
    Ok(format_statement(&parse(sql)?))
}

/// Parses `sql` and collects its structural metrics.
pub fn analyze(sql: &str) -> Result<QueryMetrics, SqlError> {
    Ok(analyze_statement(&parse(sql)?))
}
