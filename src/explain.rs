//! EXPLAIN detection and plan-report parsing.
//!
//! Two independent lexical paths that never touch the SQL parser:
//! [`is_explain`] looks at raw statement text, [`parse_plan`] /
//! [`parse_plan_report`] consume the textual plan output a server
//! returns for an `EXPLAIN` request.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::query_ast::errors::PlanError;

/// One physical operation from a plan report, with its estimates and,
/// when `ANALYZE` output is present, its measured runtime figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanNode {
    pub operation: String,
    /// Relation the operation scans or modifies (`Seq Scan on users`),
    /// alias included when the plan prints one (`on emp e`).
    pub target: Option<String>,
    pub startup_cost: f64,
    pub total_cost: f64,
    pub plan_rows: u64,
    pub plan_width: u64,
    pub actual_time: Option<(f64, f64)>,
    pub actual_rows: Option<u64>,
    pub loops: Option<u64>,
    /// Attached `Label: text` lines (`Filter:`, `Sort Key:`, ...).
    pub extra: Vec<String>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// True when the measured row count is wildly off the planner's
    /// estimate (more than 10x in either direction).
    pub fn rows_mismatch(&self) -> bool {
        match self.actual_rows {
            Some(actual) => {
                if self.plan_rows == 0 || actual == 0 {
                    return self.plan_rows != actual;
                }
                let ratio = actual as f64 / self.plan_rows as f64;
                !(0.1..=10.0).contains(&ratio)
            }
            None => false,
        }
    }
}

/// A full plan report: the node tree plus the summary timing lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub roots: Vec<PlanNode>,
    pub planning_time: Option<f64>,
    pub execution_time: Option<f64>,
    /// Completion time of the outermost node, when measured.
    pub total_time: Option<f64>,
}

/// Reports whether `text` starts with an `EXPLAIN` statement, skipping
/// leading whitespace and comments. Total: never fails, never parses.
pub fn is_explain(text: &str) -> bool {
    let head = skip_trivia(text);
    let bytes = head.as_bytes();
    if bytes.len() < 7 || !bytes[..7].eq_ignore_ascii_case(b"EXPLAIN") {
        return false;
    }
    match bytes.get(7) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'(',
    }
}

fn skip_trivia(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("--") {
            text = match rest.find('\n') {
                Some(nl) => &rest[nl + 1..],
                None => "",
            };
        } else if let Some(rest) = text.strip_prefix("/*") {
            text = match rest.find("*/") {
                Some(end) => &rest[end + 2..],
                None => "",
            };
        } else {
            return text;
        }
    }
}

// `<operation> [on <target>] (cost=a..b rows=n width=w)` with an
// optional `(actual time=a..b rows=r loops=n)` tail from ANALYZE runs.
static NODE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        (?P<op>.+?)
        (?:\s+on\s+(?P<target>.+?))?
        \s+\(cost=(?P<startup>\d+(?:\.\d+)?)\.\.(?P<total>\d+(?:\.\d+)?)
        \s+rows=(?P<rows>\d+)\s+width=(?P<width>\d+)\)
        (?:\s+\(actual\s+time=(?P<at_start>\d+(?:\.\d+)?)\.\.(?P<at_end>\d+(?:\.\d+)?)
        \s+rows=(?P<arows>\d+)\s+loops=(?P<loops>\d+)\))?
        $",
    )
    .unwrap()
});

// Attached info lines: `Filter: (age > 18)`, `Sort Key: name`, ...
static EXTRA_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9 ]*:(?:\s|$)").unwrap());

/// Parses plan-report text into its root nodes. Timing and header
/// lines are skipped; see [`parse_plan_report`] to capture them.
pub fn parse_plan(text: &str) -> Result<Vec<PlanNode>, PlanError> {
    Ok(parse_report(text)?.roots)
}

/// Parses plan-report text into a [`PlanReport`], capturing the
/// `Planning Time:` / `Execution Time:` summary lines.
pub fn parse_plan_report(text: &str) -> Result<PlanReport, PlanError> {
    parse_report(text)
}

struct Pending {
    depth: usize,
    node: PlanNode,
}

fn parse_report(text: &str) -> Result<PlanReport, PlanError> {
    let mut roots: Vec<PlanNode> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut planning_time = None;
    let mut execution_time = None;

    for (index, raw_line) in text.lines().enumerate() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with("QUERY PLAN") || trimmed.starts_with("---") {
            continue;
        }
        // Both capitalizations occur across server versions.
        if let Some(rest) = strip_time_prefix(trimmed, "Planning") {
            planning_time = parse_time_ms(rest);
            continue;
        }
        if let Some(rest) = strip_time_prefix(trimmed, "Execution") {
            execution_time = parse_time_ms(rest);
            continue;
        }

        let depth = raw_line.len() - raw_line.trim_start().len();
        let content = trimmed.strip_prefix("->").map(str::trim_start).unwrap_or(trimmed);

        if let Some(caps) = NODE_LINE.captures(content) {
            let node = node_from_captures(&caps);
            while stack.last().is_some_and(|pending| pending.depth >= depth) {
                close_top(&mut stack, &mut roots);
            }
            stack.push(Pending { depth, node });
        } else if EXTRA_LINE.is_match(content) {
            match stack.last_mut() {
                Some(pending) => pending.node.extra.push(content.to_string()),
                None => {
                    return Err(PlanError::Format {
                        line_number: index + 1,
                        raw_line: raw_line.to_string(),
                    });
                }
            }
        } else {
            return Err(PlanError::Format {
                line_number: index + 1,
                raw_line: raw_line.to_string(),
            });
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    log::debug!("parsed plan report with {} root node(s)", roots.len());

    let total_time = roots.first().and_then(|root| root.actual_time).map(|(_, end)| end);
    Ok(PlanReport { roots, planning_time, execution_time, total_time })
}

fn close_top(stack: &mut Vec<Pending>, roots: &mut Vec<PlanNode>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.node.children.push(done.node),
            None => roots.push(done.node),
        }
    }
}

fn node_from_captures(caps: &regex::Captures<'_>) -> PlanNode {
    let number = |name: &str| caps.name(name).map(|m| m.as_str().parse().unwrap_or_default());
    PlanNode {
        operation: caps["op"].to_string(),
        target: caps.name("target").map(|m| m.as_str().to_string()),
        startup_cost: caps["startup"].parse().unwrap_or_default(),
        total_cost: caps["total"].parse().unwrap_or_default(),
        plan_rows: caps["rows"].parse().unwrap_or_default(),
        plan_width: caps["width"].parse().unwrap_or_default(),
        actual_time: match (number("at_start"), number("at_end")) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        },
        actual_rows: caps.name("arows").and_then(|m| m.as_str().parse().ok()),
        loops: caps.name("loops").and_then(|m| m.as_str().parse().ok()),
        extra: Vec::new(),
        children: Vec::new(),
    }
}

fn strip_time_prefix<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(word)?;
    rest.strip_prefix(" Time:").or_else(|| rest.strip_prefix(" time:"))
}

fn parse_time_ms(text: &str) -> Option<f64> {
    text.trim().trim_end_matches("ms").trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_explain() {
        assert!(is_explain("EXPLAIN SELECT 1"));
        assert!(is_explain("explain analyze select * from t"));
        assert!(is_explain("  EXPLAIN (ANALYZE, BUFFERS) SELECT 1"));
        assert!(is_explain("EXPLAIN(COSTS OFF) SELECT 1"));
        assert!(!is_explain("SELECT 1"));
        assert!(!is_explain(""));
        assert!(!is_explain("EXPLAINED SELECT 1"));
        assert!(!is_explain("SELECT * FROM explain_table"));
    }

    #[test]
    fn test_is_explain_skips_comments() {
        assert!(is_explain("-- comment\nEXPLAIN SELECT 1"));
        assert!(is_explain("/* block */ EXPLAIN SELECT 1"));
        assert!(!is_explain("-- EXPLAIN SELECT 1"));
        assert!(!is_explain("/* unterminated EXPLAIN"));
    }

    #[test]
    fn test_parse_single_node() {
        let nodes =
            parse_plan("Seq Scan on users  (cost=0.00..35.50 rows=100 width=36)").unwrap();
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.operation, "Seq Scan");
        assert_eq!(node.target.as_deref(), Some("users"));
        assert_eq!(node.startup_cost, 0.0);
        assert_eq!(node.total_cost, 35.5);
        assert_eq!(node.plan_rows, 100);
        assert_eq!(node.plan_width, 36);
        assert!(node.children.is_empty());
        assert!(node.actual_time.is_none());
    }

    #[test]
    fn test_parse_analyze_figures() {
        let report = parse_plan_report(
            "Seq Scan on users  (cost=0.00..35.50 rows=100 width=36) (actual time=0.010..0.100 rows=100 loops=1)\n\
             Planning Time: 0.100 ms\n\
             Execution Time: 0.200 ms",
        )
        .unwrap();
        let root = &report.roots[0];
        assert_eq!(root.actual_time, Some((0.01, 0.1)));
        assert_eq!(root.actual_rows, Some(100));
        assert_eq!(root.loops, Some(1));
        assert_eq!(report.planning_time, Some(0.1));
        assert_eq!(report.execution_time, Some(0.2));
        assert_eq!(report.total_time, Some(0.1));
    }

    #[test]
    fn test_parse_lowercase_time_lines() {
        let report = parse_plan_report(
            "Result  (cost=0.00..0.01 rows=1 width=4)\nPlanning time: 0.05 ms\nExecution time: 0.01 ms",
        )
        .unwrap();
        assert_eq!(report.planning_time, Some(0.05));
        assert_eq!(report.execution_time, Some(0.01));
    }

    #[test]
    fn test_parse_nested_plan() {
        let nodes = parse_plan(
            "Sort  (cost=100.00..100.25 rows=100 width=40)\n\
             \x20 Sort Key: name\n\
             \x20 ->  Seq Scan on users  (cost=0.00..35.50 rows=100 width=40)\n\
             \x20       Filter: (age > 18)",
        )
        .unwrap();
        assert_eq!(nodes.len(), 1);
        let root = &nodes[0];
        assert_eq!(root.operation, "Sort");
        assert_eq!(root.extra, vec!["Sort Key: name".to_string()]);
        assert_eq!(root.children.len(), 1);
        let child = &root.children[0];
        assert_eq!(child.operation, "Seq Scan");
        assert_eq!(child.target.as_deref(), Some("users"));
        assert!(child.extra.iter().any(|line| line.starts_with("Filter:")));
    }

    #[test]
    fn test_parse_sibling_children() {
        let nodes = parse_plan(
            "Hash Join  (cost=1.00..2.00 rows=10 width=8)\n\
             \x20 ->  Seq Scan on a  (cost=0.00..1.00 rows=10 width=4)\n\
             \x20 ->  Hash  (cost=0.50..0.50 rows=10 width=4)\n\
             \x20       ->  Seq Scan on b  (cost=0.00..0.50 rows=10 width=4)",
        )
        .unwrap();
        let root = &nodes[0];
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].target.as_deref(), Some("a"));
        assert_eq!(root.children[1].operation, "Hash");
        assert_eq!(root.children[1].children[0].target.as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_skips_header_and_rules() {
        let nodes = parse_plan(
            "                 QUERY PLAN\n\
             ---------------------------------------------\n\
             Result  (cost=0.00..0.01 rows=1 width=4)\n",
        )
        .unwrap();
        assert_eq!(nodes[0].operation, "Result");
    }

    #[test]
    fn test_parse_bad_line_reports_position() {
        let err = parse_plan("Seq Scan on users  (cost=0.00..35.50 rows=100 width=36)\n???")
            .unwrap_err();
        match err {
            PlanError::Format { line_number, raw_line } => {
                assert_eq!(line_number, 2);
                assert_eq!(raw_line, "???");
            }
        }
    }

    #[test]
    fn test_index_scan_using_target() {
        let nodes = parse_plan(
            "Index Scan using users_pkey on users  (cost=0.29..8.31 rows=1 width=36)",
        )
        .unwrap();
        assert_eq!(nodes[0].operation, "Index Scan using users_pkey");
        assert_eq!(nodes[0].target.as_deref(), Some("users"));
    }

    #[test]
    fn test_rows_mismatch() {
        let mut node = parse_plan(
            "Seq Scan on t  (cost=0.00..1.00 rows=10 width=4) (actual time=0.0..0.1 rows=10000 loops=1)",
        )
        .unwrap()
        .remove(0);
        assert!(node.rows_mismatch());
        node.actual_rows = Some(95);
        node.plan_rows = 100;
        assert!(!node.rows_mismatch());
        node.actual_rows = None;
        assert!(!node.rows_mismatch());
    }
}
