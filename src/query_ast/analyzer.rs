//! Structural query analysis.
//!
//! One traversal over the AST collecting boolean/count metrics. Joins,
//! subqueries, aggregates, and table references are aggregated across
//! every subquery reachable from the statement, not just the top level.

use serde::Serialize;

use super::ast::*;

/// Function names counted as aggregates by [`QueryMetrics::has_aggregate`].
const AGGREGATE_FUNCTIONS: [&str; 9] = [
    "COUNT", "SUM", "AVG", "MIN", "MAX", "ARRAY_AGG", "STRING_AGG", "BOOL_AND", "BOOL_OR",
];

/// Flat structural metrics for one statement. Created fresh per call.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct QueryMetrics {
    pub has_select: bool,
    pub has_insert: bool,
    pub has_update: bool,
    pub has_delete: bool,
    pub has_distinct: bool,
    pub has_joins: bool,
    pub join_count: usize,
    pub has_where: bool,
    pub has_group_by: bool,
    pub has_having: bool,
    pub has_order_by: bool,
    pub has_limit: bool,
    pub has_subquery: bool,
    pub has_aggregate: bool,
    pub has_set_operation: bool,
    /// Base-table references in FROM and JOIN position, subqueries
    /// included. Not de-duplicated by name: `FROM a JOIN a` counts 2.
    pub table_count: usize,
}

pub fn analyze_statement(stmt: &Statement) -> QueryMetrics {
    let mut metrics = QueryMetrics::default();
    // Statement-kind flags reflect the statement itself, not nested
    // subqueries; EXPLAIN delegates to the statement it wraps.
    let mut kind_of = stmt;
    while let Statement::Explain(e) = kind_of {
        kind_of = &e.statement;
    }
    match kind_of {
        Statement::Select(_) => metrics.has_select = true,
        Statement::Insert(_) => metrics.has_insert = true,
        Statement::Update(_) => metrics.has_update = true,
        Statement::Delete(_) => metrics.has_delete = true,
        Statement::SetOperation(_) => metrics.has_set_operation = true,
        Statement::Explain(_) => unreachable!("unwrapped above"),
    }
    walk_statement(kind_of, &mut metrics);
    metrics
}

fn walk_statement(stmt: &Statement, m: &mut QueryMetrics) {
    match stmt {
        Statement::Select(s) => walk_select(s, m),
        Statement::SetOperation(s) => {
            m.has_set_operation = true;
            walk_statement(&s.left, m);
            walk_statement(&s.right, m);
        }
        Statement::Explain(e) => walk_statement(&e.statement, m),
        Statement::Insert(i) => {
            match &i.source {
                InsertSource::Values(rows) => {
                    for row in rows {
                        for expr in row {
                            walk_expr(expr, m);
                        }
                    }
                }
                InsertSource::Query(query) => walk_statement(query, m),
            }
            walk_items(&i.returning, m);
        }
        Statement::Update(u) => {
            for assignment in &u.assignments {
                walk_expr(&assignment.value, m);
            }
            if let Some(filter) = &u.filter {
                m.has_where = true;
                walk_expr(filter, m);
            }
            walk_items(&u.returning, m);
        }
        Statement::Delete(d) => {
            if let Some(filter) = &d.filter {
                m.has_where = true;
                walk_expr(filter, m);
            }
            walk_items(&d.returning, m);
        }
    }
}

fn walk_select(select: &SelectStmt, m: &mut QueryMetrics) {
    if select.distinct {
        m.has_distinct = true;
    }
    walk_items(&select.columns, m);
    if let Some(from) = &select.from {
        walk_from(from, m);
    }
    if !select.joins.is_empty() {
        m.has_joins = true;
        m.join_count += select.joins.len();
    }
    for join in &select.joins {
        walk_from(&join.source, m);
        if let Some(condition) = &join.condition {
            walk_expr(condition, m);
        }
    }
    if let Some(filter) = &select.filter {
        m.has_where = true;
        walk_expr(filter, m);
    }
    if !select.group_by.is_empty() {
        m.has_group_by = true;
        for expr in &select.group_by {
            walk_expr(expr, m);
        }
    }
    if let Some(having) = &select.having {
        m.has_having = true;
        walk_expr(having, m);
    }
    if !select.order_by.is_empty() {
        m.has_order_by = true;
        for item in &select.order_by {
            walk_expr(&item.expr, m);
        }
    }
    if let Some(limit) = &select.limit {
        m.has_limit = true;
        walk_expr(limit, m);
    }
    if let Some(offset) = &select.offset {
        walk_expr(offset, m);
    }
}

fn walk_items(items: &[SelectItem], m: &mut QueryMetrics) {
    for item in items {
        if let SelectItem::Expr { expr, .. } = item {
            walk_expr(expr, m);
        }
    }
}

fn walk_from(from: &FromClause, m: &mut QueryMetrics) {
    match from {
        FromClause::Table { .. } => m.table_count += 1,
        FromClause::Subquery { query, .. } => {
            m.has_subquery = true;
            walk_statement(query, m);
        }
    }
}

fn walk_expr(expr: &Expr, m: &mut QueryMetrics) {
    match expr {
        Expr::Literal(_) | Expr::Column { .. } | Expr::Wildcard | Expr::Parameter(_) => {}
        Expr::BinaryOp { left, right, .. } => {
            walk_expr(left, m);
            walk_expr(right, m);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => walk_expr(expr, m),
        Expr::Function { name, args, .. } => {
            if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
                m.has_aggregate = true;
            }
            for arg in args {
                walk_expr(arg, m);
            }
        }
        Expr::Subquery(query) | Expr::Exists(query) => {
            m.has_subquery = true;
            walk_statement(query, m);
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk_expr(expr, m);
            m.has_subquery = true;
            walk_statement(subquery, m);
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(expr, m);
            for item in list {
                walk_expr(item, m);
            }
        }
        Expr::Between { expr, low, high, .. } => {
            walk_expr(expr, m);
            walk_expr(low, m);
            walk_expr(high, m);
        }
        Expr::IsNull { expr, .. } => walk_expr(expr, m),
        Expr::Case { operand, when_clauses, else_clause } => {
            if let Some(op) = operand {
                walk_expr(op, m);
            }
            for (when, then) in when_clauses {
                walk_expr(when, m);
                walk_expr(then, m);
            }
            if let Some(else_expr) = else_clause {
                walk_expr(else_expr, m);
            }
        }
        Expr::Cast { expr, .. } | Expr::TypeCast { expr, .. } => walk_expr(expr, m),
    }
}
