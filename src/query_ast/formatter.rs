//! Canonical SQL renderer.
//!
//! Converts a parsed [`Statement`] back into deterministic, readable
//! SQL: upper-case keywords, one clause per line, one list item per
//! continuation line when a list has more than one entry. Formatting is
//! a pure function of the AST and is idempotent under re-parsing.

use super::ast::*;
use super::token::is_plain_identifier;

const INDENT: &str = "    ";

/// Render a statement as canonical SQL. Total: every valid AST has a
/// rendering.
pub fn format_statement(stmt: &Statement) -> String {
    format_statement_at(stmt, 0)
}

fn indent(level: usize) -> String {
    INDENT.repeat(level)
}

/// Quote an identifier only when it needs it: keyword collision or a
/// non-simple shape.
fn format_ident(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn format_object_name(name: &ObjectName) -> String {
    match &name.schema {
        Some(schema) => format!("{}.{}", format_ident(schema), format_ident(&name.name)),
        None => format_ident(&name.name),
    }
}

fn format_statement_at(stmt: &Statement, depth: usize) -> String {
    match stmt {
        Statement::Select(s) => format_select(s, depth),
        Statement::Insert(i) => format_insert(i),
        Statement::Update(u) => format_update(u),
        Statement::Delete(d) => format_delete(d),
        Statement::SetOperation(s) => format_set_operation(s, depth),
        Statement::Explain(e) => format_explain(e, depth),
    }
}

fn format_set_operation(set_op: &SetOpStmt, depth: usize) -> String {
    let op = match set_op.op {
        SetOperator::Union => "UNION",
        SetOperator::Intersect => "INTERSECT",
        SetOperator::Except => "EXCEPT",
    };
    let all = if set_op.all { " ALL" } else { "" };
    format!(
        "{}\n{}{}{}\n{}",
        format_statement_at(&set_op.left, depth),
        indent(depth),
        op,
        all,
        format_statement_at(&set_op.right, depth),
    )
}

fn format_explain(explain: &ExplainStmt, depth: usize) -> String {
    let mut head = String::from("EXPLAIN");
    if explain.options.is_empty() {
        if explain.analyze {
            head.push_str(" ANALYZE");
        }
        if explain.verbose {
            head.push_str(" VERBOSE");
        }
        if let Some(format) = &explain.format {
            head.push_str(" FORMAT ");
            head.push_str(format);
        }
    } else {
        // Extra option words only exist in the parenthesized form.
        let mut options = Vec::new();
        if explain.analyze {
            options.push("ANALYZE".to_string());
        }
        if explain.verbose {
            options.push("VERBOSE".to_string());
        }
        options.extend(explain.options.iter().cloned());
        if let Some(format) = &explain.format {
            options.push(format!("FORMAT {format}"));
        }
        head.push_str(&format!(" ({})", options.join(", ")));
    }
    format!("{}\n{}", head, format_statement_at(&explain.statement, depth))
}

fn format_select(select: &SelectStmt, depth: usize) -> String {
    let prefix = indent(depth);
    let mut lines: Vec<String> = Vec::new();

    let mut head = format!("{prefix}SELECT");
    if select.distinct {
        head.push_str(" DISTINCT");
    }
    if select.columns.len() == 1 {
        head.push(' ');
        head.push_str(&format_select_item(&select.columns[0]));
    } else {
        for (i, item) in select.columns.iter().enumerate() {
            let comma = if i + 1 < select.columns.len() { "," } else { "" };
            head.push_str(&format!("\n{prefix}{INDENT}{}{comma}", format_select_item(item)));
        }
    }
    lines.push(head);

    if let Some(from) = &select.from {
        lines.push(format!("{prefix}FROM {}", format_from(from, depth)));
    }
    for join in &select.joins {
        lines.push(format_join(join, depth));
    }
    if let Some(filter) = &select.filter {
        lines.push(format!("{prefix}WHERE {}", format_expr(filter)));
    }
    if !select.group_by.is_empty() {
        let groups: Vec<String> = select.group_by.iter().map(format_expr).collect();
        lines.push(format!("{prefix}GROUP BY {}", groups.join(", ")));
    }
    if let Some(having) = &select.having {
        lines.push(format!("{prefix}HAVING {}", format_expr(having)));
    }
    if !select.order_by.is_empty() {
        let orders: Vec<String> = select.order_by.iter().map(format_order_item).collect();
        lines.push(format!("{prefix}ORDER BY {}", orders.join(", ")));
    }
    if let Some(limit) = &select.limit {
        lines.push(format!("{prefix}LIMIT {}", format_expr(limit)));
    }
    if let Some(offset) = &select.offset {
        lines.push(format!("{prefix}OFFSET {}", format_expr(offset)));
    }

    lines.join("\n")
}

fn format_select_item(item: &SelectItem) -> String {
    match item {
        SelectItem::Wildcard => "*".to_string(),
        SelectItem::QualifiedWildcard(table) => format!("{}.*", format_ident(table)),
        SelectItem::Expr { expr, alias } => {
            let rendered = format_expr(expr);
            match alias {
                Some(a) => format!("{rendered} AS {}", format_ident(a)),
                None => rendered,
            }
        }
    }
}

fn format_from(from: &FromClause, depth: usize) -> String {
    match from {
        FromClause::Table { name, alias } => {
            let mut s = format_object_name(name);
            if let Some(a) = alias {
                s.push_str(&format!(" AS {}", format_ident(a)));
            }
            s
        }
        FromClause::Subquery { query, alias } => {
            let mut s = format!(
                "(\n{}\n{})",
                format_statement_at(query, depth + 1),
                indent(depth),
            );
            if let Some(a) = alias {
                s.push_str(&format!(" AS {}", format_ident(a)));
            }
            s
        }
    }
}

fn format_join(join: &Join, depth: usize) -> String {
    let prefix = indent(depth);
    let keyword = match join.kind {
        JoinKind::Inner => "JOIN",
        JoinKind::Left => "LEFT JOIN",
        JoinKind::Right => "RIGHT JOIN",
        JoinKind::Full => "FULL JOIN",
        JoinKind::Cross => "CROSS JOIN",
    };
    let mut s = format!("{prefix}{keyword} {}", format_from(&join.source, depth));
    if let Some(condition) = &join.condition {
        s.push_str(&format!("\n{prefix}{INDENT}ON {}", format_expr(condition)));
    }
    s
}

fn format_order_item(item: &OrderItem) -> String {
    let mut s = format_expr(&item.expr);
    match item.asc {
        Some(true) => s.push_str(" ASC"),
        Some(false) => s.push_str(" DESC"),
        None => {}
    }
    match item.nulls_first {
        Some(true) => s.push_str(" NULLS FIRST"),
        Some(false) => s.push_str(" NULLS LAST"),
        None => {}
    }
    s
}

fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => format_literal(lit),
        Expr::Column { table, name } => match table {
            Some(t) => format!("{}.{}", format_ident(t), format_ident(name)),
            None => format_ident(name),
        },
        Expr::BinaryOp { left, op, right } => {
            format!("{} {} {}", format_expr(left), binary_op_text(*op), format_expr(right))
        }
        Expr::UnaryOp { op, expr } => {
            let inner = format_expr(expr);
            match op {
                UnaryOperator::Not => format!("NOT {inner}"),
                // A space keeps "- -1" from collapsing into a line comment.
                UnaryOperator::Minus if inner.starts_with('-') => format!("- {inner}"),
                UnaryOperator::Minus => format!("-{inner}"),
                UnaryOperator::Plus => format!("+{inner}"),
            }
        }
        Expr::Function { name, args, distinct } => {
            let distinct_str = if *distinct { "DISTINCT " } else { "" };
            let rendered: Vec<String> = args.iter().map(format_expr).collect();
            format!("{name}({distinct_str}{})", rendered.join(", "))
        }
        Expr::Subquery(query) => format!("({})", format_statement(query)),
        Expr::Exists(query) => format!("EXISTS ({})", format_statement(query)),
        Expr::InList { expr, list, negated } => {
            let not = if *negated { "NOT " } else { "" };
            let items: Vec<String> = list.iter().map(format_expr).collect();
            format!("{} {not}IN ({})", format_expr(expr), items.join(", "))
        }
        Expr::InSubquery { expr, subquery, negated } => {
            let not = if *negated { "NOT " } else { "" };
            format!("{} {not}IN ({})", format_expr(expr), format_statement(subquery))
        }
        Expr::Between { expr, low, high, negated } => {
            let not = if *negated { "NOT " } else { "" };
            format!(
                "{} {not}BETWEEN {} AND {}",
                format_expr(expr),
                format_expr(low),
                format_expr(high),
            )
        }
        Expr::IsNull { expr, negated } => {
            let not = if *negated { "NOT " } else { "" };
            format!("{} IS {not}NULL", format_expr(expr))
        }
        Expr::Case { operand, when_clauses, else_clause } => {
            let mut s = String::from("CASE");
            if let Some(op) = operand {
                s.push(' ');
                s.push_str(&format_expr(op));
            }
            for (when, then) in when_clauses {
                s.push_str(&format!(" WHEN {} THEN {}", format_expr(when), format_expr(then)));
            }
            if let Some(else_expr) = else_clause {
                s.push_str(&format!(" ELSE {}", format_expr(else_expr)));
            }
            s.push_str(" END");
            s
        }
        Expr::Cast { expr, data_type } => {
            format!("CAST({} AS {data_type})", format_expr(expr))
        }
        Expr::TypeCast { expr, data_type } => {
            format!("{}::{data_type}", format_expr(expr))
        }
        Expr::Nested(inner) => format!("({})", format_expr(inner)),
        Expr::Wildcard => "*".to_string(),
        Expr::Parameter(index) => format!("${index}"),
    }
}

fn format_literal(lit: &Literal) -> String {
    match lit {
        Literal::Null => "NULL".to_string(),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => format!("{f}"),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn binary_op_text(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Eq => "=",
        BinaryOperator::NotEq => "<>",
        BinaryOperator::Lt => "<",
        BinaryOperator::LtEq => "<=",
        BinaryOperator::Gt => ">",
        BinaryOperator::GtEq => ">=",
        BinaryOperator::And => "AND",
        BinaryOperator::Or => "OR",
        BinaryOperator::Plus => "+",
        BinaryOperator::Minus => "-",
        BinaryOperator::Multiply => "*",
        BinaryOperator::Divide => "/",
        BinaryOperator::Modulo => "%",
        BinaryOperator::Like => "LIKE",
        BinaryOperator::ILike => "ILIKE",
        BinaryOperator::NotLike => "NOT LIKE",
        BinaryOperator::NotILike => "NOT ILIKE",
        BinaryOperator::Concat => "||",
    }
}

fn format_insert(insert: &InsertStmt) -> String {
    let mut s = format!("INSERT INTO {}", format_object_name(&insert.table));
    if !insert.columns.is_empty() {
        let cols: Vec<String> = insert.columns.iter().map(|c| format_ident(c)).collect();
        s.push_str(&format!(" ({})", cols.join(", ")));
    }
    match &insert.source {
        InsertSource::Values(rows) => {
            let rendered: Vec<String> = rows
                .iter()
                .map(|row| {
                    let values: Vec<String> = row.iter().map(format_expr).collect();
                    format!("{INDENT}({})", values.join(", "))
                })
                .collect();
            s.push_str(&format!("\nVALUES\n{}", rendered.join(",\n")));
        }
        InsertSource::Query(query) => {
            s.push('\n');
            s.push_str(&format_statement(query));
        }
    }
    s.push_str(&format_returning(&insert.returning));
    s
}

fn format_update(update: &UpdateStmt) -> String {
    let sets: Vec<String> = update
        .assignments
        .iter()
        .map(|a| format!("{INDENT}{} = {}", format_ident(&a.column), format_expr(&a.value)))
        .collect();
    let mut s = format!(
        "UPDATE {}\nSET\n{}",
        format_object_name(&update.table),
        sets.join(",\n"),
    );
    if let Some(filter) = &update.filter {
        s.push_str(&format!("\nWHERE {}", format_expr(filter)));
    }
    s.push_str(&format_returning(&update.returning));
    s
}

fn format_delete(delete: &DeleteStmt) -> String {
    let mut s = format!("DELETE FROM {}", format_object_name(&delete.table));
    if let Some(filter) = &delete.filter {
        s.push_str(&format!("\nWHERE {}", format_expr(filter)));
    }
    s.push_str(&format_returning(&delete.returning));
    s
}

fn format_returning(items: &[SelectItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = items.iter().map(format_select_item).collect();
    format!("\nRETURNING {}", rendered.join(", "))
}
