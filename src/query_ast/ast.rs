//! SQL abstract syntax tree.
//!
//! A closed set of variants: the formatter and analyzer match on these
//! exhaustively, so a new statement kind is a compile-time change
//! everywhere it matters. Trees are built by the parser in one call and
//! immutable afterwards.

/// One parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStmt>),
    Insert(Box<InsertStmt>),
    Update(Box<UpdateStmt>),
    Delete(Box<DeleteStmt>),
    SetOperation(Box<SetOpStmt>),
    Explain(Box<ExplainStmt>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Option<FromClause>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

/// Two query arms combined by UNION / INTERSECT / EXCEPT. Chains are
/// built left-to-right: `a UNION b UNION c` nests `(a UNION b)` on the
/// left.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOpStmt {
    pub left: Statement,
    pub op: SetOperator,
    pub all: bool,
    pub right: Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainStmt {
    pub analyze: bool,
    pub verbose: bool,
    pub format: Option<String>,
    /// Option words from a parenthesized list that are not modeled
    /// explicitly, e.g. BUFFERS.
    pub options: Vec<String>,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: ObjectName,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub returning: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Query(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: ObjectName,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expr>,
    pub returning: Vec<SelectItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: ObjectName,
    pub filter: Option<Expr>,
    pub returning: Vec<SelectItem>,
}

/// Optionally schema-qualified table name.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    /// `t.*`
    QualifiedWildcard(String),
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table { name: ObjectName, alias: Option<String> },
    Subquery { query: Statement, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub source: FromClause,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub asc: Option<bool>,
    pub nulls_first: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Column { table: Option<String>, name: String },
    BinaryOp { left: Box<Expr>, op: BinaryOperator, right: Box<Expr> },
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },
    Function { name: String, args: Vec<Expr>, distinct: bool },
    Subquery(Box<Statement>),
    Exists(Box<Statement>),
    InList { expr: Box<Expr>, list: Vec<Expr>, negated: bool },
    InSubquery { expr: Box<Expr>, subquery: Box<Statement>, negated: bool },
    Between { expr: Box<Expr>, low: Box<Expr>, high: Box<Expr>, negated: bool },
    IsNull { expr: Box<Expr>, negated: bool },
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },
    /// `CAST(x AS type)`
    Cast { expr: Box<Expr>, data_type: String },
    /// `x::type`
    TypeCast { expr: Box<Expr>, data_type: String },
    /// Explicitly parenthesized subexpression; kept so formatting
    /// preserves the author's grouping.
    Nested(Box<Expr>),
    /// `*` in expression position, e.g. COUNT(*).
    Wildcard,
    /// `$n` placeholder.
    Parameter(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Like,
    ILike,
    NotLike,
    NotILike,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}
