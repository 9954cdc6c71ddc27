//! Recursive-descent SQL parser.
//!
//! Consumes the lexer's token stream and produces a [`Statement`].
//! Fails fast on the first grammar violation; no recovery, no partial
//! trees. Expression parsing is precedence-climbing with the ladder
//! `OR < AND < NOT < comparison < additive < multiplicative < unary
//! < ::`. Subquery and expression nesting is bounded by an explicit
//! depth counter so pathological input gets a typed error instead of
//! blowing the native stack.

use super::ast::*;
use super::errors::{Position, SqlError};
use super::lexer::tokenize;
use super::token::{Token, TokenKind};

/// Default nesting ceiling; override with [`Parser::with_max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parse a single SQL statement.
pub fn parse(sql: &str) -> Result<Statement, SqlError> {
    Parser::new(tokenize(sql)?).parse_single()
}

/// Parse a `;`-separated statement list. Returns an error if the input
/// holds no statement at all.
pub fn parse_statements(sql: &str) -> Result<Vec<Statement>, SqlError> {
    Parser::new(tokenize(sql)?).parse_all()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_max_depth(tokens, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(mut tokens: Vec<Token>, max_depth: usize) -> Self {
        // The cursor relies on a trailing Eof sentinel; the lexer
        // always emits one, but these constructors take any vector.
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_else(Position::start);
            tokens.push(Token { kind: TokenKind::Eof, text: String::new(), pos });
        }
        Self { tokens, pos: 0, depth: 0, max_depth }
    }

    pub fn parse_single(mut self) -> Result<Statement, SqlError> {
        let stmt = self.parse_statement()?;
        self.eat_punct(";");
        if !self.at_eof() {
            return Err(self.expected("end of statement"));
        }
        Ok(stmt)
    }

    pub fn parse_all(mut self) -> Result<Vec<Statement>, SqlError> {
        let mut statements = Vec::new();
        loop {
            while self.eat_punct(";") {}
            if self.at_eof() {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.at_eof() && !self.check_punct(";") {
                return Err(self.expected("';' or end of input"));
            }
        }
        if statements.is_empty() {
            return Err(self.expected("a SQL statement"));
        }
        log::debug!("parsed {} statement(s)", statements.len());
        Ok(statements)
    }

    // === token cursor ===

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), SqlError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.expected(word))
        }
    }

    fn check_punct(&self, text: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Punct && t.text == text
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.check_punct(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, text: &str) -> Result<(), SqlError> {
        if self.eat_punct(text) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{text}'")))
        }
    }

    fn check_op(&self, text: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Operator && t.text == text
    }

    fn eat_op(&mut self, text: &str) -> bool {
        if self.check_op(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: &str) -> SqlError {
        let found = self.peek();
        SqlError::Parse {
            position: found.pos,
            expected: what.to_string(),
            found: found.describe(),
        }
    }

    fn enter(&mut self) -> Result<(), SqlError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SqlError::TooDeep { limit: self.max_depth });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // === statements ===

    fn parse_statement(&mut self) -> Result<Statement, SqlError> {
        let token = self.peek();
        if token.kind != TokenKind::Keyword {
            return Err(self.expected("a statement keyword"));
        }
        match token.text.to_ascii_uppercase().as_str() {
            "SELECT" => self.parse_query(),
            "INSERT" => self.parse_insert(),
            "UPDATE" => self.parse_update(),
            "DELETE" => self.parse_delete(),
            "EXPLAIN" => self.parse_explain(),
            "WITH" => Err(SqlError::Unsupported { construct: "WITH query (common table expression)" }),
            "MERGE" => Err(SqlError::Unsupported { construct: "MERGE statement" }),
            "CREATE" => Err(SqlError::Unsupported { construct: "CREATE statement" }),
            "DROP" => Err(SqlError::Unsupported { construct: "DROP statement" }),
            "ALTER" => Err(SqlError::Unsupported { construct: "ALTER statement" }),
            "TRUNCATE" => Err(SqlError::Unsupported { construct: "TRUNCATE statement" }),
            "GRANT" => Err(SqlError::Unsupported { construct: "GRANT statement" }),
            "REVOKE" => Err(SqlError::Unsupported { construct: "REVOKE statement" }),
            _ => Err(self.expected("a statement keyword")),
        }
    }

    /// SELECT plus any trailing set operations, combined left-to-right.
    fn parse_query(&mut self) -> Result<Statement, SqlError> {
        let mut left = Statement::Select(Box::new(self.parse_select()?));
        loop {
            let op = if self.check_keyword("UNION") {
                SetOperator::Union
            } else if self.check_keyword("INTERSECT") {
                SetOperator::Intersect
            } else if self.check_keyword("EXCEPT") {
                SetOperator::Except
            } else {
                break;
            };
            self.advance();
            let all = self.eat_keyword("ALL");
            let right = Statement::Select(Box::new(self.parse_select()?));
            left = Statement::SetOperation(Box::new(SetOpStmt { left, op, all, right }));
        }
        Ok(left)
    }

    fn parse_select(&mut self) -> Result<SelectStmt, SqlError> {
        self.enter()?;
        let result = self.parse_select_inner();
        self.leave();
        result
    }

    fn parse_select_inner(&mut self) -> Result<SelectStmt, SqlError> {
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");
        if !distinct {
            // SELECT ALL is the default quantifier.
            self.eat_keyword("ALL");
        }

        let mut columns = vec![self.parse_select_item()?];
        while self.eat_punct(",") {
            columns.push(self.parse_select_item()?);
        }

        let mut select = SelectStmt { distinct, columns, ..SelectStmt::default() };

        if self.eat_keyword("FROM") {
            select.from = Some(self.parse_from_item()?);
            select.joins = self.parse_joins()?;
        }
        if self.eat_keyword("WHERE") {
            select.filter = Some(self.parse_expr()?);
        }
        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            select.group_by.push(self.parse_expr()?);
            while self.eat_punct(",") {
                select.group_by.push(self.parse_expr()?);
            }
        }
        if self.eat_keyword("HAVING") {
            select.having = Some(self.parse_expr()?);
        }
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            select.order_by.push(self.parse_order_item()?);
            while self.eat_punct(",") {
                select.order_by.push(self.parse_order_item()?);
            }
        }
        if self.eat_keyword("LIMIT") {
            select.limit = Some(self.parse_expr()?);
        }
        if self.eat_keyword("OFFSET") {
            select.offset = Some(self.parse_expr()?);
        }
        Ok(select)
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, SqlError> {
        if self.check_op("*") {
            self.advance();
            return Ok(SelectItem::Wildcard);
        }
        // t.* needs a two-token lookahead before expression parsing.
        if self.peek_is_name()
            && self.peek_at(1).kind == TokenKind::Punct
            && self.peek_at(1).text == "."
            && self.peek_at(2).kind == TokenKind::Operator
            && self.peek_at(2).text == "*"
        {
            let table = self.advance().text;
            self.advance();
            self.advance();
            return Ok(SelectItem::QualifiedWildcard(table));
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn peek_is_name(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier | TokenKind::QuotedIdentifier
        )
    }

    /// `[AS] name`, where a bare name must not be a keyword so clause
    /// keywords stay unconsumed.
    fn parse_alias(&mut self) -> Result<Option<String>, SqlError> {
        if self.eat_keyword("AS") {
            return Ok(Some(self.parse_name()?));
        }
        if self.peek_is_name() {
            return Ok(Some(self.advance().text));
        }
        Ok(None)
    }

    fn parse_name(&mut self) -> Result<String, SqlError> {
        if self.peek_is_name() {
            Ok(self.advance().text)
        } else {
            Err(self.expected("an identifier"))
        }
    }

    fn parse_object_name(&mut self) -> Result<ObjectName, SqlError> {
        let first = self.parse_name()?;
        if self.check_punct(".") && self.peek_is_name_at(1) {
            self.advance();
            let name = self.parse_name()?;
            Ok(ObjectName { schema: Some(first), name })
        } else {
            Ok(ObjectName { schema: None, name: first })
        }
    }

    fn parse_from_item(&mut self) -> Result<FromClause, SqlError> {
        if self.eat_punct("(") {
            let query = self.parse_query()?;
            self.expect_punct(")")?;
            let alias = self.parse_alias()?;
            return Ok(FromClause::Subquery { query, alias });
        }
        let name = self.parse_object_name()?;
        let alias = self.parse_alias()?;
        Ok(FromClause::Table { name, alias })
    }

    fn parse_joins(&mut self) -> Result<Vec<Join>, SqlError> {
        let mut joins = Vec::new();
        loop {
            if self.check_keyword("NATURAL") {
                return Err(SqlError::Unsupported { construct: "NATURAL join" });
            }
            let kind = if self.eat_keyword("JOIN") {
                JoinKind::Inner
            } else if self.check_keyword("INNER") {
                self.advance();
                self.expect_keyword("JOIN")?;
                JoinKind::Inner
            } else if self.check_keyword("LEFT") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinKind::Left
            } else if self.check_keyword("RIGHT") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinKind::Right
            } else if self.check_keyword("FULL") {
                self.advance();
                self.eat_keyword("OUTER");
                self.expect_keyword("JOIN")?;
                JoinKind::Full
            } else if self.check_keyword("CROSS") {
                self.advance();
                self.expect_keyword("JOIN")?;
                JoinKind::Cross
            } else {
                break;
            };

            let source = self.parse_from_item()?;
            let condition = if self.eat_keyword("ON") {
                Some(self.parse_expr()?)
            } else if self.check_keyword("USING") {
                return Err(SqlError::Unsupported { construct: "USING join constraint" });
            } else {
                None
            };
            joins.push(Join { kind, source, condition });
        }
        Ok(joins)
    }

    fn parse_order_item(&mut self) -> Result<OrderItem, SqlError> {
        let expr = self.parse_expr()?;
        let asc = if self.eat_keyword("ASC") {
            Some(true)
        } else if self.eat_keyword("DESC") {
            Some(false)
        } else {
            None
        };
        let nulls_first = if self.eat_keyword("NULLS") {
            if self.eat_keyword("FIRST") {
                Some(true)
            } else {
                self.expect_keyword("LAST")?;
                Some(false)
            }
        } else {
            None
        };
        Ok(OrderItem { expr, asc, nulls_first })
    }

    fn parse_explain(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("EXPLAIN")?;
        let mut explain = ExplainStmt {
            analyze: false,
            verbose: false,
            format: None,
            options: Vec::new(),
            statement: Statement::Select(Box::new(SelectStmt::default())),
        };

        if self.eat_punct("(") {
            // PostgreSQL option-list form: EXPLAIN (ANALYZE, FORMAT JSON) ...
            loop {
                let word = self.parse_option_word()?;
                let value = if !self.check_punct(",") && !self.check_punct(")") {
                    Some(self.parse_option_word()?)
                } else {
                    None
                };
                self.apply_explain_option(&mut explain, word, value);
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct(")")?;
        } else {
            loop {
                if self.eat_keyword("ANALYZE") {
                    explain.analyze = true;
                } else if self.eat_keyword("VERBOSE") {
                    explain.verbose = true;
                } else if self.eat_keyword("FORMAT") {
                    explain.format = Some(self.parse_option_word()?);
                } else {
                    break;
                }
            }
        }
        explain.statement = self.parse_statement()?;
        Ok(Statement::Explain(Box::new(explain)))
    }

    fn parse_option_word(&mut self) -> Result<String, SqlError> {
        let t = self.peek();
        match t.kind {
            TokenKind::Keyword | TokenKind::Identifier | TokenKind::Number => {
                Ok(self.advance().text.to_ascii_uppercase())
            }
            _ => Err(self.expected("an EXPLAIN option")),
        }
    }

    fn apply_explain_option(&self, explain: &mut ExplainStmt, word: String, value: Option<String>) {
        let enabled = !matches!(value.as_deref(), Some("FALSE") | Some("OFF") | Some("0"));
        match word.as_str() {
            "ANALYZE" => explain.analyze = enabled,
            "VERBOSE" => explain.verbose = enabled,
            "FORMAT" => explain.format = value,
            _ => explain.options.push(word),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("INSERT")?;
        self.expect_keyword("INTO")?;
        let table = self.parse_object_name()?;

        let mut columns = Vec::new();
        if self.eat_punct("(") {
            columns.push(self.parse_name()?);
            while self.eat_punct(",") {
                columns.push(self.parse_name()?);
            }
            self.expect_punct(")")?;
        }

        let source = if self.eat_keyword("VALUES") {
            let mut rows = vec![self.parse_value_row()?];
            while self.eat_punct(",") {
                rows.push(self.parse_value_row()?);
            }
            InsertSource::Values(rows)
        } else if self.check_keyword("SELECT") {
            InsertSource::Query(self.parse_query()?)
        } else {
            return Err(self.expected("VALUES or SELECT"));
        };

        let returning = self.parse_returning()?;
        Ok(Statement::Insert(Box::new(InsertStmt { table, columns, source, returning })))
    }

    fn parse_value_row(&mut self) -> Result<Vec<Expr>, SqlError> {
        self.expect_punct("(")?;
        let mut row = vec![self.parse_expr()?];
        while self.eat_punct(",") {
            row.push(self.parse_expr()?);
        }
        self.expect_punct(")")?;
        Ok(row)
    }

    fn parse_update(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("UPDATE")?;
        let table = self.parse_object_name()?;
        self.expect_keyword("SET")?;

        let mut assignments = vec![self.parse_assignment()?];
        while self.eat_punct(",") {
            assignments.push(self.parse_assignment()?);
        }

        let filter = if self.eat_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let returning = self.parse_returning()?;
        Ok(Statement::Update(Box::new(UpdateStmt { table, assignments, filter, returning })))
    }

    fn parse_assignment(&mut self) -> Result<Assignment, SqlError> {
        let column = self.parse_name()?;
        if !self.eat_op("=") {
            return Err(self.expected("'='"));
        }
        let value = self.parse_expr()?;
        Ok(Assignment { column, value })
    }

    fn parse_delete(&mut self) -> Result<Statement, SqlError> {
        self.expect_keyword("DELETE")?;
        self.expect_keyword("FROM")?;
        let table = self.parse_object_name()?;
        let filter = if self.eat_keyword("WHERE") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let returning = self.parse_returning()?;
        Ok(Statement::Delete(Box::new(DeleteStmt { table, filter, returning })))
    }

    fn parse_returning(&mut self) -> Result<Vec<SelectItem>, SqlError> {
        let mut items = Vec::new();
        if self.eat_keyword("RETURNING") {
            items.push(self.parse_select_item()?);
            while self.eat_punct(",") {
                items.push(self.parse_select_item()?);
            }
        }
        Ok(items)
    }

    // === expressions ===

    pub fn parse_expr(&mut self) -> Result<Expr, SqlError> {
        self.enter()?;
        let result = self.parse_or();
        self.leave();
        result
    }

    fn parse_or(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SqlError> {
        if self.eat_keyword("NOT") {
            // Prefix chains recurse once per token, so they count
            // against the depth ceiling like any other nesting.
            self.enter()?;
            let inner = self.parse_not();
            self.leave();
            return Ok(Expr::UnaryOp { op: UnaryOperator::Not, expr: Box::new(inner?) });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_additive()?;
        loop {
            // Infix NOT flips the operator that follows it.
            let negated = if self.check_keyword("NOT")
                && (self.peek_at(1).is_keyword("BETWEEN")
                    || self.peek_at(1).is_keyword("IN")
                    || self.peek_at(1).is_keyword("LIKE")
                    || self.peek_at(1).is_keyword("ILIKE"))
            {
                self.advance();
                true
            } else {
                false
            };

            if self.eat_keyword("BETWEEN") {
                let low = self.parse_additive()?;
                self.expect_keyword("AND")?;
                let high = self.parse_additive()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
                continue;
            }
            if self.eat_keyword("IN") {
                left = self.parse_in_rhs(left, negated)?;
                continue;
            }
            if self.eat_keyword("LIKE") {
                let op = if negated { BinaryOperator::NotLike } else { BinaryOperator::Like };
                let right = self.parse_additive()?;
                left = binary(left, op, right);
                continue;
            }
            if self.eat_keyword("ILIKE") {
                let op = if negated { BinaryOperator::NotILike } else { BinaryOperator::ILike };
                let right = self.parse_additive()?;
                left = binary(left, op, right);
                continue;
            }
            if negated {
                return Err(self.expected("BETWEEN, IN, LIKE, or ILIKE"));
            }
            if self.eat_keyword("IS") {
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("NULL")?;
                left = Expr::IsNull { expr: Box::new(left), negated };
                continue;
            }

            let op = if self.eat_op("=") {
                BinaryOperator::Eq
            } else if self.eat_op("<>") || self.eat_op("!=") {
                BinaryOperator::NotEq
            } else if self.eat_op("<=") {
                BinaryOperator::LtEq
            } else if self.eat_op(">=") {
                BinaryOperator::GtEq
            } else if self.eat_op("<") {
                BinaryOperator::Lt
            } else if self.eat_op(">") {
                BinaryOperator::Gt
            } else {
                break;
            };
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_in_rhs(&mut self, left: Expr, negated: bool) -> Result<Expr, SqlError> {
        self.expect_punct("(")?;
        if self.check_keyword("SELECT") {
            let subquery = self.parse_query()?;
            self.expect_punct(")")?;
            return Ok(Expr::InSubquery {
                expr: Box::new(left),
                subquery: Box::new(subquery),
                negated,
            });
        }
        let mut list = vec![self.parse_expr()?];
        while self.eat_punct(",") {
            list.push(self.parse_expr()?);
        }
        self.expect_punct(")")?;
        Ok(Expr::InList { expr: Box::new(left), list, negated })
    }

    fn parse_additive(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_op("+") {
                BinaryOperator::Plus
            } else if self.eat_op("-") {
                BinaryOperator::Minus
            } else if self.eat_op("||") {
                BinaryOperator::Concat
            } else {
                break;
            };
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SqlError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_op("*") {
                BinaryOperator::Multiply
            } else if self.eat_op("/") {
                BinaryOperator::Divide
            } else if self.eat_op("%") {
                BinaryOperator::Modulo
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SqlError> {
        let op = if self.eat_op("-") {
            UnaryOperator::Minus
        } else if self.eat_op("+") {
            UnaryOperator::Plus
        } else {
            return self.parse_postfix();
        };
        // Sign chains recurse once per token; bound them like any
        // other nesting.
        self.enter()?;
        let inner = self.parse_unary();
        self.leave();
        Ok(Expr::UnaryOp { op, expr: Box::new(inner?) })
    }

    /// Primary expression followed by any number of `::type` casts.
    fn parse_postfix(&mut self) -> Result<Expr, SqlError> {
        let mut expr = self.parse_primary()?;
        while self.eat_op("::") {
            let data_type = self.parse_type_name()?;
            expr = Expr::TypeCast { expr: Box::new(expr), data_type };
        }
        Ok(expr)
    }

    /// Type names are a single word with an optional length list,
    /// rendered upper-case: `varchar(10)` becomes `VARCHAR(10)`.
    fn parse_type_name(&mut self) -> Result<String, SqlError> {
        let t = self.peek();
        if !matches!(t.kind, TokenKind::Identifier | TokenKind::Keyword) {
            return Err(self.expected("a type name"));
        }
        let mut name = self.advance().text.to_ascii_uppercase();
        if self.eat_punct("(") {
            let mut args = Vec::new();
            loop {
                let arg = self.peek();
                if arg.kind != TokenKind::Number {
                    return Err(self.expected("a type length"));
                }
                args.push(self.advance().text);
                if !self.eat_punct(",") {
                    break;
                }
            }
            self.expect_punct(")")?;
            name.push('(');
            name.push_str(&args.join(", "));
            name.push(')');
        }
        Ok(name)
    }

    fn parse_primary(&mut self) -> Result<Expr, SqlError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Expr::Literal(parse_number(&token.text)))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(Literal::String(token.text)))
            }
            TokenKind::Parameter => {
                self.advance();
                let index = token.text.parse::<usize>().map_err(|_| SqlError::Parse {
                    position: token.pos,
                    expected: "a parameter index".to_string(),
                    found: format!("'${}'", token.text),
                })?;
                Ok(Expr::Parameter(index))
            }
            TokenKind::Operator if token.text == "*" => {
                self.advance();
                Ok(Expr::Wildcard)
            }
            TokenKind::Punct if token.text == "(" => {
                self.advance();
                if self.check_keyword("SELECT") {
                    let query = self.parse_query()?;
                    self.expect_punct(")")?;
                    Ok(Expr::Subquery(Box::new(query)))
                } else {
                    let inner = self.parse_expr()?;
                    self.expect_punct(")")?;
                    Ok(Expr::Nested(Box::new(inner)))
                }
            }
            TokenKind::Keyword => self.parse_keyword_primary(&token),
            TokenKind::Identifier | TokenKind::QuotedIdentifier => self.parse_name_primary(),
            _ => Err(self.expected("an expression")),
        }
    }

    fn parse_keyword_primary(&mut self, token: &Token) -> Result<Expr, SqlError> {
        if self.eat_keyword("NULL") {
            return Ok(Expr::Literal(Literal::Null));
        }
        if self.eat_keyword("TRUE") {
            return Ok(Expr::Literal(Literal::Boolean(true)));
        }
        if self.eat_keyword("FALSE") {
            return Ok(Expr::Literal(Literal::Boolean(false)));
        }
        if self.eat_keyword("CASE") {
            return self.parse_case();
        }
        if self.eat_keyword("CAST") {
            self.expect_punct("(")?;
            let expr = self.parse_expr()?;
            self.expect_keyword("AS")?;
            let data_type = self.parse_type_name()?;
            self.expect_punct(")")?;
            return Ok(Expr::Cast { expr: Box::new(expr), data_type });
        }
        if self.eat_keyword("EXISTS") {
            self.expect_punct("(")?;
            let query = self.parse_query()?;
            self.expect_punct(")")?;
            return Ok(Expr::Exists(Box::new(query)));
        }
        let _ = token;
        Err(self.expected("an expression"))
    }

    fn parse_case(&mut self) -> Result<Expr, SqlError> {
        let operand = if self.check_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut when_clauses = Vec::new();
        self.expect_keyword("WHEN")?;
        loop {
            let when = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_expr()?;
            when_clauses.push((when, then));
            if !self.eat_keyword("WHEN") {
                break;
            }
        }
        let else_clause = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        Ok(Expr::Case { operand, when_clauses, else_clause })
    }

    /// Identifier-led expression: function call, qualified column, or
    /// bare column.
    fn parse_name_primary(&mut self) -> Result<Expr, SqlError> {
        let name = self.advance().text;

        if self.eat_punct("(") {
            let distinct = self.eat_keyword("DISTINCT");
            let mut args = Vec::new();
            if !self.check_punct(")") {
                args.push(self.parse_expr()?);
                while self.eat_punct(",") {
                    args.push(self.parse_expr()?);
                }
            }
            self.expect_punct(")")?;
            if self.check_keyword("OVER") {
                return Err(SqlError::Unsupported { construct: "window function (OVER)" });
            }
            return Ok(Expr::Function { name: name.to_ascii_uppercase(), args, distinct });
        }

        if self.check_punct(".") && self.peek_is_name_at(1) {
            self.advance();
            let column = self.advance().text;
            return Ok(Expr::Column { table: Some(name), name: column });
        }
        Ok(Expr::Column { table: None, name })
    }

    fn peek_is_name_at(&self, ahead: usize) -> bool {
        matches!(
            self.peek_at(ahead).kind,
            TokenKind::Identifier | TokenKind::QuotedIdentifier
        )
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) }
}

fn parse_number(text: &str) -> Literal {
    if !text.contains(['.', 'e', 'E'])
        && let Ok(i) = text.parse::<i64>()
    {
        return Literal::Integer(i);
    }
    match text.parse::<f64>() {
        Ok(f) => Literal::Float(f),
        // The lexer only emits well-formed numeric text.
        Err(_) => Literal::String(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> SelectStmt {
        match parse(sql).unwrap() {
            Statement::Select(s) => *s,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let s = select("SELECT * FROM users");
        assert_eq!(s.columns, vec![SelectItem::Wildcard]);
        assert!(matches!(s.from, Some(FromClause::Table { .. })));
    }

    #[test]
    fn test_parse_select_with_where() {
        let s = select("SELECT id, name FROM users WHERE age > 18");
        assert_eq!(s.columns.len(), 2);
        assert!(matches!(
            s.filter,
            Some(Expr::BinaryOp { op: BinaryOperator::Gt, .. })
        ));
    }

    #[test]
    fn test_parse_joins() {
        let s = select("SELECT * FROM a JOIN b ON a.id = b.a_id LEFT OUTER JOIN c ON b.id = c.b_id");
        assert_eq!(s.joins.len(), 2);
        assert_eq!(s.joins[0].kind, JoinKind::Inner);
        assert_eq!(s.joins[1].kind, JoinKind::Left);
        assert!(s.joins[1].condition.is_some());
    }

    #[test]
    fn test_parse_cross_join_without_condition() {
        let s = select("SELECT * FROM a CROSS JOIN b");
        assert_eq!(s.joins[0].kind, JoinKind::Cross);
        assert!(s.joins[0].condition.is_none());
    }

    #[test]
    fn test_parse_group_by_having() {
        let s = select("SELECT dept, COUNT(*) FROM emp GROUP BY dept HAVING COUNT(*) > 5");
        assert_eq!(s.group_by.len(), 1);
        assert!(s.having.is_some());
    }

    #[test]
    fn test_parse_order_limit_offset() {
        let s = select("SELECT * FROM users ORDER BY name DESC NULLS LAST LIMIT 10 OFFSET 5");
        assert_eq!(s.order_by[0].asc, Some(false));
        assert_eq!(s.order_by[0].nulls_first, Some(false));
        assert_eq!(s.limit, Some(Expr::Literal(Literal::Integer(10))));
        assert_eq!(s.offset, Some(Expr::Literal(Literal::Integer(5))));
    }

    #[test]
    fn test_parse_subquery_in_from() {
        let s = select("SELECT * FROM (SELECT id FROM users) u");
        match s.from {
            Some(FromClause::Subquery { alias, .. }) => assert_eq!(alias.as_deref(), Some("u")),
            other => panic!("expected subquery, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_in_subquery() {
        let s = select("SELECT * FROM users WHERE id IN (SELECT user_id FROM active)");
        assert!(matches!(
            s.filter,
            Some(Expr::InSubquery { negated: false, .. })
        ));
    }

    #[test]
    fn test_parse_not_in_list() {
        let s = select("SELECT * FROM t WHERE x NOT IN (1, 2, 3)");
        match s.filter {
            Some(Expr::InList { list, negated, .. }) => {
                assert!(negated);
                assert_eq!(list.len(), 3);
            }
            other => panic!("expected IN list, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_between() {
        let s = select("SELECT * FROM products WHERE price BETWEEN 10 AND 100");
        assert!(matches!(s.filter, Some(Expr::Between { negated: false, .. })));
    }

    #[test]
    fn test_parse_is_not_null() {
        let s = select("SELECT * FROM users WHERE email IS NOT NULL");
        assert!(matches!(s.filter, Some(Expr::IsNull { negated: true, .. })));
    }

    #[test]
    fn test_parse_case() {
        let s = select("SELECT CASE WHEN status = 'active' THEN 1 ELSE 0 END FROM users");
        match &s.columns[0] {
            SelectItem::Expr { expr: Expr::Case { when_clauses, else_clause, .. }, .. } => {
                assert_eq!(when_clauses.len(), 1);
                assert!(else_clause.is_some());
            }
            other => panic!("expected CASE, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_cast_forms() {
        let s = select("SELECT CAST(price AS INTEGER), price::numeric(10, 2) FROM products");
        assert!(matches!(
            &s.columns[0],
            SelectItem::Expr { expr: Expr::Cast { data_type, .. }, .. } if data_type == "INTEGER"
        ));
        assert!(matches!(
            &s.columns[1],
            SelectItem::Expr { expr: Expr::TypeCast { data_type, .. }, .. }
                if data_type == "NUMERIC(10, 2)"
        ));
    }

    #[test]
    fn test_parse_precedence() {
        // a OR b AND c parses as a OR (b AND c)
        let s = select("SELECT * FROM t WHERE a OR b AND c");
        match s.filter {
            Some(Expr::BinaryOp { op: BinaryOperator::Or, right, .. }) => {
                assert!(matches!(*right, Expr::BinaryOp { op: BinaryOperator::And, .. }));
            }
            other => panic!("expected OR at the top, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let s = select("SELECT 1 + 2 * 3");
        match &s.columns[0] {
            SelectItem::Expr { expr: Expr::BinaryOp { op: BinaryOperator::Plus, right, .. }, .. } => {
                assert!(matches!(**right, Expr::BinaryOp { op: BinaryOperator::Multiply, .. }));
            }
            other => panic!("expected + at the top, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_union_left_associative() {
        let stmt = parse("SELECT 1 UNION SELECT 2 UNION ALL SELECT 3").unwrap();
        match stmt {
            Statement::SetOperation(outer) => {
                assert_eq!(outer.op, SetOperator::Union);
                assert!(outer.all);
                assert!(matches!(outer.left, Statement::SetOperation(_)));
            }
            other => panic!("expected set operation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_insert_values() {
        let stmt = parse("INSERT INTO users (name, email) VALUES ('John', 'j@x.com') RETURNING id")
            .unwrap();
        match stmt {
            Statement::Insert(i) => {
                assert_eq!(i.columns, vec!["name", "email"]);
                assert!(matches!(i.source, InsertSource::Values(ref rows) if rows.len() == 1));
                assert_eq!(i.returning.len(), 1);
            }
            other => panic!("expected INSERT, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_update() {
        let stmt = parse("UPDATE users SET name = 'Jane' WHERE id = 1").unwrap();
        match stmt {
            Statement::Update(u) => {
                assert_eq!(u.assignments[0].column, "name");
                assert!(u.filter.is_some());
            }
            other => panic!("expected UPDATE, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete() {
        let stmt = parse("DELETE FROM users WHERE id = 1").unwrap();
        assert!(matches!(stmt, Statement::Delete(d) if d.filter.is_some()));
    }

    #[test]
    fn test_parse_explain_options() {
        let stmt = parse("EXPLAIN ANALYZE VERBOSE SELECT 1").unwrap();
        match stmt {
            Statement::Explain(e) => {
                assert!(e.analyze);
                assert!(e.verbose);
                assert!(matches!(e.statement, Statement::Select(_)));
            }
            other => panic!("expected EXPLAIN, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_explain_option_list() {
        let stmt = parse("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) SELECT 1").unwrap();
        match stmt {
            Statement::Explain(e) => {
                assert!(e.analyze);
                assert_eq!(e.format.as_deref(), Some("JSON"));
                assert_eq!(e.options, vec!["BUFFERS"]);
            }
            other => panic!("expected EXPLAIN, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_position() {
        let err = parse("SELECT * FORM users").unwrap_err();
        match err {
            SqlError::Parse { position, found, .. } => {
                // FORM starts at column 10
                assert_eq!(position.column, 10);
                assert_eq!(found, "'FORM'");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_cte_unsupported() {
        let err = parse("WITH a AS (SELECT 1) SELECT * FROM a").unwrap_err();
        assert!(matches!(err, SqlError::Unsupported { construct } if construct.contains("WITH")));
    }

    #[test]
    fn test_parse_window_function_unsupported() {
        let err = parse("SELECT ROW_NUMBER() OVER (ORDER BY id) FROM t").unwrap_err();
        assert!(matches!(err, SqlError::Unsupported { construct } if construct.contains("window")));
    }

    #[test]
    fn test_parse_too_deep() {
        let mut sql = String::from("SELECT ");
        for _ in 0..200 {
            sql.push('(');
        }
        sql.push('1');
        for _ in 0..200 {
            sql.push(')');
        }
        let tokens = tokenize(&sql).unwrap();
        let err = Parser::new(tokens).parse_single().unwrap_err();
        assert!(matches!(err, SqlError::TooDeep { limit: DEFAULT_MAX_DEPTH }));
    }

    #[test]
    fn test_parse_prefix_chains_hit_depth_ceiling() {
        // NOT and sign chains nest one level per token and must be
        // bounded by the same ceiling as parenthesized nesting.
        for prefix in ["NOT ", "- ", "+ "] {
            let sql = format!("SELECT {}1", prefix.repeat(100_000));
            assert!(
                matches!(parse(&sql), Err(SqlError::TooDeep { .. })),
                "unbounded recursion for prefix {prefix:?}",
            );
        }
        // Short chains still parse.
        assert!(parse("SELECT NOT NOT TRUE").is_ok());
        assert!(parse("SELECT - -1").is_ok());
    }

    #[test]
    fn test_parser_tolerates_missing_eof_sentinel() {
        assert!(Parser::new(Vec::new()).parse_single().is_err());
        let mut tokens = tokenize("SELECT 1").unwrap();
        tokens.pop(); // drop the Eof the lexer appended
        assert!(Parser::new(tokens).parse_single().is_ok());
    }

    #[test]
    fn test_parse_depth_ceiling_configurable() {
        let tokens = tokenize("SELECT ((1))").unwrap();
        assert!(Parser::with_max_depth(tokens.clone(), 2).parse_single().is_err());
        assert!(Parser::with_max_depth(tokens, 16).parse_single().is_ok());
    }

    #[test]
    fn test_parse_statements_split() {
        let stmts = parse_statements("SELECT 1; SELECT 2;").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_parse_quoted_identifier_column() {
        let s = select("SELECT \"order\" FROM t");
        assert!(matches!(
            &s.columns[0],
            SelectItem::Expr { expr: Expr::Column { name, .. }, .. } if name == "order"
        ));
    }

    #[test]
    fn test_parse_qualified_wildcard() {
        let s = select("SELECT u.* FROM users u");
        assert_eq!(s.columns[0], SelectItem::QualifiedWildcard("u".into()));
    }

    #[test]
    fn test_parse_no_partial_result_on_error() {
        assert!(parse("SELECT id, FROM users").is_err());
    }
}
