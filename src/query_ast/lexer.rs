//! Hand-written SQL tokenizer.
//!
//! Produces the token stream consumed by the parser. Comments are
//! recognized and dropped; everything else becomes a [`Token`] carrying
//! the original spelling and its source position.

use super::errors::{Position, SqlError};
use super::token::{KEYWORDS, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

/// Tokenize SQL text. Fails on unterminated strings, unterminated
/// quoted identifiers, unterminated block comments, and characters
/// outside every known class.
pub fn tokenize(text: &str) -> Result<Vec<Token>, SqlError> {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    Ok(tokens)
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn position(&self) -> Position {
        Position { offset: self.pos, line: self.line, column: self.column }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, position: Position, message: impl Into<String>) -> SqlError {
        SqlError::Lex { position, message: message.into() }
    }

    fn next_token(&mut self) -> Result<Token, SqlError> {
        self.skip_trivia()?;

        let pos = self.position();
        let Some(ch) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, text: String::new(), pos });
        };

        match ch {
            '\'' => self.lex_quoted(pos, '\'', TokenKind::String, "string literal"),
            '"' => self.lex_quoted(pos, '"', TokenKind::QuotedIdentifier, "quoted identifier"),
            c if c.is_ascii_digit() => Ok(self.lex_number(pos)),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => Ok(self.lex_number(pos)),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_word(pos)),
            '$' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => Ok(self.lex_parameter(pos)),
            _ => self.lex_symbol(pos),
        }
    }

    /// Skip whitespace, `--` line comments, and non-nesting `/* */`
    /// block comments.
    fn skip_trivia(&mut self) -> Result<(), SqlError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.peek_at(1) == Some('-') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(self.error(start, "unterminated block comment"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Quoted forms: a doubled quote character inside the body is an
    /// escaped literal quote.
    fn lex_quoted(
        &mut self,
        pos: Position,
        quote: char,
        kind: TokenKind,
        what: &str,
    ) -> Result<Token, SqlError> {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    if self.peek() == Some(quote) {
                        self.advance();
                        text.push(quote);
                    } else {
                        return Ok(Token { kind, text, pos });
                    }
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => return Err(self.error(pos, format!("unterminated {what}"))),
            }
        }
    }

    /// Integer, decimal, and exponent forms. A malformed exponent is
    /// not consumed, so `1e` lexes as `1` followed by the word `e`.
    fn lex_number(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            let digits_at = if matches!(self.peek_at(1), Some('+') | Some('-')) { 2 } else { 1 };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digits_at {
                    text.push(self.advance().unwrap());
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                }
            }
        }
        Token { kind: TokenKind::Number, text, pos }
    }

    fn lex_word(&mut self, pos: Position) -> Token {
        let mut text = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            text.push(self.advance().unwrap());
        }
        let kind = if KEYWORDS.contains(text.to_ascii_uppercase().as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token { kind, text, pos }
    }

    fn lex_parameter(&mut self, pos: Position) -> Token {
        self.advance(); // $
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        Token { kind: TokenKind::Parameter, text, pos }
    }

    /// Operators and punctuation. Multi-character operators are matched
    /// greedily before single-character ones.
    fn lex_symbol(&mut self, pos: Position) -> Result<Token, SqlError> {
        const DOUBLES: [&str; 6] = ["<=", ">=", "<>", "!=", "::", "||"];
        if let (Some(a), Some(b)) = (self.peek(), self.peek_at(1)) {
            let pair: String = [a, b].iter().collect();
            if DOUBLES.contains(&pair.as_str()) {
                self.advance();
                self.advance();
                return Ok(Token { kind: TokenKind::Operator, text: pair, pos });
            }
        }
        let ch = self.peek().unwrap();
        let kind = match ch {
            '=' | '<' | '>' | '+' | '-' | '*' | '/' | '%' => TokenKind::Operator,
            '(' | ')' | ',' | ';' | '.' => TokenKind::Punct,
            other => {
                return Err(self.error(pos, format!("unexpected character '{other}'")));
            }
        };
        self.advance();
        Ok(Token { kind, text: ch.to_string(), pos })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        tokenize(sql).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = tokenize("SELECT id FROM users").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].text, "SELECT");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_keyword_case_preserved() {
        let tokens = tokenize("select Id").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[0].text, "select");
        assert_eq!(tokens[1].text, "Id");
    }

    #[test]
    fn test_string_escaping() {
        let tokens = tokenize("'it''s'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "it's");
    }

    #[test]
    fn test_quoted_identifier_distinct_from_string() {
        let tokens = tokenize("\"order\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::QuotedIdentifier);
        assert_eq!(tokens[0].text, "order");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.5 .5 1e3 1.5e-2").unwrap();
        let texts: Vec<&str> = tokens[..5].iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["1", "2.5", ".5", "1e3", "1.5e-2"]);
        assert!(tokens[..5].iter().all(|t| t.kind == TokenKind::Number));
    }

    #[test]
    fn test_multichar_operators_greedy() {
        let tokens = tokenize("a<=b<>c::d").unwrap();
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, ["<=", "<>", "::"]);
    }

    #[test]
    fn test_comments_excluded() {
        assert_eq!(
            kinds("SELECT 1 -- trailing\n/* block */ + 2"),
            kinds("SELECT 1 + 2"),
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("SELECT 'oops").unwrap_err();
        assert!(matches!(err, SqlError::Lex { position, .. } if position.column == 8));
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(matches!(
            tokenize("SELECT /* no end").unwrap_err(),
            SqlError::Lex { .. }
        ));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(matches!(tokenize("SELECT #").unwrap_err(), SqlError::Lex { .. }));
    }

    #[test]
    fn test_positions_track_lines() {
        let tokens = tokenize("SELECT\n  id").unwrap();
        assert_eq!(tokens[1].pos.line, 2);
        assert_eq!(tokens[1].pos.column, 3);
    }

    #[test]
    fn test_parameter_token() {
        let tokens = tokenize("$1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Parameter);
        assert_eq!(tokens[0].text, "1");
    }
}
