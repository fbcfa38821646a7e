//! Hand-written recursive descent parser for kernel script.

use crate::ast::{BinOp, Expr, Program, Span, Statement, Subscript, Target};
use crate::error::ScriptError;
use crate::lexer::{tokenize, SpannedToken, Token};

/// Parse source text into a [`Program`].
pub(crate) fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source).map_err(|e| ScriptError::Parse {
        message: e.message,
        line: e.line,
        col: e.col,
    })?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        match self.tokens.get(self.pos + ahead) {
            Some(t) => &t.token,
            None => &Token::Eof,
        }
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(t) => Span {
                line: t.line,
                col: t.col,
            },
            None => Span { line: 0, col: 0 },
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ScriptError> {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}, got {:?}", expected, self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ScriptError> {
        if let Token::Ident(name) = self.peek() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(&format!("expected {what}, got {:?}", self.peek())))
        }
    }

    fn error(&self, msg: &str) -> ScriptError {
        let span = self.current_span();
        ScriptError::Parse {
            message: msg.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    /// Consume a trailing newline or EOF after a statement.
    fn expect_newline(&mut self) -> Result<(), ScriptError> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.error("expected end of statement")),
        }
    }

    // ── Grammar rules ───────────────────────────────────────────────

    /// program → (statement NEWLINE)* EOF
    fn parse_program(&mut self) -> Result<Program, ScriptError> {
        let mut statements = Vec::new();
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
        while !matches!(self.peek(), Token::Eof) {
            let span = self.current_span();
            let stmt = self.parse_statement()?;
            statements.push((stmt, span));
            self.expect_newline()?;
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, ScriptError> {
        match self.peek() {
            Token::Record => self.parse_record(),
            Token::Del => self.parse_del(),
            _ => {
                let expr = self.parse_expr()?;
                if !matches!(self.peek(), Token::Equals) {
                    return Ok(Statement::Expr(expr));
                }
                let target = match expr {
                    Expr::Name(name) => Target::Name(name),
                    Expr::Index { base, subs } => Target::Index { base: *base, subs },
                    _ => return Err(self.error("cannot assign to this expression")),
                };
                self.advance(); // consume "="
                let value = self.parse_expr()?;
                Ok(Statement::Assign { target, value })
            }
        }
    }

    /// record → "record" IDENT "(" IDENT ("," IDENT)* ")"
    fn parse_record(&mut self) -> Result<Statement, ScriptError> {
        self.advance(); // consume "record"
        let name = self.expect_ident("record name after 'record'")?;
        self.expect(&Token::LParen)?;
        let mut fields = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                let field = self.expect_ident("field name")?;
                if fields.contains(&field) {
                    return Err(self.error(&format!("duplicate field '{field}'")));
                }
                fields.push(field);
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Statement::Record { name, fields })
    }

    /// del → "del" IDENT ("," IDENT)*
    fn parse_del(&mut self) -> Result<Statement, ScriptError> {
        self.advance(); // consume "del"
        let mut names = vec![self.expect_ident("name after 'del'")?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            names.push(self.expect_ident("name after ','")?);
        }
        Ok(Statement::Del(names))
    }

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.parse_additive()
    }

    /// additive → multiplicative (('+' | '-') multiplicative)*
    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// multiplicative → unary (('*' | '/' | '%') unary)*
    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// unary → ('-' | '+') unary | postfix
    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    /// postfix → atom ('.' IDENT | '[' subscripts ']' | '(' args ')')*
    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident("attribute name after '.'")?;
                    expr = Expr::Attr {
                        base: Box::new(expr),
                        name,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let subs = self.parse_subscripts()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        base: Box::new(expr),
                        subs,
                    };
                }
                Token::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_args()?;
                    self.expect(&Token::RParen)?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// subscripts → subscript (',' subscript)*
    fn parse_subscripts(&mut self) -> Result<Vec<Subscript>, ScriptError> {
        let mut subs = vec![self.parse_subscript()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            subs.push(self.parse_subscript()?);
        }
        Ok(subs)
    }

    /// subscript → '...' | expr? ':' expr? | expr
    fn parse_subscript(&mut self) -> Result<Subscript, ScriptError> {
        if matches!(self.peek(), Token::Ellipsis) {
            self.advance();
            return Ok(Subscript::Ellipsis);
        }
        let start = if matches!(self.peek(), Token::Colon) {
            None
        } else {
            let expr = self.parse_expr()?;
            if !matches!(self.peek(), Token::Colon) {
                return Ok(Subscript::Item(expr));
            }
            Some(expr)
        };
        self.advance(); // consume ":"
        let stop = if matches!(self.peek(), Token::Comma | Token::RBracket) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(Subscript::Range { start, stop })
    }

    /// args → (arg (',' arg)*)?  where arg → IDENT '=' expr | expr
    fn parse_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ScriptError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            return Ok((args, kwargs));
        }
        loop {
            if let (Token::Ident(name), Token::Equals) = (self.peek(), self.peek_at(1)) {
                let name = name.clone();
                self.advance();
                self.advance();
                kwargs.push((name, self.parse_expr()?));
            } else if kwargs.is_empty() {
                args.push(self.parse_expr()?);
            } else {
                return Err(self.error("positional argument follows keyword argument"));
            }
            if matches!(self.peek(), Token::Comma) {
                self.advance();
            } else {
                return Ok((args, kwargs));
            }
        }
    }

    /// atom → NUMBER | STRING | IDENT | '(' expr ')' | '[' (expr (',' expr)*)? ']'
    fn parse_atom(&mut self) -> Result<Expr, ScriptError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Name(name))
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek(), Token::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if matches!(self.peek(), Token::Comma) {
                            self.advance();
                            if matches!(self.peek(), Token::RBracket) {
                                break;
                            }
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            other => Err(self.error(&format!("unexpected token {other:?}"))),
        }
    }
}
