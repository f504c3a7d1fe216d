// quill-parser - Parser for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Recursive-descent parser producing the AST in [`crate::ast`].
//!
//! Binary expressions use Go's precedence table. Control-clause
//! headers (`if`/`for`) disable top-level map literals so that the
//! opening `{` of the body is never swallowed by the condition.

use crate::ast::{AssignOp, Block, Expr, File, Ident, Stmt, UnaryOp};
use crate::error::{ParseError, Result};
use crate::lexer::{Lexer, SpannedToken};
use crate::source::Pos;
use crate::token::{BinOp, Token};

/// The parser.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    cursor: usize,
    /// > 0 while parsing an `if`/`for` header outside parentheses;
    /// suppresses bare map literals.
    clause_depth: u32,
}

impl Parser {
    /// Parse a full source file.
    pub fn parse_file(src: &str) -> Result<File> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut parser = Parser {
            tokens,
            cursor: 0,
            clause_depth: 0,
        };
        let mut stmts = Vec::new();
        while !parser.at(&Token::Eof) {
            parser.skip_semicolons();
            if parser.at(&Token::Eof) {
                break;
            }
            stmts.push(parser.parse_stmt()?);
        }
        Ok(File { stmts })
    }

    /// Parse a single expression (used by tests and the REPL-less CLI).
    pub fn parse_expr_str(src: &str) -> Result<Expr> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut parser = Parser {
            tokens,
            cursor: 0,
            clause_depth: 0,
        };
        let expr = parser.parse_expr()?;
        parser.skip_semicolons();
        parser.expect(&Token::Eof)?;
        Ok(expr)
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor].token
    }

    fn peek_at(&self, n: usize) -> &Token {
        let idx = (self.cursor + n).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn pos(&self) -> Pos {
        self.tokens[self.cursor].pos
    }

    fn advance(&mut self) -> SpannedToken {
        let t = self.tokens[self.cursor].clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        t
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<Pos> {
        if self.at(token) {
            Ok(self.advance().pos)
        } else {
            Err(ParseError::new(
                format!("expected '{}', found '{}'", token, self.peek()),
                self.pos(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<Ident> {
        match self.peek() {
            Token::Ident(_) => {
                let t = self.advance();
                let Token::Ident(name) = t.token else {
                    unreachable!()
                };
                Ok(Ident::new(name, t.pos))
            }
            other => Err(ParseError::new(
                format!("expected identifier, found '{}'", other),
                self.pos(),
            )),
        }
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&Token::Semicolon) {}
    }

    /// Consume a statement terminator: `;`, or nothing before `}`/EOF.
    fn expect_terminator(&mut self) -> Result<()> {
        if self.eat(&Token::Semicolon) || self.at(&Token::RBrace) || self.at(&Token::Eof) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected end of statement, found '{}'", self.peek()),
                self.pos(),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Token::Break => {
                let pos = self.advance().pos;
                self.expect_terminator()?;
                Ok(Stmt::Break(pos))
            }
            Token::Continue => {
                let pos = self.advance().pos;
                self.expect_terminator()?;
                Ok(Stmt::Continue(pos))
            }
            Token::Return => {
                let pos = self.advance().pos;
                let value = if self.at(&Token::Semicolon)
                    || self.at(&Token::RBrace)
                    || self.at(&Token::Eof)
                {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_terminator()?;
                Ok(Stmt::Return { value, pos })
            }
            Token::Export => {
                let pos = self.advance().pos;
                let value = self.parse_expr()?;
                self.expect_terminator()?;
                Ok(Stmt::Export { value, pos })
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect_terminator()?;
                Ok(stmt)
            }
        }
    }

    /// An expression statement, definition, or assignment (no
    /// terminator). Shared by statement position and `if`/`for`
    /// headers.
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            exprs.push(self.parse_expr()?);
        }

        match self.peek().clone() {
            Token::Define => {
                self.advance();
                let names = self.idents_from_exprs(exprs)?;
                let value = self.parse_expr()?;
                Ok(Stmt::Define { names, value, pos })
            }
            Token::Assign => {
                self.advance();
                self.check_assignable(&exprs)?;
                let value = self.parse_expr()?;
                Ok(Stmt::Assign {
                    targets: exprs,
                    op: AssignOp::Assign,
                    value,
                    pos,
                })
            }
            tok => {
                if let Some(op) = Self::compound_op(&tok) {
                    self.advance();
                    if exprs.len() != 1 {
                        return Err(ParseError::new(
                            "compound assignment requires a single target",
                            pos,
                        ));
                    }
                    self.check_assignable(&exprs)?;
                    let value = self.parse_expr()?;
                    return Ok(Stmt::Assign {
                        targets: exprs,
                        op: AssignOp::Compound(op),
                        value,
                        pos,
                    });
                }
                if exprs.len() != 1 {
                    return Err(ParseError::new("expected ':=' or '=' after expression list", pos));
                }
                Ok(Stmt::Expr(exprs.into_iter().next().unwrap()))
            }
        }
    }

    fn compound_op(token: &Token) -> Option<BinOp> {
        Some(match token {
            Token::AddAssign => BinOp::Add,
            Token::SubAssign => BinOp::Sub,
            Token::MulAssign => BinOp::Mul,
            Token::QuoAssign => BinOp::Quo,
            Token::RemAssign => BinOp::Rem,
            Token::AndAssign => BinOp::And,
            Token::OrAssign => BinOp::Or,
            Token::XorAssign => BinOp::Xor,
            Token::AndNotAssign => BinOp::AndNot,
            Token::ShlAssign => BinOp::Shl,
            Token::ShrAssign => BinOp::Shr,
            _ => return None,
        })
    }

    fn idents_from_exprs(&self, exprs: Vec<Expr>) -> Result<Vec<Ident>> {
        exprs
            .into_iter()
            .map(|e| match e {
                Expr::Ident(id) => Ok(id),
                other => Err(ParseError::new(
                    "':=' requires identifiers on the left",
                    other.pos(),
                )),
            })
            .collect()
    }

    fn check_assignable(&self, targets: &[Expr]) -> Result<()> {
        for t in targets {
            if !t.is_assignable() {
                return Err(ParseError::new("cannot assign to this expression", t.pos()));
            }
        }
        Ok(())
    }

    fn parse_block(&mut self) -> Result<Block> {
        let pos = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            self.skip_semicolons();
            if self.at(&Token::RBrace) || self.at(&Token::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(Block { stmts, pos })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let pos = self.expect(&Token::If)?;
        self.clause_depth += 1;
        let first = self.parse_simple_stmt()?;
        let (init, cond) = if self.eat(&Token::Semicolon) {
            let cond = self.parse_expr()?;
            (Some(Box::new(first)), cond)
        } else {
            match first {
                Stmt::Expr(e) => (None, e),
                other => {
                    self.clause_depth -= 1;
                    return Err(ParseError::new("missing condition in if statement", other.pos()));
                }
            }
        };
        self.clause_depth -= 1;
        let body = self.parse_block()?;
        let alt = if self.eat(&Token::Else) {
            if self.at(&Token::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(Stmt::Block(self.parse_block()?)))
            }
        } else {
            None
        };
        Ok(Stmt::If {
            init,
            cond,
            body,
            alt,
            pos,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let pos = self.expect(&Token::For)?;

        // Bare `for { ... }` loops forever.
        if self.at(&Token::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            });
        }

        self.clause_depth += 1;

        // `for k in xs` / `for k, v in xs`
        if matches!(self.peek(), Token::Ident(_))
            && (self.peek_at(1) == &Token::In
                || (self.peek_at(1) == &Token::Comma
                    && matches!(self.peek_at(2), Token::Ident(_))
                    && self.peek_at(3) == &Token::In))
        {
            let key = self.expect_ident()?;
            let value = if self.eat(&Token::Comma) {
                Some(self.expect_ident()?)
            } else {
                None
            };
            self.expect(&Token::In)?;
            let iterable = self.parse_expr()?;
            self.clause_depth -= 1;
            let body = self.parse_block()?;
            return Ok(Stmt::ForIn {
                key,
                value,
                iterable,
                body,
                pos,
            });
        }

        // `for cond { ... }` or `for init; cond; post { ... }`.
        let first = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_simple_stmt()?)
        };
        let (init, cond, post) = if self.eat(&Token::Semicolon) {
            let cond = if self.at(&Token::Semicolon) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(&Token::Semicolon)?;
            let post = if self.at(&Token::LBrace) {
                None
            } else {
                Some(Box::new(self.parse_simple_stmt()?))
            };
            (first.map(Box::new), cond, post)
        } else {
            match first {
                Some(Stmt::Expr(e)) => (None, Some(e), None),
                Some(other) => {
                    self.clause_depth -= 1;
                    return Err(ParseError::new("missing condition in for statement", other.pos()));
                }
                None => (None, None, None),
            }
        };
        self.clause_depth -= 1;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
            pos,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(1)
    }

    /// Go's operator precedence: 5 binds tightest.
    fn precedence(token: &Token) -> Option<(u8, Token)> {
        let prec = match token {
            Token::LOr => 1,
            Token::LAnd => 2,
            Token::Equal
            | Token::NotEqual
            | Token::Less
            | Token::LessEq
            | Token::Greater
            | Token::GreaterEq => 3,
            Token::Add | Token::Sub | Token::Or | Token::Xor => 4,
            Token::Mul
            | Token::Quo
            | Token::Rem
            | Token::Shl
            | Token::Shr
            | Token::And
            | Token::AndNot => 5,
            _ => return None,
        };
        Some((prec, token.clone()))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((prec, op)) = Self::precedence(self.peek()) {
            if prec < min_prec {
                break;
            }
            let pos = self.advance().pos;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = match op {
                Token::LAnd | Token::LOr => Expr::Logical {
                    and: op == Token::LAnd,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    pos,
                },
                Token::Equal | Token::NotEqual => Expr::Equality {
                    negated: op == Token::NotEqual,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    pos,
                },
                _ => Expr::Binary {
                    op: Self::binop_for(&op),
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    pos,
                },
            };
        }
        Ok(lhs)
    }

    fn binop_for(token: &Token) -> BinOp {
        match token {
            Token::Add => BinOp::Add,
            Token::Sub => BinOp::Sub,
            Token::Mul => BinOp::Mul,
            Token::Quo => BinOp::Quo,
            Token::Rem => BinOp::Rem,
            Token::And => BinOp::And,
            Token::Or => BinOp::Or,
            Token::Xor => BinOp::Xor,
            Token::AndNot => BinOp::AndNot,
            Token::Shl => BinOp::Shl,
            Token::Shr => BinOp::Shr,
            Token::Less => BinOp::Less,
            Token::Greater => BinOp::Greater,
            Token::LessEq => BinOp::LessEq,
            Token::GreaterEq => BinOp::GreaterEq,
            other => unreachable!("not a binary operator: {}", other),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Sub => Some(UnaryOp::Neg),
            Token::Not => Some(UnaryOp::Not),
            Token::Xor => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            let pos = self.advance().pos;
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
                pos,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::LParen => {
                    let pos = self.advance().pos;
                    let (args, spread) = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        spread,
                        pos,
                    };
                }
                Token::LBracket => {
                    let pos = self.advance().pos;
                    let saved = self.clause_depth;
                    self.clause_depth = 0;
                    let index = self.parse_expr()?;
                    self.clause_depth = saved;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        expr: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                Token::Dot => {
                    let pos = self.advance().pos;
                    let name = self.expect_ident()?;
                    expr = Expr::Selector {
                        expr: Box::new(expr),
                        name: name.name,
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, bool)> {
        let saved = self.clause_depth;
        self.clause_depth = 0;
        let mut args = Vec::new();
        let mut spread = false;
        if !self.at(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Token::Ellipsis) {
                    spread = true;
                    break;
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.clause_depth = saved;
        self.expect(&Token::RParen)?;
        Ok((args, spread))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let pos = self.pos();
        match self.peek().clone() {
            Token::Int(value) => {
                self.advance();
                Ok(Expr::IntLit { value, pos })
            }
            Token::Float(value) => {
                self.advance();
                Ok(Expr::FloatLit { value, pos })
            }
            Token::Char(value) => {
                self.advance();
                Ok(Expr::CharLit { value, pos })
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::StringLit { value, pos })
            }
            Token::True => {
                self.advance();
                Ok(Expr::BoolLit { value: true, pos })
            }
            Token::False => {
                self.advance();
                Ok(Expr::BoolLit { value: false, pos })
            }
            Token::Null => {
                self.advance();
                Ok(Expr::NullLit { pos })
            }
            Token::Ident(_) => {
                let id = self.expect_ident()?;
                Ok(Expr::Ident(id))
            }
            Token::LParen => {
                self.advance();
                let saved = self.clause_depth;
                self.clause_depth = 0;
                let expr = self.parse_expr()?;
                self.clause_depth = saved;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => self.parse_array_lit(),
            Token::LBrace if self.clause_depth == 0 => self.parse_map_lit(),
            Token::Func => self.parse_func_lit(),
            Token::Import => {
                self.advance();
                self.expect(&Token::LParen)?;
                let name = match self.peek().clone() {
                    Token::Str(s) => {
                        self.advance();
                        s
                    }
                    other => {
                        return Err(ParseError::new(
                            format!("import requires a string literal, found '{}'", other),
                            self.pos(),
                        ));
                    }
                };
                self.expect(&Token::RParen)?;
                Ok(Expr::Import { name, pos })
            }
            other => Err(ParseError::new(
                format!("unexpected token '{}'", other),
                pos,
            )),
        }
    }

    fn parse_array_lit(&mut self) -> Result<Expr> {
        let pos = self.expect(&Token::LBracket)?;
        let saved = self.clause_depth;
        self.clause_depth = 0;
        let mut elements = Vec::new();
        self.skip_semicolons();
        if !self.at(&Token::RBracket) {
            loop {
                elements.push(self.parse_expr()?);
                self.skip_semicolons();
                if !self.eat(&Token::Comma) {
                    break;
                }
                self.skip_semicolons();
                if self.at(&Token::RBracket) {
                    break; // trailing comma
                }
            }
        }
        self.clause_depth = saved;
        self.expect(&Token::RBracket)?;
        Ok(Expr::ArrayLit { elements, pos })
    }

    fn parse_map_lit(&mut self) -> Result<Expr> {
        let pos = self.expect(&Token::LBrace)?;
        let saved = self.clause_depth;
        self.clause_depth = 0;
        let mut entries = Vec::new();
        self.skip_semicolons();
        if !self.at(&Token::RBrace) {
            loop {
                let key = match self.peek().clone() {
                    Token::Ident(name) => {
                        self.advance();
                        name
                    }
                    Token::Str(s) => {
                        self.advance();
                        s
                    }
                    other => {
                        return Err(ParseError::new(
                            format!("map key must be an identifier or string, found '{}'", other),
                            self.pos(),
                        ));
                    }
                };
                self.expect(&Token::Colon)?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                self.skip_semicolons();
                if !self.eat(&Token::Comma) {
                    break;
                }
                self.skip_semicolons();
                if self.at(&Token::RBrace) {
                    break; // trailing comma
                }
            }
        }
        self.clause_depth = saved;
        self.expect(&Token::RBrace)?;
        Ok(Expr::MapLit { entries, pos })
    }

    fn parse_func_lit(&mut self) -> Result<Expr> {
        let pos = self.expect(&Token::Func)?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.at(&Token::RParen) {
            loop {
                if self.eat(&Token::Ellipsis) {
                    variadic = true;
                    params.push(self.expect_ident()?);
                    break;
                }
                params.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let saved = self.clause_depth;
        self.clause_depth = 0;
        let body = self.parse_block()?;
        self.clause_depth = saved;
        Ok(Expr::FuncLit {
            params,
            variadic,
            body,
            pos,
        })
    }
}
