//! Expression grammar shared by every value position of the language:
//! annotation arguments, option defaults, superclasses and member lists.
//!
//! ```text
//! expr    := atom trailer*
//! atom    := NUMBER | STRING | BOOL | ID
//!          | "(" exprlist ")" | "[" exprlist "]" | "[" dictents "]" | "[" ":" "]"
//! trailer := "." ID | "[" expr "]" | "(" arguments ")"
//! ```

use std::collections::HashSet;

use crate::ast::{Expr, ExprKind, KeywordArg, Literal};
use crate::error::{Error, Result};
use crate::lexer::TokenKind;
use crate::parser::{MAX_NESTING, Parser};

impl Parser {
    pub fn parse_expr(&mut self) -> Result<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(Error::syntax(
                &self.peek().location,
                "expression nested too deeply",
            ));
        }
        self.depth += 1;
        let result = self.parse_trailers();
        self.depth -= 1;
        result
    }

    fn parse_trailers(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            let next = self.peek().clone();
            let location = next.location;
            let kind = match next.kind {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    ExprKind::Attribute(Box::new(expr), name)
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    ExprKind::Subscript(Box::new(expr), Box::new(index))
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_arguments()?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                        keywords,
                    }
                }
                _ => return Ok(expr),
            };
            expr = Expr::new(kind, location);
        }
    }

    /// Comma separated values of a member statement, e.g. `depends a, b(x = 1)`.
    pub(crate) fn parse_value_list(&mut self) -> Result<Vec<Expr>> {
        let mut values = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.parse_expr()?);
        }
        Ok(values)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let location = token.location.clone();
        let kind = match token.kind {
            TokenKind::Number(value) => {
                self.advance();
                ExprKind::Literal(Literal::Number(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                ExprKind::Literal(Literal::Str(value))
            }
            TokenKind::Bool(value) => {
                self.advance();
                ExprKind::Literal(Literal::Bool(value))
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            TokenKind::LParen => {
                self.advance();
                let (mut elements, single) = self.parse_exprlist(&TokenKind::RParen)?;
                if single {
                    return Ok(elements.remove(0));
                }
                ExprKind::List(elements)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_bracket_body()?
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, location))
    }

    /// After `[`: a list literal, a dict literal, or the empty dict `[:]`.
    fn parse_bracket_body(&mut self) -> Result<ExprKind> {
        if self.eat(&TokenKind::Colon) {
            self.expect(&TokenKind::RBracket)?;
            return Ok(ExprKind::Dict(Vec::new()));
        }
        if self.eat(&TokenKind::RBracket) {
            return Ok(ExprKind::List(Vec::new()));
        }

        let first = self.parse_expr()?;
        if !self.eat(&TokenKind::Colon) {
            let mut elements = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.check(&TokenKind::RBracket) {
                    break;
                }
                elements.push(self.parse_expr()?);
            }
            self.expect(&TokenKind::RBracket)?;
            return Ok(ExprKind::List(elements));
        }

        let mut entries = vec![(first, self.parse_expr()?)];
        while self.eat(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            let key = self.parse_expr()?;
            self.expect(&TokenKind::Colon)?;
            entries.push((key, self.parse_expr()?));
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(ExprKind::Dict(entries))
    }

    /// Parses `e, e, ...` up to and including `close`.
    ///
    /// The flag is true when exactly one element was given without a
    /// trailing comma.
    fn parse_exprlist(&mut self, close: &TokenKind) -> Result<(Vec<Expr>, bool)> {
        let mut elements = Vec::new();
        let mut trailing_comma = false;
        while !self.check(close) {
            elements.push(self.parse_expr()?);
            trailing_comma = self.eat(&TokenKind::Comma);
            if !trailing_comma {
                break;
            }
        }
        self.expect(close)?;
        let single = elements.len() == 1 && !trailing_comma;
        Ok((elements, single))
    }

    /// Parses call arguments after the opening parenthesis, consuming the
    /// closing one.
    ///
    /// Positional arguments may not follow keyword arguments and a keyword
    /// may appear only once per call.
    pub(crate) fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<KeywordArg>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<KeywordArg> = Vec::new();
        let mut seen = HashSet::new();

        while !self.check(&TokenKind::RParen) {
            let is_keyword = matches!(self.peek().kind, TokenKind::Ident(_))
                && *self.peek_nth(1) == TokenKind::Equal;
            if is_keyword {
                let (name, location) = self.expect_ident()?;
                self.advance(); // '='
                if !seen.insert(name.clone()) {
                    return Err(Error::syntax(
                        &location,
                        format!("keyword argument '{name}' repeated"),
                    ));
                }
                let value = self.parse_expr()?;
                keywords.push(KeywordArg {
                    name,
                    value,
                    location,
                });
            } else {
                let value = self.parse_expr()?;
                if !keywords.is_empty() {
                    return Err(Error::syntax(
                        &value.location,
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(value);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok((args, keywords))
    }
}
