//! Declaration grammar: package header, entities, module bodies, members
//! and annotations. Value positions are delegated to the expression
//! grammar in `expr`.

use crate::ast::{
    Annotation, AnnotationArgs, Entity, Member, MemberKind, Modifier, ModuleDecl, OptionDecl,
    OptionKind, QualName, SourceFile,
};
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind, lex};
use crate::span::Location;

/// Lex and parse a whole file.
///
/// `expected_package` is the package the loader expects this file to
/// belong to; a `package` declaration naming anything else fails.
pub fn parse(file: &str, source: &str, expected_package: &str) -> Result<SourceFile> {
    let tokens = lex(file, source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_file(expected_package)
}

/// Deepest expression nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 128;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Current expression nesting, bounded by `MAX_NESTING`.
    pub(crate) depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    pub fn parse_file(&mut self, expected_package: &str) -> Result<SourceFile> {
        let package = if self.eat(&TokenKind::Package) {
            let name = self.parse_qualname()?;
            check_package(&name, expected_package)?;
            Some(name)
        } else {
            None
        };

        let mut entities = Vec::new();
        while !self.check(&TokenKind::Eof) {
            entities.push(self.parse_entity()?);
        }
        Ok(SourceFile { package, entities })
    }

    fn parse_entity(&mut self) -> Result<Entity> {
        if self.eat(&TokenKind::DebugPrint) {
            return Ok(Entity::DebugPrint(self.parse_expr()?));
        }
        let annotations = self.parse_annotations()?;
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Module | TokenKind::Abstract | TokenKind::Static => {
                Ok(Entity::Module(self.parse_module(annotations)?))
            }
            TokenKind::Import => Err(Error::unsupported(&token.location, "'import' statements")),
            TokenKind::Interface => Err(Error::unsupported(&token.location, "'interface' types")),
            TokenKind::Feature => Err(Error::unsupported(&token.location, "'feature' declarations")),
            TokenKind::Annotation => Err(Error::unsupported(&token.location, "'annotation' types")),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_module(&mut self, annotations: Vec<Annotation>) -> Result<ModuleDecl> {
        let location = self.peek().location.clone();
        let modifier = if self.eat(&TokenKind::Abstract) {
            Modifier::Abstract
        } else if self.eat(&TokenKind::Static) {
            Modifier::Static
        } else {
            Modifier::Regular
        };
        self.expect(&TokenKind::Module)?;
        let (name, _) = self.expect_ident()?;

        let superclass = if self.eat(&TokenKind::Extends) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.eat(&TokenKind::RBrace) {
            members.push(self.parse_member()?);
        }

        Ok(ModuleDecl {
            annotations,
            modifier,
            name,
            superclass,
            members,
            location,
        })
    }

    fn parse_member(&mut self) -> Result<Member> {
        let annotations = self.parse_annotations()?;
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Depends => MemberKind::Depends(self.parse_value_list()?),
            TokenKind::Source => MemberKind::Source(self.parse_value_list()?),
            TokenKind::Option => MemberKind::Option(self.parse_option()?),
            TokenKind::Provides | TokenKind::Requires | TokenKind::Object => {
                return Err(Error::unsupported(
                    &token.location,
                    format!("'{}' members", token.text),
                ));
            }
            _ => return Err(unexpected_token(&token)),
        };
        Ok(Member {
            annotations,
            kind,
            location: token.location,
        })
    }

    // ( string | number | boolean | reference ) name ( = value )?
    fn parse_option(&mut self) -> Result<OptionDecl> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::TypeString => OptionKind::String,
            TokenKind::TypeNumber => OptionKind::Number,
            TokenKind::TypeBoolean => OptionKind::Boolean,
            TokenKind::Ident(_) => {
                return Err(Error::unsupported(
                    &token.location,
                    "options typed by a module reference",
                ));
            }
            _ => return Err(unexpected_token(&token)),
        };
        let (name, location) = self.expect_ident()?;
        let default = if self.eat(&TokenKind::Equal) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(OptionDecl {
            name,
            kind,
            default,
            location,
        })
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        while self.check(&TokenKind::At) {
            let location = self.advance().location;
            let name = self.parse_qualname()?;
            let args = if self.check(&TokenKind::LParen) {
                let open = self.advance();
                let (mut args, keywords) = self.parse_call_arguments()?;
                match (args.len(), keywords.len()) {
                    (1, 0) => AnnotationArgs::Value(args.remove(0)),
                    (0, n) if n > 0 => AnnotationArgs::Params(keywords),
                    _ => {
                        return Err(Error::syntax(
                            &open.location,
                            "annotation expects a single value or keyword parameters",
                        ));
                    }
                }
            } else {
                AnnotationArgs::Bare
            };
            annotations.push(Annotation {
                name,
                args,
                location,
            });
        }
        Ok(annotations)
    }

    /// `ID ( . ID )*`
    pub(crate) fn parse_qualname(&mut self) -> Result<QualName> {
        let mut segments = vec![self.expect_ident()?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            segments.push(self.expect_ident()?);
        }
        Ok(QualName { segments })
    }

    // ---------------------------------------------------------------
    // Token cursor
    // ---------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + n).min(last)].kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(String, Location)> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.location)),
            _ => Err(unexpected_token(&token)),
        }
    }

    pub(crate) fn unexpected(&self) -> Error {
        unexpected_token(self.peek())
    }
}

fn unexpected_token(token: &Token) -> Error {
    if token.kind == TokenKind::Eof {
        Error::syntax(&token.location, "premature end of file")
    } else {
        Error::syntax(
            &token.location,
            format!("unexpected {}", token.kind.describe()),
        )
    }
}

fn check_package(declared: &QualName, expected: &str) -> Result<()> {
    let joined = declared.joined();
    if joined == expected {
        return Ok(());
    }
    let expected_segments: Vec<&str> = expected.split('.').collect();
    let mismatch = declared
        .segments
        .iter()
        .zip(&expected_segments)
        .position(|((name, _), want)| name != want)
        .unwrap_or_else(|| declared.segments.len().min(expected_segments.len()));
    let index = mismatch.min(declared.segments.len() - 1);
    Err(Error::PackageMismatch {
        location: declared.segments[index].1.clone(),
        expected: expected.to_string(),
        declared: joined,
    })
}
