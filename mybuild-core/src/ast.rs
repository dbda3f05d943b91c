//! Surface AST produced by the parser.
//!
//! Every node carries the `Location` it was parsed at. Locations are only
//! used for diagnostics.

use crate::span::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Number(i64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    Attribute(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<KeywordArg>,
    },
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordArg {
    pub name: String,
    pub value: Expr,
    pub location: Location,
}

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Expr { kind, location }
    }

    /// Renders a name / attribute chain back to its dotted form.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name(name) => Some(name.clone()),
            ExprKind::Attribute(base, attr) => base.dotted_name().map(|b| format!("{b}.{attr}")),
            _ => None,
        }
    }
}

/// A dotted name such as a package or annotation name.
///
/// Each segment keeps its own location so diagnostics can point at the
/// exact segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualName {
    pub segments: Vec<(String, Location)>,
}

impl QualName {
    pub fn joined(&self) -> String {
        self.segments
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn location(&self) -> &Location {
        &self.segments[0].1
    }
}

/// Initializer of an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationArgs {
    /// `@Name` with no parenthesized initializer.
    Bare,
    /// `@Name(value)`.
    Value(Expr),
    /// `@Name(key = value, ...)`.
    Params(Vec<KeywordArg>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: QualName,
    pub args: AnnotationArgs,
    pub location: Location,
}

impl Annotation {
    pub fn name(&self) -> String {
        self.name.joined()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Number,
    Boolean,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::String => "string",
            OptionKind::Number => "number",
            OptionKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub name: String,
    pub kind: OptionKind,
    pub default: Option<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Depends(Vec<Expr>),
    Source(Vec<Expr>),
    Option(OptionDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub annotations: Vec<Annotation>,
    pub kind: MemberKind,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Regular,
    Abstract,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub annotations: Vec<Annotation>,
    pub modifier: Modifier,
    pub name: String,
    pub superclass: Option<Expr>,
    /// Member statements in source order; merging happens in the builder.
    pub members: Vec<Member>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Module(ModuleDecl),
    /// `__print__ expr`, a developer aid evaluated eagerly.
    DebugPrint(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub package: Option<QualName>,
    pub entities: Vec<Entity>,
}
