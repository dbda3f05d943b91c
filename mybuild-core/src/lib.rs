//! Language core for Mybuild module descriptions.
//!
//! The pipeline is roughly:
//!
//!   source Mybuild / *.my
//!     -> lexer     (located tokens)
//!     -> parser    (declaration AST, expressions via `expr`)
//!     -> builder   (module objects with deferred attributes)
//!     -> eval      (forced on first access, memoized)
//!
//! Tools (the CLI, a build-graph executor) should depend on this crate
//! rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod ast;
pub mod parser;
pub mod expr;

// ---------------------------------------------------------------------
// Semantic layers: values, namespaces, deferred evaluation, modules
// ---------------------------------------------------------------------

pub mod value;
pub mod builtins;
pub mod namespace;
pub mod eval;
pub mod module;
pub mod builder;

// ---------------------------------------------------------------------
// Orchestration: options, whole-file entry points, tree loading
// ---------------------------------------------------------------------

pub mod config;
pub mod compiler;
pub mod loader;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{FileModules, parse, parse_in};
pub use config::{MemberAnnotationPolicy, ParseOptions};
pub use error::{Error, Result};
pub use loader::{LoadedFile, load_file, load_tree};
pub use module::{MemberList, Module, ModuleKind, OptionDescriptor, Toolset};
pub use namespace::{Registry, Scope};
pub use span::Location;
pub use value::{HostFunction, Value};
