//! Deferred evaluator: a tree-walking interpreter over the expression AST
//! whose results are computed on first access and memoized.
//!
//! Names are resolved when a value is forced, not when it is compiled, so a
//! module may refer to modules declared later in the same file.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, KeywordArg, Literal};
use crate::builtins::call_builtin;
use crate::error::{Error, Result};
use crate::namespace::Scope;
use crate::span::Location;
use crate::value::{Function, Instance, Value};

/// One element of a module's member list.
#[derive(Debug, Clone)]
pub enum Item {
    Plain(Expr),
    /// `@IncludePath` value; `(`/`)` become `{`/`}` once evaluated.
    IncludePath(Expr),
    /// A member value wrapped with its annotations.
    Tagged {
        item: Box<Item>,
        metadata: Vec<(String, Rc<Deferred>)>,
    },
}

pub(crate) enum Thunk {
    Expr(Expr),
    Items(Vec<Item>),
    /// Follows a `DefaultImpl` target to its own default provider.
    Provider(Rc<Deferred>),
    Const(Value),
}

enum State {
    Pending,
    Forcing,
    Ready(Value),
}

/// A computation bound to a scope, evaluated at most once.
///
/// A failed force is not cached; forcing again re-runs the computation,
/// which lets a value succeed once the namespaces it needs are complete.
pub struct Deferred {
    thunk: Thunk,
    scope: Scope,
    location: Location,
    state: RefCell<State>,
}

/// Binds `expr` to `scope` without evaluating it.
pub fn compile(expr: &Expr, scope: &Scope) -> Rc<Deferred> {
    Deferred::new(Thunk::Expr(expr.clone()), scope, expr.location.clone())
}

impl Deferred {
    pub(crate) fn new(thunk: Thunk, scope: &Scope, location: Location) -> Rc<Self> {
        Rc::new(Deferred {
            thunk,
            scope: scope.clone(),
            location,
            state: RefCell::new(State::Pending),
        })
    }

    pub fn constant(value: Value, scope: &Scope, location: Location) -> Rc<Self> {
        Deferred::new(Thunk::Const(value), scope, location)
    }

    pub fn items(items: Vec<Item>, scope: &Scope, location: Location) -> Rc<Self> {
        Deferred::new(Thunk::Items(items), scope, location)
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_forced(&self) -> bool {
        matches!(*self.state.borrow(), State::Ready(_))
    }

    pub fn force(&self) -> Result<Value> {
        match &*self.state.borrow() {
            State::Ready(value) => return Ok(value.clone()),
            State::Forcing => {
                return Err(Error::evaluation(
                    &self.location,
                    "cyclic reference while evaluating this value",
                ));
            }
            State::Pending => {}
        }

        *self.state.borrow_mut() = State::Forcing;
        tracing::debug!(location = %self.location, "forcing deferred value");
        let result = self.run();
        *self.state.borrow_mut() = match &result {
            Ok(value) => State::Ready(value.clone()),
            Err(_) => State::Pending,
        };
        result
    }

    fn run(&self) -> Result<Value> {
        match &self.thunk {
            Thunk::Expr(expr) => evaluate(expr, &self.scope),
            Thunk::Items(items) => items
                .iter()
                .map(|item| evaluate_item(item, &self.scope))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Thunk::Provider(target) => {
                let target = target.force()?;
                if let Some(next) = target
                    .as_module()
                    .and_then(|module| module.own_attribute(crate::module::DEFAULT_PROVIDER))
                {
                    return next.force();
                }
                Ok(target)
            }
            Thunk::Const(value) => Ok(value.clone()),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            State::Pending => "pending".to_string(),
            State::Forcing => "forcing".to_string(),
            State::Ready(value) => value.to_string(),
        };
        f.debug_struct("Deferred")
            .field("location", &self.location.to_string())
            .field("state", &state)
            .finish()
    }
}

fn evaluate_item(item: &Item, scope: &Scope) -> Result<Value> {
    match item {
        Item::Plain(expr) => evaluate(expr, scope),
        Item::IncludePath(expr) => match evaluate(expr, scope)? {
            Value::Str(path) => Ok(Value::Str(path.replace('(', "{").replace(')', "}"))),
            other => Err(Error::evaluation(
                &expr.location,
                format!("include path must be a string, found {}", other.type_name()),
            )),
        },
        Item::Tagged { item, metadata } => {
            let value = evaluate_item(item, scope)?;
            let metadata = metadata
                .iter()
                .map(|(name, deferred)| Ok((name.clone(), deferred.force()?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Tagged {
                value: Box::new(value),
                metadata,
            })
        }
    }
}

/// Evaluates `expr` immediately against `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value> {
    match &expr.kind {
        ExprKind::Literal(Literal::Number(n)) => Ok(Value::Number(*n)),
        ExprKind::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),
        ExprKind::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        ExprKind::Name(name) => scope.lookup(name, &expr.location),
        ExprKind::Attribute(base, name) => {
            let base = evaluate(base, scope)?;
            attribute(base, name, &expr.location, scope)
        }
        ExprKind::Subscript(base, index) => {
            let base = evaluate(base, scope)?;
            let index = evaluate(index, scope)?;
            subscript(&base, &index, &expr.location)
        }
        ExprKind::Call {
            callee,
            args,
            keywords,
        } => {
            let callee = evaluate(callee, scope)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>>>()?;
            call(callee, args, keywords, &expr.location, scope)
        }
        ExprKind::List(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        ExprKind::Dict(entries) => entries
            .iter()
            .map(|(key, value)| Ok((evaluate(key, scope)?, evaluate(value, scope)?)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Dict),
    }
}

fn attribute(base: Value, name: &str, location: &Location, scope: &Scope) -> Result<Value> {
    match base {
        Value::Module(module) => module.attribute(name, location),
        Value::Instance(instance) => {
            match instance.options.iter().find(|(option, _)| option == name) {
                Some((_, value)) => Ok(value.clone()),
                None => instance.module.attribute(name, location),
            }
        }
        Value::Package(path) => scope.lookup_in_package(&path, name, location),
        Value::Tagged { value, .. } => attribute(*value, name, location, scope),
        other => Err(Error::evaluation(
            location,
            format!("{} value has no attribute '{name}'", other.type_name()),
        )),
    }
}

fn subscript(base: &Value, index: &Value, location: &Location) -> Result<Value> {
    let out_of_range = || Error::evaluation(location, format!("index {index} out of range"));
    match (base.untagged(), index.untagged()) {
        (Value::List(items), Value::Number(i)) => {
            let position = normalize_index(*i, items.len()).ok_or_else(out_of_range)?;
            Ok(items[position].clone())
        }
        (Value::Str(s), Value::Number(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let position = normalize_index(*i, chars.len()).ok_or_else(out_of_range)?;
            Ok(Value::Str(chars[position].to_string()))
        }
        (Value::Dict(entries), key) => entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| Error::evaluation(location, format!("key {key} not found"))),
        (base, index) => Err(Error::evaluation(
            location,
            format!("cannot index {} with {}", base.type_name(), index.type_name()),
        )),
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let position = if index < 0 { len + index } else { index };
    (0..len).contains(&position).then_some(position as usize)
}

fn call(
    callee: Value,
    args: Vec<Value>,
    keywords: &[KeywordArg],
    location: &Location,
    scope: &Scope,
) -> Result<Value> {
    match callee.untagged() {
        Value::Function(function) => {
            if let Some(keyword) = keywords.first() {
                return Err(Error::evaluation(
                    &keyword.location,
                    format!("{}() takes no keyword arguments", function.name()),
                ));
            }
            match function {
                Function::Builtin(builtin) => call_builtin(builtin, args, location),
                Function::Host(host) => host
                    .call(&args)
                    .map_err(|message| Error::evaluation(location, message)),
            }
        }
        Value::Module(module) => {
            if !args.is_empty() {
                return Err(Error::evaluation(
                    location,
                    format!("module {} accepts only keyword option values", module.name()),
                ));
            }
            let known = module.options();
            let mut options = Vec::with_capacity(keywords.len());
            for keyword in keywords {
                if !known.iter().any(|option| option.name == keyword.name) {
                    return Err(Error::evaluation(
                        &keyword.location,
                        format!("module {} has no option '{}'", module.name(), keyword.name),
                    ));
                }
                options.push((keyword.name.clone(), evaluate(&keyword.value, scope)?));
            }
            Ok(Value::Instance(Rc::new(Instance {
                module: Rc::clone(module),
                options,
            })))
        }
        other => Err(Error::evaluation(
            location,
            format!("{} value is not callable", other.type_name()),
        )),
    }
}
