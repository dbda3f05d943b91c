//! Runtime values produced by evaluating expressions.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::builtins::BuiltinDescriptor;
use crate::module::Module;

/// The closed set of values an expression can evaluate to.
#[derive(Debug, Clone)]
pub enum Value {
    /// No value, e.g. an option without default or a bare annotation.
    Unset,
    Bool(bool),
    Number(i64),
    Str(String),
    List(Vec<Value>),
    /// Ordered key/value pairs.
    Dict(Vec<(Value, Value)>),
    Module(Rc<Module>),
    /// A module called with option values: `timer(hz = 100)`.
    Instance(Rc<Instance>),
    /// A dotted package path reached through names, e.g. `embox.kernel`.
    Package(String),
    Function(Function),
    /// A member value carrying the member's annotations.
    Tagged {
        value: Box<Value>,
        metadata: Vec<(String, Value)>,
    },
}

#[derive(Debug)]
pub struct Instance {
    pub module: Rc<Module>,
    pub options: Vec<(String, Value)>,
}

#[derive(Clone)]
pub enum Function {
    Builtin(&'static BuiltinDescriptor),
    Host(Rc<HostFunction>),
}

/// Function provided by the embedding program.
pub struct HostFunction {
    pub name: String,
    pub(crate) func: Box<dyn Fn(&[Value]) -> Result<Value, String>>,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        HostFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Builtin(descriptor) => descriptor.name,
            Function::Host(host) => &host.name,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unset => "unset",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Module(_) => "module",
            Value::Instance(_) => "module instance",
            Value::Package(_) => "package",
            Value::Function(_) => "function",
            Value::Tagged { value, .. } => value.type_name(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Unset => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            Value::Tagged { value, .. } => value.truthy(),
            Value::Module(_) | Value::Instance(_) | Value::Package(_) | Value::Function(_) => true,
        }
    }

    /// Strips member metadata.
    pub fn untagged(&self) -> &Value {
        match self {
            Value::Tagged { value, .. } => value.untagged(),
            other => other,
        }
    }

    pub fn as_module(&self) -> Option<&Rc<Module>> {
        match self.untagged() {
            Value::Module(module) => Some(module),
            Value::Instance(instance) => Some(&instance.module),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.untagged() {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self.untagged() {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self.untagged() {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Ordering between comparable scalars (numbers, strings, booleans).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.untagged(), other.untagged()) {
            (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => {
                Rc::ptr_eq(&a.module, &b.module) && a.options == b.options
            }
            (Value::Package(a), Value::Package(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.name() == b.name(),
            (
                Value::Tagged {
                    value: a,
                    metadata: ma,
                },
                Value::Tagged {
                    value: b,
                    metadata: mb,
                },
            ) => a == b && ma == mb,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => f.write_str("unset"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Dict(entries) if entries.is_empty() => f.write_str("[:]"),
            Value::Dict(entries) => {
                f.write_str("[")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("]")
            }
            Value::Module(module) => f.write_str(&module.qualified_name()),
            Value::Instance(instance) => {
                write!(f, "{}(", instance.module.qualified_name())?;
                for (i, (name, value)) in instance.options.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                f.write_str(")")
            }
            Value::Package(path) => write!(f, "package {path}"),
            Value::Function(function) => write!(f, "<function {}>", function.name()),
            Value::Tagged { value, metadata } => {
                write!(f, "{value}")?;
                for (name, meta) in metadata {
                    match meta {
                        Value::Unset => write!(f, " @{name}")?,
                        other => write!(f, " @{name}({other})")?,
                    }
                }
                Ok(())
            }
        }
    }
}
