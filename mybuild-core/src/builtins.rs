//! Built-in functions visible to expressions.
//!
//! Builtins are looked up after module and package names, so a module
//! called `len` shadows the builtin of the same name.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::span::Location;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Abs,
    All,
    Any,
    Bin,
    Bool,
    Hex,
    Int,
    Len,
    List,
    Max,
    Min,
    Sorted,
    Str,
    Sum,
}

/// Metadata about a single builtin symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    /// Accepted number of positional arguments, inclusive.
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub kind: BuiltinKind,
}

const fn builtin(
    name: &'static str,
    min_args: usize,
    max_args: Option<usize>,
    kind: BuiltinKind,
) -> BuiltinDescriptor {
    BuiltinDescriptor {
        name,
        min_args,
        max_args,
        kind,
    }
}

/// The complete list of builtins known to the evaluator.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    builtin("abs", 1, Some(1), BuiltinKind::Abs),
    builtin("all", 1, Some(1), BuiltinKind::All),
    builtin("any", 1, Some(1), BuiltinKind::Any),
    builtin("bin", 1, Some(1), BuiltinKind::Bin),
    builtin("bool", 0, Some(1), BuiltinKind::Bool),
    builtin("hex", 1, Some(1), BuiltinKind::Hex),
    builtin("int", 0, Some(2), BuiltinKind::Int),
    builtin("len", 1, Some(1), BuiltinKind::Len),
    builtin("list", 0, Some(1), BuiltinKind::List),
    builtin("max", 1, None, BuiltinKind::Max),
    builtin("min", 1, None, BuiltinKind::Min),
    builtin("sorted", 1, Some(1), BuiltinKind::Sorted),
    builtin("str", 0, Some(1), BuiltinKind::Str),
    builtin("sum", 1, Some(2), BuiltinKind::Sum),
];

/// Look up a builtin by name.
///
/// The search is linear over `BUILTINS` because the table is small.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn call_builtin(
    builtin: &BuiltinDescriptor,
    args: Vec<Value>,
    location: &Location,
) -> Result<Value> {
    let arity_ok = args.len() >= builtin.min_args
        && builtin.max_args.is_none_or(|max| args.len() <= max);
    if !arity_ok {
        return Err(Error::evaluation(
            location,
            format!("{}() got {} arguments", builtin.name, args.len()),
        ));
    }

    let fail = |message: String| Error::evaluation(location, format!("{}(): {message}", builtin.name));
    let args: Vec<Value> = args.into_iter().map(|v| v.untagged().clone()).collect();

    match builtin.kind {
        BuiltinKind::Abs => number_arg(&args[0])
            .and_then(i64::checked_abs)
            .map(Value::Number)
            .ok_or_else(|| fail(format!("bad operand {}", args[0]))),
        BuiltinKind::All => iterable(&args[0])
            .map(|items| Value::Bool(items.iter().all(Value::truthy)))
            .ok_or_else(|| fail(format!("{} is not iterable", args[0].type_name()))),
        BuiltinKind::Any => iterable(&args[0])
            .map(|items| Value::Bool(items.iter().any(Value::truthy)))
            .ok_or_else(|| fail(format!("{} is not iterable", args[0].type_name()))),
        BuiltinKind::Bin => number_arg(&args[0])
            .map(|n| Value::Str(radix_string(n, "0b", format!("{:b}", n.unsigned_abs()))))
            .ok_or_else(|| fail("expected a number".to_string())),
        BuiltinKind::Hex => number_arg(&args[0])
            .map(|n| Value::Str(radix_string(n, "0x", format!("{:x}", n.unsigned_abs()))))
            .ok_or_else(|| fail("expected a number".to_string())),
        BuiltinKind::Bool => Ok(Value::Bool(args.first().is_some_and(Value::truthy))),
        BuiltinKind::Int => int(&args).map_err(fail),
        BuiltinKind::Len => match &args[0] {
            Value::Str(s) => Ok(Value::Number(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Number(items.len() as i64)),
            Value::Dict(entries) => Ok(Value::Number(entries.len() as i64)),
            other => Err(fail(format!("{} has no length", other.type_name()))),
        },
        BuiltinKind::List => match args.first() {
            None => Ok(Value::List(Vec::new())),
            Some(value) => iterable(value)
                .map(Value::List)
                .ok_or_else(|| fail(format!("{} is not iterable", value.type_name()))),
        },
        BuiltinKind::Max | BuiltinKind::Min => {
            let items = if args.len() == 1 {
                iterable(&args[0])
                    .ok_or_else(|| fail(format!("{} is not iterable", args[0].type_name())))?
            } else {
                args
            };
            let wanted = if builtin.kind == BuiltinKind::Max {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut best: Option<Value> = None;
            for item in items {
                best = match best {
                    None => Some(item),
                    Some(current) => match item.compare(&current) {
                        Some(order) if order == wanted => Some(item),
                        Some(_) => Some(current),
                        None => {
                            return Err(fail(format!(
                                "cannot compare {} with {}",
                                item.type_name(),
                                current.type_name()
                            )));
                        }
                    },
                };
            }
            best.ok_or_else(|| fail("empty sequence".to_string()))
        }
        BuiltinKind::Sorted => {
            let mut items = iterable(&args[0])
                .ok_or_else(|| fail(format!("{} is not iterable", args[0].type_name())))?;
            let mut incomparable = false;
            items.sort_by(|a, b| {
                a.compare(b).unwrap_or_else(|| {
                    incomparable = true;
                    Ordering::Equal
                })
            });
            if incomparable {
                return Err(fail("items are not mutually comparable".to_string()));
            }
            Ok(Value::List(items))
        }
        BuiltinKind::Str => Ok(Value::Str(match args.first() {
            None => String::new(),
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
        })),
        BuiltinKind::Sum => {
            let items = iterable(&args[0])
                .ok_or_else(|| fail(format!("{} is not iterable", args[0].type_name())))?;
            let start = match args.get(1) {
                Some(value) => number_arg(value).ok_or_else(|| fail("start must be a number".to_string()))?,
                None => 0,
            };
            items
                .iter()
                .try_fold(start, |acc, item| number_arg(item).and_then(|n| acc.checked_add(n)))
                .map(Value::Number)
                .ok_or_else(|| fail("expected numbers".to_string()))
        }
    }
}

fn number_arg(value: &Value) -> Option<i64> {
    match value.untagged() {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn iterable(value: &Value) -> Option<Vec<Value>> {
    match value.untagged() {
        Value::List(items) => Some(items.clone()),
        Value::Dict(entries) => Some(entries.iter().map(|(key, _)| key.clone()).collect()),
        Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => None,
    }
}

fn radix_string(n: i64, prefix: &str, digits: String) -> String {
    if n < 0 {
        format!("-{prefix}{digits}")
    } else {
        format!("{prefix}{digits}")
    }
}

fn int(args: &[Value]) -> core::result::Result<Value, String> {
    match args {
        [] => Ok(Value::Number(0)),
        [value] => match value {
            Value::Number(n) => Ok(Value::Number(*n)),
            Value::Bool(b) => Ok(Value::Number(i64::from(*b))),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Number)
                .map_err(|_| format!("invalid literal {s:?}")),
            other => Err(format!("cannot convert {} to number", other.type_name())),
        },
        [Value::Str(s), Value::Number(base)] if (2..=36).contains(base) => {
            let text = s.trim();
            let digits = match *base {
                16 => text.trim_start_matches("0x").trim_start_matches("0X"),
                8 => text.trim_start_matches("0o").trim_start_matches("0O"),
                2 => text.trim_start_matches("0b").trim_start_matches("0B"),
                _ => text,
            };
            i64::from_str_radix(digits, *base as u32)
                .map(Value::Number)
                .map_err(|_| format!("invalid literal {s:?} for base {base}"))
        }
        _ => Err("expected a string and a base between 2 and 36".to_string()),
    }
}
