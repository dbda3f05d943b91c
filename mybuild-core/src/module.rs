//! Module objects: the resolved form of a `module` declaration.
//!
//! A module is a plain record whose list-valued and annotation-derived
//! attributes are `Deferred` values. Inheritance is an overlay: a module
//! answers from its own attributes first and falls back to its base.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::OptionKind;
use crate::error::{Error, Result};
use crate::eval::Deferred;
use crate::span::Location;
use crate::value::Value;

pub const DEFAULT_PROVIDER: &str = "default_provider";

/// Attribute names answered by the module itself, which no type
/// annotation may take.
pub fn is_builtin_attribute(name: &str) -> bool {
    matches!(name, "name" | "qualified_name" | "provides" | DEFAULT_PROVIDER)
        || MemberList::from_name(name).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Regular,
    Static,
    /// Declared `abstract`.
    Interface,
}

/// Build tooling attached to a module by its modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolset {
    Default,
    Static,
    Empty,
}

impl ModuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Regular => "module",
            ModuleKind::Static => "static module",
            ModuleKind::Interface => "abstract module",
        }
    }
}

/// The lazily computed member lists of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberList {
    Files,
    BuildDepends,
    RuntimeDepends,
    Includes,
}

impl MemberList {
    pub const ALL: [MemberList; 4] = [
        MemberList::Files,
        MemberList::BuildDepends,
        MemberList::RuntimeDepends,
        MemberList::Includes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MemberList::Files => "files",
            MemberList::BuildDepends => "build_depends",
            MemberList::RuntimeDepends => "runtime_depends",
            MemberList::Includes => "includes",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        MemberList::ALL.into_iter().find(|list| list.name() == name)
    }
}

/// A typed configuration option declared with `option`.
#[derive(Debug, Clone)]
pub struct OptionDescriptor {
    pub name: String,
    pub kind: OptionKind,
    pub(crate) default: Option<Rc<Deferred>>,
    /// Member annotations kept under the wrapping policy.
    pub(crate) metadata: Vec<(String, Rc<Deferred>)>,
    pub location: Location,
}

impl OptionDescriptor {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Forces the default value and checks it against the declared kind.
    ///
    /// `None` means the option has no default, which is not an error.
    pub fn default_value(&self) -> Result<Option<Value>> {
        let Some(default) = &self.default else {
            return Ok(None);
        };
        let value = default.force()?;
        let matches = matches!(
            (self.kind, value.untagged()),
            (OptionKind::Number, Value::Number(_))
                | (OptionKind::String, Value::Str(_))
                | (OptionKind::Boolean, Value::Bool(_))
        );
        if !matches {
            return Err(Error::evaluation(
                default.location(),
                format!(
                    "default of {} option '{}' is a {}",
                    self.kind.as_str(),
                    self.name,
                    value.type_name()
                ),
            ));
        }
        Ok(Some(value))
    }

    pub fn metadata(&self) -> Result<Vec<(String, Value)>> {
        self.metadata
            .iter()
            .map(|(name, deferred)| Ok((name.clone(), deferred.force()?)))
            .collect()
    }
}

pub struct Module {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) kind: ModuleKind,
    pub(crate) toolset: Toolset,
    pub(crate) base: Option<Rc<Module>>,
    pub(crate) options: Vec<OptionDescriptor>,
    pub(crate) lists: BTreeMap<MemberList, Rc<Deferred>>,
    /// Annotation-derived attributes, including `default_provider`.
    pub(crate) attributes: BTreeMap<String, Rc<Deferred>>,
    pub(crate) location: Location,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == ModuleKind::Static
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ModuleKind::Interface
    }

    pub fn toolset(&self) -> Toolset {
        self.toolset
    }

    pub fn base(&self) -> Option<&Rc<Module>> {
        self.base.as_ref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn own_attribute(&self, name: &str) -> Option<Rc<Deferred>> {
        self.attributes.get(name).cloned()
    }

    /// Annotation attribute of this module or the nearest base defining it.
    pub fn lookup_attribute(&self, name: &str) -> Option<Rc<Deferred>> {
        self.own_attribute(name)
            .or_else(|| self.base.as_ref().and_then(|base| base.lookup_attribute(name)))
    }

    /// Names of annotation attributes visible on this module, inherited ones
    /// included.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = self
            .base
            .as_ref()
            .map(|base| base.attribute_names())
            .unwrap_or_default();
        for name in self.attributes.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Member list of the given kind; inherited when not declared here and
    /// empty when declared nowhere.
    pub fn list(&self, list: MemberList) -> Result<Vec<Value>> {
        if let Some(deferred) = self.lists.get(&list) {
            let value = deferred.force()?;
            return Ok(value.as_list().map(<[Value]>::to_vec).unwrap_or_default());
        }
        match &self.base {
            Some(base) => base.list(list),
            None => Ok(Vec::new()),
        }
    }

    pub fn files(&self) -> Result<Vec<Value>> {
        self.list(MemberList::Files)
    }

    pub fn build_depends(&self) -> Result<Vec<Value>> {
        self.list(MemberList::BuildDepends)
    }

    pub fn runtime_depends(&self) -> Result<Vec<Value>> {
        self.list(MemberList::RuntimeDepends)
    }

    pub fn includes(&self) -> Result<Vec<Value>> {
        self.list(MemberList::Includes)
    }

    pub fn default_provider(&self) -> Result<Option<Value>> {
        self.lookup_attribute(DEFAULT_PROVIDER)
            .map(|deferred| deferred.force())
            .transpose()
    }

    /// The module itself followed by its direct superclass, if any.
    pub fn provides(self: &Rc<Self>) -> Vec<Rc<Module>> {
        let mut provided = vec![Rc::clone(self)];
        provided.extend(self.base.iter().cloned());
        provided
    }

    /// Options of the whole inheritance chain. Parent options come first;
    /// an option redeclared by a child replaces the parent's in place.
    pub fn options(&self) -> Vec<OptionDescriptor> {
        let mut options = self
            .base
            .as_ref()
            .map(|base| base.options())
            .unwrap_or_default();
        for option in &self.options {
            match options.iter_mut().find(|known| known.name == option.name) {
                Some(known) => *known = option.clone(),
                None => options.push(option.clone()),
            }
        }
        options
    }

    pub fn option(&self, name: &str) -> Option<OptionDescriptor> {
        self.options().into_iter().find(|option| option.name == name)
    }

    /// Attribute access from expressions, e.g. `timer.files` or
    /// `timer.DefaultImpl`.
    pub fn attribute(self: &Rc<Self>, name: &str, location: &Location) -> Result<Value> {
        match name {
            "name" => return Ok(Value::Str(self.name.clone())),
            "qualified_name" => return Ok(Value::Str(self.qualified_name())),
            "provides" => {
                return Ok(Value::List(
                    self.provides().into_iter().map(Value::Module).collect(),
                ));
            }
            _ => {}
        }
        if let Some(list) = MemberList::from_name(name) {
            return self.list(list).map(Value::List);
        }
        if let Some(deferred) = self.lookup_attribute(name) {
            return deferred.force();
        }
        if let Some(option) = self.option(name) {
            return Ok(option.default_value()?.unwrap_or(Value::Unset));
        }
        Err(Error::evaluation(
            location,
            format!("module {} has no attribute '{name}'", self.qualified_name()),
        ))
    }

    #[cfg(test)]
    pub(crate) fn placeholder(name: &str, package: &str) -> Self {
        Module {
            name: name.to_string(),
            package: package.to_string(),
            kind: ModuleKind::Regular,
            toolset: Toolset::Default,
            base: None,
            options: Vec::new(),
            lists: BTreeMap::new(),
            attributes: BTreeMap::new(),
            location: Location::builtin(),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.qualified_name())
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|base| base.qualified_name()))
            .field("options", &self.options.len())
            .finish()
    }
}
