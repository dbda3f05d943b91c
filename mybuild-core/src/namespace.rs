//! Name spaces consulted by the deferred evaluator.
//!
//! A `Registry` is owned by the loader and holds one `Namespace` per
//! package across all files. A `Scope` is the context threaded through one
//! file's processing: the file-local namespace, the package namespace and
//! a handle on the registry.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::builtins::find_builtin;
use crate::error::{Error, Result};
use crate::module::Module;
use crate::span::Location;
use crate::value::{Function, HostFunction, Value};

/// Shared, mutable mapping from module name to module.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Rc<RefCell<BTreeMap<String, Rc<Module>>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn get(&self, name: &str) -> Option<Rc<Module>> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn insert(&self, name: impl Into<String>, module: Rc<Module>) -> Option<Rc<Module>> {
        self.entries.borrow_mut().insert(name.into(), module)
    }

    pub fn remove(&self, name: &str) -> Option<Rc<Module>> {
        self.entries.borrow_mut().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, Rc<Module>> {
        self.entries.borrow().clone()
    }
}

/// Namespaces of every package seen so far, plus host functions visible
/// to all files.
///
/// Modules hold deferred attributes, deferred attributes hold the `Scope`
/// of their file, and the scope holds the package namespaces that hold the
/// modules. These `Rc` cycles are never broken: every module built against
/// a registry lives as long as the process. Use one registry per load and
/// do not rebuild a long-lived registry file by file expecting memory back.
#[derive(Default)]
pub struct Registry {
    packages: RefCell<BTreeMap<String, Namespace>>,
    host: RefCell<BTreeMap<String, Rc<HostFunction>>>,
}

impl Registry {
    pub fn new() -> Rc<Self> {
        Rc::new(Registry::default())
    }

    /// Namespace of `package`, created on first use.
    pub fn package(&self, package: &str) -> Namespace {
        self.packages
            .borrow_mut()
            .entry(package.to_string())
            .or_default()
            .clone()
    }

    fn remove_package(&self, package: &str) {
        self.packages.borrow_mut().remove(package);
    }

    pub fn find_package(&self, package: &str) -> Option<Namespace> {
        self.packages.borrow().get(package).cloned()
    }

    pub fn package_names(&self) -> Vec<String> {
        self.packages.borrow().keys().cloned().collect()
    }

    /// Whether `path` names a package or a parent of one.
    pub fn has_package_prefix(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        self.packages
            .borrow()
            .keys()
            .any(|name| name == path || name.strip_prefix(path).is_some_and(|rest| rest.starts_with('.')))
    }

    /// Resolves a fully qualified module name such as `embox.kernel.timer`.
    pub fn lookup_module(&self, qualified: &str) -> Option<Rc<Module>> {
        let (package, name) = qualified.rsplit_once('.').unwrap_or(("", qualified));
        self.find_package(package).and_then(|ns| ns.get(name))
    }

    pub fn define_function(&self, function: HostFunction) {
        self.host
            .borrow_mut()
            .insert(function.name.clone(), Rc::new(function));
    }

    fn host_function(&self, name: &str) -> Option<Rc<HostFunction>> {
        self.host.borrow().get(name).cloned()
    }
}

/// Everything one file's evaluation can see.
///
/// Cloning a scope is cheap and yields a handle on the same namespaces, so
/// every deferred value of a file observes modules registered after it was
/// created.
#[derive(Clone)]
pub struct Scope {
    package_name: Rc<str>,
    local: Namespace,
    package: Namespace,
    registry: Rc<Registry>,
    /// Whether this scope brought its package into existence.
    created_package: bool,
    journal: Rc<RefCell<Vec<(String, Option<Rc<Module>>)>>>,
}

impl Scope {
    pub fn new(registry: &Rc<Registry>, package: &str) -> Self {
        Scope {
            package_name: Rc::from(package),
            local: Namespace::new(),
            created_package: registry.find_package(package).is_none(),
            package: registry.package(package),
            registry: Rc::clone(registry),
            journal: Rc::default(),
        }
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn local(&self) -> &Namespace {
        &self.local
    }

    pub fn package(&self) -> &Namespace {
        &self.package
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// Binds `module` by name in both the file-local and the package
    /// namespace.
    pub fn register(&self, module: Rc<Module>) {
        let name = module.name().to_string();
        if self.local.insert(name.clone(), Rc::clone(&module)).is_some() {
            tracing::warn!(module = %name, "module redeclared in the same file");
        }
        let previous = self.package.insert(name.clone(), module);
        self.journal.borrow_mut().push((name, previous));
    }

    /// Undoes every package registration made through this scope, and
    /// forgets the package itself if this scope created it.
    pub fn rollback(&self) {
        for (name, previous) in self.journal.borrow_mut().drain(..).rev() {
            match previous {
                Some(module) => {
                    self.package.insert(name, module);
                }
                None => {
                    self.package.remove(&name);
                }
            }
        }
        if self.created_package && self.package.is_empty() {
            self.registry.remove_package(&self.package_name);
        }
    }

    /// Accepts every registration made so far. A later `rollback` only
    /// undoes registrations made after this call.
    pub fn commit(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Resolves a bare name at force time.
    ///
    /// Lookup order: file-local modules, package modules, host functions,
    /// package roots, builtins.
    pub fn lookup(&self, name: &str, location: &Location) -> Result<Value> {
        if let Some(module) = self.local.get(name).or_else(|| self.package.get(name)) {
            return Ok(Value::Module(module));
        }
        if let Some(host) = self.registry.host_function(name) {
            return Ok(Value::Function(Function::Host(host)));
        }
        if self.registry.has_package_prefix(name) {
            return Ok(Value::Package(name.to_string()));
        }
        if let Some(builtin) = find_builtin(name) {
            return Ok(Value::Function(Function::Builtin(builtin)));
        }
        Err(Error::unresolved(location, name))
    }

    /// Resolves `package.name`: a module of that package or a sub-package.
    pub fn lookup_in_package(&self, package: &str, name: &str, location: &Location) -> Result<Value> {
        let path = format!("{package}.{name}");
        if let Some(module) = self.registry.find_package(package).and_then(|ns| ns.get(name)) {
            return Ok(Value::Module(module));
        }
        if self.registry.has_package_prefix(&path) {
            return Ok(Value::Package(path));
        }
        Err(Error::unresolved(location, path))
    }
}
