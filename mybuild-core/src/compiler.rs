//! Whole-file entry points: source text in, declared modules out.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{Entity, SourceFile};
use crate::builder::build;
use crate::config::ParseOptions;
use crate::error::Result;
use crate::eval::evaluate;
use crate::module::Module;
use crate::namespace::{Registry, Scope};
use crate::parser;

/// Modules declared by one file, keyed by name.
pub type FileModules = BTreeMap<String, Rc<Module>>;

/// Parses one file against a fresh registry with default options.
pub fn parse(source: &str, file_label: &str, package: &str) -> Result<FileModules> {
    parse_in(source, file_label, package, &Registry::new(), &ParseOptions::default())
}

/// Parses one file and registers its modules in `registry`.
///
/// Either every module of the file is registered or, on the first error,
/// none of them is.
pub fn parse_in(
    source: &str,
    file_label: &str,
    package: &str,
    registry: &Rc<Registry>,
    options: &ParseOptions,
) -> Result<FileModules> {
    tracing::debug!(file = file_label, package, "parsing file");
    let file = parser::parse(file_label, source, package)?;

    let scope = Scope::new(registry, package);
    if let Err(err) = build_entities(&file, &scope, options) {
        tracing::debug!(file = file_label, error = %err, "file failed, rolling back");
        scope.rollback();
        return Err(err);
    }
    scope.commit();

    let modules = scope.local().snapshot();
    tracing::debug!(file = file_label, modules = modules.len(), "file done");
    Ok(modules)
}

fn build_entities(file: &SourceFile, scope: &Scope, options: &ParseOptions) -> Result<()> {
    for entity in &file.entities {
        match entity {
            Entity::Module(decl) => {
                build(decl, scope, options)?;
            }
            Entity::DebugPrint(expr) => {
                let value = evaluate(expr, scope)?;
                if options.debug_print {
                    tracing::info!(target: "mybuild::print", location = %expr.location, "{value}");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::module::MemberList;
    use crate::value::Value;

    const TIMER: &str = "
        package embox.kernel

        /* Timer subsystem. */
        @DefaultImpl(sys_timer)
        abstract module timer {
            option number hz = 100
            source 'timer.c'
        }

        module sys_timer extends timer {
            depends clock, irq
            @NoRuntime depends time
            source \"sys_timer.c\", '''
                generated.c'''
        }

        module clock {}
        module irq {}
        module time {}
    ";

    fn resolved(modules: &FileModules) -> Vec<String> {
        modules
            .values()
            .map(|module| {
                format!(
                    "{} files={:?} build={:?} runtime={:?} provider={:?}",
                    module.qualified_name(),
                    module.files().unwrap(),
                    module.build_depends().unwrap(),
                    module.runtime_depends().unwrap(),
                    module.default_provider().unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn parsing_twice_is_deterministic() {
        let first = parse(TIMER, "timer.my", "embox.kernel").expect("parses");
        let second = parse(TIMER, "timer.my", "embox.kernel").expect("parses");
        assert_eq!(first.keys().collect::<Vec<_>>(), ["clock", "irq", "sys_timer", "time", "timer"]);
        assert_eq!(resolved(&first), resolved(&second));
    }

    #[test]
    fn members_resolve_forward_references() {
        let modules = parse(TIMER, "timer.my", "embox.kernel").expect("parses");
        let sys_timer = &modules["sys_timer"];
        let runtime: Vec<_> = sys_timer
            .runtime_depends()
            .unwrap()
            .iter()
            .map(|value| value.to_string())
            .collect();
        assert_eq!(runtime, ["embox.kernel.clock", "embox.kernel.irq"]);
        assert_eq!(sys_timer.build_depends().unwrap().len(), 3);
        assert_eq!(
            sys_timer.files().unwrap(),
            [Value::from("sys_timer.c"), Value::from("\n                generated.c")]
        );
        let provider = modules["timer"].default_provider().unwrap();
        assert!(matches!(provider, Some(Value::Module(m)) if Rc::ptr_eq(&m, sys_timer)));
    }

    #[test]
    fn list_attributes_are_memoized() {
        let modules = parse(TIMER, "timer.my", "embox.kernel").expect("parses");
        let first = modules["sys_timer"].build_depends().unwrap();
        let second = modules["sys_timer"].build_depends().unwrap();
        assert_eq!(first, second);
        assert!(modules["sys_timer"].lists[&MemberList::BuildDepends].is_forced());
        assert!(!modules["sys_timer"].lists[&MemberList::Files].is_forced());
    }

    #[test]
    fn missing_dependency_fails_only_when_forced() {
        let modules = parse("module m { depends nowhere }", "m.my", "pkg").expect("parses");
        assert!(matches!(
            modules["m"].build_depends(),
            Err(Error::Resolution { name, .. }) if name == "nowhere"
        ));
    }

    #[test]
    fn packages_resolve_across_files() {
        let registry = Registry::new();
        let options = ParseOptions::default();
        parse_in("module timer {}", "a.my", "embox.kernel", &registry, &options).expect("first");
        let modules = parse_in(
            "module app { depends embox.kernel.timer }",
            "b.my",
            "embox.app",
            &registry,
            &options,
        )
        .expect("second");
        let depends = modules["app"].build_depends().unwrap();
        assert!(matches!(&depends[0], Value::Module(m) if m.qualified_name() == "embox.kernel.timer"));
    }

    #[test]
    fn failed_file_leaves_registry_untouched() {
        let registry = Registry::new();
        let options = ParseOptions::default();
        parse_in("module keep {}", "a.my", "pkg", &registry, &options).expect("first");

        let err = parse_in(
            "module keep {} module extra {} module bad extends missing {}",
            "b.my",
            "pkg",
            &registry,
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));

        let package = registry.package("pkg");
        assert_eq!(package.names(), ["keep"]);
        let keep = package.get("keep").expect("kept");
        assert_eq!(&*keep.location().file, "a.my");

        parse_in("module bad extends missing {}", "c.my", "ghost", &registry, &options)
            .unwrap_err();
        assert!(registry.find_package("ghost").is_none());
        let modules = parse_in("module m { depends ghost }", "d.my", "pkg", &registry, &options)
            .expect("parses");
        assert!(matches!(
            modules["m"].build_depends(),
            Err(Error::Resolution { name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn deeply_nested_values_fail_cleanly() {
        let source = format!(
            "module m {{ depends {}x{} }}",
            "[".repeat(200_000),
            "]".repeat(200_000)
        );
        assert!(matches!(
            parse(&source, "deep.my", "pkg"),
            Err(Error::Syntax { message, .. }) if message.contains("nested too deeply")
        ));
    }

    #[test]
    fn debug_print_evaluates_eagerly() {
        let err = parse("module a {} __print__ a.files __print__ b", "p.my", "pkg").unwrap_err();
        assert!(matches!(err, Error::Resolution { name, .. } if name == "b"));
    }

    #[test]
    fn package_mismatch_aborts_file() {
        let err = parse("package a.b.c module m {}", "m.my", "a.b.d").unwrap_err();
        match err {
            Error::PackageMismatch {
                expected,
                declared,
                location,
            } => {
                assert_eq!(expected, "a.b.d");
                assert_eq!(declared, "a.b.c");
                assert_eq!(location.column, 13);
            }
            other => panic!("expected package mismatch, got {other:?}"),
        }
    }
}
