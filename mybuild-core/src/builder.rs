//! Module graph builder: turns a parsed `module` declaration into a
//! `Module` and registers it in the file and package namespaces.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::ast::{
    Annotation, AnnotationArgs, Expr, ExprKind, Literal, Member, MemberKind, Modifier, ModuleDecl,
};
use crate::config::{MemberAnnotationPolicy, ParseOptions};
use crate::error::{Error, Result};
use crate::eval::{Deferred, Item, Thunk, compile, evaluate};
use crate::module::{
    DEFAULT_PROVIDER, MemberList, Module, ModuleKind, OptionDescriptor, Toolset,
    is_builtin_attribute,
};
use crate::namespace::Scope;
use crate::value::Value;

/// Type annotation naming the default implementation of an abstract module.
pub const DEFAULT_IMPL: &str = "DefaultImpl";
/// Member annotation keeping a dependency out of the runtime image.
pub const NO_RUNTIME: &str = "NoRuntime";
/// Member annotation adding an include directory.
pub const INCLUDE_PATH: &str = "IncludePath";

/// Member values collected per list, in declaration order.
type Slots = BTreeMap<MemberList, Vec<Item>>;

pub fn build(decl: &ModuleDecl, scope: &Scope, options: &ParseOptions) -> Result<Rc<Module>> {
    let (kind, toolset) = match decl.modifier {
        Modifier::Regular => (ModuleKind::Regular, Toolset::Default),
        Modifier::Static => (ModuleKind::Static, Toolset::Static),
        Modifier::Abstract => (ModuleKind::Interface, Toolset::Empty),
    };

    // The base must exist now; only member values may refer forward.
    let base = match &decl.superclass {
        Some(expr) => Some(resolve_superclass(expr, scope, &decl.name)?),
        None => None,
    };

    let mut slots = Slots::new();
    let mut module_options: Vec<OptionDescriptor> = Vec::new();
    for member in &decl.members {
        build_member(member, scope, options, &mut slots, &mut module_options)?;
    }

    let lists = slots
        .into_iter()
        .map(|(list, items)| (list, Deferred::items(items, scope, decl.location.clone())))
        .collect();

    let mut attributes = BTreeMap::new();
    for annotation in &decl.annotations {
        let name = annotation.name();
        if is_builtin_attribute(&name) {
            return Err(Error::unsupported(
                &annotation.location,
                format!("annotation '@{name}' shadowing a module attribute"),
            ));
        }
        let value = annotation_value(annotation, scope);
        if name == DEFAULT_IMPL {
            let provider = Deferred::new(
                Thunk::Provider(Rc::clone(&value)),
                scope,
                annotation.location.clone(),
            );
            attributes.insert(DEFAULT_PROVIDER.to_string(), provider);
        }
        if attributes.insert(name.clone(), value).is_some() {
            tracing::warn!(module = %decl.name, annotation = %name, "annotation repeated");
        }
    }

    let module = Rc::new(Module {
        name: decl.name.clone(),
        package: scope.package_name().to_string(),
        kind,
        toolset,
        base,
        options: module_options,
        lists,
        attributes,
        location: decl.location.clone(),
    });

    scope.register(Rc::clone(&module));
    tracing::debug!(module = %module.qualified_name(), kind = module.kind().as_str(), "registered module");
    Ok(module)
}

fn resolve_superclass(expr: &Expr, scope: &Scope, name: &str) -> Result<Rc<Module>> {
    match evaluate(expr, scope)? {
        Value::Module(module) => Ok(module),
        other => Err(Error::evaluation(
            &expr.location,
            format!(
                "module {name} cannot extend a {} value",
                other.type_name()
            ),
        )),
    }
}

fn build_member(
    member: &Member,
    scope: &Scope,
    options: &ParseOptions,
    slots: &mut Slots,
    module_options: &mut Vec<OptionDescriptor>,
) -> Result<()> {
    let mut no_runtime = false;
    let mut metadata = Vec::new();
    for annotation in &member.annotations {
        let name = annotation.name();
        match name.as_str() {
            NO_RUNTIME => {
                if !matches!(member.kind, MemberKind::Depends(_)) {
                    return Err(Error::unsupported(
                        &annotation.location,
                        "'@NoRuntime' on a member other than 'depends'",
                    ));
                }
                no_runtime = true;
            }
            INCLUDE_PATH => {
                let AnnotationArgs::Value(path) = &annotation.args else {
                    return Err(Error::syntax(
                        &annotation.location,
                        "'@IncludePath' expects a single path",
                    ));
                };
                slots
                    .entry(MemberList::Includes)
                    .or_default()
                    .push(Item::IncludePath(path.clone()));
            }
            _ => match options.member_annotations {
                MemberAnnotationPolicy::Reject => {
                    return Err(Error::unsupported(
                        &annotation.location,
                        format!("member annotation '@{name}'"),
                    ));
                }
                MemberAnnotationPolicy::Wrap => {
                    metadata.push((name, annotation_value(annotation, scope)));
                }
            },
        }
    }

    let item = |expr: &Expr| {
        let plain = Item::Plain(expr.clone());
        if metadata.is_empty() {
            plain
        } else {
            Item::Tagged {
                item: Box::new(plain),
                metadata: metadata.clone(),
            }
        }
    };

    match &member.kind {
        MemberKind::Depends(values) => {
            slots
                .entry(MemberList::BuildDepends)
                .or_default()
                .extend(values.iter().map(&item));
            if !no_runtime {
                slots
                    .entry(MemberList::RuntimeDepends)
                    .or_default()
                    .extend(values.iter().map(&item));
            }
        }
        MemberKind::Source(values) => {
            slots
                .entry(MemberList::Files)
                .or_default()
                .extend(values.iter().map(&item));
        }
        MemberKind::Option(decl) => {
            if module_options.iter().any(|option| option.name == decl.name) {
                return Err(Error::syntax(
                    &decl.location,
                    format!("option '{}' declared twice", decl.name),
                ));
            }
            module_options.push(OptionDescriptor {
                name: decl.name.clone(),
                kind: decl.kind,
                default: decl.default.as_ref().map(|expr| compile(expr, scope)),
                metadata,
                location: decl.location.clone(),
            });
        }
    }
    Ok(())
}

/// Lazy value of an annotation: `Unset` when bare, the argument when given
/// one value, and a string-keyed dict for keyword parameters.
fn annotation_value(annotation: &Annotation, scope: &Scope) -> Rc<Deferred> {
    match &annotation.args {
        AnnotationArgs::Bare => {
            Deferred::constant(Value::Unset, scope, annotation.location.clone())
        }
        AnnotationArgs::Value(expr) => compile(expr, scope),
        AnnotationArgs::Params(params) => {
            let entries = params
                .iter()
                .map(|param| {
                    let key = Expr::new(
                        ExprKind::Literal(Literal::Str(param.name.clone())),
                        param.location.clone(),
                    );
                    (key, param.value.clone())
                })
                .collect();
            compile(
                &Expr::new(ExprKind::Dict(entries), annotation.location.clone()),
                scope,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OptionKind;
    use crate::compiler::{FileModules, parse_in};
    use crate::namespace::Registry;

    fn build_with(source: &str, options: &ParseOptions) -> Result<FileModules> {
        parse_in(source, "test.my", "pkg", &Registry::new(), options)
    }

    fn build_ok(source: &str) -> FileModules {
        build_with(source, &ParseOptions::default()).expect("file builds")
    }

    fn names(values: &[Value]) -> Vec<String> {
        values
            .iter()
            .map(|value| match value.untagged() {
                Value::Module(module) => module.name().to_string(),
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn modifiers_select_kind_and_toolset() {
        let modules = build_ok("module r {} static module s {} abstract module a {}");
        assert_eq!(modules["r"].kind(), ModuleKind::Regular);
        assert_eq!(modules["r"].toolset(), Toolset::Default);
        assert!(modules["s"].is_static());
        assert_eq!(modules["s"].toolset(), Toolset::Static);
        assert!(modules["a"].is_interface());
        assert_eq!(modules["a"].toolset(), Toolset::Empty);
    }

    #[test]
    fn repeated_depends_accumulate_in_order() {
        let modules = build_ok(
            "module a {} module b {} module c {}
             module m { depends a, b depends c }",
        );
        let m = &modules["m"];
        assert_eq!(names(&m.build_depends().unwrap()), ["a", "b", "c"]);
        assert_eq!(names(&m.runtime_depends().unwrap()), ["a", "b", "c"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let modules = build_ok("module m { source 'a.c', 'a.c' source 'a.c' }");
        assert_eq!(names(&modules["m"].files().unwrap()), ["a.c", "a.c", "a.c"]);
    }

    #[test]
    fn no_runtime_keeps_only_build_dependency() {
        let modules = build_ok(
            "module x {} module y {}
             module m { @NoRuntime depends x depends y }",
        );
        let m = &modules["m"];
        assert_eq!(names(&m.build_depends().unwrap()), ["x", "y"]);
        assert_eq!(names(&m.runtime_depends().unwrap()), ["y"]);

        let modules = build_ok("module x {} module m { @NoRuntime depends x }");
        assert!(modules["m"].runtime_depends().unwrap().is_empty());
    }

    #[test]
    fn no_runtime_only_applies_to_depends() {
        let err = build_with("module m { @NoRuntime source 'a.c' }", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { feature, .. } if feature.contains("NoRuntime")));
    }

    #[test]
    fn include_path_appends_rewritten_entry() {
        let modules = build_ok(
            "module m {
                @IncludePath('$(ROOT)/include')
                source 'a.c'
                @IncludePath('$(GEN)')
                source 'b.c'
            }",
        );
        let m = &modules["m"];
        assert_eq!(names(&m.includes().unwrap()), ["${ROOT}/include", "${GEN}"]);
        assert_eq!(names(&m.files().unwrap()), ["a.c", "b.c"]);
    }

    #[test]
    fn options_carry_kind_and_default() {
        let modules = build_ok("module m { option number n = 100 option string s }");
        let options = modules["m"].options();
        assert_eq!(options[0].kind, OptionKind::Number);
        assert_eq!(options[0].default_value().unwrap(), Some(Value::Number(100)));
        assert_eq!(options[1].kind, OptionKind::String);
        assert!(!options[1].has_default());
        assert_eq!(options[1].default_value().unwrap(), None);
    }

    #[test]
    fn duplicate_option_is_rejected() {
        let err = build_with(
            "module m { option number n option string n }",
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn default_impl_resolves_forward_reference() {
        let modules = build_ok(
            "@DefaultImpl(b)
             abstract module a {}
             module b extends a {}",
        );
        let provider = modules["a"].default_provider().unwrap().expect("provider");
        assert!(matches!(provider, Value::Module(m) if Rc::ptr_eq(&m, &modules["b"])));
    }

    #[test]
    fn default_provider_follows_chains() {
        let modules = build_ok(
            "@DefaultImpl(b) abstract module a {}
             @DefaultImpl(c) abstract module b {}
             module c {}",
        );
        let provider = modules["a"].default_provider().unwrap().expect("provider");
        assert!(matches!(provider, Value::Module(m) if m.name() == "c"));
    }

    #[test]
    fn default_provider_cycle_is_an_error() {
        let modules = build_ok(
            "@DefaultImpl(b) abstract module a {}
             @DefaultImpl(a) abstract module b {}",
        );
        assert!(matches!(
            modules["a"].default_provider(),
            Err(Error::Evaluation { .. })
        ));
    }

    #[test]
    fn undeclared_superclass_fails_immediately() {
        let err = build_with("module m extends later {} module later {}", &ParseOptions::default())
            .unwrap_err();
        match err {
            Error::Resolution { name, location } => {
                assert_eq!(name, "later");
                assert_eq!((location.line, location.column), (1, 18));
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
    }

    #[test]
    fn superclass_must_be_a_module() {
        let err = build_with("module m extends len {}", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
    }

    #[test]
    fn subclass_inherits_members_and_provides_base() {
        let modules = build_ok(
            "abstract module api { source 'api.c' option number hz = 100 }
             module impl extends api { option number hz = 1000 }",
        );
        let implementation = &modules["impl"];
        assert_eq!(names(&implementation.files().unwrap()), ["api.c"]);
        assert_eq!(
            implementation.options()[0].default_value().unwrap(),
            Some(Value::Number(1000))
        );
        let provided: Vec<_> = implementation.provides().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(provided, ["impl", "api"]);
    }

    #[test]
    fn type_annotations_become_attributes() {
        let modules = build_ok(
            "@Bare @Single('x') @Params(a = 1, b = 'two')
             module m {}",
        );
        let m = &modules["m"];
        let location = m.location().clone();
        assert_eq!(m.attribute("Bare", &location).unwrap(), Value::Unset);
        assert_eq!(m.attribute("Single", &location).unwrap(), Value::from("x"));
        assert_eq!(
            m.attribute("Params", &location).unwrap(),
            Value::Dict(vec![
                (Value::from("a"), Value::Number(1)),
                (Value::from("b"), Value::from("two")),
            ])
        );
        assert_eq!(m.attribute_names(), ["Bare", "Params", "Single"]);
    }

    #[test]
    fn annotations_cannot_shadow_module_attributes() {
        for source in [
            "@files('x.c') module m {}",
            "@includes('inc') module m {}",
            "@qualified_name('x') module m {}",
            "@default_provider module m {}",
        ] {
            let err = build_with(source, &ParseOptions::default()).unwrap_err();
            match err {
                Error::Unsupported { feature, .. } => {
                    assert!(feature.contains("shadowing a module attribute"), "{feature}")
                }
                other => panic!("unexpected error for {source:?}: {other:?}"),
            }
        }
        let modules = build_ok("@Files('x.c') module m {}");
        assert_eq!(modules["m"].attribute_names(), ["Files"]);
    }

    #[test]
    fn unknown_member_annotation_is_rejected_by_default() {
        let err = build_with("module m { @Weak depends x }", &ParseOptions::default()).unwrap_err();
        match err {
            Error::Unsupported { feature, location } => {
                assert!(feature.contains("@Weak"));
                assert_eq!(location.column, 12);
            }
            other => panic!("expected unsupported error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_member_annotation_wraps_values_when_enabled() {
        let modules = build_with(
            "module x {}
             module m {
                @Weak depends x
                @Note('generated') option number n = 1
             }",
            &ParseOptions::wrapping_member_annotations(),
        )
        .expect("file builds");
        let m = &modules["m"];
        let depends = m.build_depends().unwrap();
        match &depends[0] {
            Value::Tagged { value, metadata } => {
                assert!(matches!(value.as_ref(), Value::Module(x) if x.name() == "x"));
                assert_eq!(metadata, &[("Weak".to_string(), Value::Unset)]);
            }
            other => panic!("expected tagged value, got {other:?}"),
        }
        assert_eq!(
            m.options()[0].metadata().unwrap(),
            [("Note".to_string(), Value::from("generated"))]
        );
    }

    #[test]
    fn module_call_builds_instance() {
        let modules = build_ok(
            "module timer { option number hz = 100 }
             module m { depends timer(hz = 1000) }",
        );
        let depends = modules["m"].build_depends().unwrap();
        assert_eq!(depends[0].to_string(), "pkg.timer(hz = 1000)");

        let modules = build_ok("module timer {} module m { depends timer(rate = 1) }");
        assert!(matches!(modules["m"].build_depends(), Err(Error::Evaluation { .. })));
    }
}
