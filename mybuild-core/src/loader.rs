use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use walkdir::WalkDir;

use crate::compiler::{FileModules, parse_in};
use crate::config::ParseOptions;
use crate::error::Result;
use crate::namespace::Registry;

/// File name that marks a directory's module description.
pub const MYBUILD_FILE: &str = "Mybuild";
pub const MYBUILD_EXTENSION: &str = "my";

#[derive(Debug)]
pub struct LoadedFile {
    /// Path relative to the tree root.
    pub path: PathBuf,
    pub package: String,
    pub modules: FileModules,
}

pub fn is_mybuild_file(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == MYBUILD_FILE)
        || path.extension().is_some_and(|ext| ext == MYBUILD_EXTENSION)
}

/// Package a file is expected to declare: its directory relative to the
/// root, with path separators turned into dots.
pub fn package_for(relative: &Path) -> String {
    relative
        .parent()
        .map(|dir| {
            dir.components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default()
}

/// Parses every description file under `root` into `registry`, in sorted
/// path order. The first failing file aborts the walk.
pub fn load_tree(
    root: impl AsRef<Path>,
    registry: &Rc<Registry>,
    options: &ParseOptions,
) -> Result<Vec<LoadedFile>> {
    let root = root.as_ref();
    let mut loaded = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_mybuild_file(path) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let package = package_for(&relative);
        let source = fs::read_to_string(path)?;
        let modules = parse_in(
            &source,
            &relative.to_string_lossy(),
            &package,
            registry,
            options,
        )?;
        tracing::debug!(path = %relative.display(), package = %package, "loaded file");
        loaded.push(LoadedFile {
            path: relative,
            package,
            modules,
        });
    }
    Ok(loaded)
}

/// Reads and parses a single file against `registry`.
pub fn load_file(
    path: impl AsRef<Path>,
    package: &str,
    registry: &Rc<Registry>,
    options: &ParseOptions,
) -> Result<LoadedFile> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)?;
    let modules = parse_in(&source, &path.to_string_lossy(), package, registry, options)?;
    Ok(LoadedFile {
        path: path.to_path_buf(),
        package: package.to_string(),
        modules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::Value;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(path, contents).expect("write file");
    }

    #[test]
    fn derives_packages_from_directories() {
        assert_eq!(package_for(Path::new("embox/kernel/Mybuild")), "embox.kernel");
        assert_eq!(package_for(Path::new("top.my")), "");
        assert!(is_mybuild_file(Path::new("a/Mybuild")));
        assert!(is_mybuild_file(Path::new("a/timer.my")));
        assert!(!is_mybuild_file(Path::new("a/timer.c")));
    }

    #[test]
    fn loads_tree_in_sorted_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "embox/kernel/Mybuild",
            "package embox.kernel\nmodule timer { source 'timer.c' }",
        );
        write(
            dir.path(),
            "embox/driver/serial.my",
            "package embox.driver\nmodule serial { depends embox.kernel.timer }",
        );
        write(dir.path(), "embox/kernel/timer.c", "int x;");

        let registry = Registry::new();
        let loaded = load_tree(dir.path(), &registry, &ParseOptions::default()).expect("loads");
        let packages: Vec<_> = loaded.iter().map(|file| file.package.as_str()).collect();
        assert_eq!(packages, ["embox.driver", "embox.kernel"]);

        // Cross-file references resolve once the whole tree is loaded.
        let serial = &loaded[0].modules["serial"];
        let depends = serial.build_depends().expect("resolves");
        assert!(matches!(&depends[0], Value::Module(m) if m.qualified_name() == "embox.kernel.timer"));
    }

    #[test]
    fn first_failing_file_aborts() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "pkg/Mybuild", "package other\nmodule m {}");

        let registry = Registry::new();
        let err = load_tree(dir.path(), &registry, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::PackageMismatch { .. }));
        assert!(registry.lookup_module("pkg.m").is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let registry = Registry::new();
        let err = load_file("/nonexistent/Mybuild", "pkg", &registry, &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SourceIo(_)));
    }
}
