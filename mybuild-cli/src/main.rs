use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use mybuild_core::{
    LoadedFile, MemberAnnotationPolicy, MemberList, Module, ParseOptions, Registry, Value,
    load_file, load_tree, parse_in,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Load Mybuild descriptions and print the resolved module graph.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Single file to load; reads stdin when neither this nor --root is given.
    #[arg(short, long, conflicts_with = "root")]
    input: Option<PathBuf>,

    /// Package the input file must declare.
    #[arg(short, long, default_value = "")]
    package: String,

    /// Directory tree to load; packages follow the directory layout.
    #[arg(short, long, value_name = "DIR")]
    root: Option<PathBuf>,

    #[arg(long, help = "Keep unknown member annotations as metadata instead of failing")]
    wrap_member_annotations: bool,

    #[arg(long, help = "Print declarations without forcing lazy attributes")]
    no_force: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = execute(&cli)?;
    print!("{output}");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "warn,mybuild::print=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn execute(cli: &Cli) -> Result<String> {
    let options = ParseOptions {
        member_annotations: if cli.wrap_member_annotations {
            MemberAnnotationPolicy::Wrap
        } else {
            MemberAnnotationPolicy::Reject
        },
        ..ParseOptions::default()
    };
    let registry = Registry::new();

    let files = match (&cli.root, &cli.input) {
        (Some(root), _) => load_tree(root, &registry, &options)
            .with_context(|| format!("failed to load tree {}", root.display()))?,
        (None, Some(path)) => vec![
            load_file(path, &cli.package, &registry, &options)
                .with_context(|| format!("failed to load {}", path.display()))?,
        ],
        (None, None) => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            let modules = parse_in(&source, "<stdin>", &cli.package, &registry, &options)
                .context("failed to load <stdin>")?;
            vec![LoadedFile {
                path: PathBuf::from("<stdin>"),
                package: cli.package.clone(),
                modules,
            }]
        }
    };

    let mut out = String::new();
    for file in &files {
        for module in file.modules.values() {
            render_module(&mut out, module, !cli.no_force)
                .with_context(|| format!("failed to resolve module {}", module.qualified_name()))?;
        }
    }
    Ok(out)
}

fn render_module(out: &mut String, module: &Rc<Module>, force: bool) -> Result<()> {
    write!(out, "{} {}", module.kind().as_str(), module.qualified_name())?;
    if let Some(base) = module.base() {
        write!(out, " extends {}", base.qualified_name())?;
    }
    writeln!(out)?;

    for option in module.options() {
        write!(out, "  option {} {}", option.kind.as_str(), option.name)?;
        if force {
            if let Some(default) = option.default_value()? {
                write!(out, " = {default}")?;
            }
        } else if option.has_default() {
            write!(out, " = ...")?;
        }
        writeln!(out)?;
    }

    if !force {
        return Ok(());
    }

    for list in MemberList::ALL {
        let values = module.list(list)?;
        if !values.is_empty() {
            writeln!(out, "  {}: {}", list.name(), Value::List(values))?;
        }
    }
    for name in module.attribute_names() {
        let value = module.attribute(&name, module.location())?;
        writeln!(out, "  @{name}: {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const KERNEL: &str = "package embox.kernel

@DefaultImpl(sys_timer)
abstract module timer {
    option number hz = 100
}

module sys_timer extends timer {
    @NoRuntime depends clock
    source 'sys_timer.c'
}

module clock {}
";

    #[test]
    fn prints_resolved_modules_of_a_file() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("kernel.my");
        fs::write(&input_path, KERNEL).expect("write input");

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--package")
            .arg("embox.kernel")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "module embox.kernel.sys_timer extends embox.kernel.timer",
            ))
            .stdout(predicate::str::contains("build_depends: [embox.kernel.clock]"))
            .stdout(predicate::str::contains("@default_provider: embox.kernel.sys_timer"))
            .stdout(predicate::str::contains("option number hz = 100"));
    }

    #[test]
    fn loads_a_directory_tree() {
        let dir = tempdir().expect("tempdir");
        let kernel = dir.path().join("embox/kernel");
        fs::create_dir_all(&kernel).expect("create dirs");
        fs::write(kernel.join("Mybuild"), KERNEL).expect("write kernel");
        let app = dir.path().join("embox/app");
        fs::create_dir_all(&app).expect("create dirs");
        fs::write(
            app.join("Mybuild"),
            "package embox.app\nmodule shell { depends embox.kernel.timer }\n",
        )
        .expect("write app");

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--root")
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("module embox.app.shell"))
            .stdout(predicate::str::contains("runtime_depends: [embox.kernel.timer]"));
    }

    #[test]
    fn reports_package_mismatch() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("kernel.my");
        fs::write(&input_path, KERNEL).expect("write input");

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--package")
            .arg("embox.driver")
            .assert()
            .failure()
            .stderr(predicate::str::contains("package mismatch"));
    }

    #[test]
    fn unknown_member_annotation_needs_opt_in() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("m.my");
        fs::write(&input_path, "module x {}\nmodule m { @Weak depends x }\n").expect("write input");

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("member annotation '@Weak' is not supported"));

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--wrap-member-annotations")
            .assert()
            .success()
            .stdout(predicate::str::contains("build_depends: [x @Weak]"));
    }

    #[test]
    fn unresolved_dependency_fails_when_forced() {
        let source = "module m { depends missing }\n";

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .write_stdin(source)
            .assert()
            .failure()
            .stderr(predicate::str::contains("unresolved name 'missing'"));

        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .arg("--no-force")
            .write_stdin(source)
            .assert()
            .success()
            .stdout(predicate::str::contains("module m"));
    }

    #[test]
    fn debug_print_goes_to_stderr() {
        Command::cargo_bin("mybuild-cli")
            .expect("binary exists")
            .write_stdin("__print__ len([1, 2, 3])\n")
            .assert()
            .success()
            .stderr(predicate::str::contains("3"));
    }
}
