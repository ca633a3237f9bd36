//! Setup phase (spec.md §4.3, component C6): the one-time, single-threaded pipeline that runs
//! before the intercepted build starts — resolve targets, enumerate dependencies, extract the
//! hook tree, match rules against every dependency's ASTs, wire a glue import into each target
//! module, and persist `matched.json` for every later `toolexec` process to read. Modeled on
//! the teacher's `Project::compile` top-level sequence (`crates/compilers/src/project.rs`):
//! one method, a fixed ordered list of fallible steps, no parallelism.

use std::path::{Path, PathBuf};

use otelweave_artifacts::{MatchedRules, Rule, RuleSet};
use otelweave_ast::GoFile;
use otelweave_core::error::Result;

use crate::resolver::PackageLister;
use crate::rules::Catalog;
use crate::workdir::Workdir;

pub struct SetupOutcome {
    /// Whether setup actually ran (`false` means the sentinel short-circuited it, step 1).
    pub ran: bool,
    pub matched: MatchedRules,
}

/// Runs the setup pipeline, or no-ops if `workdir.is_set_up()` (spec.md §4.3 step 1).
pub fn run(
    workdir: &Workdir,
    build_argv: &[String],
    extra_rules_file: Option<&Path>,
    lister: &dyn PackageLister,
    build_flags: &[String],
) -> Result<SetupOutcome> {
    if workdir.is_set_up() {
        let matched = otelweave_core::fs::read_json_file(&workdir.matched_json())?;
        return Ok(SetupOutcome { ran: false, matched });
    }

    workdir.ensure_layout()?;
    workdir.clear_stale_sidecars();

    let targets = resolve_build_targets(build_argv);
    let dependencies = lister.list_dependencies(&targets, build_flags)?;
    Catalog::extract_to(&workdir.hook_tree_dir())?;
    let catalog = Catalog::load_all(extra_rules_file)?;

    let mut matched = MatchedRules::default();
    for dep in &dependencies {
        let mut rule_set = RuleSet::new(dep.import_path.clone(), dep.package_name.clone());
        let parsed_files: Vec<GoFile> = dep
            .source_files
            .iter()
            .filter_map(|path| {
                let source = std::fs::read_to_string(path).ok()?;
                GoFile::parse(path.clone(), source).ok()
            })
            .collect();

        for rule in &catalog.rules {
            if rule.target() != dep.import_path {
                continue;
            }
            match rule {
                Rule::Struct(r) => {
                    if parsed_files.iter().any(|f| f.find_struct(&r.struct_name).is_some()) {
                        rule_set.structs.push(r.clone());
                        push_extra_file(&mut rule_set, &r.path);
                    } else {
                        tracing::warn!(rule = %r.name, struct_name = %r.struct_name, target = %r.target, "struct target not found, skipping rule");
                    }
                }
                Rule::Raw(r) => {
                    if parsed_files.iter().any(|f| f.find_func(&func_name(&r.func), receiver_of(&r.func)).is_some()) {
                        rule_set.raw.push(r.clone());
                        push_extra_file(&mut rule_set, &r.path);
                    } else {
                        tracing::warn!(rule = %r.name, func = %r.func, target = %r.target, "raw rule target not found, skipping rule");
                    }
                }
                Rule::Function(r) => {
                    let (receiver, name) = r.receiver_and_name();
                    if parsed_files.iter().any(|f| f.find_func(name, receiver).is_some()) {
                        rule_set.functions.push(r.clone());
                        push_extra_file(&mut rule_set, &r.path);
                    } else {
                        tracing::warn!(rule = %r.name, func = %r.func, target = %r.target, "function target not found, skipping rule");
                    }
                }
                Rule::File(r) => {
                    rule_set.files.push(r.clone());
                    push_extra_file(&mut rule_set, &r.path);
                }
                Rule::Call(r) => {
                    // CallRule matching is deferred to the weaver (spec.md §4.3.1): call
                    // sites are scoped per compile, not per dependency snapshot.
                    rule_set.calls.push(r.clone());
                    push_extra_file(&mut rule_set, &r.path);
                }
            }
        }

        if !rule_set.is_empty() {
            write_glue_file(&dep.module_dir, &dep.package_name, &rule_set.extra_files)?;
            if let Some(go_mod) = find_go_mod(&dep.module_dir) {
                workdir.backup_manifests(std::slice::from_ref(&go_mod))?;
                update_go_mod(&go_mod, &workdir.hook_tree_dir())?;
                if !matched.manifests.contains(&go_mod) {
                    matched.manifests.push(go_mod);
                }
            }
            matched.insert(rule_set);
        }
    }

    otelweave_core::fs::write_json_file(&matched, &workdir.matched_json())?;
    workdir.mark_set_up()?;
    Ok(SetupOutcome { ran: true, matched })
}

/// Walks up from `dir` to find the nearest `go.mod`, mirroring how `go build` resolves the
/// enclosing module for a package directory. `None` for a directory outside any module (the
/// standard library, which has no manifest to update).
fn find_go_mod(dir: &Path) -> Option<PathBuf> {
    let mut current = Some(dir);
    while let Some(d) = current {
        let candidate = d.join("go.mod");
        if candidate.exists() {
            return Some(candidate);
        }
        current = d.parent();
    }
    None
}

const HOOK_MODULE_PATH: &str = "otelweave/hooks";

/// Adds the `require`/`replace` pair that lets the glue file's `otelweave/hooks/...` import
/// resolve to the extracted hook tree (spec.md §4.3 step 6: "update the module manifest to
/// include it"). Idempotent: a go.mod that already carries the replace line is left untouched.
fn update_go_mod(go_mod: &Path, hook_tree_dir: &Path) -> Result<()> {
    let original = std::fs::read_to_string(go_mod)?;
    if original.contains(HOOK_MODULE_PATH) {
        return Ok(());
    }
    let mut updated = original;
    if !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!(
        "\nrequire {HOOK_MODULE_PATH} v0.0.0\n\nreplace {HOOK_MODULE_PATH} => {}\n",
        hook_tree_dir.display()
    ));
    otelweave_core::fs::write_atomic(go_mod, updated.as_bytes())
}

/// Build-target resolution (spec.md §4.3 step 2): the argv's non-flag positional arguments,
/// skipping the value that follows a flag known to take one. Defaults to `.` when none.
fn resolve_build_targets(build_argv: &[String]) -> Vec<String> {
    const VALUE_TAKING_FLAGS: &[&str] = &["-o", "-tags", "-ldflags", "-gcflags", "-modfile", "-p"];
    let mut targets = Vec::new();
    let mut i = 0;
    while i < build_argv.len() {
        let arg = &build_argv[i];
        if arg.starts_with('-') {
            if VALUE_TAKING_FLAGS.contains(&arg.as_str()) && !arg.contains('=') {
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        targets.push(arg.clone());
        i += 1;
    }
    if targets.is_empty() {
        targets.push(".".to_string());
    }
    targets
}

fn func_name(func: &str) -> String {
    if let Some(dot) = func.rfind(')') {
        if let Some(open) = func.find('(') {
            if open == 0 {
                return func[dot + 1..].trim_start_matches('.').to_string();
            }
        }
    }
    func.to_string()
}

fn receiver_of(func: &str) -> Option<&str> {
    let dot = func.rfind(')')?;
    let open = func.find('(')?;
    if open == 0 {
        Some(&func[open + 1..dot])
    } else {
        None
    }
}

fn push_extra_file(rule_set: &mut RuleSet, hook_path: &str) {
    let path = PathBuf::from(hook_path);
    if !rule_set.extra_files.contains(&path) {
        rule_set.extra_files.push(path);
    }
}

/// Generates the per-module glue file that pulls the extracted hook tree into the build graph
/// (spec.md §4.3 step 6): one blank import per distinct hook path this package matched,
/// under the package's own declared name so it compiles alongside the rest of the package,
/// and under the same logical `otelweave/hooks/<path>` import [`crate::weave::hook_import_path`]
/// builds — not a raw filesystem path, which `go build` cannot resolve as an import.
fn write_glue_file(module_dir: &Path, package_name: &str, hook_paths: &[PathBuf]) -> Result<()> {
    let glue_path = module_dir.join("otelweave_glue.go");
    let mut contents = format!("package {package_name}\n\nimport (\n");
    for path in hook_paths {
        let import_path = crate::weave::hook_import_path(&path.to_string_lossy());
        contents.push_str(&format!("\t_ \"{import_path}\"\n"));
    }
    contents.push_str(")\n");
    otelweave_core::fs::write_atomic(&glue_path, contents.as_bytes())
}
