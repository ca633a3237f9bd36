//! Per-compile weaver orchestration (spec.md §4.6, component C8): apply every matched rule to
//! every source file in a compile invocation, in the fixed order StructRules -> RawRules ->
//! FunctionRules -> CallRules -> FileRules, reconcile the imports each rule adds, and emit
//! rewritten sources plus an updated `importcfg`. Continues the teacher's
//! `ProjectCompiler::compile` shape (`crates/compilers/src/compile/project.rs`): one pipeline
//! object, a fixed sequence of filesystem-touching steps, atomic writes throughout.

pub mod trampoline;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use otelweave_artifacts::{CallRule, ImportCfg, RuleSet};
use otelweave_ast::{
    default_package_ident, is_valid_statement_fragment, scan_calls, Edit, GoFile, ImportAlias, Template,
};
use otelweave_core::error::{Result, WeaveError};

use crate::resolver::PackageLister;

/// One source file as the weaver sees it: its original path and its text.
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
}

/// Output of weaving one compile invocation.
#[derive(Debug)]
pub struct WeaveOutput {
    /// `(original path, new temp path)` for every file whose content changed, plus brand new
    /// files synthesized by FileRules (whose "original" is the hook-tree source path).
    pub rewritten: Vec<(PathBuf, PathBuf)>,
    pub importcfg: ImportCfg,
    /// Archive paths newly added to `importcfg` by this compile, recorded into the
    /// per-process sidecar (spec.md §4.6 step 6).
    pub added_archives: BTreeMap<String, PathBuf>,
    /// Whether any file changed — if so the caller must strip `-complete` from the compile
    /// argv (spec.md §4.6 step 5).
    pub any_change: bool,
}

/// The synthetic import path a rule's hook-tree `path` is reachable under, once the setup
/// phase's glue file has brought the scratch hook tree into the build graph (spec.md §4.3
/// step 6). Kept as one well-known prefix so every weaving site agrees on it.
pub fn hook_import_path(rule_path: &str) -> String {
    format!("otelweave/hooks/{rule_path}")
}

#[allow(clippy::too_many_arguments)]
pub fn weave_compile(
    rule_set: &RuleSet,
    files: &[SourceFile],
    importcfg_path: &Path,
    lister: &dyn PackageLister,
    build_flags: &[String],
    hook_tree_dir: &Path,
    temp_dir: &Path,
    debug_dir: &Path,
    call_templates: &[Template],
) -> Result<WeaveOutput> {
    let mut importcfg = ImportCfg::read(importcfg_path)?;
    let mut added_archives = BTreeMap::new();
    let mut rewritten = Vec::new();
    let mut any_change = false;

    // Raw fragments are validated once, independent of which file (if any) their target
    // function lives in (spec.md §4.6.1: malformed raw source is a fatal, typed error).
    for rule in &rule_set.raw {
        if !is_valid_statement_fragment(&rule.raw) {
            return Err(WeaveError::SyntaxInRaw {
                rule: rule.name.clone(),
                reason: "fragment has unbalanced parens/braces/brackets".to_string(),
            });
        }
    }

    let mut found_structs: BTreeSet<&str> = BTreeSet::new();

    for file in files {
        let go_file = GoFile::parse(file.path.clone(), file.source.clone())?;
        let mut edits = Vec::new();
        let mut wanted_imports: Vec<(Option<String>, String)> = Vec::new();

        for rule in &rule_set.structs {
            if let Some(decl) = go_file.find_struct(&rule.struct_name) {
                found_structs.insert(rule.struct_name.as_str());
                if !struct_already_has_field(&go_file, decl, &rule.field_name) {
                    edits.push(Edit::insert(
                        decl.body_span.1,
                        format!("\n\t{} {}\n", rule.field_name, rule.field_type),
                    ));
                }
            }
        }

        for rule in &rule_set.raw {
            if let Some(decl) = go_file.find_func(&rule.func, None) {
                if !go_file.clone_span(decl.body_span).contains(rule.raw.trim()) {
                    edits.push(Edit::insert(decl.body_span.0, format!("\n{}\n", rule.raw)));
                }
            }
        }

        for rule in &rule_set.functions {
            let (receiver, name) = rule.receiver_and_name();
            if go_file.already_woven(name) {
                continue;
            }
            if let Some(decl) = go_file.find_func(name, receiver) {
                // spec.md §4.6.3: an unnamed parameter/result needs a synthetic name spliced
                // into the signature before the jump statement can take its address.
                edits.extend(decl.synthesize_names_edits());
                let hook_alias = default_package_ident(&hook_import_path(&rule.path));
                let tramp = trampoline::build(rule, decl, &hook_alias);
                edits.push(Edit::insert(decl.body_span.0, format!("\n{}", tramp.jump_statement)));
                edits.push(Edit::insert(decl.body_span.1, "\n\t}\n"));
                edits.push(Edit::insert(go_file.source.len(), format!("\n{}", tramp.definitions)));
                wanted_imports.push((None, trampoline::HOOKCTX_IMPORT_PATH.to_string()));
                wanted_imports.push((None, hook_import_path(&rule.path)));
            }
        }

        for rule in &rule_set.calls {
            apply_call_rule(&go_file, rule, call_templates, &mut edits, &mut wanted_imports)?;
        }

        if edits.is_empty() {
            continue;
        }
        any_change = true;
        edits.extend(reconcile_imports(&go_file, &wanted_imports)?);

        let rewritten_source = go_file.apply_edits(edits)?;
        let file_name = file.path.file_name().unwrap_or_default();
        let new_path = temp_dir.join(file_name);
        otelweave_core::fs::write_atomic(&new_path, rewritten_source.as_bytes())?;
        otelweave_core::fs::copy_into(&new_path, &debug_dir.join(file_name))?;
        rewritten.push((file.path.clone(), new_path));

        resolve_new_archives(&wanted_imports, lister, build_flags, &mut importcfg, &mut added_archives)?;
    }

    for rule in &rule_set.structs {
        if !found_structs.contains(rule.struct_name.as_str()) {
            return Err(WeaveError::TypeNotFound {
                rule: rule.name.clone(),
                struct_name: rule.struct_name.clone(),
                target: rule_set.import_path.clone(),
            });
        }
    }

    for rule in &rule_set.files {
        let src_path = hook_tree_dir.join(&rule.path).join(&rule.file);
        let contents = std::fs::read_to_string(&src_path)?;
        let rewritten_contents = rewrite_package_header(&contents, &rule_set.package_name)?;
        let dest_name = format!("otelweave_{}_{}", sanitize_ident(&rule.name), rule.file);
        let dest = temp_dir.join(&dest_name);
        otelweave_core::fs::write_atomic(&dest, rewritten_contents.as_bytes())?;
        otelweave_core::fs::copy_into(&dest, &debug_dir.join(&dest_name))?;
        rewritten.push((src_path, dest.clone()));
        any_change = true;

        let injected = GoFile::parse(dest, rewritten_contents)?;
        let wants: Vec<(Option<String>, String)> = injected
            .imports
            .iter()
            .filter(|i| i.alias != ImportAlias::Blank && i.alias != ImportAlias::Dot)
            .map(|i| (i.reference_name(), i.path.clone()))
            .collect();
        resolve_new_archives(&wants, lister, build_flags, &mut importcfg, &mut added_archives)?;
    }

    Ok(WeaveOutput { rewritten, importcfg, added_archives, any_change })
}

fn struct_already_has_field(go_file: &GoFile, decl: &otelweave_ast::StructDecl, field_name: &str) -> bool {
    let body = go_file.clone_span(decl.body_span);
    body.lines().any(|l| l.trim_start().starts_with(field_name))
}

fn rewrite_package_header(contents: &str, new_package_name: &str) -> Result<String> {
    let mut lines = contents.lines();
    let mut out = String::new();
    let mut replaced = false;
    for line in &mut lines {
        if !replaced && line.trim_start().starts_with("package ") {
            out.push_str(&format!("package {new_package_name}\n"));
            replaced = true;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    if !replaced {
        return Err(WeaveError::WeaveFailure {
            file: PathBuf::new(),
            reason: "file-rule source has no package clause".to_string(),
        });
    }
    Ok(out)
}

fn sanitize_ident(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

fn apply_call_rule(
    go_file: &GoFile,
    rule: &CallRule,
    call_templates: &[Template],
    edits: &mut Vec<Edit>,
    wanted_imports: &mut Vec<(Option<String>, String)>,
) -> Result<()> {
    let Some(template) = call_templates.iter().find(|t| t.rule_name() == rule.name) else {
        return Ok(());
    };
    let candidate_aliases: Vec<String> = go_file
        .imports
        .iter()
        .filter(|i| i.path == rule.import_path)
        .filter_map(|i| i.reference_name())
        .collect();
    if candidate_aliases.is_empty() {
        return Ok(());
    }

    for site in scan_calls(&go_file.source, 0) {
        if site.func_name != rule.func_name || !candidate_aliases.iter().any(|a| a == &site.alias) {
            continue;
        }
        let original = go_file.clone_span(site.span);
        let spliced = template.splice(&original);
        edits.push(Edit::replace(site.span, spliced));
    }
    for addition in &rule.imports {
        wanted_imports.push((addition.alias.clone(), addition.path.clone()));
    }
    Ok(())
}

/// Import reconciliation (spec.md §4.6 step 4).
fn reconcile_imports(go_file: &GoFile, wants: &[(Option<String>, String)]) -> Result<Vec<Edit>> {
    let mut to_add: Vec<&(Option<String>, String)> = Vec::new();
    for want @ (alias, path) in wants {
        let existing = go_file.imports.iter().find(|i| &i.path == path);
        match existing {
            None => to_add.push(want),
            Some(imp) => match (&imp.alias, alias) {
                (ImportAlias::Named(existing_alias), Some(wanted_alias))
                    if existing_alias != wanted_alias =>
                {
                    return Err(WeaveError::AliasConflict {
                        file: go_file.path.clone(),
                        path: path.clone(),
                        existing: existing_alias.clone(),
                        wanted: wanted_alias.clone(),
                        rule: String::new(),
                    });
                }
                (ImportAlias::Dot, None) => {
                    return Err(WeaveError::DotImportConflict {
                        file: go_file.path.clone(),
                        path: path.clone(),
                        rule: String::new(),
                    });
                }
                _ => {}
            },
        }
    }
    if to_add.is_empty() {
        return Ok(Vec::new());
    }
    let insertion_point = go_file.source.find('\n').map(|n| n + 1).unwrap_or(0);
    let mut text = String::new();
    let mut seen = std::collections::BTreeSet::new();
    for (alias, path) in to_add {
        if !seen.insert(path.clone()) {
            continue;
        }
        text.push_str("\nimport ");
        if let Some(alias) = alias {
            text.push_str(alias);
            text.push(' ');
        }
        text.push('"');
        text.push_str(path);
        text.push('"');
    }
    Ok(vec![Edit::insert(insertion_point, text)])
}

fn resolve_new_archives(
    wants: &[(Option<String>, String)],
    lister: &dyn PackageLister,
    build_flags: &[String],
    importcfg: &mut ImportCfg,
    added_archives: &mut BTreeMap<String, PathBuf>,
) -> Result<()> {
    for (_, path) in wants {
        if importcfg.packagefile.contains_key(path) {
            continue;
        }
        let archives = lister.list_archives(path, build_flags)?;
        for (k, v) in archives {
            if importcfg.add_packagefile(k.clone(), v.clone()) {
                added_archives.insert(k, v);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SubprocessLister;
    use otelweave_artifacts::{FunctionRule, StructRule};
    use std::collections::BTreeMap as Map;

    struct NullLister;
    impl PackageLister for NullLister {
        fn list_name(&self, _import_path: &str, _build_flags: &[String]) -> Result<String> {
            Ok("pkg".to_string())
        }
        fn list_archives(&self, import_path: &str, _build_flags: &[String]) -> Result<Map<String, PathBuf>> {
            let mut m = Map::new();
            m.insert(import_path.to_string(), PathBuf::from(format!("/archives/{import_path}.a")));
            Ok(m)
        }
        fn list_dependencies(
            &self,
            _targets: &[String],
            _build_flags: &[String],
        ) -> Result<Vec<otelweave_artifacts::Dependency>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn struct_rule_appends_field_once() {
        let src = "package m\n\ntype T struct {\n\tX int\n}\n";
        let go_file = GoFile::parse("m.go", src).unwrap();
        let decl = go_file.find_struct("T").unwrap();
        assert!(!struct_already_has_field(&go_file, decl, "TraceID"));
    }

    #[test]
    fn weave_compile_rewrites_matched_function_and_strips_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("temp");
        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&debug_dir).unwrap();

        let importcfg_path = dir.path().join("importcfg");
        std::fs::write(&importcfg_path, "").unwrap();

        let mut rule_set = RuleSet::new("example.com/svc", "svc");
        rule_set.functions.push(FunctionRule {
            name: "demo".into(),
            target: "example.com/svc".into(),
            path: "nethttp".into(),
            func: "Handle".into(),
            before: Some("BeforeServeHTTP".into()),
            after: Some("AfterServeHTTP".into()),
        });

        let source = SourceFile {
            path: PathBuf::from("handler.go"),
            source: "package svc\n\nfunc Handle(w int) {\n\tdoStuff()\n}\n".to_string(),
        };

        let output = weave_compile(
            &rule_set,
            &[source],
            &importcfg_path,
            &NullLister,
            &[],
            Path::new("/hooks"),
            &temp_dir,
            &debug_dir,
            &[],
        )
        .unwrap();

        assert!(output.any_change);
        assert_eq!(output.rewritten.len(), 1);
        let (_, new_path) = &output.rewritten[0];
        let contents = std::fs::read_to_string(new_path).unwrap();
        assert!(contents.contains("doStuff()"));
        assert!(contents.contains(&otelweave_ast::weave_marker("Handle")));
    }

    #[test]
    fn idempotent_on_already_woven_function() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("temp");
        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&debug_dir).unwrap();
        let importcfg_path = dir.path().join("importcfg");
        std::fs::write(&importcfg_path, "").unwrap();

        let mut rule_set = RuleSet::new("example.com/svc", "svc");
        rule_set.functions.push(FunctionRule {
            name: "demo".into(),
            target: "example.com/svc".into(),
            path: "nethttp".into(),
            func: "Handle".into(),
            before: Some("BeforeServeHTTP".into()),
            after: None,
        });

        let marker = otelweave_ast::weave_marker("Handle");
        let source = SourceFile {
            path: PathBuf::from("handler.go"),
            source: format!("package svc\n\nfunc Handle(w int) {{\n\t// {marker}\n}}\n"),
        };

        let output = weave_compile(
            &rule_set,
            &[source],
            &importcfg_path,
            &NullLister,
            &[],
            Path::new("/hooks"),
            &temp_dir,
            &debug_dir,
            &[],
        )
        .unwrap();
        assert!(!output.any_change);
        assert!(output.rewritten.is_empty());
    }

    #[test]
    fn alias_conflict_is_detected() {
        let src = "package m\n\nimport other \"example.com/x\"\n\nfunc F() {}\n";
        let go_file = GoFile::parse("m.go", src).unwrap();
        let wants = vec![(Some("mine".to_string()), "example.com/x".to_string())];
        let err = reconcile_imports(&go_file, &wants).unwrap_err();
        assert!(matches!(err, WeaveError::AliasConflict { .. }));
    }

    #[test]
    fn struct_rule_missing_target_raises_type_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("temp");
        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&debug_dir).unwrap();
        let importcfg_path = dir.path().join("importcfg");
        std::fs::write(&importcfg_path, "").unwrap();

        let mut rule_set = RuleSet::new("example.com/svc", "svc");
        rule_set.structs.push(StructRule {
            name: "add-trace-id".into(),
            target: "example.com/svc".into(),
            path: "p".into(),
            struct_name: "NoSuchType".into(),
            field_name: "TraceID".into(),
            field_type: "string".into(),
        });
        let source = SourceFile {
            path: PathBuf::from("svc.go"),
            source: "package svc\n\ntype Other struct{}\n".to_string(),
        };

        let err = weave_compile(
            &rule_set,
            &[source],
            &importcfg_path,
            &NullLister,
            &[],
            Path::new("/hooks"),
            &temp_dir,
            &debug_dir,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, WeaveError::TypeNotFound { .. }));
    }

    #[test]
    fn raw_rule_with_unbalanced_fragment_raises_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("temp");
        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&debug_dir).unwrap();
        let importcfg_path = dir.path().join("importcfg");
        std::fs::write(&importcfg_path, "").unwrap();

        let mut rule_set = RuleSet::new("example.com/svc", "svc");
        rule_set.raw.push(otelweave_artifacts::RawRule {
            name: "bad-raw".into(),
            target: "example.com/svc".into(),
            path: "p".into(),
            func: "Handle".into(),
            raw: "if (x { doStuff()".into(),
        });
        let source = SourceFile {
            path: PathBuf::from("svc.go"),
            source: "package svc\n\nfunc Handle() {\n}\n".to_string(),
        };

        let err = weave_compile(
            &rule_set,
            &[source],
            &importcfg_path,
            &NullLister,
            &[],
            Path::new("/hooks"),
            &temp_dir,
            &debug_dir,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, WeaveError::SyntaxInRaw { .. }));
    }

    #[test]
    fn function_rule_synthesizes_names_for_unnamed_results() {
        let dir = tempfile::tempdir().unwrap();
        let temp_dir = dir.path().join("temp");
        let debug_dir = dir.path().join("debug");
        std::fs::create_dir_all(&temp_dir).unwrap();
        std::fs::create_dir_all(&debug_dir).unwrap();
        let importcfg_path = dir.path().join("importcfg");
        std::fs::write(&importcfg_path, "").unwrap();

        let mut rule_set = RuleSet::new("database/sql", "sql");
        rule_set.functions.push(FunctionRule {
            name: "database-sql-exec".into(),
            target: "database/sql".into(),
            path: "sqldriver".into(),
            func: "(*conn).ExecContext".into(),
            before: Some("BeforeExecContext".into()),
            after: Some("AfterExecContext".into()),
        });

        let source = SourceFile {
            path: PathBuf::from("conn.go"),
            source: "package sql\n\nfunc (c *conn) ExecContext(ctx context.Context, query string) (driver.Result, error) {\n\treturn nil, nil\n}\n".to_string(),
        };

        let output = weave_compile(
            &rule_set,
            &[source],
            &importcfg_path,
            &NullLister,
            &[],
            Path::new("/hooks"),
            &temp_dir,
            &debug_dir,
            &[],
        )
        .unwrap();
        let (_, new_path) = &output.rewritten[0];
        let contents = std::fs::read_to_string(new_path).unwrap();
        assert!(contents.contains("_res1 driver.Result"));
        assert!(contents.contains("_res2 error"));
        assert!(contents.contains("&_res1"));
        assert!(contents.contains("&_res2"));
    }

    #[test]
    fn unused_struct_rule_import_keeps_lister_untouched() {
        let _ = StructRule {
            name: "n".into(),
            target: "t".into(),
            path: "p".into(),
            struct_name: "T".into(),
            field_name: "X".into(),
            field_type: "int".into(),
        };
        let _ = SubprocessLister::new("go");
    }
}
