//! Rule catalog (spec.md §4.1, component C4): loads the embedded hook-source tree's YAML
//! rule documents, discriminates each into a [`Rule`] variant, and pre-compiles every
//! `CallRule` template so a malformed template fails here — at load time — rather than mid
//! weave. Continues the teacher's `Project::compile`-time "parse configuration once, fail
//! fast" posture (`crates/compilers/src/project.rs`).

use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use otelweave_artifacts::rule::{CallRule, FileRule, FunctionRule, RawRule, RawRuleDoc, Rule, StructRule};
use otelweave_ast::Template;
use otelweave_core::error::{Result, WeaveError};

/// The hook source tree shipped with the binary: rule YAML documents under `rules/`, and the
/// per-technology advice source trees the rules' `path` fields point into.
static HOOK_TREE: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../demos/hooks");

/// A loaded rule catalog: the discriminated rules plus their pre-compiled `CallRule`
/// templates (compilation happens once here; splicing reuses the compiled form).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub rules: Vec<Rule>,
    pub templates: Vec<Template>,
}

impl Catalog {
    /// Loads every rule under the embedded `rules/` directory, plus any extra rule file
    /// supplied via the `RULES` environment variable (spec.md §6), in sorted-name order
    /// (spec.md §4.3.1: "rules are visited in sorted-name order").
    pub fn load_all(extra_rules_file: Option<&Path>) -> Result<Self> {
        let mut docs = load_embedded_docs()?;
        if let Some(path) = extra_rules_file {
            docs.extend(load_extra_docs(path)?);
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut rules = Vec::with_capacity(docs.len());
        let mut templates = Vec::new();
        for doc in docs {
            let rule = discriminate(doc)?;
            if let Rule::Call(call) = &rule {
                templates.push(Template::compile(&call.name, &call.template)?);
            }
            rules.push(rule);
        }
        Ok(Self { rules, templates })
    }

    pub fn template_for(&self, rule_name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.rule_name() == rule_name)
    }

    /// Extracts the embedded hook tree to `dest` (spec.md §4.3 step 4): "extract the
    /// embedded hook-source archive into the scratch directory".
    pub fn extract_to(dest: &Path) -> Result<()> {
        extract_dir(&HOOK_TREE, dest)
    }
}

fn extract_dir(dir: &Dir<'_>, dest: &Path) -> Result<()> {
    otelweave_core::fs::ensure_dir(dest)?;
    for file in dir.files() {
        let target = dest.join(file.path());
        if let Some(parent) = target.parent() {
            otelweave_core::fs::ensure_dir(parent)?;
        }
        otelweave_core::fs::write_atomic(&target, file.contents())?;
    }
    for sub in dir.dirs() {
        extract_dir(sub, dest)?;
    }
    Ok(())
}

fn load_embedded_docs() -> Result<Vec<RawRuleDoc>> {
    let rules_dir = HOOK_TREE.get_dir("rules").ok_or_else(|| {
        WeaveError::SetupAbort("embedded hook tree has no `rules/` directory".to_string())
    })?;
    let mut docs = Vec::new();
    for file in rules_dir.files() {
        let text = file.contents_utf8().ok_or_else(|| {
            WeaveError::MalformedRule {
                name: file.path().display().to_string(),
                reason: "not valid UTF-8".to_string(),
            }
        })?;
        docs.push(parse_doc(file.path(), text)?);
    }
    Ok(docs)
}

fn load_extra_docs(path: &Path) -> Result<Vec<RawRuleDoc>> {
    let text = std::fs::read_to_string(path)?;
    // An extra rules file may contain a multi-document YAML stream.
    let mut docs = Vec::new();
    for doc_text in split_yaml_stream(&text) {
        if doc_text.trim().is_empty() {
            continue;
        }
        docs.push(parse_doc(path, &doc_text)?);
    }
    Ok(docs)
}

fn split_yaml_stream(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim_start() == "---" && !current.trim().is_empty() {
            out.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn parse_doc(path: &Path, text: &str) -> Result<RawRuleDoc> {
    serde_yaml::from_str(text).map_err(|err| WeaveError::MalformedRule {
        name: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Decides which [`Rule`] variant a document represents from its discriminator keys (spec.md
/// §4.1: "presence of discriminator keys `struct`, `file`, `raw`, `func`, `template`").
/// `raw` always implies `func` is present too (the function the raw statement prepends into),
/// so the two are treated as one discriminator group distinct from a bare `func` (which means
/// a FunctionRule).
fn discriminate(doc: RawRuleDoc) -> Result<Rule> {
    let is_struct = doc.struct_name.is_some();
    let is_file = doc.file.is_some();
    let is_raw = doc.raw.is_some();
    let is_call = doc.template.is_some();
    let is_function = doc.func.is_some() && doc.raw.is_none();

    let present = [is_struct, is_file, is_raw, is_call, is_function];
    let count = present.iter().filter(|&&b| b).count();
    if count != 1 {
        return Err(WeaveError::MalformedRule {
            name: doc.name.clone(),
            reason: format!("expected exactly one discriminator key, found {count}"),
        });
    }

    if is_struct {
        let field_name = doc.field_name.ok_or_else(|| missing(&doc.name, "field_name"))?;
        let field_type = doc.field_type.ok_or_else(|| missing(&doc.name, "field_type"))?;
        return Ok(Rule::Struct(StructRule {
            name: doc.name,
            target: doc.target,
            path: doc.path,
            struct_name: doc.struct_name.unwrap(),
            field_name,
            field_type,
        }));
    }
    if is_file {
        return Ok(Rule::File(FileRule {
            name: doc.name,
            target: doc.target,
            path: doc.path,
            file: doc.file.unwrap(),
        }));
    }
    if is_raw {
        let func = doc.func.ok_or_else(|| missing(&doc.name, "func"))?;
        return Ok(Rule::Raw(RawRule {
            name: doc.name,
            target: doc.target,
            path: doc.path,
            func,
            raw: doc.raw.unwrap(),
        }));
    }
    if is_call {
        let import_path = doc.import_path.ok_or_else(|| missing(&doc.name, "import_path"))?;
        let func_name = match doc.func_name {
            Some(f) => f,
            None => split_trailing_func(&import_path)
                .ok_or_else(|| missing(&doc.name, "func_name"))?
                .1,
        };
        let import_path = split_trailing_func(&import_path).map(|(p, _)| p).unwrap_or(import_path);
        return Ok(Rule::Call(CallRule {
            name: doc.name,
            target: doc.target,
            path: doc.path,
            import_path,
            func_name,
            template: doc.template.unwrap(),
            imports: doc.imports,
        }));
    }
    // is_function
    let func = doc.func.unwrap();
    if doc.before.is_none() && doc.after.is_none() {
        return Err(WeaveError::MalformedRule {
            name: doc.name,
            reason: "function rule needs at least one of `before`/`after`".to_string(),
        });
    }
    Ok(Rule::Function(FunctionRule {
        name: doc.name,
        target: doc.target,
        path: doc.path,
        func,
        before: doc.before,
        after: doc.after,
    }))
}

/// Splits `importPath.FuncName` on the last dot (spec.md §4.1), used only as a fallback when a
/// `CallRule` document supplies a single combined string instead of separate `import_path`/
/// `func_name` keys.
fn split_trailing_func(combined: &str) -> Option<(String, String)> {
    let dot = combined.rfind('.')?;
    Some((combined[..dot].to_string(), combined[dot + 1..].to_string()))
}

fn missing(rule_name: &str, field: &str) -> WeaveError {
    WeaveError::MalformedRule { name: rule_name.to_string(), reason: format!("missing `{field}`") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_catalog_in_sorted_order() {
        let catalog = Catalog::load_all(None).unwrap();
        assert!(!catalog.rules.is_empty());
        let names: Vec<&str> = catalog.rules.iter().map(|r| r.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn call_rule_templates_are_precompiled() {
        let catalog = Catalog::load_all(None).unwrap();
        let call = catalog.rules.iter().find(|r| matches!(r, Rule::Call(_))).unwrap();
        assert!(catalog.template_for(call.name()).is_some());
    }

    #[test]
    fn rejects_document_with_no_discriminator() {
        let doc = RawRuleDoc { name: "bad".into(), target: "x".into(), ..Default::default() };
        let err = discriminate(doc).unwrap_err();
        assert!(matches!(err, WeaveError::MalformedRule { .. }));
    }

    #[test]
    fn rejects_document_with_multiple_discriminators() {
        let doc = RawRuleDoc {
            name: "bad".into(),
            target: "x".into(),
            func: Some("F".into()),
            before: Some("B".into()),
            file: Some("f.go".into()),
            ..Default::default()
        };
        let err = discriminate(doc).unwrap_err();
        assert!(matches!(err, WeaveError::MalformedRule { .. }));
    }

    #[test]
    fn function_rule_requires_advice() {
        let doc = RawRuleDoc {
            name: "bad".into(),
            target: "x".into(),
            func: Some("F".into()),
            ..Default::default()
        };
        let err = discriminate(doc).unwrap_err();
        assert!(matches!(err, WeaveError::MalformedRule { .. }));
    }
}
