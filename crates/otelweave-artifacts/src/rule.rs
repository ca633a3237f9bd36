//! The rule data model (spec.md §3, "Rule").
//!
//! Rules are polymorphic and keyed by name. [`RawRuleDoc`] is the literal shape of one
//! embedded YAML document (every field optional, since which fields are present is exactly
//! what decides the variant); [`Rule`] is the validated, discriminated form the rest of the
//! crate works with. The split mirrors how the teacher keeps a loosely-typed wire shape
//! (`SolcVersionedInput`) separate from the strongly-typed in-memory model it's converted
//! into once validated.

use serde::{Deserialize, Serialize};

/// One YAML document under the embedded rule tree, before discriminator validation.
/// Every field is optional; [`crate::rule::Rule::from_doc`] (implemented by the loader in
/// `otelweave-weave`, which alone knows the discriminator policy) decides the variant from
/// which of `struct_field`/`file`/`raw`/`func`/`template` is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRuleDoc {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub path: String,

    // FunctionRule / RawRule
    pub func: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub raw: Option<String>,

    // StructRule
    #[serde(rename = "struct")]
    pub struct_name: Option<String>,
    pub field_name: Option<String>,
    pub field_type: Option<String>,

    // FileRule
    pub file: Option<String>,

    // CallRule
    pub import_path: Option<String>,
    pub func_name: Option<String>,
    pub template: Option<String>,
    #[serde(default)]
    pub imports: Vec<ImportAddition>,
}

/// An alias -> import path addition a [`CallRule`] or [`FileRule`] wants merged into a file's
/// imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportAddition {
    pub alias: Option<String>,
    pub path: String,
}

/// A function-hook rule: wrap `func` with Before/After advice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRule {
    pub name: String,
    pub target: String,
    pub path: String,
    /// Function name, optionally written as `(*Receiver).Method`.
    pub func: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FunctionRule {
    /// Splits `func` into an optional receiver type and the bare method/function name, e.g.
    /// `(*serverHandler).ServeHTTP` -> `(Some("*serverHandler"), "ServeHTTP")`.
    pub fn receiver_and_name(&self) -> (Option<&str>, &str) {
        if let Some(dot) = self.func.rfind(')') {
            if let Some(open) = self.func.find('(') {
                if open == 0 {
                    let receiver = &self.func[open + 1..dot];
                    let rest = self.func[dot + 1..].trim_start_matches('.');
                    return (Some(receiver), rest);
                }
            }
        }
        (None, self.func.as_str())
    }
}

/// A struct-field-injection rule: append a field to a struct type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructRule {
    pub name: String,
    pub target: String,
    pub path: String,
    pub struct_name: String,
    pub field_name: String,
    pub field_type: String,
}

/// A raw-statement rule: prepend a source fragment inside a function body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    pub name: String,
    pub target: String,
    pub path: String,
    pub func: String,
    pub raw: String,
}

/// A file-inject rule: copy an entire file from the hook tree into the target package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRule {
    pub name: String,
    pub target: String,
    pub path: String,
    pub file: String,
}

/// A call-site-template rule: rewrite call expressions to `importPath.funcName` using a
/// source template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRule {
    pub name: String,
    pub target: String,
    pub path: String,
    pub import_path: String,
    pub func_name: String,
    pub template: String,
    pub imports: Vec<ImportAddition>,
}

/// The validated, discriminated rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Rule {
    Function(FunctionRule),
    Struct(StructRule),
    Raw(RawRule),
    File(FileRule),
    Call(CallRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Self::Function(r) => &r.name,
            Self::Struct(r) => &r.name,
            Self::Raw(r) => &r.name,
            Self::File(r) => &r.name,
            Self::Call(r) => &r.name,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Function(r) => &r.target,
            Self::Struct(r) => &r.target,
            Self::Raw(r) => &r.target,
            Self::File(r) => &r.target,
            Self::Call(r) => &r.target,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Function(r) => &r.path,
            Self::Struct(r) => &r.path,
            Self::Raw(r) => &r.path,
            Self::File(r) => &r.path,
            Self::Call(r) => &r.path,
        }
    }
}
