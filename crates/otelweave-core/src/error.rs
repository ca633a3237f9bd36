use std::path::PathBuf;

/// Kind of malformed template, mirrors the template engine's compile-time checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TemplateErrorKind {
    #[error("template body is empty")]
    EmptyBody,
    #[error("template body has more than one statement")]
    MultipleStatements,
    #[error("template body is not a single expression")]
    NotAnExpression,
    #[error("template is missing the `{{ . }}` placeholder")]
    PlaceholderMissing,
}

/// Error taxonomy for the weaver. Recovery policy is attached via [`WeaveError::is_fatal`]
/// rather than encoded in the type: the same kind of error (e.g. a malformed rule) is fatal
/// at setup time but would be a mere skip if it turned up mid-weave for an unrelated rule.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    #[error("setup aborted: {0}")]
    SetupAbort(String),

    #[error("rule `{rule}` has no matching pointcut in {target}: {reason}")]
    MatchFailure { rule: String, target: String, reason: String },

    #[error("failed to weave {file}: {reason}")]
    WeaveFailure { file: PathBuf, reason: String },

    #[error(
        "import alias conflict in {file}: `{path}` is already imported as `{existing}`, rule `{rule}` wants `{wanted}`"
    )]
    AliasConflict { file: PathBuf, path: String, existing: String, wanted: String, rule: String },

    #[error("dot-import conflict in {file} for `{path}` (rule `{rule}`)")]
    DotImportConflict { file: PathBuf, path: String, rule: String },

    #[error("`{import_path}` has no export archive: {reason}")]
    ArchiveResolution { import_path: String, reason: String },

    #[error("`{import_path}` is a pseudo-package and cannot be exported")]
    PackageNotExported { import_path: String },

    #[error("template error in rule `{rule}`: {kind}")]
    TemplateError { rule: String, kind: TemplateErrorKind },

    #[error("malformed rule `{name}`: {reason}")]
    MalformedRule { name: String, reason: String },

    #[error("rule `{rule}` targets struct `{struct_name}` but {target} has no such type")]
    TypeNotFound { rule: String, struct_name: String, target: String },

    #[error("rule `{rule}`'s raw fragment is not valid Go syntax: {reason}")]
    SyntaxInRaw { rule: String, reason: String },

    #[error("build cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml_error::Error),
}

/// Thin newtype so `otelweave-core` doesn't need a direct dependency on `serde_yaml` just to
/// forward its error type through `#[from]`.
pub mod serde_yaml_error {
    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    pub struct Error(pub String);
}

impl WeaveError {
    pub fn msg(msg: impl std::fmt::Display) -> Self {
        Self::Message(msg.to_string())
    }

    /// Recovery policy per spec: most rewrite/config errors are fatal for the current
    /// compile or setup; rule-matching and sidecar-tracker issues are local and recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MatchFailure { .. })
    }
}

pub type Result<T, E = WeaveError> = std::result::Result<T, E>;
