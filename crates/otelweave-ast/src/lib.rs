//! Position-preserving parse/format facade over the narrow slice of Go syntax the weaver
//! touches (package clause, imports, function and struct declarations, call expressions),
//! plus the call-site template engine. There is no general Go parser here: every module
//! extracts exactly the structured facts the weaver needs and leaves everything else as
//! opaque source text, so a rewrite can never silently reformat code it didn't touch.

pub mod builder;
pub mod calls;
pub mod file;
pub mod lexer;
pub mod template;
pub mod types;

pub use calls::{scan_calls, CallSite};
pub use file::{default_package_ident, Edit, FuncDecl, GoFile, ImportAlias, ImportSpec, Param, StructDecl};
pub use lexer::{brackets_balanced, tokenize};
pub use template::Template;
pub use types::TypeExpr;

/// Whether `fragment` (e.g. a raw-rule body) is syntactically well-bracketed enough to splice
/// into a function body: every paren/brace/bracket closes, in the right order.
pub fn is_valid_statement_fragment(fragment: &str) -> bool {
    brackets_balanced(&tokenize(fragment))
}

/// The marker a woven function's body carries once a trampoline jump has been spliced in,
/// used both to generate the jump line and to detect that a file is already woven (spec.md
/// §8: "idempotent — re-running weave on an already-woven file is a no-op").
pub fn weave_marker(func_name: &str) -> String {
    format!("__otelweave_hook_{func_name}")
}
