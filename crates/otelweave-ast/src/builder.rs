//! Small text builders for the snippets of Go source the weaver splices in. Kept as plain
//! string formatting rather than a real node tree — spec.md §4.9 only asks the facade to
//! "build the handful of node shapes the weaver needs", not a general code generator. Used by
//! both the trampoline generator (`otelweave-weave`'s jump-statement/accessor construction)
//! and [`crate::file::FuncDecl::synthesize_names_edits`].

use crate::file::Param;

pub fn pointer_of(expr: &str) -> String {
    format!("&{expr}")
}

/// Builds the comma-separated address-of argument list used for a trampoline jump line:
/// `&result, &arg1, &arg2, ...` (spec.md §4.6.3: "Before takes pointers so the hook can
/// observe or rewrite in place").
pub fn pointer_arg_list(params: &[Param]) -> Vec<String> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| pointer_of(&p.effective_name(i + 1)))
        .collect()
}

/// Renders a parameter list back to Go source, e.g. `w ResponseWriter, r *Request`, used when
/// the weaver has to synthesize a new function (the dispatch wrapper for method-set hooks).
pub fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} {}", p.effective_name(i + 1), p.ty.source()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeExpr;

    #[test]
    fn builds_pointer_of() {
        assert_eq!(pointer_of("x"), "&x");
    }

    #[test]
    fn pointer_arg_list_synthesizes_names_for_unnamed_results() {
        let params = vec![Param { name: None, ty: TypeExpr::parse("error") }];
        assert_eq!(pointer_arg_list(&params), vec!["&_res1".to_string()]);
    }

    #[test]
    fn render_params_keeps_named_and_synthesizes_unnamed() {
        let params = vec![
            Param { name: Some("ctx".to_string()), ty: TypeExpr::parse("context.Context") },
            Param { name: None, ty: TypeExpr::parse("error") },
        ];
        assert_eq!(render_params(&params), "ctx context.Context, _res2 error");
    }
}
