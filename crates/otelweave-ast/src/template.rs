//! The call-site template engine (spec.md §4.9, component C5): a `CallRule`'s `template`
//! field is a Go expression containing the literal placeholder `{{ . }}`, which is replaced
//! with the original call expression's cloned source at splice time. `compile` validates the
//! template once, at rule-load time, so a malformed rule fails before any file is touched.

use otelweave_core::error::{Result, TemplateErrorKind, WeaveError};

use crate::lexer::{tokenize, TokenKind};

pub const PLACEHOLDER: &str = "{{ . }}";

const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "for", "return", "var", "const", "type", "go", "defer", "switch", "select", "func",
    "import", "package", "break", "continue", "goto", "fallthrough",
];

#[derive(Debug, Clone)]
pub struct Template {
    rule: String,
    source: String,
}

impl Template {
    /// Validates and compiles a rule's template text. Errors are attributed to `rule` so the
    /// router/setup phase can surface which rule in the catalog is malformed.
    pub fn compile(rule: &str, raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(template_err(rule, TemplateErrorKind::EmptyBody));
        }
        if !trimmed.contains(PLACEHOLDER) {
            return Err(template_err(rule, TemplateErrorKind::PlaceholderMissing));
        }

        let stand_in = trimmed.replace(PLACEHOLDER, "__otelweave_call__");
        let tokens = tokenize(&stand_in);
        let first_ident = tokens.iter().find(|t| !t.is_trivia());
        if let Some(t) = first_ident {
            if t.kind == TokenKind::Ident && STATEMENT_KEYWORDS.contains(&t.text) {
                return Err(template_err(rule, TemplateErrorKind::NotAnExpression));
            }
        }
        if has_top_level_assignment(&tokens) {
            return Err(template_err(rule, TemplateErrorKind::NotAnExpression));
        }
        if count_top_level_segments(&tokens) > 1 {
            return Err(template_err(rule, TemplateErrorKind::MultipleStatements));
        }

        Ok(Self { rule: rule.to_string(), source: trimmed.to_string() })
    }

    pub fn rule_name(&self) -> &str {
        &self.rule
    }

    /// Replaces the placeholder with `original_call_source` (typically obtained from
    /// [`crate::file::GoFile::clone_span`] over the matched call site) and returns the
    /// resulting expression source.
    pub fn splice(&self, original_call_source: &str) -> String {
        self.source.replace(PLACEHOLDER, original_call_source)
    }
}

fn template_err(rule: &str, kind: TemplateErrorKind) -> WeaveError {
    WeaveError::TemplateError { rule: rule.to_string(), kind }
}

fn has_top_level_assignment(tokens: &[crate::lexer::Token<'_>]) -> bool {
    let mut depth = 0i32;
    for t in tokens {
        match t.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth -= 1,
            "=" | ":=" if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

fn count_top_level_segments(tokens: &[crate::lexer::Token<'_>]) -> usize {
    let mut depth = 0i32;
    let mut seen_since_boundary = false;
    let mut segments = 0usize;
    for t in tokens {
        match t.text {
            "(" | "[" | "{" => {
                depth += 1;
                seen_since_boundary = true;
            }
            ")" | "]" | "}" => {
                depth -= 1;
                seen_since_boundary = true;
            }
            ";" if depth == 0 => {
                if seen_since_boundary {
                    segments += 1;
                }
                seen_since_boundary = false;
            }
            _ => {
                if t.kind == TokenKind::Newline {
                    if depth == 0 && seen_since_boundary {
                        segments += 1;
                        seen_since_boundary = false;
                    }
                } else if !t.is_trivia() {
                    seen_since_boundary = true;
                }
            }
        }
    }
    if seen_since_boundary {
        segments += 1;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_splices_wrapping_call() {
        let t = Template::compile("wrap-client", "instrumented.Wrap({{ . }})").unwrap();
        assert_eq!(t.splice("http.DefaultClient.Do(req)"), "instrumented.Wrap(http.DefaultClient.Do(req))");
    }

    #[test]
    fn rejects_missing_placeholder() {
        let err = Template::compile("r", "instrumented.Wrap(x)").unwrap_err();
        assert!(matches!(
            err,
            WeaveError::TemplateError { kind: TemplateErrorKind::PlaceholderMissing, .. }
        ));
    }

    #[test]
    fn rejects_empty_body() {
        let err = Template::compile("r", "   ").unwrap_err();
        assert!(matches!(err, WeaveError::TemplateError { kind: TemplateErrorKind::EmptyBody, .. }));
    }

    #[test]
    fn rejects_statement_keyword() {
        let err = Template::compile("r", "return {{ . }}").unwrap_err();
        assert!(matches!(
            err,
            WeaveError::TemplateError { kind: TemplateErrorKind::NotAnExpression, .. }
        ));
    }

    #[test]
    fn rejects_assignment() {
        let err = Template::compile("r", "x := {{ . }}").unwrap_err();
        assert!(matches!(
            err,
            WeaveError::TemplateError { kind: TemplateErrorKind::NotAnExpression, .. }
        ));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = Template::compile("r", "a()\n{{ . }}").unwrap_err();
        assert!(matches!(
            err,
            WeaveError::TemplateError { kind: TemplateErrorKind::MultipleStatements, .. }
        ));
    }

    #[test]
    fn allows_multiline_single_expression() {
        let t = Template::compile(
            "r",
            "instrumented.Wrap(\n\t{{ . }},\n\t\"label\",\n)",
        )
        .unwrap();
        assert!(t.splice("f()").contains("f()"));
    }
}
