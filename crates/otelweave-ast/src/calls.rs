//! Call-expression scanner for `CallRule` matching (spec.md §4.6.6): finds `alias.Func(args)`
//! call sites so the weaver can decide, using the file's own import table, whether `alias`
//! actually resolves to the rule's target import path before splicing a replacement.

use crate::lexer::{match_parens, tokenize, TokenKind};

/// A single `alias.Func(...)` call site found in a source range.
#[derive(Debug, Clone)]
pub struct CallSite {
    pub alias: String,
    pub func_name: String,
    /// Byte range of the whole expression, `alias.Func(args)` inclusive.
    pub span: (usize, usize),
    /// Byte range of the argument list's contents, excluding the parens.
    pub args_span: (usize, usize),
    /// Top-level-comma-split argument source texts.
    pub args: Vec<String>,
}

/// Scans `source` (or any substring of it, as long as `base_offset` is added back to every
/// returned span) for call sites shaped like `ident.ident(...)`.
pub fn scan_calls(source: &str, base_offset: usize) -> Vec<CallSite> {
    let tokens = tokenize(source);
    let mut out = Vec::new();
    let mut i = 0;
    while i + 3 < tokens.len() {
        let is_pattern = tokens[i].kind == TokenKind::Ident
            && tokens[i + 1].is_punct(".")
            && tokens[i + 2].kind == TokenKind::Ident
            && tokens[i + 3].is_punct("(");
        if is_pattern {
            if let Some(close) = match_parens(&tokens, i + 3) {
                let args_text = &source[tokens[i + 3].end..tokens[close].start];
                out.push(CallSite {
                    alias: tokens[i].text.to_string(),
                    func_name: tokens[i + 2].text.to_string(),
                    span: (base_offset + tokens[i].start, base_offset + tokens[close].end),
                    args_span: (base_offset + tokens[i + 3].end, base_offset + tokens[close].start),
                    args: split_top_level_commas(args_text),
                });
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

fn split_top_level_commas(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut depth = 0i32;
    let mut out = Vec::new();
    let mut last = 0usize;
    for t in &tokens {
        match t.text {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth -= 1,
            "," if depth == 0 => {
                out.push(text[last..t.start].trim().to_string());
                last = t.end;
            }
            _ => {}
        }
    }
    let tail = text[last..].trim();
    if !tail.is_empty() || !out.is_empty() {
        out.push(tail.to_string());
    }
    out
}
