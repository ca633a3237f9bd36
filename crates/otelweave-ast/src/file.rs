//! The AST facade itself (spec.md §4.9, component C1): parse a Go source file far enough to
//! locate functions, structs, imports and call expressions, and rewrite it by byte-range
//! edits that leave every untouched byte identical to the input. No caller outside this
//! crate touches [`crate::lexer`] tokens directly.

use crate::lexer::{match_braces, match_parens, tokenize, Token, TokenKind};
use crate::types::TypeExpr;
use otelweave_core::error::{Result, WeaveError};
use std::path::{Path, PathBuf};

/// A single parameter, result, or receiver: `name Type`, or just `Type` for unnamed results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

impl Param {
    /// The identifier this parameter is addressed by in generated code: its own name if
    /// named, otherwise a synthetic `_resN` (spec.md §4.6.3/§8: "unnamed result list —
    /// trampoline generation introduces synthetic names before pointer-taking").
    pub fn effective_name(&self, synthetic_index: usize) -> String {
        self.name.clone().unwrap_or_else(|| format!("_res{synthetic_index}"))
    }
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    /// Byte range of the parameter list's inner text, excluding the enclosing parens.
    pub params_span: (usize, usize),
    /// Byte range of the result list's text, if any: a parenthesized list's inner text
    /// (excluding the parens), or a single unparenthesized result type's own span. `None`
    /// when the function returns nothing.
    pub results_span: Option<(usize, usize)>,
    /// Byte range of the whole declaration, `func ... { ... }` inclusive.
    pub span: (usize, usize),
    /// Byte range of the body's contents, excluding the enclosing `{` `}`.
    pub body_span: (usize, usize),
}

impl FuncDecl {
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.ty.is_variadic())
    }

    /// Edits that give every unnamed parameter and result a synthetic `_resN` name (spec.md
    /// §4.6.3: "unnamed result list — trampoline generation introduces synthetic names before
    /// pointer-taking"), so a generated jump statement's `&name` expressions always address a
    /// real identifier. A list where every entry is already named produces no edit.
    pub fn synthesize_names_edits(&self) -> Vec<Edit> {
        let mut edits = Vec::new();
        if self.params.iter().any(|p| p.name.is_none()) {
            edits.push(Edit::replace(self.params_span, crate::builder::render_params(&self.params)));
        }
        if let Some(span) = self.results_span {
            if self.results.iter().any(|r| r.name.is_none()) {
                edits.push(Edit::replace(span, crate::builder::render_params(&self.results)));
            }
        }
        edits
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    /// Byte range of the whole `type Name struct { ... }` declaration.
    pub span: (usize, usize),
    /// Byte range of the field-list contents, excluding `{` `}`.
    pub body_span: (usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportAlias {
    /// No alias: the import is referenced by its last path component.
    None,
    /// `_ "path"` — side-effect only.
    Blank,
    /// `. "path"` — dot import.
    Dot,
    /// `alias "path"`.
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub alias: ImportAlias,
    pub path: String,
    /// Byte range of this one import spec line (for mutation-avoidance checks only; the
    /// weaver appends new imports rather than editing existing ones).
    pub span: (usize, usize),
}

impl ImportSpec {
    /// The identifier this import is referenced by at call sites: the alias if named, else
    /// the last path component. Handles the common hosted-path and version-suffix shapes
    /// (`gopkg.in/yaml.v2` -> `yaml`, `.../v2` module suffixes) per spec.md §4.6.6 / §9.
    pub fn reference_name(&self) -> Option<String> {
        match &self.alias {
            ImportAlias::Blank | ImportAlias::Dot => None,
            ImportAlias::Named(alias) => Some(alias.clone()),
            ImportAlias::None => Some(default_package_ident(&self.path)),
        }
    }
}

/// Derives the identifier a package is referenced by when it has no explicit import alias,
/// applying the two heuristics spec.md calls out: major-version module suffixes (`/v2`,
/// `/v10`, ...) are skipped, and `gopkg.in/pkg.vN` style paths use the part before `.vN`.
pub fn default_package_ident(import_path: &str) -> String {
    let mut segments: Vec<&str> = import_path.split('/').collect();
    let mut last = *segments.last().unwrap_or(&import_path);

    // example.com/lib/v2 -> the "/vN" path segment doesn't count, fall back to "lib".
    if is_major_version_segment(last) && segments.len() > 1 {
        segments.pop();
        last = *segments.last().unwrap_or(&last);
    }

    // gopkg.in/yaml.v2 -> "yaml.v2" as the last segment; strip the ".vN" suffix.
    if let Some(dot) = last.rfind(".v") {
        let (head, tail) = last.split_at(dot + 2);
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
            return head.split_at(dot).0.to_string();
        }
    }
    last.to_string()
}

fn is_major_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// An edit to apply to a [`GoFile`]'s source: replace the byte range `[start, end)` with
/// `replacement`. Edits must be non-overlapping; [`GoFile::apply_edits`] sorts and applies
/// them in one pass so untouched bytes are copied unchanged — this is the "rewrite in place
/// with position-preserving decorations" operation from spec.md §4.9.
#[derive(Debug, Clone)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self { start: at, end: at, replacement: text.into() }
    }

    pub fn replace(range: (usize, usize), text: impl Into<String>) -> Self {
        Self { start: range.0, end: range.1, replacement: text.into() }
    }
}

#[derive(Debug, Clone)]
pub struct GoFile {
    pub path: PathBuf,
    pub source: String,
    pub package_name: String,
    pub imports: Vec<ImportSpec>,
    pub funcs: Vec<FuncDecl>,
    pub structs: Vec<StructDecl>,
}

impl GoFile {
    /// Parses `source`. Never errors on constructs outside the supported subset; unsupported
    /// top-level items are simply not captured as funcs/structs/imports, which mirrors
    /// `ParsedSource::parse`'s "extract what we can, regex-fallback for the rest" posture in
    /// the teacher (`resolver/parse.rs`).
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let source = source.into();
        let tokens = tokenize(&source);
        let package_name = parse_package_clause(&path, &source, &tokens)?;
        let imports = parse_imports(&source, &tokens);
        let funcs = parse_funcs(&source, &tokens);
        let structs = parse_structs(&source, &tokens);
        Ok(Self { path, source, package_name, imports, funcs, structs })
    }

    pub fn find_func(&self, name: &str, receiver: Option<&str>) -> Option<&FuncDecl> {
        self.funcs.iter().find(|f| {
            f.name == name
                && match receiver {
                    None => true,
                    Some(want) => f
                        .receiver
                        .as_ref()
                        .map(|r| receiver_matches(&r.ty.source(), want))
                        .unwrap_or(false),
                }
        })
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructDecl> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn list_funcs(&self) -> &[FuncDecl] {
        &self.funcs
    }

    /// Returns a clone of the source text spanning `range`. Used by the template engine to
    /// clone a call-site expression before splicing it into a rule's template (spec.md §4.5:
    /// "cloned to avoid decoration aliasing").
    pub fn clone_span(&self, range: (usize, usize)) -> String {
        self.source[range.0..range.1].to_string()
    }

    /// Applies a batch of non-overlapping edits and returns the new source. Edits may be
    /// given in any order.
    pub fn apply_edits(&self, mut edits: Vec<Edit>) -> Result<String> {
        edits.sort_by_key(|e| e.start);
        for pair in edits.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(WeaveError::WeaveFailure {
                    file: self.path.clone(),
                    reason: "overlapping edits".to_string(),
                });
            }
        }
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in &edits {
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.replacement);
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..]);
        Ok(out)
    }

    /// Whether this file already carries the trampoline-jump marker for `func_name` —
    /// the idempotence check from spec.md §8 ("rules detect their own footprint via
    /// hook-function presence").
    pub fn already_woven(&self, func_name: &str) -> bool {
        self.source.contains(&crate::weave_marker(func_name))
    }
}

fn receiver_matches(actual: &str, wanted: &str) -> bool {
    actual.trim_start_matches('*') == wanted.trim_start_matches('*')
}

fn parse_package_clause(path: &Path, source: &str, tokens: &[Token<'_>]) -> Result<String> {
    let mut iter = tokens.iter().filter(|t| !t.is_trivia());
    match iter.next() {
        Some(t) if t.is_ident("package") => {}
        _ => {
            return Err(WeaveError::WeaveFailure {
                file: path.to_path_buf(),
                reason: "missing package clause".to_string(),
            })
        }
    }
    match iter.next() {
        Some(t) if t.kind == TokenKind::Ident => Ok(t.text.to_string()),
        _ => Err(WeaveError::WeaveFailure {
            file: path.to_path_buf(),
            reason: format!("malformed package clause in {}", &source[..source.len().min(40)]),
        }),
    }
}

fn non_trivia<'a>(tokens: &'a [Token<'a>]) -> Vec<&'a Token<'a>> {
    tokens.iter().filter(|t| !t.is_trivia()).collect()
}

fn parse_imports(source: &str, tokens: &[Token<'_>]) -> Vec<ImportSpec> {
    let mut specs = Vec::new();
    let nt = non_trivia(tokens);
    let mut i = 0;
    while i < nt.len() {
        if nt[i].is_ident("import") {
            if i + 1 < nt.len() && nt[i + 1].is_punct("(") {
                let open = nt[i + 1].start;
                let close = find_matching_paren_by_offset(source, open);
                if let Some(close) = close {
                    parse_import_specs_in_range(source, open + 1, close, &mut specs);
                }
            } else if i + 1 < nt.len() {
                parse_one_import_spec(source, nt[i + 1..].iter().copied(), &mut specs);
            }
        }
        i += 1;
    }
    specs
}

fn find_matching_paren_by_offset(source: &str, open_offset: usize) -> Option<usize> {
    let tokens = tokenize(&source[open_offset..]);
    let idx = tokens.iter().position(|t| t.is_punct("("))?;
    let close_idx = match_parens(&tokens, idx)?;
    Some(open_offset + tokens[close_idx].start)
}

fn parse_import_specs_in_range(source: &str, start: usize, end: usize, out: &mut Vec<ImportSpec>) {
    let body = &source[start..end];
    for line in body.lines() {
        let line_start_in_body = body_line_offset(body, line);
        let abs_start = start + line_start_in_body;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if let Some(spec) = parse_import_line(trimmed, abs_start, abs_start + line.len()) {
            out.push(spec);
        }
    }
}

fn body_line_offset(body: &str, line: &str) -> usize {
    // Safe because `line` is a substring slice produced by `body.lines()`.
    (line.as_ptr() as usize).saturating_sub(body.as_ptr() as usize)
}

fn parse_one_import_spec<'a>(
    source: &str,
    mut toks: impl Iterator<Item = &'a Token<'a>>,
    out: &mut Vec<ImportSpec>,
) {
    if let Some(first) = toks.next() {
        let line_end = source[first.start..].find('\n').map(|n| first.start + n).unwrap_or(source.len());
        let line = source[first.start..line_end].trim();
        if let Some(spec) = parse_import_line(line, first.start, line_end) {
            out.push(spec);
        }
    }
}

fn parse_import_line(line: &str, start: usize, end: usize) -> Option<ImportSpec> {
    let line_tokens = tokenize(line);
    let toks: Vec<_> = non_trivia(&line_tokens);
    let (alias_tok, path_tok) = match toks.as_slice() {
        [path] if path.kind == TokenKind::String => (None, path),
        [alias, path] if path.kind == TokenKind::String => (Some(*alias), path),
        _ => return None,
    };
    let path = unquote(path_tok.text);
    let alias = match alias_tok {
        None => ImportAlias::None,
        Some(t) if t.is_punct("_") || t.text == "_" => ImportAlias::Blank,
        Some(t) if t.is_punct(".") || t.text == "." => ImportAlias::Dot,
        Some(t) => ImportAlias::Named(t.text.to_string()),
    };
    Some(ImportSpec { alias, path, span: (start, end) })
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}

fn parse_funcs(source: &str, tokens: &[Token<'_>]) -> Vec<FuncDecl> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_ident("func") {
            if let Some((decl, next)) = parse_one_func(source, tokens, i) {
                out.push(decl);
                i = next;
                continue;
            }
        }
        i += 1;
    }
    out
}

fn parse_one_func(source: &str, tokens: &[Token<'_>], func_idx: usize) -> Option<(FuncDecl, usize)> {
    let mut idx = func_idx + 1;
    idx = skip_trivia(tokens, idx);

    let mut receiver = None;
    if tokens.get(idx)?.is_punct("(") {
        // Could be a receiver `(h *T)` ahead of the name, or — never for a func decl at
        // top level — this branch is only reachable for receivers since a bare function
        // name is always an identifier, not `(`.
        let close = match_parens(tokens, idx)?;
        let inner_start = tokens[idx].end;
        let inner_end = tokens[close].start;
        receiver = parse_receiver(&source[inner_start..inner_end]);
        idx = skip_trivia(tokens, close + 1);
    }

    let name_tok = tokens.get(idx)?;
    if name_tok.kind != TokenKind::Ident {
        return None;
    }
    let name = name_tok.text.to_string();
    idx = skip_trivia(tokens, idx + 1);

    // Skip a generic type-parameter list `[T any]` if present.
    if tokens.get(idx)?.is_punct("[") {
        idx = skip_matching(tokens, idx, "[", "]")?;
        idx = skip_trivia(tokens, idx);
    }

    if !tokens.get(idx)?.is_punct("(") {
        return None;
    }
    let params_open = idx;
    let params_close = match_parens(tokens, params_open)?;
    let params_span = (tokens[params_open].end, tokens[params_close].start);
    let params_text = &source[params_span.0..params_span.1];
    let params = parse_field_list(params_text, true);
    idx = skip_trivia(tokens, params_close + 1);

    let mut results = Vec::new();
    let mut results_span = None;
    if let Some(tok) = tokens.get(idx) {
        if tok.is_punct("(") {
            let close = match_parens(tokens, idx)?;
            let span = (tokens[idx].end, tokens[close].start);
            let text = &source[span.0..span.1];
            results = parse_field_list(text, false);
            if !results.is_empty() {
                results_span = Some(span);
            }
            idx = skip_trivia(tokens, close + 1);
        } else if !tok.is_punct("{") && !tok.is_punct(";") {
            // A single unparenthesized result type, e.g. `func F(x int) error {`.
            let result_start = tok.start;
            let brace_idx = find_next_punct(tokens, idx, "{")?;
            let result_text = source[result_start..tokens[brace_idx].start].trim_end();
            if !result_text.is_empty() {
                results.push(Param { name: None, ty: TypeExpr::parse(result_text.trim_start()) });
                let leading_ws = result_text.len() - result_text.trim_start().len();
                results_span = Some((result_start + leading_ws, result_start + result_text.len()));
            }
            idx = brace_idx;
        }
    }

    let body_open = find_next_punct(tokens, idx, "{")?;
    let body_close = match_braces(tokens, body_open)?;
    let span = (tokens[func_idx].start, tokens[body_close].end);
    let body_span = (tokens[body_open].end, tokens[body_close].start);

    Some((
        FuncDecl { name, receiver, params, results, params_span, results_span, span, body_span },
        body_close + 1,
    ))
}

fn skip_trivia(tokens: &[Token<'_>], mut idx: usize) -> usize {
    while tokens.get(idx).map(|t| t.is_trivia()).unwrap_or(false) {
        idx += 1;
    }
    idx
}

fn skip_matching(tokens: &[Token<'_>], open_idx: usize, open: &str, close: &str) -> Option<usize> {
    debug_assert!(tokens[open_idx].is_punct(open));
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate().skip(open_idx) {
        if t.is_punct(open) {
            depth += 1;
        } else if t.is_punct(close) {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
    }
    None
}

fn find_next_punct(tokens: &[Token<'_>], from: usize, punct: &str) -> Option<usize> {
    tokens[from..].iter().position(|t| t.is_punct(punct)).map(|p| from + p)
}

fn parse_receiver(text: &str) -> Option<Param> {
    let text_tokens = tokenize(text);
    let toks = non_trivia(&text_tokens);
    if toks.is_empty() {
        return None;
    }
    if toks.len() == 1 {
        return Some(Param { name: None, ty: TypeExpr::parse(toks[0].text) });
    }
    let name = toks[0].text.to_string();
    let rest = text[toks[1].start..].trim();
    Some(Param { name: Some(name), ty: TypeExpr::parse(rest) })
}

/// Parses a parameter or result list's inner text (without the enclosing parens) into
/// [`Param`]s, resolving Go's "shared type across a comma run" grouping. See the module-level
/// note in `file.rs` tests for the documented heuristic this relies on: a group carries its
/// own name only when its first token is an identifier immediately followed by whitespace
/// before the next token (gofmt always inserts that space; a qualified type name like
/// `pkg.Type` never has one before the dot).
fn parse_field_list(text: &str, _is_params: bool) -> Vec<Param> {
    let groups = split_top_level_commas(text);
    if groups.iter().all(|g| g.trim().is_empty()) {
        return Vec::new();
    }

    enum Slot {
        PendingName(String),
        Resolved(Option<String>, String),
    }

    let mut slots = Vec::new();
    for g in &groups {
        let trimmed = g.trim();
        if trimmed.is_empty() {
            continue;
        }
        let trimmed_tokens = tokenize(trimmed);
        let toks = non_trivia(&trimmed_tokens);
        if toks.is_empty() {
            continue;
        }
        if toks.len() == 1 && toks[0].kind == TokenKind::Ident {
            slots.push(Slot::PendingName(toks[0].text.to_string()));
            continue;
        }
        if toks[0].kind == TokenKind::Ident {
            let gap = toks[1].start > toks[0].end;
            if gap {
                let ty_text = trimmed[toks[1].start..].trim().to_string();
                slots.push(Slot::Resolved(Some(toks[0].text.to_string()), ty_text));
                continue;
            }
        }
        slots.push(Slot::Resolved(None, trimmed.to_string()));
    }

    // Forward pass: propagate a resolved type backward onto any run of pending names that
    // precedes it.
    let mut params = vec![None; slots.len()];
    let mut pending_run: Vec<usize> = Vec::new();
    for (i, slot) in slots.iter().enumerate() {
        match slot {
            Slot::PendingName(name) => {
                pending_run.push(i);
                params[i] = Some(Param { name: Some(name.clone()), ty: TypeExpr::Raw(String::new()) });
            }
            Slot::Resolved(name, ty) => {
                let ty_expr = TypeExpr::parse(ty);
                for &j in &pending_run {
                    if let Some(p) = &mut params[j] {
                        p.ty = ty_expr.clone();
                    }
                }
                pending_run.clear();
                params[i] = Some(Param { name: name.clone(), ty: ty_expr });
            }
        }
    }
    // Any trailing pending names with nothing to borrow a type from are actually bare
    // (unnamed) types themselves, e.g. the result list `(int, error)`.
    for &j in &pending_run {
        if let Some(p) = &mut params[j] {
            if let Some(name) = p.name.take() {
                p.ty = TypeExpr::Raw(name);
            }
        }
    }

    params.into_iter().flatten().collect()
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
                out.push(text[last..t.start].to_string());
                last = t.end;
            }
            _ => {}
        }
    }
    out.push(text[last..].to_string());
    out
}

fn parse_structs(source: &str, tokens: &[Token<'_>]) -> Vec<StructDecl> {
    let mut out = Vec::new();
    let nt_indices: Vec<usize> =
        (0..tokens.len()).filter(|&i| !tokens[i].is_trivia()).collect();
    let nt: Vec<&Token<'_>> = nt_indices.iter().map(|&i| &tokens[i]).collect();
    let mut i = 0;
    while i + 3 < nt.len() {
        if nt[i].is_ident("type") && nt[i + 1].kind == TokenKind::Ident && nt[i + 2].is_ident("struct")
        {
            let name = nt[i + 1].text.to_string();
            let brace_idx_in_full = nt_indices[i + 3];
            if tokens[brace_idx_in_full].is_punct("{") {
                if let Some(close) = match_braces(tokens, brace_idx_in_full) {
                    let span = (tokens[nt_indices[i]].start, tokens[close].end);
                    let body_span = (tokens[brace_idx_in_full].end, tokens[close].start);
                    out.push(StructDecl { name, span, body_span });
                    i += 4;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_and_simple_func() {
        let src = "package http\n\nfunc Get(url string) (resp *Response, err error) {\n\treturn nil, nil\n}\n";
        let file = GoFile::parse("http.go", src).unwrap();
        assert_eq!(file.package_name, "http");
        let f = file.find_func("Get", None).unwrap();
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].name.as_deref(), Some("url"));
        assert_eq!(f.results.len(), 2);
        assert_eq!(f.results[0].name.as_deref(), Some("resp"));
        assert_eq!(f.results[1].ty.source(), "error");
    }

    #[test]
    fn parses_receiver_and_pointer_params() {
        let src = "package http\n\ntype serverHandler struct{}\n\nfunc (sh serverHandler) ServeHTTP(rw ResponseWriter, req *Request) {\n}\n";
        let file = GoFile::parse("server.go", src).unwrap();
        let f = file.find_func("ServeHTTP", Some("serverHandler")).unwrap();
        assert!(f.receiver.is_some());
        assert_eq!(f.params[1].ty.source(), "*Request");
        assert!(file.find_struct("serverHandler").is_some());
    }

    #[test]
    fn parses_variadic_and_empty_interface() {
        let src = "package log\n\nfunc Printf(format string, args ...interface{}) {\n}\n";
        let file = GoFile::parse("log.go", src).unwrap();
        let f = file.find_func("Printf", None).unwrap();
        assert!(f.is_variadic());
        let variadic_ty = &f.params[1].ty;
        assert_eq!(variadic_ty.trampoline_param_type(), "[]interface{}");
    }

    #[test]
    fn parses_unnamed_result_list() {
        let src = "package driver\n\nfunc (c *conn) ExecContext(ctx context.Context, query string) (driver.Result, error) {\n}\n";
        let file = GoFile::parse("driver.go", src).unwrap();
        let f = file.find_func("ExecContext", Some("conn")).unwrap();
        assert_eq!(f.results.len(), 2);
        assert!(f.results[0].name.is_none());
        assert_eq!(f.results[0].ty.source(), "driver.Result");
        assert_eq!(f.results[1].ty.source(), "error");
    }

    #[test]
    fn shared_type_parameter_group_resolves_to_both_names() {
        let src = "package m\n\nfunc Add(a, b int) int {\n\treturn a + b\n}\n";
        let file = GoFile::parse("m.go", src).unwrap();
        let f = file.find_func("Add", None).unwrap();
        assert_eq!(f.params[0].name.as_deref(), Some("a"));
        assert_eq!(f.params[0].ty.source(), "int");
        assert_eq!(f.params[1].name.as_deref(), Some("b"));
        assert_eq!(f.params[1].ty.source(), "int");
    }

    #[test]
    fn parses_grouped_and_single_line_imports() {
        let src = "package m\n\nimport (\n\t\"fmt\"\n\tmy \"example.com/foo\"\n\t_ \"net/http/pprof\"\n)\n\nimport \"os\"\n";
        let file = GoFile::parse("m.go", src).unwrap();
        assert!(file.imports.iter().any(|i| i.path == "fmt" && i.alias == ImportAlias::None));
        assert!(file
            .imports
            .iter()
            .any(|i| i.path == "example.com/foo" && i.alias == ImportAlias::Named("my".into())));
        assert!(file.imports.iter().any(|i| i.path == "net/http/pprof" && i.alias == ImportAlias::Blank));
        assert!(file.imports.iter().any(|i| i.path == "os"));
    }

    #[test]
    fn default_package_ident_strips_version_suffixes() {
        assert_eq!(default_package_ident("example.com/lib/v2"), "lib");
        assert_eq!(default_package_ident("gopkg.in/yaml.v2"), "yaml");
        assert_eq!(default_package_ident("net/http"), "http");
    }

    #[test]
    fn apply_edits_leaves_untouched_bytes_identical() {
        let src = "package m\n\nfunc F() {\n\tdoStuff()\n}\n";
        let file = GoFile::parse("m.go", src).unwrap();
        let f = file.find_func("F", None).unwrap();
        let edit = Edit::insert(f.body_span.0, "\n\t// woven\n");
        let rewritten = file.apply_edits(vec![edit]).unwrap();
        assert!(rewritten.contains("doStuff()"));
        assert!(rewritten.starts_with("package m"));
    }
}
