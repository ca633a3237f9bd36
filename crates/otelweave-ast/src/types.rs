//! Type-expression recognition for function signatures (spec.md §4.9: "recognize variadic
//! and interface-of-anything types"). Anything beyond pointer/variadic/empty-interface is
//! kept as its raw source text — the weaver never needs to understand a type structurally,
//! only to know whether it's variadic (trampoline parameter degrades to the slice form) or
//! the empty interface (parameter is left untyped to avoid leaking unexported types).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `T`, `pkg.T`, `[]T`, `map[K]V`, generics, etc. — anything not specially recognized,
    /// kept verbatim.
    Raw(String),
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `...T` (only valid as the last parameter type).
    Variadic(Box<TypeExpr>),
    /// `interface{}` or `any`.
    EmptyInterface,
}

impl TypeExpr {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "any" || trimmed == "interface{}" || trimmed == "interface {}" {
            return Self::EmptyInterface;
        }
        if let Some(rest) = trimmed.strip_prefix("...") {
            return Self::Variadic(Box::new(Self::parse(rest)));
        }
        if let Some(rest) = trimmed.strip_prefix('*') {
            return Self::Pointer(Box::new(Self::parse(rest)));
        }
        Self::Raw(trimmed.to_string())
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, Self::Variadic(_))
    }

    pub fn is_empty_interface(&self) -> bool {
        matches!(self, Self::EmptyInterface)
    }

    /// The type the trampoline parameter actually takes: a variadic `...T` degrades to the
    /// slice form `[]T` (spec.md §4.6.3 step 2).
    pub fn trampoline_param_type(&self) -> String {
        match self {
            Self::Variadic(inner) => format!("[]{}", inner.source()),
            other => other.source(),
        }
    }

    /// Renders back to Go source text.
    pub fn source(&self) -> String {
        match self {
            Self::Raw(s) => s.clone(),
            Self::Pointer(inner) => format!("*{}", inner.source()),
            Self::Variadic(inner) => format!("...{}", inner.source()),
            Self::EmptyInterface => "interface{}".to_string(),
        }
    }

    /// Wraps this type in a pointer, used by the trampoline generator to build
    /// `*T` parameter types for Before/After trampolines (spec.md §4.6.3 step 2: "Before-
    /// trampoline takes `(ctx, <pointer-of-R>, <pointer-of-P1>, ...)`").
    pub fn pointer_of(&self) -> Self {
        Self::Pointer(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_empty_interface_spellings() {
        assert_eq!(TypeExpr::parse("interface{}"), TypeExpr::EmptyInterface);
        assert_eq!(TypeExpr::parse("any"), TypeExpr::EmptyInterface);
    }

    #[test]
    fn variadic_degrades_to_slice_for_trampoline() {
        let t = TypeExpr::parse("...string");
        assert!(t.is_variadic());
        assert_eq!(t.trampoline_param_type(), "[]string");
    }

    #[test]
    fn pointer_roundtrips_source() {
        let t = TypeExpr::parse("*http.Request");
        assert_eq!(t.source(), "*http.Request");
        assert_eq!(t.pointer_of().source(), "**http.Request");
    }
}
