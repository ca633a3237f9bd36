//! Data model shared by every phase of the weaver: rules, rule sets, dependency records,
//! the `importcfg` model and the cross-process import sidecar.

pub mod dependency;
pub mod importcfg;
pub mod rule;
pub mod ruleset;
pub mod sidecar;

pub use dependency::Dependency;
pub use importcfg::ImportCfg;
pub use rule::{CallRule, FileRule, FunctionRule, ImportAddition, RawRule, RawRuleDoc, Rule, StructRule};
pub use ruleset::{MatchedRules, RuleSet};
pub use sidecar::Sidecar;
