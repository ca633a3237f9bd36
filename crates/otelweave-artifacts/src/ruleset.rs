//! [`RuleSet`]: the per-target-package matched rules, persisted as `matched.json` (spec.md §6)
//! at setup time and read back by every toolexec interceptor process.

use crate::rule::{CallRule, FileRule, FunctionRule, RawRule, StructRule};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The matched subsets for one target package, plus enough identity to look the set up again
/// from a `-p <import path>` compile flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Import path of the package these rules target.
    pub import_path: String,
    /// Declared package name, resolved once during setup.
    pub package_name: String,
    pub functions: Vec<FunctionRule>,
    pub structs: Vec<StructRule>,
    pub raw: Vec<RawRule>,
    pub files: Vec<FileRule>,
    pub calls: Vec<CallRule>,
    /// Hook-tree-relative source files that must be added to this package's compile (one per
    /// matched rule's `path`, deduplicated).
    pub extra_files: Vec<PathBuf>,
}

impl RuleSet {
    pub fn new(import_path: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self { import_path: import_path.into(), package_name: package_name.into(), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.structs.is_empty()
            && self.raw.is_empty()
            && self.files.is_empty()
            && self.calls.is_empty()
    }
}

/// The full `matched.json` payload: one [`RuleSet`] per instrumented target package, looked
/// up by import path at interceptor time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchedRules {
    pub packages: Vec<RuleSet>,
    /// Module manifests (`go.mod`) setup backed up and mutated, to be restored once the build
    /// finishes (spec.md §3: "Backups of manifest files: taken before setup, restored after
    /// build"). Persisted here so a later process that finds setup already done (the sentinel
    /// short-circuit) still knows what to restore.
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

impl MatchedRules {
    pub fn for_package(&self, import_path: &str) -> Option<&RuleSet> {
        self.packages.iter().find(|rs| rs.import_path == import_path)
    }

    pub fn insert(&mut self, rule_set: RuleSet) {
        if let Some(existing) =
            self.packages.iter_mut().find(|rs| rs.import_path == rule_set.import_path)
        {
            *existing = rule_set;
        } else {
            self.packages.push(rule_set);
        }
    }
}
