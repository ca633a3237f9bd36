//! Dependency record (spec.md §3): one entry per package in the transitive closure of the
//! build targets, as produced by the package resolver (C3) and consumed by rule matching
//! (§4.3.1).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub import_path: String,
    pub module_dir: PathBuf,
    pub source_files: Vec<PathBuf>,
    pub package_name: String,
}

impl Dependency {
    pub fn new(
        import_path: impl Into<String>,
        module_dir: impl Into<PathBuf>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            import_path: import_path.into(),
            module_dir: module_dir.into(),
            source_files: Vec::new(),
            package_name: package_name.into(),
        }
    }
}
