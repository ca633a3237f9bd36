//! Per-process import sidecar (spec.md §3/§4.10): `<scratch>/added_imports.<pid>.json`,
//! written once by a compile's toolexec process and consumed (unioned, never mutated) by
//! every subsequent link in the same build.

use otelweave_core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sidecar {
    /// import path -> archive path, for every package this compile added to its `importcfg`.
    pub added: BTreeMap<String, PathBuf>,
}

impl Sidecar {
    pub fn file_name(pid: u32) -> String {
        format!("added_imports.{pid}.json")
    }

    pub fn path_for(scratch_dir: &Path, pid: u32) -> PathBuf {
        scratch_dir.join(Self::file_name(pid))
    }

    /// Writes this sidecar for the current process, write-temp-then-rename.
    pub fn write_for_current_process(&self, scratch_dir: &Path) -> Result<()> {
        let path = Self::path_for(scratch_dir, std::process::id());
        otelweave_core::fs::write_json_file(self, &path)
    }

    /// Reads every sidecar under `scratch_dir`, in sorted file-name order (spec.md §4.10:
    /// "merger across sidecars is deterministic under lexicographic file order"). Unreadable
    /// or unparseable files are skipped with a `tracing::warn!`, not an error — this is the
    /// *TrackerWarning* recovery path, never fatal for the link.
    pub fn read_all(scratch_dir: &Path) -> Vec<Sidecar> {
        let paths = otelweave_core::fs::glob_sorted(scratch_dir, "added_imports.*.json");
        paths
            .into_iter()
            .filter_map(|path| match otelweave_core::fs::read_json_file::<Sidecar>(&path) {
                Ok(sidecar) => Some(sidecar),
                Err(err) => {
                    tracing::warn!(?path, %err, "skipping unreadable import sidecar");
                    None
                }
            })
            .collect()
    }

    /// Unions a sequence of sidecars into one mapping. Last-writer-wins on duplicate import
    /// paths is harmless (spec.md §5): the value — an archive path — is always identical for
    /// the same import path within one build.
    pub fn union(sidecars: &[Sidecar]) -> BTreeMap<String, PathBuf> {
        let mut merged = BTreeMap::new();
        for sidecar in sidecars {
            for (k, v) in &sidecar.added {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_merges_distinct_keys() {
        let mut a = Sidecar::default();
        a.added.insert("pkg/a".into(), PathBuf::from("/a.a"));
        let mut b = Sidecar::default();
        b.added.insert("pkg/b".into(), PathBuf::from("/b.a"));
        let merged = Sidecar::union(&[a, b]);
        assert_eq!(merged.len(), 2);
    }
}
