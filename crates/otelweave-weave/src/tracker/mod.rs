//! Cross-process import tracker orchestration (spec.md §4.7/§4.10, component C10). The
//! sidecar file shape lives in `otelweave-artifacts::sidecar`; this module is the two
//! operations that use it during a build: recording one compile's additions, and merging
//! every sidecar into the link-time `importcfg`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use otelweave_artifacts::{ImportCfg, Sidecar};
use otelweave_core::error::Result;

/// Records the archive paths a single compile process added to its own `importcfg`, so the
/// link phase can pick them up later (spec.md §4.6 step 6).
pub fn record_additions(scratch_dir: &Path, added: BTreeMap<String, PathBuf>) -> Result<()> {
    if added.is_empty() {
        return Ok(());
    }
    Sidecar { added }.write_for_current_process(scratch_dir)
}

/// Link-time merge (spec.md §4.7): load every sidecar under `scratch_dir`, union them, and
/// add any packagefile entries missing from `link_cfg`. Returns the number of entries that
/// were newly added, for logging.
pub fn merge_into_link_importcfg(scratch_dir: &Path, link_cfg: &mut ImportCfg) -> usize {
    let sidecars = Sidecar::read_all(scratch_dir);
    let merged = Sidecar::union(&sidecars);
    let mut added = 0;
    for (import_path, archive) in merged {
        if link_cfg.add_packagefile(import_path, archive) {
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_merge_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut added = BTreeMap::new();
        added.insert("net/http".to_string(), PathBuf::from("/a/http.a"));
        record_additions(dir.path(), added).unwrap();

        let mut link_cfg = ImportCfg::default();
        let count = merge_into_link_importcfg(dir.path(), &mut link_cfg);
        assert_eq!(count, 1);
        assert_eq!(link_cfg.packagefile.get("net/http").unwrap(), &PathBuf::from("/a/http.a"));
    }

    #[test]
    fn empty_additions_do_not_write_a_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        record_additions(dir.path(), BTreeMap::new()).unwrap();
        assert!(otelweave_core::fs::glob_sorted(dir.path(), "added_imports.*.json").is_empty());
    }
}
