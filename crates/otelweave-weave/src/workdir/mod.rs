//! Cache, backup and workdir discipline (spec.md §6/§4.3/§4.10, component C11): the on-disk
//! layout under the scratch root, manifest backup/restore, and persistent build-cache
//! location selection. Continues the teacher's `SolFilesCache` idea of a *location*-keyed
//! cache (`src/cache.rs`), generalized per SPEC_FULL.md §2.10 to a location rather than a
//! staleness index, since spec.md §4.3 step 8 forces a full rebuild every time.

use std::path::{Path, PathBuf};

use otelweave_core::error::Result;

/// The on-disk layout under `<scratch root>/.build/` (spec.md §6).
#[derive(Debug, Clone)]
pub struct Workdir {
    pub root: PathBuf,
}

impl Workdir {
    pub fn new(scratch_root: &Path) -> Self {
        Self { root: scratch_root.join(".build") }
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    pub fn debug_dir(&self, package_import_path: &str) -> PathBuf {
        self.root.join("debug").join(sanitize_for_path(package_import_path))
    }

    pub fn gocache_dir(&self) -> PathBuf {
        self.root.join("gocache")
    }

    pub fn hook_tree_dir(&self) -> PathBuf {
        self.root.join("hooks")
    }

    pub fn matched_json(&self) -> PathBuf {
        self.root.join("matched.json")
    }

    pub fn sentinel(&self) -> PathBuf {
        self.root.join(".setup-complete")
    }

    /// Whether setup has already run for this scratch root (spec.md §4.3 step 1: "if already
    /// set up (sentinel present), no-op").
    pub fn is_set_up(&self) -> bool {
        self.sentinel().exists()
    }

    pub fn mark_set_up(&self) -> Result<()> {
        otelweave_core::fs::ensure_dir(&self.root)?;
        otelweave_core::fs::write_atomic(&self.sentinel(), b"")
    }

    /// Creates the full directory skeleton (spec.md §6's on-disk layout).
    pub fn ensure_layout(&self) -> Result<()> {
        otelweave_core::fs::ensure_dir(&self.root)?;
        otelweave_core::fs::ensure_dir(&self.backup_dir())?;
        otelweave_core::fs::ensure_dir(&self.root.join("debug"))?;
        otelweave_core::fs::ensure_dir(&self.gocache_dir())?;
        otelweave_core::fs::ensure_dir(&self.hook_tree_dir())?;
        Ok(())
    }

    /// The build cache location to export as `GOCACHE` (spec.md §6): the user's own if
    /// `cache_dir_override` is set, otherwise one isolated inside the scratch directory.
    pub fn effective_cache_dir(&self, cache_dir_override: Option<&Path>) -> PathBuf {
        cache_dir_override.map(Path::to_path_buf).unwrap_or_else(|| self.gocache_dir())
    }

    /// Backs up every manifest file before setup mutates them (spec.md §3: "Backups of
    /// manifest files: taken before setup, restored after build").
    pub fn backup_manifests(&self, manifests: &[PathBuf]) -> Result<Vec<PathBuf>> {
        for manifest in manifests {
            otelweave_core::fs::backup_once(manifest, &self.root)?;
        }
        Ok(manifests.to_vec())
    }

    pub fn restore_manifests(&self, manifests: &[PathBuf]) -> Result<()> {
        otelweave_core::fs::restore_backups(&self.root, manifests)
    }

    /// Deletes stale per-process sidecars left over from a previous build (spec.md §9:
    /// "cleanup of per-process sidecars ... specified here as start-of-next"). Best-effort:
    /// a file that's already gone or cannot be removed is not an error.
    pub fn clear_stale_sidecars(&self) {
        for path in otelweave_core::fs::glob_sorted(&self.root, "added_imports.*.json") {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn sanitize_for_path(import_path: &str) -> String {
    import_path.replace(['/', '\\', ':'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        assert!(!workdir.is_set_up());
        workdir.mark_set_up().unwrap();
        assert!(workdir.is_set_up());
    }

    #[test]
    fn debug_dir_sanitizes_import_path() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        let debug = workdir.debug_dir("net/http");
        assert!(debug.ends_with("net_http"));
    }

    #[test]
    fn cache_dir_prefers_override() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        let custom = PathBuf::from("/custom/gocache");
        assert_eq!(workdir.effective_cache_dir(Some(&custom)), custom);
        assert_eq!(workdir.effective_cache_dir(None), workdir.gocache_dir());
    }

    #[test]
    fn manifest_backup_and_restore_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = Workdir::new(dir.path());
        let manifest = dir.path().join("go.mod");
        std::fs::write(&manifest, "module example\n").unwrap();
        let backed_up = workdir.backup_manifests(&[manifest.clone()]).unwrap();
        std::fs::write(&manifest, "module example\n\nrequire x v1\n").unwrap();
        workdir.restore_manifests(&backed_up).unwrap();
        assert_eq!(std::fs::read_to_string(&manifest).unwrap(), "module example\n");
    }
}
