//! Package resolver (spec.md §4.2, component C3): asks the master build tool's package-
//! listing command for a package's declared name and for the export-archive locations of a
//! package plus its transitive dependencies. Continues the teacher's `Solc::version`/
//! subprocess-invocation pattern (`crates/compilers/src/compilers/mod.rs`): shell out, parse
//! stdout, surface a typed error on nonzero exit.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use otelweave_artifacts::Dependency;
use otelweave_core::error::{Result, WeaveError};

/// The subprocess front door: the master build tool binary (normally `go`, but kept
/// injectable so tests don't need a real toolchain on PATH).
pub trait PackageLister {
    fn list_name(&self, import_path: &str, build_flags: &[String]) -> Result<String>;
    fn list_archives(
        &self,
        import_path: &str,
        build_flags: &[String],
    ) -> Result<BTreeMap<String, PathBuf>>;
    /// The transitive dependency closure of `targets`, with each package's module directory
    /// and source file list (spec.md §4.3 step 3).
    fn list_dependencies(&self, targets: &[String], build_flags: &[String]) -> Result<Vec<Dependency>>;
}

/// Resolves packages by invoking `go list` (or whichever binary `tool_name` names) as a real
/// subprocess.
pub struct SubprocessLister {
    pub tool_name: String,
}

impl SubprocessLister {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self { tool_name: tool_name.into() }
    }
}

impl PackageLister for SubprocessLister {
    /// `ResolvePackageName` (spec.md §4.2.1): panic-fatal on failure — a missing name
    /// mid-toolexec is unrecoverable, so this surfaces a [`WeaveError::SetupAbort`] that the
    /// caller is expected to treat as fatal rather than retry.
    fn list_name(&self, import_path: &str, build_flags: &[String]) -> Result<String> {
        let output = run_list(&self.tool_name, import_path, build_flags, &["-f", "{{.Name}}"])?;
        let name = output.trim();
        if name.is_empty() {
            return Err(WeaveError::SetupAbort(format!(
                "`{}` reported no package name for {import_path}",
                self.tool_name
            )));
        }
        Ok(name.to_string())
    }

    /// `ResolveExportArchives` (spec.md §4.2.2): the package plus all transitive dependencies
    /// and their export-archive locations. `-deps` walks the transitive closure; the format
    /// string prints one `importPath archivePath` pair per line, blank archive meaning a
    /// pseudo-package with nothing to export.
    fn list_archives(
        &self,
        import_path: &str,
        build_flags: &[String],
    ) -> Result<BTreeMap<String, PathBuf>> {
        let output = run_list(
            &self.tool_name,
            import_path,
            build_flags,
            &["-deps", "-f", "{{.ImportPath}} {{.Export}}"],
        )?;
        let mut archives = BTreeMap::new();
        for line in output.lines() {
            let Some((path, archive)) = line.split_once(' ') else { continue };
            let archive = archive.trim();
            if path == import_path && archive.is_empty() {
                return Err(WeaveError::PackageNotExported { import_path: import_path.to_string() });
            }
            if !archive.is_empty() {
                archives.insert(path.to_string(), PathBuf::from(archive));
            }
        }
        Ok(archives)
    }

    /// `-deps -f '{{.ImportPath}}|{{.Dir}}|{{.Name}}|{{.GoFiles}}'`, one package per line, Go
    /// files space-separated (spec.md §4.3 step 3).
    fn list_dependencies(&self, targets: &[String], build_flags: &[String]) -> Result<Vec<Dependency>> {
        let mut out = Vec::new();
        for target in targets {
            let output = run_list(
                &self.tool_name,
                target,
                build_flags,
                &["-deps", "-f", "{{.ImportPath}}|{{.Dir}}|{{.Name}}|{{.GoFiles}}"],
            )?;
            for line in output.lines() {
                let mut parts = line.splitn(4, '|');
                let (Some(import_path), Some(dir), Some(name), Some(files)) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let mut dep = Dependency::new(import_path, dir, name);
                dep.source_files = files.split_whitespace().map(|f| PathBuf::from(dir).join(f)).collect();
                out.push(dep);
            }
        }
        out.sort_by(|a, b| a.import_path.cmp(&b.import_path));
        out.dedup_by(|a, b| a.import_path == b.import_path);
        Ok(out)
    }
}

fn run_list(
    tool_name: &str,
    import_path: &str,
    build_flags: &[String],
    format_args: &[&str],
) -> Result<String> {
    let mut cmd = Command::new(tool_name);
    cmd.arg("list");
    cmd.args(build_flags);
    cmd.args(format_args);
    cmd.arg(import_path);
    let output = cmd
        .output()
        .map_err(|e| WeaveError::ArchiveResolution { import_path: import_path.to_string(), reason: e.to_string() })?;
    if !output.status.success() {
        return Err(WeaveError::ArchiveResolution {
            import_path: import_path.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// An in-memory lister for unit tests, so rule-matching and setup tests don't need a
    /// real `go` toolchain on PATH.
    #[derive(Default)]
    pub struct FakeLister {
        pub names: RefCell<BTreeMap<String, String>>,
        pub archives: RefCell<BTreeMap<String, BTreeMap<String, PathBuf>>>,
        pub dependencies: RefCell<BTreeMap<String, Dependency>>,
    }

    impl PackageLister for FakeLister {
        fn list_name(&self, import_path: &str, _build_flags: &[String]) -> Result<String> {
            self.names
                .borrow()
                .get(import_path)
                .cloned()
                .ok_or_else(|| WeaveError::SetupAbort(format!("no such package {import_path}")))
        }

        fn list_archives(
            &self,
            import_path: &str,
            _build_flags: &[String],
        ) -> Result<BTreeMap<String, PathBuf>> {
            self.archives
                .borrow()
                .get(import_path)
                .cloned()
                .ok_or_else(|| WeaveError::PackageNotExported { import_path: import_path.to_string() })
        }

        fn list_dependencies(&self, targets: &[String], _build_flags: &[String]) -> Result<Vec<Dependency>> {
            let mut out = Vec::new();
            for target in targets {
                if let Some(dep) = self.dependencies.borrow().get(target) {
                    out.push(dep.clone());
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn fake_lister_reports_package_not_exported_for_unknown_path() {
        let lister = FakeLister::default();
        let err = lister.list_archives("unsafe", &[]).unwrap_err();
        assert!(matches!(err, WeaveError::PackageNotExported { .. }));
    }

    #[test]
    fn fake_lister_returns_configured_name() {
        let lister = FakeLister::default();
        lister.names.borrow_mut().insert("net/http".into(), "http".into());
        assert_eq!(lister.list_name("net/http", &[]).unwrap(), "http");
    }
}
