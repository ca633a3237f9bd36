//! Environment-variable configuration threaded from `inst build` (setup) to `inst toolexec`
//! (interceptor), per spec.md §6.

use std::path::{Path, PathBuf};

/// Scratch-root override. Default: current working directory, scratch lives under `./.build`.
pub const ENV_WORKDIR: &str = "WORKDIR";
/// Additional user rule file, merged into the embedded catalog.
pub const ENV_RULES: &str = "RULES";
/// JSON-encoded argv fragment of build-context flags, forwarded verbatim to every `go list`
/// invocation the package resolver makes so resolved archives match the current build.
pub const ENV_BUILD_FLAGS: &str = "BUILD_FLAGS";
/// Persistent build-cache directory override (`GOCACHE`-equivalent).
pub const ENV_CACHE_DIR: &str = "OTELWEAVE_CACHE_DIR";

/// Resolved configuration for a single build invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub scratch_root: PathBuf,
    pub extra_rules_file: Option<PathBuf>,
    pub build_flags: Vec<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Reads configuration from the process environment, relative to `cwd`.
    pub fn from_env(cwd: &Path) -> Self {
        let scratch_root = std::env::var_os(ENV_WORKDIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| cwd.to_path_buf());
        let extra_rules_file = std::env::var_os(ENV_RULES).map(PathBuf::from);
        let build_flags = std::env::var(ENV_BUILD_FLAGS)
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default();
        let cache_dir = std::env::var_os(ENV_CACHE_DIR).map(PathBuf::from);
        Self { scratch_root, extra_rules_file, build_flags, cache_dir }
    }

    /// The per-build scratch directory, `<scratch_root>/.build`.
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_root.join(".build")
    }

    /// Encodes `flags` the way `BUILD_FLAGS` expects: a JSON string array so values
    /// containing spaces (e.g. `-gcflags=all=-N -l`) survive the environment-variable hop.
    pub fn encode_build_flags(flags: &[String]) -> String {
        serde_json::to_string(flags).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_flags_round_trip_through_json() {
        let flags = vec!["-tags".to_string(), "integration nightly".to_string()];
        let encoded = Config::encode_build_flags(&flags);
        let decoded: Vec<String> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, flags);
    }
}
