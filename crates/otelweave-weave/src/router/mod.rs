//! Toolexec router (spec.md §4.4, component C7): classifies each intercepted tool invocation
//! by binary-name suffix and flag presence, and re-merges Windows drive-prefixed argv runs
//! that a naive shell split would otherwise break apart.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Compile,
    Link,
    PassThrough,
}

const COMPILE_TOOL_SUFFIXES: &[&str] = &["compile", "compile.exe"];
const LINK_TOOL_SUFFIXES: &[&str] = &["link", "link.exe"];

/// Classifies `argv` (argv[0] is the tool binary path) per spec.md §4.4:
/// - Compile iff the binary name matches the compile tool and `-o`, `-p`, `-buildid` are
///   present and `-pgoprofile` is absent.
/// - Link iff the binary name matches the link tool and `-o`, `-buildid`, `-importcfg` are
///   present.
/// - Otherwise pass-through.
pub fn classify(argv: &[String]) -> Classification {
    let Some(tool) = argv.first() else { return Classification::PassThrough };
    let name = tool_basename(tool);

    if COMPILE_TOOL_SUFFIXES.iter().any(|s| name.ends_with(s))
        && has_flag(argv, "-o")
        && has_flag(argv, "-p")
        && has_flag(argv, "-buildid")
        && !has_flag(argv, "-pgoprofile")
    {
        return Classification::Compile;
    }
    if LINK_TOOL_SUFFIXES.iter().any(|s| name.ends_with(s))
        && has_flag(argv, "-o")
        && has_flag(argv, "-buildid")
        && has_flag(argv, "-importcfg")
    {
        return Classification::Link;
    }
    Classification::PassThrough
}

fn tool_basename(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_ascii_lowercase()
}

fn has_flag(argv: &[String], flag: &str) -> bool {
    argv.iter().any(|a| a == flag || a.starts_with(&format!("{flag}=")))
}

/// Returns the value of `flag` if present, whether given as `-flag value` or `-flag=value`.
pub fn flag_value<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    let prefix = format!("{flag}=");
    for (i, a) in argv.iter().enumerate() {
        if let Some(v) = a.strip_prefix(&prefix) {
            return Some(v);
        }
        if a == flag {
            return argv.get(i + 1).map(String::as_str);
        }
    }
    None
}

/// Re-merges argv entries a naive split broke apart on Windows drive-prefixed paths, e.g. a
/// path argument `C:\foo bar\x.go` that a shell-unaware splitter separated into `C:\foo` and
/// `bar\x.go`. Spec.md §4.4: "argv parsing used only when reconstructing a split command line
/// must merge drive-prefixed runs back together."
pub fn remerge_windows_paths(parts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if is_windows_drive_prefix(part) {
            if let Some(prev) = out.last_mut() {
                prev.push(' ');
                prev.push_str(part);
                continue;
            }
        }
        out.push(part.clone());
    }
    out
}

fn is_windows_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_compile_invocation() {
        let a = argv(&["/usr/lib/go/pkg/tool/linux_amd64/compile", "-o", "out.o", "-p", "net/http", "-buildid", "abc"]);
        assert_eq!(classify(&a), Classification::Compile);
    }

    #[test]
    fn pgoprofile_excludes_compile_classification() {
        let a = argv(&[
            "/usr/lib/go/pkg/tool/linux_amd64/compile",
            "-o",
            "out.o",
            "-p",
            "net/http",
            "-buildid",
            "abc",
            "-pgoprofile",
            "default.pgo",
        ]);
        assert_eq!(classify(&a), Classification::PassThrough);
    }

    #[test]
    fn classifies_link_invocation() {
        let a = argv(&["/usr/lib/go/pkg/tool/linux_amd64/link", "-o", "bin", "-buildid", "abc", "-importcfg", "x"]);
        assert_eq!(classify(&a), Classification::Link);
    }

    #[test]
    fn unrelated_tool_passes_through() {
        let a = argv(&["/usr/lib/go/pkg/tool/linux_amd64/asm", "-o", "out.o"]);
        assert_eq!(classify(&a), Classification::PassThrough);
    }

    #[test]
    fn flag_value_handles_both_spellings() {
        let a = argv(&["compile", "-p", "net/http", "-importcfg=./x.cfg"]);
        assert_eq!(flag_value(&a, "-p"), Some("net/http"));
        assert_eq!(flag_value(&a, "-importcfg"), Some("./x.cfg"));
    }

    #[test]
    fn remerges_drive_prefixed_path_fragments() {
        let parts = argv(&["-o", "C:\\foo", "bar\\x.go"]);
        let merged = remerge_windows_paths(&parts);
        assert_eq!(merged, vec!["-o".to_string(), "C:\\foo bar\\x.go".to_string()]);
    }
}
