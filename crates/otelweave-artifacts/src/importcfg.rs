//! The build tool's import-resolution file (spec.md §2/§4.8/§6 "ImportCfg").
//!
//! A line-oriented text format with two recognized directives (`packagefile k=v`,
//! `importmap k=v`); everything else — blank lines, `#` comments, and directives the weaver
//! doesn't know about such as `modinfo "..."` — is preserved verbatim as a trailing tail.
//! Writing is deterministic: `importmap` lines first (sorted by key), then `packagefile`
//! lines (sorted by key), then the tail in original order. This is the byte-compatibility
//! contract spec.md §6 requires: the build tool's own parser must accept the rewritten file
//! with identical resolutions.

use otelweave_core::error::{Result, WeaveError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCfg {
    pub packagefile: BTreeMap<String, PathBuf>,
    pub importmap: BTreeMap<String, String>,
    /// Lines that are not a recognized directive, in their original relative order.
    pub tail: Vec<String>,
}

impl ImportCfg {
    pub fn parse(contents: &str) -> Self {
        let mut cfg = Self::default();
        for line in contents.lines() {
            if let Some(rest) = line.strip_prefix("packagefile ") {
                if let Some((k, v)) = rest.split_once('=') {
                    cfg.packagefile.insert(k.to_string(), PathBuf::from(v));
                    continue;
                }
            } else if let Some(rest) = line.strip_prefix("importmap ") {
                if let Some((k, v)) = rest.split_once('=') {
                    cfg.importmap.insert(k.to_string(), v.to_string());
                    continue;
                }
            }
            cfg.tail.push(line.to_string());
        }
        cfg
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    /// Serializes in the deterministic order the round-trip law (spec.md §8) requires:
    /// importmap (sorted), packagefile (sorted), then the preserved tail.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.importmap {
            out.push_str("importmap ");
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        for (k, v) in &self.packagefile {
            out.push_str("packagefile ");
            out.push_str(k);
            out.push('=');
            out.push_str(&v.to_string_lossy());
            out.push('\n');
        }
        for line in &self.tail {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        otelweave_core::fs::write_atomic(path, self.serialize().as_bytes())
    }

    /// Adds or keeps a `packagefile` entry per spec.md's invariant: "on addition, the
    /// existing archive wins unless absent". Returns `true` if the map changed.
    pub fn add_packagefile(&mut self, import_path: impl Into<String>, archive: PathBuf) -> bool {
        let import_path = import_path.into();
        if self.packagefile.contains_key(&import_path) {
            return false;
        }
        self.packagefile.insert(import_path, archive);
        true
    }

    /// Merges another `ImportCfg`'s `packagefile` entries into this one, existing-wins.
    /// Used at link time to union every per-process sidecar (spec.md §4.7).
    pub fn merge_packagefiles<I: IntoIterator<Item = (String, PathBuf)>>(&mut self, entries: I) {
        for (k, v) in entries {
            self.add_packagefile(k, v);
        }
    }
}

impl TryFrom<&str> for ImportCfg {
    type Error = WeaveError;
    fn try_from(value: &str) -> Result<Self> {
        Ok(Self::parse(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "packagefile fmt=/a/fmt.a\npackagefile context=/a/context.a\nimportmap example.com/x=example.com/x/v2\nmodinfo \"...\"\n";

    #[test]
    fn writer_orders_importmap_then_packagefile_then_tail() {
        let cfg = ImportCfg::parse(FIXTURE);
        let serialized = cfg.serialize();
        let expected = "importmap example.com/x=example.com/x/v2\n\
packagefile context=/a/context.a\n\
packagefile fmt=/a/fmt.a\n\
modinfo \"...\"\n";
        assert_eq!(serialized, expected);
    }

    #[test]
    fn serialization_is_bit_stable_across_repeats() {
        let cfg = ImportCfg::parse(FIXTURE);
        let once = cfg.serialize();
        let twice = ImportCfg::parse(&once).serialize();
        assert_eq!(once, twice);
    }

    #[test]
    fn round_trip_preserves_parsed_form() {
        let cfg = ImportCfg::parse(FIXTURE);
        let reparsed = ImportCfg::parse(&cfg.serialize());
        assert_eq!(cfg, reparsed);
    }

    #[test]
    fn existing_archive_wins_on_addition() {
        let mut cfg = ImportCfg::parse("packagefile foo=/orig/foo.a\n");
        let changed = cfg.add_packagefile("foo", PathBuf::from("/new/foo.a"));
        assert!(!changed);
        assert_eq!(cfg.packagefile.get("foo").unwrap(), &PathBuf::from("/orig/foo.a"));
    }

    #[test]
    fn absent_archive_is_added() {
        let mut cfg = ImportCfg::default();
        let changed = cfg.add_packagefile("foo", PathBuf::from("/new/foo.a"));
        assert!(changed);
        assert_eq!(cfg.packagefile.get("foo").unwrap(), &PathBuf::from("/new/foo.a"));
    }

    #[test]
    fn blank_lines_and_comments_are_preserved_in_tail() {
        let input = "packagefile foo=/a/foo.a\n\n# a comment\n";
        let cfg = ImportCfg::parse(input);
        assert_eq!(cfg.tail, vec!["".to_string(), "# a comment".to_string()]);
    }
}
