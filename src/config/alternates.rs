//! Alternate file selection.
//!
//! A variant sits beside its base file as `<base>##<key>.<value>,...`, where
//! `key` is one of `hostname`, `profile`, `distro`, `os` or `default`.
//! Qualifiers are conjunctive: one mismatching qualifier rejects the variant.
//! The surviving candidate with the highest score wins; ties go to the
//! lexically smallest file name.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{FsError, IoResultExt as _};
use crate::platform::SystemInfo;

/// Separator between a base name and its qualifiers.
pub const VARIANT_MARKER: &str = "##";

const HOSTNAME_SCORE: u32 = 1000;
const PROFILE_SCORE: u32 = 100;
const DISTRO_SCORE: u32 = 50;
const OS_SCORE: u32 = 10;
const DEFAULT_SCORE: u32 = 1;

/// One candidate for a base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateMatch {
    /// Full path of the candidate.
    pub path: PathBuf,
    /// Summed qualifier score; zero for the base file.
    pub score: u32,
    /// Raw qualifiers, empty for the base file.
    pub suffixes: Vec<String>,
    /// Whether a qualifier mismatched the current context.
    pub rejected: bool,
}

/// Values qualifiers are matched against. All comparisons are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlternateContext {
    /// Host name.
    pub hostname: String,
    /// Active profile, if any.
    pub profile: Option<String>,
    /// Distribution (`arch`, `ubuntu`, ...).
    pub distro: String,
    /// Operating system (`linux`, `darwin`).
    pub os: String,
}

impl AlternateContext {
    /// Context for `system` with an optional active profile.
    #[must_use]
    pub fn from_system(system: &SystemInfo, profile: Option<&str>) -> Self {
        Self {
            hostname: system.hostname.to_lowercase(),
            profile: profile.map(str::to_lowercase),
            distro: system.distro.to_string(),
            os: system.os.to_string(),
        }
    }
}

/// Split `file_name` into its base name and qualifier list, if it is a variant.
#[must_use]
pub fn split_variant(file_name: &str) -> Option<(&str, Vec<String>)> {
    let (base, suffix) = file_name.split_once(VARIANT_MARKER)?;
    Some((
        base,
        suffix.split(',').map(|s| s.trim().to_string()).collect(),
    ))
}

/// Whether `file_name` carries a variant marker.
#[must_use]
pub fn is_variant(file_name: &str) -> bool {
    file_name.contains(VARIANT_MARKER)
}

/// Picks the best variant of a file for one machine.
#[derive(Debug, Clone)]
pub struct AlternateResolver {
    context: AlternateContext,
}

impl AlternateResolver {
    /// Create a resolver for `context`.
    #[must_use]
    pub const fn new(context: AlternateContext) -> Self {
        Self { context }
    }

    /// The context qualifiers are matched against.
    #[must_use]
    pub const fn context(&self) -> &AlternateContext {
        &self.context
    }

    /// Score a qualifier list, or `None` when any qualifier mismatches.
    ///
    /// Qualifiers without a `.` (other than `default`) and unknown keys are ignored.
    #[must_use]
    pub fn score(&self, suffixes: &[String]) -> Option<u32> {
        let mut score = 0;
        for suffix in suffixes {
            let lowered = suffix.to_lowercase();
            let (key, value) = match lowered.split_once('.') {
                Some((key, value)) => (key, value),
                None if lowered == "default" => ("default", ""),
                None => continue,
            };
            let matched = |expected: &str, points: u32| (value == expected).then_some(points);
            let points = match key {
                "hostname" => matched(&self.context.hostname, HOSTNAME_SCORE)?,
                "profile" => matched(self.context.profile.as_deref()?, PROFILE_SCORE)?,
                "distro" => matched(&self.context.distro, DISTRO_SCORE)?,
                "os" => matched(&self.context.os, OS_SCORE)?,
                "default" => DEFAULT_SCORE,
                _ => 0,
            };
            score += points;
        }
        Some(score)
    }

    /// All candidates for `base_path`: the base file (if present) and every
    /// sibling variant, including rejected ones. Sorted best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be read.
    pub fn alternates_for_file(&self, base_path: &Path) -> Result<Vec<AlternateMatch>, FsError> {
        let dir = base_path.parent().unwrap_or_else(|| Path::new("."));
        let Some(base) = base_path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!("{base}{VARIANT_MARKER}");

        let mut matches = Vec::new();
        if base_path.is_file() {
            matches.push(AlternateMatch {
                path: base_path.to_path_buf(),
                score: 0,
                suffixes: Vec::new(),
                rejected: false,
            });
        }

        for entry in fs::read_dir(dir).fs_op("read directory", dir)? {
            let entry = entry.fs_op("read directory entry", dir)?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let suffixes: Vec<String> = rest.split(',').map(|s| s.trim().to_string()).collect();
            let score = self.score(&suffixes);
            matches.push(AlternateMatch {
                path,
                score: score.unwrap_or(0),
                suffixes,
                rejected: score.is_none(),
            });
        }

        matches.sort_by(|a, b| {
            a.rejected
                .cmp(&b.rejected)
                .then(b.score.cmp(&a.score))
                .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
        });
        Ok(matches)
    }

    /// The best file for `base_path`.
    ///
    /// Returns `base_path` itself when nothing matches. When the directory
    /// cannot be read but `base_path` exists, `base_path` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read and `base_path` does
    /// not exist.
    pub fn resolve_file(&self, base_path: &Path) -> Result<PathBuf, FsError> {
        match self.alternates_for_file(base_path) {
            Ok(matches) => Ok(matches
                .into_iter()
                .find(|m| !m.rejected)
                .map_or_else(|| base_path.to_path_buf(), |m| m.path)),
            Err(_) if base_path.exists() => Ok(base_path.to_path_buf()),
            Err(e) => Err(e),
        }
    }

    /// Map every variant group under `dir` to its chosen file.
    ///
    /// Keys are base paths relative to `dir`; values are full paths of the
    /// chosen candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory in the tree cannot be read.
    pub fn resolve_directory(&self, dir: &Path) -> Result<BTreeMap<PathBuf, PathBuf>, FsError> {
        let mut resolved = BTreeMap::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| FsError::Io {
                operation: "walk directory",
                path: e.path().unwrap_or(dir).to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((base, _)) = split_variant(name) else {
                continue;
            };
            let base_path = entry.path().with_file_name(base);
            let Ok(rel) = base_path.strip_prefix(dir) else {
                continue;
            };
            if resolved.contains_key(rel) {
                continue;
            }
            let rel = rel.to_path_buf();
            let chosen = self.resolve_file(&base_path)?;
            resolved.insert(rel, chosen);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn context(hostname: &str, os: &str) -> AlternateContext {
        AlternateContext {
            hostname: hostname.to_string(),
            profile: Some("desktop".to_string()),
            distro: "arch".to_string(),
            os: os.to_string(),
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn hostname_variant_beats_base_and_mismatched_os_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = touch(dir.path(), "nvim.lua");
        touch(dir.path(), "nvim.lua##os.darwin");
        let host = touch(dir.path(), "nvim.lua##hostname.work");

        let resolver = AlternateResolver::new(context("work", "linux"));
        assert_eq!(resolver.resolve_file(&base).unwrap(), host);

        let all = resolver.alternates_for_file(&base).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].score, 1000);
        let darwin = all.iter().find(|m| m.suffixes == ["os.darwin"]).unwrap();
        assert!(darwin.rejected);
    }

    #[test]
    fn qualifiers_are_conjunctive_and_summed() {
        let resolver = AlternateResolver::new(context("work", "linux"));
        let both = vec!["os.linux".to_string(), "distro.arch".to_string()];
        assert_eq!(resolver.score(&both), Some(60));
        let mixed = vec!["os.linux".to_string(), "hostname.home".to_string()];
        assert_eq!(resolver.score(&mixed), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let resolver = AlternateResolver::new(context("work", "linux"));
        assert_eq!(resolver.score(&["HOSTNAME.Work".to_string()]), Some(1000));
        assert_eq!(resolver.score(&["Profile.DESKTOP".to_string()]), Some(100));
    }

    #[test]
    fn unknown_and_malformed_qualifiers_are_ignored() {
        let resolver = AlternateResolver::new(context("work", "linux"));
        let suffixes = vec!["color.blue".to_string(), "nodot".to_string()];
        assert_eq!(resolver.score(&suffixes), Some(0));
        assert_eq!(resolver.score(&["default".to_string()]), Some(1));
    }

    #[test]
    fn profile_qualifier_rejected_without_profile() {
        let mut ctx = context("work", "linux");
        ctx.profile = None;
        let resolver = AlternateResolver::new(ctx);
        assert_eq!(resolver.score(&["profile.desktop".to_string()]), None);
    }

    #[test]
    fn ties_break_on_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("rc");
        touch(dir.path(), "rc##os.linux");
        let first = touch(dir.path(), "rc##default,os.linux");
        touch(dir.path(), "rc##os.linux,default");

        let resolver = AlternateResolver::new(context("work", "linux"));
        assert_eq!(resolver.resolve_file(&base).unwrap(), first);
    }

    #[test]
    fn no_candidates_returns_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("missing.conf");
        touch(dir.path(), "missing.conf##os.darwin");
        let resolver = AlternateResolver::new(context("work", "linux"));
        assert_eq!(resolver.resolve_file(&base).unwrap(), base);
    }

    #[test]
    fn unreadable_directory_falls_back_or_errors() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = AlternateResolver::new(context("work", "linux"));
        let missing = dir.path().join("nope").join("file");
        assert!(resolver.resolve_file(&missing).is_err());
    }

    #[test]
    fn variant_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let base = touch(dir.path(), "conf");
        fs::create_dir(dir.path().join("conf##hostname.work")).unwrap();
        let resolver = AlternateResolver::new(context("work", "linux"));
        assert_eq!(resolver.resolve_file(&base).unwrap(), base);
    }

    #[test]
    fn resolve_directory_maps_relative_bases() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join(".config/git");
        fs::create_dir_all(&sub).unwrap();
        touch(&sub, "config");
        let chosen = touch(&sub, "config##distro.arch");
        touch(dir.path(), "plain");

        let resolver = AlternateResolver::new(context("work", "linux"));
        let map = resolver.resolve_directory(dir.path()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[Path::new(".config/git/config")], chosen);
    }

    #[test]
    fn split_variant_parses_suffixes() {
        let (base, suffixes) = split_variant("zshrc##os.linux, hostname.box").unwrap();
        assert_eq!(base, "zshrc");
        assert_eq!(suffixes, vec!["os.linux", "hostname.box"]);
        assert!(split_variant("zshrc").is_none());
        assert!(is_variant("a##b"));
    }
}
