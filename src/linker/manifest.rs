//! The table of links dotts owns, persisted as `manifest.json`.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fs::write_atomic;
use crate::error::{FsError, IoResultExt as _};

/// One deployed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// File or directory inside the repository.
    pub source: PathBuf,
    /// Path under the home directory.
    pub target: PathBuf,
    /// When the unit was deployed.
    pub created_at: DateTime<Utc>,
    /// Whether a whole directory was linked.
    #[serde(default)]
    pub is_dir: bool,
    /// Whether `target` is a rendered copy rather than a symlink.
    #[serde(default)]
    pub is_template: bool,
}

/// In-memory manifest keyed by target path.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    entries: RwLock<BTreeMap<PathBuf, LinkEntry>>,
}

impl Manifest {
    /// Load the manifest at `path`; a missing file is an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, FsError> {
        let entries = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str::<Vec<LinkEntry>>(&content).map_err(|source| {
                    FsError::Json {
                        path: path.to_path_buf(),
                        source,
                    }
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).fs_op("read", path),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|entry| (entry.target.clone(), entry))
                    .collect(),
            ),
        })
    }

    /// Insert or replace the entry for `entry.target`.
    pub fn add(&self, entry: LinkEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.target.clone(), entry);
    }

    /// Drop the entry for `target`, returning it.
    pub fn remove(&self, target: &Path) -> Option<LinkEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
    }

    /// The entry for `target`.
    #[must_use]
    pub fn get(&self, target: &Path) -> Option<LinkEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
    }

    /// Whether `target` is owned.
    #[must_use]
    pub fn contains(&self, target: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    /// All entries, ordered by target.
    #[must_use]
    pub fn entries(&self) -> Vec<LinkEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every entry to disk as a JSON list ordered by target.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<(), FsError> {
        let entries = self.entries();
        let json = serde_json::to_vec_pretty(&entries).map_err(|source| FsError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn entry(target: &str) -> LinkEntry {
        LinkEntry {
            source: PathBuf::from("/repo/configs/shell").join(target),
            target: PathBuf::from("/home/u").join(target),
            created_at: Utc::now(),
            is_dir: false,
            is_template: false,
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("manifest.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn save_and_reload_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = Manifest::load(&path).unwrap();
        manifest.add(entry(".zshrc"));
        manifest.add(entry(".bashrc"));
        manifest.save().unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        let targets: Vec<PathBuf> = reloaded.entries().into_iter().map(|e| e.target).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/home/u/.bashrc"),
                PathBuf::from("/home/u/.zshrc")
            ]
        );
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.is_array());
    }

    #[test]
    fn add_replaces_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("m.json")).unwrap();
        manifest.add(entry(".zshrc"));
        let mut again = entry(".zshrc");
        again.is_template = true;
        manifest.add(again);
        assert_eq!(manifest.len(), 1);
        assert!(manifest.get(Path::new("/home/u/.zshrc")).unwrap().is_template);
        assert!(manifest.remove(Path::new("/home/u/.zshrc")).is_some());
        assert!(!manifest.contains(Path::new("/home/u/.zshrc")));
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Manifest::load(&path).unwrap_err(),
            FsError::Json { .. }
        ));
    }
}
