//! Timestamped copies of files replaced by the linker.
//!
//! Copies live under `backups/<timestamp>/<basename>`. An index keyed by the
//! original absolute path points at the most recent copy; older copies stay
//! on disk until [`BackupManager::clean`] removes their index entries.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::fs::{copy_any, remove_path, write_atomic};
use crate::error::{FsError, IoResultExt as _};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Where one path was backed up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// The path that was replaced.
    pub original_path: PathBuf,
    /// The copy.
    pub backup_path: PathBuf,
    /// When the copy was taken.
    pub backed_up_at: DateTime<Utc>,
    /// Whether the original was a directory.
    #[serde(default)]
    pub is_dir: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupIndex {
    #[serde(default)]
    entries: BTreeMap<PathBuf, BackupEntry>,
}

/// Takes, restores and prunes backups.
#[derive(Debug)]
pub struct BackupManager {
    backup_dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<BackupIndex>,
}

impl BackupManager {
    /// Open the store rooted at `backup_dir` with its index at `index_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index exists but cannot be read or parsed.
    pub fn open(backup_dir: &Path, index_path: &Path) -> Result<Self, FsError> {
        let index = match fs::read_to_string(index_path) {
            Ok(content) if content.trim().is_empty() => BackupIndex::default(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| FsError::Json {
                path: index_path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BackupIndex::default(),
            Err(e) => return Err(e).fs_op("read", index_path),
        };
        Ok(Self {
            backup_dir: backup_dir.to_path_buf(),
            index_path: index_path.to_path_buf(),
            index: Mutex::new(index),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BackupIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, index: &BackupIndex) -> Result<(), FsError> {
        let json = serde_json::to_vec_pretty(index).map_err(|source| FsError::Json {
            path: self.index_path.clone(),
            source,
        })?;
        write_atomic(&self.index_path, &json)
    }

    /// A fresh location for a copy of `path` taken now.
    fn allocate(&self, path: &Path) -> PathBuf {
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let base = path
            .file_name()
            .map_or_else(|| "backup".into(), |n| n.to_os_string());
        let dir = self.backup_dir.join(stamp);
        let mut candidate = dir.join(&base);
        let mut n = 1;
        while candidate.symlink_metadata().is_ok() {
            let mut name = base.clone();
            name.push(format!(".{n}"));
            candidate = dir.join(name);
            n += 1;
        }
        candidate
    }

    /// Copy `path` into the store and record it, returning the copy's path.
    ///
    /// Directories are copied recursively. Symlinks are followed.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read, the copy fails, or the
    /// index cannot be written.
    pub fn backup(&self, path: &Path) -> Result<PathBuf, FsError> {
        let meta = fs::metadata(path).fs_op("inspect", path)?;
        let backup_path = self.allocate(path);
        copy_any(path, &backup_path)?;

        let mut index = self.lock();
        index.entries.insert(
            path.to_path_buf(),
            BackupEntry {
                original_path: path.to_path_buf(),
                backup_path: backup_path.clone(),
                backed_up_at: Utc::now(),
                is_dir: meta.is_dir(),
            },
        );
        self.save(&index)?;
        tracing::debug!("backed up {} to {}", path.display(), backup_path.display());
        Ok(backup_path)
    }

    /// Put the recorded copy of `path` back in place and forget it.
    ///
    /// Whatever currently lives at `path` is removed first.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NoBackup`] when nothing is recorded for `path`, or an
    /// I/O error if the swap fails.
    pub fn restore(&self, path: &Path) -> Result<(), FsError> {
        let mut index = self.lock();
        let entry = index
            .entries
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NoBackup {
                path: path.to_path_buf(),
            })?;

        remove_path(path)?;
        copy_any(&entry.backup_path, path)?;

        index.entries.remove(path);
        self.save(&index)?;
        tracing::info!("restored {}", path.display());
        Ok(())
    }

    /// Whether a copy of `path` is recorded.
    #[must_use]
    pub fn has_backup(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    /// Every recorded backup, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<BackupEntry> {
        let mut entries: Vec<BackupEntry> = self.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.backed_up_at
                .cmp(&a.backed_up_at)
                .then_with(|| a.original_path.cmp(&b.original_path))
        });
        entries
    }

    /// Delete backups taken more than `older_than` ago, with their copies.
    ///
    /// Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a copy cannot be deleted or the index cannot be
    /// written.
    pub fn clean(&self, older_than: Duration) -> Result<usize, FsError> {
        let Some(cutoff) = TimeDelta::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let mut index = self.lock();
        let expired: Vec<PathBuf> = index
            .entries
            .iter()
            .filter(|(_, entry)| entry.backed_up_at < cutoff)
            .map(|(path, _)| path.clone())
            .collect();

        for path in &expired {
            if let Some(entry) = index.entries.remove(path) {
                remove_path(&entry.backup_path)?;
            }
        }
        if !expired.is_empty() {
            self.save(&index)?;
        }
        Ok(expired.len())
    }
}
