//! XDG application directories.
use std::path::{Path, PathBuf};

const APP_NAME: &str = "dotts";

/// Resolve an XDG base directory from `var`, falling back to `$HOME/<fallback>`.
fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map_or_else(
            || {
                std::env::var_os("HOME")
                    .map_or_else(|| PathBuf::from("."), PathBuf::from)
                    .join(fallback)
            },
            PathBuf::from,
        )
}

/// Directories owned by dotts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// `$XDG_DATA_HOME/dotts`: state, manifest, backups.
    pub data_dir: PathBuf,
    /// `$XDG_CONFIG_HOME/dotts`: repository checkout and personal values.
    pub config_dir: PathBuf,
    /// `$XDG_CACHE_HOME/dotts`: log files.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    /// Resolve directories from the XDG environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            data_dir: xdg_dir("XDG_DATA_HOME", ".local/share").join(APP_NAME),
            config_dir: xdg_dir("XDG_CONFIG_HOME", ".config").join(APP_NAME),
            cache_dir: xdg_dir("XDG_CACHE_HOME", ".cache").join(APP_NAME),
        }
    }

    /// Place every directory under `root` (`data/`, `config/`, `cache/`).
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
        }
    }

    /// `state.json`
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    /// `manifest.json`
    #[must_use]
    pub fn manifest_file(&self) -> PathBuf {
        self.data_dir.join("manifest.json")
    }

    /// Root of the timestamped backup copies.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// `backup-index.json`
    #[must_use]
    pub fn backup_index_file(&self) -> PathBuf {
        self.data_dir.join("backup-index.json")
    }

    /// Default location of the cloned configuration repository.
    #[must_use]
    pub fn repo_dir(&self) -> PathBuf {
        self.config_dir.join("repo")
    }

    /// `personal.yaml`
    #[must_use]
    pub fn personal_file(&self) -> PathBuf {
        self.config_dir.join("personal.yaml")
    }

    /// Log file for `command`.
    #[must_use]
    pub fn log_file(&self, command: &str) -> PathBuf {
        self.cache_dir.join(format!("{command}.log"))
    }
}
