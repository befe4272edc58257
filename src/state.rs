//! Persisted tool state (`state.json`).
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FsError, IoResultExt as _};
use crate::linker::fs::write_atomic;

const STATE_VERSION: &str = "1.0.0";

/// Where the configuration repository came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Cloned from a git remote.
    #[default]
    Git,
    /// A directory the user manages.
    Local,
}

/// The configuration repository in use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSource {
    /// Git remote or local directory.
    #[serde(rename = "type")]
    pub kind: SourceType,
    /// Remote URL, for git sources.
    pub url: String,
    /// Checkout directory.
    pub path: String,
    /// Tracked branch.
    pub branch: String,
    /// Last successful pull.
    pub last_pull: Option<DateTime<Utc>>,
    /// Commit checked out after the last pull.
    pub last_commit: String,
}

/// The machine most recently applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineState {
    /// Machine record name (empty when a bare profile was applied).
    pub name: String,
    /// Host name at apply time.
    pub hostname: String,
    /// Operating system at apply time.
    pub os: String,
    /// Distribution at apply time.
    pub distro: String,
    /// Most specific profile.
    pub profile: String,
}

/// Contents of `state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Schema version.
    pub version: String,
    /// Repository origin.
    pub config_source: ConfigSource,
    /// Last applied machine.
    pub machine: MachineState,
    /// User-level settings.
    pub settings: BTreeMap<String, serde_json::Value>,
    /// Enabled features.
    pub features: Vec<String>,
    /// When `apply` last completed.
    pub last_apply: Option<DateTime<Utc>>,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            config_source: ConfigSource::default(),
            machine: MachineState::default(),
            settings: BTreeMap::new(),
            features: Vec::new(),
            last_apply: None,
            path: PathBuf::new(),
        }
    }
}

impl State {
    /// Load state from `path`; a missing file yields fresh state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, FsError> {
        let mut state = match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str::<Self>(&content).map_err(|source| FsError::Json {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e).fs_op("read", path),
        };
        state.path = path.to_path_buf();
        Ok(state)
    }

    /// Write the state back to where it was loaded from, as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> Result<(), FsError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| FsError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json)
    }

    /// Whether a configuration repository has been recorded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.config_source.url.is_empty() || !self.config_source.path.is_empty()
    }

    /// Whether a machine has been applied.
    #[must_use]
    pub fn has_machine(&self) -> bool {
        !self.machine.name.is_empty()
    }

    /// Record the repository origin, clearing pull history.
    pub fn set_config_source(&mut self, kind: SourceType, url: &str, path: &Path, branch: &str) {
        self.config_source = ConfigSource {
            kind,
            url: url.to_string(),
            path: path.to_string_lossy().into_owned(),
            branch: branch.to_string(),
            last_pull: None,
            last_commit: String::new(),
        };
    }

    /// Record the machine that was applied.
    pub fn set_machine(&mut self, machine: MachineState) {
        self.machine = machine;
    }

    /// Stamp `last_apply` with the current time.
    pub fn mark_applied(&mut self) {
        self.last_apply = Some(Utc::now());
    }

    /// Record a successful pull that checked out `commit`.
    pub fn record_pull(&mut self, commit: &str) {
        self.config_source.last_pull = Some(Utc::now());
        self.config_source.last_commit = commit.to_string();
    }

    /// Enable `feature` once.
    pub fn add_feature(&mut self, feature: &str) {
        if !self.has_feature(feature) {
            self.features.push(feature.to_string());
        }
    }

    /// Whether `feature` is enabled.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}
