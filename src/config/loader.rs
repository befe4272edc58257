//! Repository loader: reads profiles, machines, package groups and config bundles.
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::schema::{Machine, PackageManifest, Profile, RepoConfig};
use crate::error::{ConfigError, RecordKind};

const PROFILES_DIR: &str = "profiles";
const MACHINES_DIR: &str = "machines";
const PACKAGES_DIR: &str = "packages";
const CONFIGS_DIR: &str = "configs";

/// Read-only view of a configuration repository on disk.
#[derive(Debug, Clone)]
pub struct Loader {
    root: PathBuf,
}

/// Parse a YAML file into `T`. An empty file yields `T::default()`.
fn load_yaml<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Names of the `.yaml`/`.yml` files in `dir`, sorted. A missing directory is empty.
fn list_yaml_names(dir: &Path) -> Result<Vec<String>, ConfigError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

impl Loader {
    /// Create a loader for the repository rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate `<dir>/<name>.yaml` (or `.yml`).
    fn record_path(&self, dir: &str, name: &str) -> Option<PathBuf> {
        ["yaml", "yml"]
            .iter()
            .map(|ext| self.root.join(dir).join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }

    fn require(&self, kind: RecordKind, dir: &str, name: &str) -> Result<PathBuf, ConfigError> {
        self.record_path(dir, name)
            .ok_or_else(|| ConfigError::NotFound {
                kind,
                name: name.to_string(),
                path: self.root.join(dir).join(format!("{name}.yaml")),
                chain: Vec::new(),
            })
    }

    /// Load `config.yaml`, or defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_repo_config(&self) -> Result<RepoConfig, ConfigError> {
        let path = self.root.join("config.yaml");
        if !path.is_file() {
            return Ok(RepoConfig::default());
        }
        load_yaml(&path)
    }

    /// Load `profiles/<name>.yaml`. The returned profile's name is `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, or a parse error.
    pub fn load_profile(&self, name: &str) -> Result<Profile, ConfigError> {
        let path = self.require(RecordKind::Profile, PROFILES_DIR, name)?;
        let mut profile: Profile = load_yaml(&path)?;
        profile.name = name.to_string();
        Ok(profile)
    }

    /// Load `machines/<name>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, or a parse error.
    pub fn load_machine(&self, name: &str) -> Result<Machine, ConfigError> {
        let path = self.require(RecordKind::Machine, MACHINES_DIR, name)?;
        load_yaml(&path)
    }

    /// Load `packages/<name>.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, or a parse error.
    pub fn load_packages(&self, name: &str) -> Result<PackageManifest, ConfigError> {
        let path = self.require(RecordKind::PackageGroup, PACKAGES_DIR, name)?;
        load_yaml(&path)
    }

    /// Names of all profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if `profiles/` exists but cannot be read.
    pub fn list_profiles(&self) -> Result<Vec<String>, ConfigError> {
        list_yaml_names(&self.root.join(PROFILES_DIR))
    }

    /// Names of all machines.
    ///
    /// # Errors
    ///
    /// Returns an error if `machines/` exists but cannot be read.
    pub fn list_machines(&self) -> Result<Vec<String>, ConfigError> {
        list_yaml_names(&self.root.join(MACHINES_DIR))
    }

    /// Names of all package groups.
    ///
    /// # Errors
    ///
    /// Returns an error if `packages/` exists but cannot be read.
    pub fn list_package_manifests(&self) -> Result<Vec<String>, ConfigError> {
        list_yaml_names(&self.root.join(PACKAGES_DIR))
    }

    /// Names of all config bundles (directories under `configs/`), sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if `configs/` exists but cannot be read.
    pub fn list_configs(&self) -> Result<Vec<String>, ConfigError> {
        let dir = self.root.join(CONFIGS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ConfigError::Io { path: dir, source }),
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(ToString::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Directory of config bundle `name` (may not exist).
    #[must_use]
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.root.join(CONFIGS_DIR).join(name)
    }

    /// Whether config bundle `name` exists.
    #[must_use]
    pub fn config_exists(&self, name: &str) -> bool {
        self.config_path(name).is_dir()
    }

    /// Whether profile `name` exists.
    #[must_use]
    pub fn profile_exists(&self, name: &str) -> bool {
        self.record_path(PROFILES_DIR, name).is_some()
    }

    /// Whether machine `name` exists.
    #[must_use]
    pub fn machine_exists(&self, name: &str) -> bool {
        self.record_path(MACHINES_DIR, name).is_some()
    }

    /// Whether package group `name` exists.
    #[must_use]
    pub fn packages_exist(&self, name: &str) -> bool {
        self.record_path(PACKAGES_DIR, name).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_repo_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Loader::new(dir.path()).load_repo_config().unwrap();
        assert_eq!(config.name, "dotfiles");
        assert_eq!(config.version, "1.0.0");
    }

    #[test]
    fn profile_name_comes_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "profiles/base.yaml", "name: other\nconfigs: [git]\n");
        let profile = Loader::new(dir.path()).load_profile("base").unwrap();
        assert_eq!(profile.name, "base");
        assert_eq!(profile.configs, vec!["git"]);
    }

    #[test]
    fn yml_extension_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "machines/laptop.yml", "inherits: [base]\n");
        let loader = Loader::new(dir.path());
        assert!(loader.machine_exists("laptop"));
        assert_eq!(loader.load_machine("laptop").unwrap().inherits, vec!["base"]);
    }

    #[test]
    fn empty_file_is_default_record() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "packages/empty.yaml", "");
        let manifest = Loader::new(dir.path()).load_packages("empty").unwrap();
        assert_eq!(manifest, PackageManifest::default());
    }

    #[test]
    fn missing_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Loader::new(dir.path()).load_profile("ghost").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotFound {
                kind: RecordKind::Profile,
                ..
            }
        ));
    }

    #[test]
    fn malformed_yaml_is_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "profiles/bad.yaml", "inherits: [unterminated\n");
        let err = Loader::new(dir.path()).load_profile("bad").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn listings_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "profiles/zeta.yaml", "");
        write(dir.path(), "profiles/alpha.yml", "");
        write(dir.path(), "profiles/notes.txt", "");
        fs::create_dir_all(dir.path().join("configs/zsh")).unwrap();
        fs::create_dir_all(dir.path().join("configs/git")).unwrap();
        write(dir.path(), "configs/README", "");

        let loader = Loader::new(dir.path());
        assert_eq!(loader.list_profiles().unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(loader.list_configs().unwrap(), vec!["git", "zsh"]);
        assert!(loader.list_machines().unwrap().is_empty());
        assert!(loader.config_exists("git"));
        assert!(!loader.config_exists("README"));
    }
}
