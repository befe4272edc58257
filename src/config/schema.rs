//! Repository record types and the resolver's output.
//!
//! Every field is optional on disk; absent keys deserialize to their defaults.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Arbitrary key to value settings, ordered by key.
pub type Settings = BTreeMap<String, Value>;

/// Repository-level metadata from `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Repository name.
    pub name: String,
    /// Author, free-form.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    /// One-line description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Repository version.
    pub version: String,
    /// Machine to apply when none is named.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_machine: Option<String>,
    /// Declared feature flags.
    pub features: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            name: "dotfiles".to_string(),
            author: String::new(),
            description: String::new(),
            version: "1.0.0".to_string(),
            default_machine: None,
            features: Vec::new(),
        }
    }
}

impl RepoConfig {
    /// Whether `feature` is declared.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Shell commands run around install and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scripts {
    /// Before packages are installed.
    pub pre_install: Vec<String>,
    /// After dotfiles are linked.
    pub post_install: Vec<String>,
    /// Before `dotts update`.
    pub pre_update: Vec<String>,
    /// After `dotts update`.
    pub post_update: Vec<String>,
}

impl Scripts {
    /// Append `other`'s commands after ours.
    pub fn extend(&mut self, other: &Self) {
        self.pre_install.extend(other.pre_install.iter().cloned());
        self.post_install.extend(other.post_install.iter().cloned());
        self.pre_update.extend(other.pre_update.iter().cloned());
        self.post_update.extend(other.post_update.iter().cloned());
    }

    /// True when no commands are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pre_install.is_empty()
            && self.post_install.is_empty()
            && self.pre_update.is_empty()
            && self.post_update.is_empty()
    }
}

/// `profiles/<name>.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Profile name; always the file stem, whatever the file says.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Parent profiles, resolved before this one.
    pub inherits: Vec<String>,
    /// Config bundles under `configs/` to deploy.
    pub configs: Vec<String>,
    /// Package groups under `packages/` to merge.
    pub packages: Vec<String>,
    /// Settings contributed by this profile.
    pub settings: Settings,
    /// Install and update hooks.
    pub scripts: Scripts,
}

/// Host metadata nested under `machine:` in a machine file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineInfo {
    /// Host name this machine file describes.
    pub hostname: String,
    /// Free-form description.
    pub description: String,
}

/// `machines/<name>.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Machine {
    /// Host metadata.
    pub machine: MachineInfo,
    /// Profiles this machine inherits, in order.
    pub inherits: Vec<String>,
    /// Settings that override anything profile-derived.
    pub settings: Settings,
    /// Enabled features.
    pub features: Vec<String>,
}

/// Distribution-specific package lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPackages {
    /// pacman packages.
    pub arch: Vec<String>,
    /// apt packages on Debian (and Ubuntu fallback).
    pub debian: Vec<String>,
    /// apt packages on Ubuntu.
    pub ubuntu: Vec<String>,
    /// dnf packages.
    pub fedora: Vec<String>,
    /// Native macOS packages.
    pub darwin: Vec<String>,
}

/// `packages/<name>.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageManifest {
    /// Platform-independent nix packages.
    pub nix: Vec<String>,
    /// Per-distribution system packages.
    pub system: SystemPackages,
    /// Arch User Repository packages.
    pub aur: Vec<String>,
    /// Homebrew formulae.
    pub brew: Vec<String>,
    /// Homebrew casks.
    pub cask: Vec<String>,
    /// asdf tool versions.
    pub asdf: BTreeMap<String, String>,
}

/// Append the items of `other` not already in `into`, keeping first-seen order.
fn append_unique(into: &mut Vec<String>, other: &[String]) {
    for item in other {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

impl PackageManifest {
    /// Union-merge `other` into `self`.
    ///
    /// Lists keep first-seen order without duplicates; existing asdf versions
    /// are never overwritten.
    pub fn merge(&mut self, other: &Self) {
        append_unique(&mut self.nix, &other.nix);
        append_unique(&mut self.aur, &other.aur);
        append_unique(&mut self.brew, &other.brew);
        append_unique(&mut self.cask, &other.cask);
        append_unique(&mut self.system.arch, &other.system.arch);
        append_unique(&mut self.system.debian, &other.system.debian);
        append_unique(&mut self.system.ubuntu, &other.system.ubuntu);
        append_unique(&mut self.system.fedora, &other.system.fedora);
        append_unique(&mut self.system.darwin, &other.system.darwin);
        for (tool, version) in &other.asdf {
            self.asdf
                .entry(tool.clone())
                .or_insert_with(|| version.clone());
        }
    }
}

/// The flattened result of resolving a machine or a profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    /// Machine that was resolved, if any.
    pub machine: Option<String>,
    /// Host name recorded on the machine file.
    pub hostname: Option<String>,
    /// The most specific profile: the resolved profile itself, or the last
    /// profile a machine inherits.
    pub profile: Option<String>,
    /// Config bundles to deploy, ancestors first, without duplicates.
    pub configs: Vec<String>,
    /// Merged package manifest.
    pub packages: PackageManifest,
    /// Merged settings.
    pub settings: Settings,
    /// Features enabled by the machine.
    pub features: Vec<String>,
    /// Scripts concatenated in resolution order.
    pub scripts: Scripts,
}

impl ResolvedConfig {
    /// Append configs not already present.
    pub fn add_configs(&mut self, configs: &[String]) {
        append_unique(&mut self.configs, configs);
    }

    /// Settings flattened into dotted keys with string values.
    ///
    /// Nested mappings are joined with `.`; sequences and nulls are skipped.
    #[must_use]
    pub fn flat_settings(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.settings {
            flatten_value(key, value, &mut out);
        }
        out
    }
}

fn flatten_value(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Mapping(map) => {
            for (k, v) in map {
                if let Some(k) = k.as_str() {
                    flatten_value(&format!("{prefix}.{k}"), v, out);
                }
            }
        }
        Value::Tagged(tagged) => flatten_value(prefix, &tagged.value, out),
        Value::Null | Value::Sequence(_) => {}
    }
}
