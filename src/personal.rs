//! Per-user values kept outside the repository (`personal.yaml`).
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::ConfigError;
use crate::template::TemplateValues;

/// Identity used in rendered templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// GitHub handle.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub github: String,
    /// Commit signing key.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signing_key: String,
}

/// Contents of `personal.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalConfig {
    /// Identity.
    pub user: UserInfo,
    /// Extra template values; scalar entries only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, Value>,
}

impl PersonalConfig {
    /// Load `path`; a missing file yields empty values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Whether the fields templates commonly need are filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.name.is_empty() && !self.user.email.is_empty()
    }

    /// Non-empty values as `user.*` keys, followed by scalar overrides.
    #[must_use]
    pub fn to_values(&self) -> TemplateValues {
        let mut values = TemplateValues::new();
        let user = [
            ("user.name", &self.user.name),
            ("user.email", &self.user.email),
            ("user.github", &self.user.github),
            ("user.signing_key", &self.user.signing_key),
        ];
        for (key, value) in user {
            if !value.is_empty() {
                values.insert(key.to_string(), value.clone());
            }
        }
        for (key, value) in &self.overrides {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            values.entry(key.clone()).or_insert(text);
        }
        values
    }
}
