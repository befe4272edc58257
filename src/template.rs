//! `<<dotts:key>>` placeholder rendering.
//!
//! Keys match `[a-z][a-z0-9_.]*`. A placeholder whose key is unknown or maps
//! to an empty value is left verbatim in the output.
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Values substituted into templates, keyed by dotted identifier.
pub type TemplateValues = BTreeMap<String, String>;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<<dotts:([a-z][a-z0-9_.]*)>>").expect("placeholder pattern is valid")
});

fn lookup<'v>(values: &'v TemplateValues, key: &str) -> Option<&'v str> {
    values
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Substitute every known placeholder in `content`.
#[must_use]
pub fn render(content: &str, values: &TemplateValues) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            caps.get(1)
                .and_then(|key| lookup(values, key.as_str()))
                .unwrap_or(whole)
                .to_string()
        })
        .into_owned()
}

/// Whether `content` contains at least one placeholder.
#[must_use]
pub fn has_placeholders(content: &str) -> bool {
    PLACEHOLDER.is_match(content)
}

/// Placeholder keys in `content`, unique, in first-seen order.
#[must_use]
pub fn extract_placeholders(content: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(content) {
        if let Some(key) = caps.get(1)
            && !keys.iter().any(|k| k == key.as_str())
        {
            keys.push(key.as_str().to_string());
        }
    }
    keys
}

/// Placeholder keys in `content` that `values` cannot fill.
#[must_use]
pub fn missing_keys(content: &str, values: &TemplateValues) -> Vec<String> {
    extract_placeholders(content)
        .into_iter()
        .filter(|key| lookup(values, key).is_none())
        .collect()
}
