use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration for a [`crate::store::WildcardStore`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Maximum number of undo checkpoints kept (default 50)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Undo/redo diffs with at least this many changes trigger a full reset
    /// instead of a patch (default 50)
    #[serde(default = "default_patch_threshold")]
    pub patch_threshold: usize,

    /// Buffered events per subscriber before the slowest one lags (default 100)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Namespace for persisted keys (default "wildcards")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Optional byte cap for the file backend
    #[serde(default)]
    pub quota_bytes: Option<u64>,
}

fn default_history_limit() -> usize { 50 }
fn default_patch_threshold() -> usize { 50 }
fn default_event_capacity() -> usize { 100 }
fn default_key_prefix() -> String { "wildcards".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            patch_threshold: default_patch_threshold(),
            event_capacity: default_event_capacity(),
            key_prefix: default_key_prefix(),
            quota_bytes: None,
        }
    }
}

impl StoreConfig {
    /// Defaults overlaid with `WILDCARD_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.clamped())
    }

    /// Overlay variables looked up through `lookup`. Unparsable values are
    /// skipped with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(limit) = parse_var(&lookup, "WILDCARD_HISTORY_LIMIT") {
            self.history_limit = limit;
        }
        if let Some(threshold) = parse_var(&lookup, "WILDCARD_PATCH_THRESHOLD") {
            self.patch_threshold = threshold;
        }
        if let Some(capacity) = parse_var(&lookup, "WILDCARD_EVENT_CAPACITY") {
            self.event_capacity = capacity;
        }
        if let Some(prefix) = lookup("WILDCARD_KEY_PREFIX").filter(|p| !p.trim().is_empty()) {
            self.key_prefix = prefix;
        }
        if let Some(quota) = parse_var(&lookup, "WILDCARD_QUOTA_BYTES") {
            self.quota_bytes = Some(quota);
        }
        *self = self.clone().clamped();
    }

    fn clamped(mut self) -> Self {
        self.history_limit = self.history_limit.max(1);
        self.event_capacity = self.event_capacity.max(1);
        self
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.patch_threshold, 50);
        assert_eq!(config.event_capacity, 100);
        assert_eq!(config.key_prefix, "wildcards");
        assert_eq!(config.quota_bytes, None);
    }

    #[test]
    fn env_overlay_skips_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("WILDCARD_HISTORY_LIMIT", "0"),
            ("WILDCARD_PATCH_THRESHOLD", "ten"),
            ("WILDCARD_KEY_PREFIX", "mine"),
            ("WILDCARD_QUOTA_BYTES", "4096"),
        ]
        .into_iter()
        .collect();
        let mut config = StoreConfig::default();
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.history_limit, 1);
        assert_eq!(config.patch_threshold, 50);
        assert_eq!(config.key_prefix, "mine");
        assert_eq!(config.quota_bytes, Some(4096));
    }

    #[test]
    fn json_file_uses_defaults_for_missing_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "history_limit": 5 }"#).unwrap();
        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.patch_threshold, 50);

        std::fs::write(&path, "not json").unwrap();
        assert!(StoreConfig::from_json_file(&path).is_err());
    }
}
