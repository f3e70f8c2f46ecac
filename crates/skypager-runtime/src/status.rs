// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime-wide feature status map.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;
use skypager_core::{FeatureState, Options, SkypagerError};
use tokio::sync::broadcast;

use crate::observable::{MapChange, ObservableMap};

/// Outcome of the most recent enable attempt for one feature name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub cache_key: String,
    pub status: FeatureState,
    pub cfg: Option<Value>,
    pub options: Options,
    #[serde(
        serialize_with = "error_as_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<SkypagerError>,
}

impl StatusEntry {
    pub fn is_enabled(&self) -> bool {
        self.status == FeatureState::Enabled
    }
}

fn error_as_message<S: Serializer>(
    error: &Option<SkypagerError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Observable `feature name -> StatusEntry` map. One per runtime; created
/// on first access and never reset.
#[derive(Debug, Default)]
pub struct FeatureStatusMap {
    entries: ObservableMap<StatusEntry>,
}

impl FeatureStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<StatusEntry> {
        self.entries.get(name)
    }

    /// Record an attempt, replacing any earlier entry for `name`.
    pub fn set(&self, name: impl Into<String>, entry: StatusEntry) -> Option<StatusEntry> {
        self.entries.insert(name, entry)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|e| e.is_enabled())
    }

    /// True if `name` is enabled and was enabled with `cache_key`.
    pub fn enabled_with_key(&self, name: &str, cache_key: &str) -> bool {
        self.get(name)
            .is_some_and(|e| e.is_enabled() && e.cache_key == cache_key)
    }

    /// Names of every enabled feature, sorted.
    pub fn enabled(&self) -> Vec<String> {
        self.entries
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| entry.is_enabled())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, StatusEntry> {
        self.entries.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MapChange<StatusEntry>> {
        self.entries.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(key: &str, status: FeatureState) -> StatusEntry {
        StatusEntry {
            cache_key: key.into(),
            status,
            cfg: None,
            options: Options::new(),
            error: None,
        }
    }

    #[test]
    fn enabled_with_key_requires_matching_key() {
        let map = FeatureStatusMap::new();
        map.set("git", entry("git:aa", FeatureState::Enabled));

        assert!(map.enabled_with_key("git", "git:aa"));
        assert!(!map.enabled_with_key("git", "git:bb"));
        assert!(!map.enabled_with_key("fs", "git:aa"));
    }

    #[test]
    fn failed_entries_are_not_enabled() {
        let map = FeatureStatusMap::new();
        map.set("git", entry("git:aa", FeatureState::Enabled));
        map.set("fs", entry("fs:aa", FeatureState::Failed));

        assert_eq!(map.enabled(), vec!["git"]);
        assert!(!map.is_enabled("fs"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn entry_serializes_error_as_message() {
        let mut failed = entry("git:aa", FeatureState::Failed);
        failed.error = Some(SkypagerError::lifecycle("git", "no repository"));
        failed.cfg = Some(json!({"remote": "origin"}));

        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            value,
            json!({
                "cacheKey": "git:aa",
                "status": "failed",
                "cfg": {"remote": "origin"},
                "options": {},
                "error": "feature git failed: no repository",
            })
        );

        let ok = serde_json::to_value(entry("git:aa", FeatureState::Enabled)).unwrap();
        assert!(ok.get("error").is_none());
    }
}
