// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observable key-value state attached to runtimes and features.

use serde_json::Value;
use skypager_core::{deep_merge, Options};
use tokio::sync::broadcast;

use crate::observable::{MapChange, ObservableMap};

#[derive(Debug, Default)]
pub struct StateStore {
    values: ObservableMap<Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    /// Deep-merge every entry of `overlay` into the store. Each changed key
    /// is broadcast separately.
    pub fn merge(&self, overlay: &Options) {
        for (key, value) in overlay {
            let merged = match self.values.get(key) {
                Some(existing) => deep_merge(value, &existing),
                None => value.clone(),
            };
            self.values.insert(key.clone(), merged);
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn snapshot(&self) -> Options {
        self.values.snapshot().into_iter().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MapChange<Value>> {
        self.values.subscribe()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
