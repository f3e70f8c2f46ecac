// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper instance cache.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::lock;

/// Instances of one helper kind, keyed by identity key
/// (helper name plus a fingerprint of its constructor options).
pub struct HelperCache<T: Clone> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T: Clone> HelperCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        lock::read(&self.entries).get(key).cloned()
    }

    /// Return the cached instance for `key`, or construct and cache one.
    ///
    /// `construct` runs without holding the lock. If two callers race on the
    /// same key, the first insert wins and both receive that instance.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, construct: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let built = construct()?;
        Ok(lock::write(&self.entries)
            .entry(key.to_string())
            .or_insert(built)
            .clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock::read(&self.entries).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock::read(&self.entries).is_empty()
    }
}

impl<T: Clone> Default for HelperCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
