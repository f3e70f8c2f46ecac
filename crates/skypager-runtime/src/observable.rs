// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A string-keyed map that broadcasts every change to subscribers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::lock;

const CHANNEL_CAPACITY: usize = 64;

/// A single change to an [`ObservableMap`].
#[derive(Debug, Clone)]
pub struct MapChange<V> {
    pub key: String,
    pub previous: Option<V>,
    /// `None` when the key was removed.
    pub value: Option<V>,
}

/// Map with change notification.
///
/// Writers never block on subscribers; a subscriber that falls more than
/// the channel capacity behind receives `RecvError::Lagged`.
pub struct ObservableMap<V: Clone> {
    entries: RwLock<BTreeMap<String, V>>,
    changes: broadcast::Sender<MapChange<V>>,
}

impl<V: Clone + Send + 'static> ObservableMap<V> {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        lock::read(&self.entries).get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        lock::read(&self.entries).contains_key(key)
    }

    /// Insert or overwrite `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let previous = lock::write(&self.entries).insert(key.clone(), value.clone());
        self.notify(MapChange {
            key,
            previous: previous.clone(),
            value: Some(value),
        });
        previous
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let previous = lock::write(&self.entries).remove(key);
        if previous.is_some() {
            self.notify(MapChange {
                key: key.to_string(),
                previous: previous.clone(),
                value: None,
            });
        }
        previous
    }

    pub fn keys(&self) -> Vec<String> {
        lock::read(&self.entries).keys().cloned().collect()
    }

    /// A point-in-time copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, V> {
        lock::read(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock::read(&self.entries).is_empty()
    }

    /// Receive every change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MapChange<V>> {
        self.changes.subscribe()
    }

    fn notify(&self, change: MapChange<V>) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }
}

impl<V: Clone + Send + 'static> Default for ObservableMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + fmt::Debug> fmt::Debug for ObservableMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(lock::read(&self.entries).iter()).finish()
    }
}
