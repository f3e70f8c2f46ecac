// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider registry.
//!
//! A `Registry` maps helper names to provider factories. Each helper kind
//! owns one registry per runtime. Registries can be backed by a
//! [`ModuleContext`], an in-memory namespace of providers that is consulted
//! when no explicit registration matches.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use skypager_core::SkypagerError;
use tracing::debug;

use crate::lock;
use crate::provider::Provider;

/// Factory producing a provider on lookup.
pub type ProviderFactory = Arc<dyn Fn() -> Provider + Send + Sync>;

/// Extensions stripped from context keys and lookup names.
const MODULE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".ts", ".json"];

/// A namespace of providers a registry can be scoped to.
pub trait ModuleContext: Send + Sync {
    /// Raw keys in this context (e.g. `./git.js`).
    fn keys(&self) -> Vec<String>;

    /// Resolve a raw key to its provider.
    fn resolve(&self, key: &str) -> Option<Provider>;
}

/// Purely in-memory [`ModuleContext`].
#[derive(Clone, Default)]
pub struct MockContext {
    modules: BTreeMap<String, Provider>,
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, provider: Provider) -> Self {
        self.modules.insert(key.into(), provider);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, provider: Provider) {
        self.modules.insert(key.into(), provider);
    }
}

impl ModuleContext for MockContext {
    fn keys(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    fn resolve(&self, key: &str) -> Option<Provider> {
        self.modules.get(key).cloned()
    }
}

/// Build an empty in-memory context with the given providers.
pub fn create_mock_context<I, K>(modules: I) -> MockContext
where
    I: IntoIterator<Item = (K, Provider)>,
    K: Into<String>,
{
    modules
        .into_iter()
        .fold(MockContext::new(), |ctx, (key, provider)| ctx.with(key, provider))
}

/// Registry of provider factories, keyed by helper name.
pub struct Registry {
    name: String,
    strict: AtomicBool,
    factories: RwLock<BTreeMap<String, ProviderFactory>>,
    context: Option<Arc<dyn ModuleContext>>,
}

impl Registry {
    /// Create an empty registry. `name` is its namespace (e.g. `features`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strict: AtomicBool::new(false),
            factories: RwLock::new(BTreeMap::new()),
            context: None,
        }
    }

    /// Create a registry backed by a module context.
    pub fn with_context(name: impl Into<String>, context: impl ModuleContext + 'static) -> Self {
        Self {
            context: Some(Arc::new(context)),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_strict(&self) -> bool {
        self.strict.load(Ordering::Relaxed)
    }

    /// In strict mode `register` refuses to overwrite an existing name.
    pub fn set_strict(&self, strict: bool) {
        self.strict.store(strict, Ordering::Relaxed);
    }

    /// Register a factory under `name`. The last registration wins unless
    /// the registry is strict.
    pub fn register<F>(&self, name: impl AsRef<str>, factory: F) -> Result<(), SkypagerError>
    where
        F: Fn() -> Provider + Send + Sync + 'static,
    {
        let key = self.normalize(name.as_ref());
        let mut factories = lock::write(&self.factories);
        if factories.contains_key(&key) {
            if self.is_strict() {
                return Err(SkypagerError::DuplicateName {
                    registry: self.name.clone(),
                    name: key,
                });
            }
            debug!(registry = %self.name, name = %key, "replacing existing registration");
        }
        factories.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Register an already-built provider.
    pub fn register_provider(
        &self,
        name: impl AsRef<str>,
        provider: Provider,
    ) -> Result<(), SkypagerError> {
        self.register(name, move || provider.clone())
    }

    /// The factory registered under `name`, without calling it.
    pub fn factory(&self, name: &str) -> Option<ProviderFactory> {
        lock::read(&self.factories).get(&self.normalize(name)).cloned()
    }

    /// Resolve `name` to a provider, or `None` if nothing matches.
    ///
    /// Explicit registrations are checked first, then the module context.
    pub fn lookup(&self, name: &str) -> Option<Provider> {
        let key = self.normalize(name);
        if let Some(factory) = self.factory(&key) {
            return Some(factory());
        }

        let context = self.context.as_ref()?;
        context
            .keys()
            .into_iter()
            .find(|raw| self.normalize(raw) == key)
            .and_then(|raw| context.resolve(&raw))
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = self.normalize(name);
        lock::read(&self.factories).contains_key(&key)
            || self
                .context
                .as_ref()
                .is_some_and(|ctx| ctx.keys().iter().any(|raw| self.normalize(raw) == key))
    }

    /// Every resolvable name, sorted and deduplicated.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = lock::read(&self.factories).keys().cloned().collect();
        if let Some(context) = &self.context {
            names.extend(context.keys().iter().map(|raw| self.normalize(raw)));
        }
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.available().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical form of a lookup name or context key.
    ///
    /// `./git.js`, `features/git` and `git/index.js` all resolve to `git` in
    /// the `features` registry.
    fn normalize(&self, raw: &str) -> String {
        let mut key = raw.trim().trim_start_matches("./");
        if let Some(rest) = key
            .strip_prefix(self.name.as_str())
            .and_then(|r| r.strip_prefix('/'))
        {
            key = rest;
        }
        for ext in MODULE_EXTENSIONS {
            if let Some(stripped) = key.strip_suffix(ext) {
                key = stripped;
                break;
            }
        }
        key.strip_suffix("/index").unwrap_or(key).to_string()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("strict", &self.is_strict())
            .field("available", &self.available())
            .finish()
    }
}
