// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature providers.
//!
//! A provider is what a registry resolves a name to. It comes in two styles:
//!
//! - **class**: a constructor producing a fresh [`FeatureProvider`] per
//!   feature instance, so the provider may keep per-instance state.
//! - **module**: a shared [`ProviderModule`], a table of exported methods
//!   plus declared capability lists. Lifecycle hooks are looked up among the
//!   exports by name.
//!
//! Both styles are driven through the [`FeatureProvider`] trait.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use skypager_core::{deep_merge_options, Options, SkypagerError};
use strum::Display;

use crate::feature::Feature;
use crate::interface::MixinOverrides;
use crate::method::{Invocation, Method, Receiver};

/// Export a module calls after a successful `enable()`.
pub const FEATURE_WAS_ENABLED: &str = "featureWasEnabled";

/// Export a module uses to compute its initial state asynchronously.
pub const INITIAL_STATE_ASYNC: &str = "initialStateAsync";

/// Lifecycle contract every feature provider implements.
///
/// Every method has a default, so a provider only overrides the hooks it
/// needs.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    /// Host method names this feature wants grafted onto itself.
    fn host_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Method names this feature grafts onto the host.
    fn feature_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolve a method this provider exposes.
    fn method(&self, _name: &str) -> Option<Method> {
        None
    }

    fn is_supported(&self) -> bool {
        true
    }

    /// Overrides applied in both mixin directions.
    fn mixin_options(&self) -> MixinOverrides {
        MixinOverrides::default()
    }

    /// Overrides applied when host methods are grafted onto the feature.
    fn host_mixin_options(&self) -> MixinOverrides {
        MixinOverrides::default()
    }

    /// Overrides applied when feature methods are grafted onto the host.
    fn feature_mixin_options(&self) -> MixinOverrides {
        MixinOverrides::default()
    }

    /// Called once, synchronously, right after the feature is constructed.
    fn initialize(&self, _feature: &Feature) -> Result<(), SkypagerError> {
        Ok(())
    }

    fn has_initial_state(&self) -> bool {
        false
    }

    /// State merged into the feature's state store after construction.
    async fn initial_state(&self, _feature: &Feature) -> Result<Option<Options>, SkypagerError> {
        Ok(None)
    }

    /// Lifecycle hook awaited by every `enable()` that is not short-circuited.
    async fn feature_was_enabled(
        &self,
        _feature: &Feature,
        _cfg: Option<&Value>,
        _options: &Options,
    ) -> Result<(), SkypagerError> {
        Ok(())
    }
}

/// How a provider was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderStyle {
    Class,
    Module,
}

type ClassConstructor = dyn Fn() -> Arc<dyn FeatureProvider> + Send + Sync;
type Initializer = dyn Fn(&Feature) -> Result<(), SkypagerError> + Send + Sync;

/// A resolved provider, as stored in a registry.
#[derive(Clone)]
pub enum Provider {
    Class(Arc<ClassConstructor>),
    Module(Arc<ProviderModule>),
}

impl Provider {
    /// A class-style provider. `constructor` runs once per feature instance.
    pub fn class<P, F>(constructor: F) -> Self
    where
        P: FeatureProvider + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Provider::Class(Arc::new(move || Arc::new(constructor()) as Arc<dyn FeatureProvider>))
    }

    /// A module-style provider shared by every instance.
    pub fn module(module: ProviderModule) -> Self {
        Provider::Module(Arc::new(module))
    }

    pub fn style(&self) -> ProviderStyle {
        match self {
            Provider::Class(_) => ProviderStyle::Class,
            Provider::Module(_) => ProviderStyle::Module,
        }
    }

    /// Produce the lifecycle object for one feature instance.
    pub fn instantiate(&self) -> Arc<dyn FeatureProvider> {
        match self {
            Provider::Class(constructor) => constructor(),
            Provider::Module(module) => Arc::new(ModuleAdapter(module.clone())),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Class(_) => f.write_str("Provider::Class"),
            Provider::Module(module) => f.debug_tuple("Provider::Module").field(module).finish(),
        }
    }
}

/// A table of exported methods with declared capabilities.
#[derive(Clone)]
pub struct ProviderModule {
    host_methods: Vec<String>,
    feature_methods: Vec<String>,
    exports: BTreeMap<String, Method>,
    initial_state: Option<Options>,
    initializer: Option<Arc<Initializer>>,
    supported: bool,
    mixin_options: MixinOverrides,
    host_mixin_options: MixinOverrides,
    feature_mixin_options: MixinOverrides,
}

impl Default for ProviderModule {
    fn default() -> Self {
        Self {
            host_methods: Vec::new(),
            feature_methods: Vec::new(),
            exports: BTreeMap::new(),
            initial_state: None,
            initializer: None,
            supported: true,
            mixin_options: MixinOverrides::default(),
            host_mixin_options: MixinOverrides::default(),
            feature_mixin_options: MixinOverrides::default(),
        }
    }
}

impl ProviderModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_methods = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_feature_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_methods = names.into_iter().map(Into::into).collect();
        self
    }

    /// Export a method under `name`. Lifecycle hooks are exports too.
    pub fn export(mut self, name: impl Into<String>, method: Method) -> Self {
        self.exports.insert(name.into(), method);
        self
    }

    pub fn with_initial_state(mut self, state: Options) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Feature) -> Result<(), SkypagerError> + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    pub fn with_supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    pub fn with_mixin_options(mut self, overrides: MixinOverrides) -> Self {
        self.mixin_options = overrides;
        self
    }

    pub fn with_host_mixin_options(mut self, overrides: MixinOverrides) -> Self {
        self.host_mixin_options = overrides;
        self
    }

    pub fn with_feature_mixin_options(mut self, overrides: MixinOverrides) -> Self {
        self.feature_mixin_options = overrides;
        self
    }

    pub fn host_methods(&self) -> &[String] {
        &self.host_methods
    }

    pub fn feature_methods(&self) -> &[String] {
        &self.feature_methods
    }

    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        self.exports.get(name)
    }
}

impl fmt::Debug for ProviderModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderModule")
            .field("host_methods", &self.host_methods)
            .field("feature_methods", &self.feature_methods)
            .field("exports", &self.exports.keys().collect::<Vec<_>>())
            .field("initial_state", &self.initial_state)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}

/// Drives a [`ProviderModule`] through the lifecycle trait.
struct ModuleAdapter(Arc<ProviderModule>);

#[async_trait]
impl FeatureProvider for ModuleAdapter {
    fn host_methods(&self) -> Vec<String> {
        self.0.host_methods.clone()
    }

    fn feature_methods(&self) -> Vec<String> {
        self.0.feature_methods.clone()
    }

    fn method(&self, name: &str) -> Option<Method> {
        self.0.exports.get(name).cloned()
    }

    fn is_supported(&self) -> bool {
        self.0.supported
    }

    fn mixin_options(&self) -> MixinOverrides {
        self.0.mixin_options.clone()
    }

    fn host_mixin_options(&self) -> MixinOverrides {
        self.0.host_mixin_options.clone()
    }

    fn feature_mixin_options(&self) -> MixinOverrides {
        self.0.feature_mixin_options.clone()
    }

    fn initialize(&self, feature: &Feature) -> Result<(), SkypagerError> {
        match &self.0.initializer {
            Some(initializer) => initializer(feature),
            None => Ok(()),
        }
    }

    fn has_initial_state(&self) -> bool {
        self.0.initial_state.is_some() || self.0.exports.contains_key(INITIAL_STATE_ASYNC)
    }

    async fn initial_state(&self, feature: &Feature) -> Result<Option<Options>, SkypagerError> {
        let Some(export) = self.0.exports.get(INITIAL_STATE_ASYNC) else {
            return Ok(self.0.initial_state.clone());
        };

        let invocation = Invocation::new(
            Receiver::Feature(feature.clone()),
            vec![feature.context().clone()],
        );
        let computed = match export.call(invocation).await? {
            Value::Null => Options::new(),
            Value::Object(map) => map,
            other => {
                return Err(SkypagerError::lifecycle(
                    feature.name(),
                    format!("{INITIAL_STATE_ASYNC} returned {other}, expected an object"),
                ));
            }
        };

        Ok(Some(match &self.0.initial_state {
            Some(base) => deep_merge_options(&computed, base),
            None => computed,
        }))
    }

    async fn feature_was_enabled(
        &self,
        feature: &Feature,
        cfg: Option<&Value>,
        options: &Options,
    ) -> Result<(), SkypagerError> {
        let Some(hook) = self.0.exports.get(FEATURE_WAS_ENABLED) else {
            return Ok(());
        };

        let args = vec![
            cfg.cloned().unwrap_or(Value::Null),
            Value::Object(options.clone()),
            feature.context().clone(),
        ];
        hook.call(Invocation::new(Receiver::Feature(feature.clone()), args))
            .await
            .map(|_| ())
    }
}
