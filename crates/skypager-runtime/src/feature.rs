// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Features and their lifecycle.
//!
//! A [`Feature`] is the helper instance produced by the `feature` factory.
//! Calling [`Feature::enable`] runs the lifecycle:
//!
//! 1. merge the enable configuration over the current options,
//! 2. short-circuit if the runtime already records this feature as enabled
//!    with the resulting cache key,
//! 3. graft host methods onto the feature and feature methods onto the host,
//! 4. await the provider's `feature_was_enabled` hook,
//! 5. record the outcome in the runtime's feature status map.
//!
//! Enable attempts on one instance are serialized.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use heck::ToLowerCamelCase;
use serde_json::{json, Value};
use skypager_core::{
    deep_merge_options, fingerprint, FeaturePhase, FeatureState, Options, SkypagerError,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::builtin;
use crate::helper::{HelperKind, HelperSpec};
use crate::interface::{BoundMethod, Interface, MethodMap, MixinOptions};
use crate::lock;
use crate::method::{Invocation, MethodResult, Receiver, Scope};
use crate::provider::{FeatureProvider, ProviderStyle};
use crate::registry::Registry;
use crate::runtime::{Runtime, WeakRuntime};
use crate::state::StateStore;
use crate::status::StatusEntry;

/// The helper kind for features.
pub struct FeatureKind;

impl HelperKind for FeatureKind {
    type Instance = Feature;

    const KIND: &'static str = "Feature";
    const REGISTRY_PROP: &'static str = "features";
    const LOOKUP_PROP: &'static str = "feature";
    const ALLOW_ANONYMOUS_PROVIDERS: bool = true;

    fn create_registry() -> Result<Registry, SkypagerError> {
        let registry = Registry::new(Self::REGISTRY_PROP);
        builtin::register_all(&registry)?;
        Ok(registry)
    }

    fn construct(runtime: &Runtime, spec: HelperSpec) -> Result<Feature, SkypagerError> {
        Feature::construct(runtime, spec)
    }

    fn describe(feature: &Feature) -> Value {
        json!({
            "name": feature.name(),
            "uuid": feature.uuid(),
            "cacheKey": feature.cache_key(),
            "style": feature.style().to_string(),
            "phase": feature.phase().to_string(),
            "options": feature.options(),
        })
    }
}

struct FeatureInner {
    name: String,
    uuid: String,
    style: ProviderStyle,
    runtime: WeakRuntime,
    provider: Arc<dyn FeatureProvider>,
    options: RwLock<Options>,
    cache_key: RwLock<String>,
    context: Value,
    state: StateStore,
    interface: Interface,
    phase: RwLock<FeaturePhase>,
    initial_state: OnceCell<()>,
    initial_state_error: RwLock<Option<SkypagerError>>,
    enable_lock: Mutex<()>,
}

/// A feature instance. Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Feature {
    inner: Arc<FeatureInner>,
}

/// A non-owning handle to a [`Feature`].
#[derive(Clone)]
pub struct WeakFeature {
    inner: Weak<FeatureInner>,
}

impl WeakFeature {
    pub fn upgrade(&self) -> Option<Feature> {
        self.inner.upgrade().map(|inner| Feature { inner })
    }
}

impl fmt::Debug for WeakFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "WeakFeature({})", inner.name),
            None => f.write_str("WeakFeature(<released>)"),
        }
    }
}

impl Feature {
    fn construct(runtime: &Runtime, spec: HelperSpec) -> Result<Feature, SkypagerError> {
        let HelperSpec {
            name,
            provider,
            options,
        } = spec;

        let options = match runtime.config().feature_options(&name) {
            Some(project) => deep_merge_options(&options, project),
            None => options,
        };
        let cache_key = fingerprint(&name, &options);
        let context = json!({
            "feature": name,
            "runtime": runtime.name(),
            "runtimeId": runtime.uuid(),
        });

        let feature = Feature {
            inner: Arc::new(FeatureInner {
                uuid: Uuid::new_v4().to_string(),
                style: provider.style(),
                runtime: runtime.downgrade(),
                provider: provider.instantiate(),
                options: RwLock::new(options),
                cache_key: RwLock::new(cache_key),
                context,
                state: StateStore::new(),
                interface: Interface::new(),
                phase: RwLock::new(FeaturePhase::Resolved),
                initial_state: OnceCell::new(),
                initial_state_error: RwLock::new(None),
                enable_lock: Mutex::new(()),
                name,
            }),
        };

        feature.inner.provider.initialize(&feature)?;

        if feature.inner.provider.has_initial_state()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let pending = feature.clone();
            handle.spawn(async move { pending.ensure_initial_state().await });
        }

        debug!(
            feature = %feature.name(),
            uuid = %feature.uuid(),
            style = %feature.style(),
            "feature constructed"
        );
        Ok(feature)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn uuid(&self) -> &str {
        &self.inner.uuid
    }

    pub fn style(&self) -> ProviderStyle {
        self.inner.style
    }

    /// Current options: project config, factory options and every enable
    /// configuration merged in order.
    pub fn options(&self) -> Options {
        lock::read(&self.inner.options).clone()
    }

    /// Feature name plus a fingerprint of the current options.
    pub fn cache_key(&self) -> String {
        lock::read(&self.inner.cache_key).clone()
    }

    /// Ambient data passed as a partial argument to grafted methods.
    pub fn context(&self) -> &Value {
        &self.inner.context
    }

    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn phase(&self) -> FeaturePhase {
        *lock::read(&self.inner.phase)
    }

    fn set_phase(&self, phase: FeaturePhase) {
        *lock::write(&self.inner.phase) = phase;
    }

    pub fn runtime(&self) -> Result<Runtime, SkypagerError> {
        self.inner
            .runtime
            .upgrade()
            .ok_or_else(|| SkypagerError::ScopeReleased {
                name: self.inner.name.clone(),
            })
    }

    pub fn downgrade(&self) -> WeakFeature {
        WeakFeature {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Methods grafted onto this feature.
    pub fn interface(&self) -> &Interface {
        &self.inner.interface
    }

    pub fn host_methods(&self) -> Vec<String> {
        self.inner.provider.host_methods()
    }

    pub fn feature_methods(&self) -> Vec<String> {
        self.inner.provider.feature_methods()
    }

    pub fn is_supported(&self) -> bool {
        self.inner.provider.is_supported()
    }

    /// Host methods named in `host_methods` that the runtime currently defines.
    pub fn host_mixin(&self) -> Result<MethodMap, SkypagerError> {
        let runtime = self.runtime()?;
        Ok(self
            .host_methods()
            .into_iter()
            .filter_map(|name| runtime.interface().method(&name).map(|m| (name, m)))
            .collect())
    }

    /// Provider methods named in `feature_methods`, minus any name claimed
    /// by `host_methods`, that the provider currently resolves.
    ///
    /// Names are compared as they will be grafted, so with key transformation
    /// on `get_info` is claimed by `getInfo`.
    pub fn feature_mixin(&self) -> MethodMap {
        let transform_keys = self
            .feature_mixin_options()
            .map(|opts| opts.transform_keys)
            .unwrap_or(false);
        self.feature_mixin_keyed(transform_keys)
    }

    fn feature_mixin_keyed(&self, transform_keys: bool) -> MethodMap {
        let graft_key = |name: &str| {
            if transform_keys {
                name.to_lower_camel_case()
            } else {
                name.to_string()
            }
        };
        let claimed: HashSet<String> = self
            .host_methods()
            .iter()
            .map(|name| graft_key(name))
            .collect();
        self.feature_methods()
            .into_iter()
            .filter(|name| !claimed.contains(&graft_key(name)))
            .filter_map(|name| self.inner.provider.method(&name).map(|m| (name, m)))
            .collect()
    }

    /// Options for grafting host methods onto this feature. Grafted methods
    /// run against the runtime with the feature context pre-bound.
    pub fn host_mixin_options(&self) -> Result<MixinOptions, SkypagerError> {
        let runtime = self.runtime()?;
        Ok(
            MixinOptions::from_config(&runtime.config().mixin, Scope::Runtime(runtime.downgrade()))
                .with_partial(vec![self.inner.context.clone()])
                .with_overrides(&self.inner.provider.mixin_options())
                .with_overrides(&self.inner.provider.host_mixin_options()),
        )
    }

    /// Options for grafting this feature's methods onto the host. Grafted
    /// methods run against this feature with its context pre-bound.
    pub fn feature_mixin_options(&self) -> Result<MixinOptions, SkypagerError> {
        let runtime = self.runtime()?;
        Ok(
            MixinOptions::from_config(&runtime.config().mixin, Scope::Feature(self.downgrade()))
                .with_partial(vec![self.inner.context.clone()])
                .with_overrides(&self.inner.provider.mixin_options())
                .with_overrides(&self.inner.provider.feature_mixin_options()),
        )
    }

    /// Graft both mixin directions. Failures are logged and do not abort.
    pub fn apply_mixins(&self) {
        let host = self
            .host_mixin_options()
            .and_then(|opts| self.host_mixin().and_then(|m| self.interface().apply(&m, &opts)));
        match host {
            Ok(applied) if !applied.is_empty() => {
                debug!(feature = %self.name(), methods = ?applied, "host methods grafted onto feature");
            }
            Ok(_) => {}
            Err(err) => warn!(feature = %self.name(), error = %err, "host mixin failed"),
        }

        let onto_host = self.feature_mixin_options().and_then(|opts| {
            let runtime = self.runtime()?;
            runtime
                .interface()
                .apply(&self.feature_mixin_keyed(opts.transform_keys), &opts)
        });
        match onto_host {
            Ok(applied) if !applied.is_empty() => {
                debug!(feature = %self.name(), methods = ?applied, "feature methods grafted onto host");
            }
            Ok(_) => {}
            Err(err) => warn!(feature = %self.name(), error = %err, "feature mixin failed"),
        }
    }

    /// Call a method on this feature: grafted host methods first, then the
    /// provider's own methods.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> MethodResult {
        if let Some(bound) = self.inner.interface.get(name) {
            return bound.invoke(name, args).await;
        }

        let method = self
            .inner
            .provider
            .method(name)
            .ok_or_else(|| SkypagerError::MethodNotFound {
                name: name.to_string(),
            })?;
        let options = self.feature_mixin_options()?;
        BoundMethod::with_options(method, &options)
            .invoke(name, args)
            .await
    }

    /// Call a provider method with the context appended as the last
    /// argument. Returns `Ok(None)` if the provider has no such method.
    pub async fn run_method(
        &self,
        name: &str,
        mut args: Vec<Value>,
    ) -> Result<Option<Value>, SkypagerError> {
        let Some(method) = self.inner.provider.method(name) else {
            return Ok(None);
        };
        args.push(self.inner.context.clone());
        method
            .call(Invocation::new(Receiver::Feature(self.clone()), args))
            .await
            .map(Some)
    }

    /// Resolve the provider's initial state into this feature's state store.
    /// Runs at most once; later calls wait for the first to finish.
    pub async fn ensure_initial_state(&self) {
        self.inner
            .initial_state
            .get_or_init(|| async {
                if !self.inner.provider.has_initial_state() {
                    return;
                }
                match self.inner.provider.initial_state(self).await {
                    Ok(Some(state)) => self.inner.state.merge(&state),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(feature = %self.name(), error = %err, "initial state failed");
                        *lock::write(&self.inner.initial_state_error) = Some(err);
                    }
                }
            })
            .await;
    }

    pub fn initial_state_error(&self) -> Option<SkypagerError> {
        lock::read(&self.inner.initial_state_error).clone()
    }

    /// This feature's entry in the runtime status map.
    pub fn status(&self) -> Option<StatusEntry> {
        self.runtime()
            .ok()
            .and_then(|runtime| runtime.feature_status().get(self.name()))
    }

    pub fn is_enabled(&self) -> bool {
        self.status().is_some_and(|entry| entry.is_enabled())
    }

    /// Enable this feature with an optional configuration object.
    ///
    /// Returns the same instance on success. On failure the hook's error is
    /// recorded in the status map and returned unchanged.
    pub async fn enable(&self, cfg: Option<Value>) -> Result<Feature, SkypagerError> {
        let _serialized = self.inner.enable_lock.lock().await;
        let runtime = self.runtime()?;
        let status = runtime.feature_status();

        let current = self.options();
        let options = match &cfg {
            Some(Value::Object(overlay)) => deep_merge_options(overlay, &current),
            None | Some(Value::Null) => current,
            Some(other) => {
                warn!(
                    feature = %self.name(),
                    cfg = %other,
                    "unsupported configuration; keeping prior options"
                );
                current
            }
        };
        let cache_key = fingerprint(self.name(), &options);

        if status.enabled_with_key(self.name(), &cache_key) {
            debug!(feature = %self.name(), cache_key = %cache_key, "already enabled");
            return Ok(self.clone());
        }

        *lock::write(&self.inner.options) = options.clone();
        *lock::write(&self.inner.cache_key) = cache_key.clone();
        self.set_phase(FeaturePhase::Enabling);

        if !self.is_supported() {
            warn!(feature = %self.name(), "enabling a feature that reports itself unsupported");
        }

        self.ensure_initial_state().await;
        self.apply_mixins();

        let outcome = self
            .inner
            .provider
            .feature_was_enabled(self, cfg.as_ref(), &options)
            .await;

        let state = if outcome.is_ok() {
            FeatureState::Enabled
        } else {
            FeatureState::Failed
        };
        status.set(
            self.name(),
            StatusEntry {
                cache_key: cache_key.clone(),
                status: state,
                cfg,
                options,
                error: outcome.as_ref().err().cloned(),
            },
        );
        self.set_phase(state.into());

        match outcome {
            Ok(()) => {
                info!(feature = %self.name(), cache_key = %cache_key, "feature enabled");
                Ok(self.clone())
            }
            Err(err) => {
                error!(feature = %self.name(), error = %err, "feature failed to enable");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("name", &self.inner.name)
            .field("uuid", &self.inner.uuid)
            .field("style", &self.inner.style)
            .field("phase", &self.phase())
            .field("cache_key", &self.cache_key())
            .finish_non_exhaustive()
    }
}
