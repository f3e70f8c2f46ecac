// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host runtime.
//!
//! A [`Runtime`] owns its configuration, its method interface, one
//! attachment (registry and instance cache) per helper kind, the feature
//! status map and an observable state store. Handles are cheap to clone.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use serde_json::Value;
use skypager_config::SkypagerConfig;
use skypager_core::{Options, SkypagerError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::feature::{Feature, FeatureKind};
use crate::helper::{self, AttachOptions, Attachment, HelperKind, HelperKindInfo};
use crate::interface::{BoundMethod, Interface, Property};
use crate::lock;
use crate::method::{Method, MethodResult, Scope};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::state::StateStore;
use crate::status::FeatureStatusMap;

struct RuntimeInner {
    uuid: String,
    config: SkypagerConfig,
    interface: Interface,
    attachments: RwLock<HashMap<TypeId, Arc<Attachment>>>,
    feature_status: OnceLock<Arc<FeatureStatusMap>>,
    state: StateStore,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// A non-owning handle to a [`Runtime`], held by everything the runtime owns.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "WeakRuntime({})", inner.uuid),
            None => f.write_str("WeakRuntime(<released>)"),
        }
    }
}

impl Runtime {
    /// A runtime with the host builtins installed and features attached.
    pub fn new(config: SkypagerConfig) -> Self {
        let runtime = Self::without_helpers(config);
        if let Err(err) = helper::attach::<FeatureKind>(&runtime, AttachOptions::default()) {
            error!(error = %err, "failed to attach features");
        }
        runtime
    }

    /// A runtime with only the host builtins. Helper kinds are attached on
    /// first use or explicitly with [`Runtime::attach`].
    pub fn without_helpers(config: SkypagerConfig) -> Self {
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                uuid: Uuid::new_v4().to_string(),
                config,
                interface: Interface::new(),
                attachments: RwLock::new(HashMap::new()),
                feature_status: OnceLock::new(),
                state: StateStore::new(),
            }),
        };
        runtime.install_builtins();
        debug!(runtime = %runtime.name(), uuid = %runtime.uuid(), "runtime created");
        runtime
    }

    fn install_builtins(&self) {
        let is_enabled = Method::new(|inv| {
            let runtime = inv.receiver.runtime().ok_or_else(|| SkypagerError::ScopeReleased {
                name: "isFeatureEnabled".into(),
            })?;
            let name = inv.first_str().unwrap_or_default();
            Ok(Value::Bool(runtime.is_feature_enabled(name)))
        });
        let enabled = Method::new(|inv| {
            let runtime = inv.receiver.runtime().ok_or_else(|| SkypagerError::ScopeReleased {
                name: "enabledFeatures".into(),
            })?;
            Ok(Value::from(runtime.enabled_features()))
        });

        for (name, method) in [("isFeatureEnabled", is_enabled), ("enabledFeatures", enabled)] {
            if let Err(err) = self.define_method(name, method) {
                warn!(method = name, error = %err, "could not install builtin");
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.runtime.name
    }

    pub fn uuid(&self) -> &str {
        &self.inner.uuid
    }

    pub fn config(&self) -> &SkypagerConfig {
        &self.inner.config
    }

    /// The host method table features graft onto.
    pub fn interface(&self) -> &Interface {
        &self.inner.interface
    }

    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Define a host method bound to this runtime.
    pub fn define_method(&self, name: &str, method: Method) -> Result<(), SkypagerError> {
        self.inner.interface.define(
            name,
            Property {
                bound: BoundMethod::new(method, Scope::Runtime(self.downgrade())),
                enumerable: true,
                configurable: true,
            },
        )
    }

    pub async fn call(&self, name: &str, args: Vec<Value>) -> MethodResult {
        self.inner.interface.call(name, args).await
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.interface.contains(name)
    }

    /// Enumerable host method names.
    pub fn methods(&self) -> Vec<String> {
        self.inner.interface.keys()
    }

    /// The feature status map, created on first access.
    pub fn feature_status(&self) -> Arc<FeatureStatusMap> {
        self.inner
            .feature_status
            .get_or_init(|| Arc::new(FeatureStatusMap::new()))
            .clone()
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.feature_status().is_enabled(name)
    }

    pub fn enabled_features(&self) -> Vec<String> {
        self.feature_status().enabled()
    }

    /// Attach helper kind `K`. See [`helper::attach`].
    pub fn attach<K: HelperKind>(&self, options: AttachOptions) -> Result<Runtime, SkypagerError> {
        helper::attach::<K>(self, options)
    }

    pub fn attachment<K: HelperKind>(&self) -> Option<Arc<Attachment>> {
        lock::read(&self.inner.attachments)
            .get(&TypeId::of::<K>())
            .cloned()
    }

    /// The attachment for `K`, attaching with defaults if needed.
    pub fn ensure_attached<K: HelperKind>(&self) -> Result<Arc<Attachment>, SkypagerError> {
        if let Some(attachment) = self.attachment::<K>() {
            return Ok(attachment);
        }
        helper::attach::<K>(self, AttachOptions::default())?;
        self.attachment::<K>().ok_or_else(|| {
            SkypagerError::Internal(format!("{} did not attach", K::KIND))
        })
    }

    /// Insert unless `type_id` is already attached. Returns whether it was inserted.
    pub(crate) fn insert_attachment(&self, type_id: TypeId, attachment: Arc<Attachment>) -> bool {
        let mut attachments = lock::write(&self.inner.attachments);
        if attachments.contains_key(&type_id) {
            return false;
        }
        attachments.insert(type_id, attachment);
        true
    }

    /// The registry installed under `prop` (e.g. `features`).
    pub fn registry(&self, prop: &str) -> Option<Arc<Registry>> {
        lock::read(&self.inner.attachments)
            .values()
            .find(|a| a.info.registry_prop == prop)
            .map(|a| a.registry.clone())
    }

    /// Every attached helper kind, sorted by kind name.
    pub fn helper_kinds(&self) -> Vec<HelperKindInfo> {
        let mut kinds: Vec<HelperKindInfo> = lock::read(&self.inner.attachments)
            .values()
            .map(|a| a.info.clone())
            .collect();
        kinds.sort_by(|a, b| a.kind.cmp(&b.kind));
        kinds
    }

    /// The cached factory for helper kind `K`.
    pub fn create<K: HelperKind>(
        &self,
        name: &str,
        options: Options,
    ) -> Result<K::Instance, SkypagerError> {
        helper::create::<K>(self, name, options, None)
    }

    /// The feature registry.
    pub fn features(&self) -> Result<Arc<Registry>, SkypagerError> {
        Ok(self.ensure_attached::<FeatureKind>()?.registry.clone())
    }

    /// The cached feature factory.
    pub fn feature(&self, name: &str, options: Options) -> Result<Feature, SkypagerError> {
        helper::create::<FeatureKind>(self, name, options, None)
    }

    /// Create a feature from an inline provider without registering it.
    pub fn feature_from(
        &self,
        name: &str,
        provider: Provider,
        options: Options,
    ) -> Result<Feature, SkypagerError> {
        helper::create::<FeatureKind>(self, name, options, Some(provider))
    }

    /// Enable every feature marked `enabled` in the project configuration.
    ///
    /// Failures do not stop the remaining features; every outcome is
    /// reported in configuration order.
    pub async fn enable_configured(&self) -> Vec<(String, Result<Feature, SkypagerError>)> {
        let names: Vec<String> = self
            .inner
            .config
            .enabled_features()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let outcome = match self.feature(&name, Options::new()) {
                Ok(feature) => feature.enable(None).await,
                Err(err) => Err(err),
            };
            if let Err(err) = &outcome {
                warn!(feature = %name, error = %err, "configured feature did not enable");
            }
            outcomes.push((name, outcome));
        }
        outcomes
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.name())
            .field("uuid", &self.inner.uuid)
            .field("helper_kinds", &self.helper_kinds())
            .field("methods", &self.methods())
            .finish_non_exhaustive()
    }
}
