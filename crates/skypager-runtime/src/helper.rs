// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper kinds and attach/bootstrap.
//!
//! A helper kind (features are the built-in one) is wired into a runtime
//! with [`attach`]. Attaching creates the kind's registry, its instance
//! cache and two host methods: a registry accessor named after the plural
//! registry prop (`features`) and a cached factory named after the singular
//! lookup prop (`feature`).

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use skypager_core::{fingerprint, Options, SkypagerError, CACHE_HELPER_KEY};
use tracing::{debug, info};

use crate::cache::HelperCache;
use crate::interface::{BoundMethod, Property};
use crate::method::{Method, Scope};
use crate::provider::Provider;
use crate::registry::Registry;
use crate::runtime::Runtime;

/// What a factory call hands to [`HelperKind::construct`].
#[derive(Debug, Clone)]
pub struct HelperSpec {
    pub name: String,
    pub provider: Provider,
    /// Constructor options with the `cacheHelper` flag removed.
    pub options: Options,
}

/// A family of helpers sharing a registry, a cache and a constructor.
pub trait HelperKind: Send + Sync + 'static {
    type Instance: Clone + Send + Sync + 'static;

    /// Human-readable kind name, used in errors (`Feature not found: x`).
    const KIND: &'static str;
    const REGISTRY_PROP: &'static str;
    const LOOKUP_PROP: &'static str;
    const IS_CACHEABLE: bool = true;
    /// Accept providers passed inline to the factory instead of registered.
    const ALLOW_ANONYMOUS_PROVIDERS: bool = false;

    /// Build the registry, pre-seeded with well-known providers.
    fn create_registry() -> Result<Registry, SkypagerError> {
        Ok(Registry::new(Self::REGISTRY_PROP))
    }

    /// Runs once, after the kind's host methods are installed.
    fn on_attach(_runtime: &Runtime) -> Result<(), SkypagerError> {
        Ok(())
    }

    fn construct(runtime: &Runtime, spec: HelperSpec) -> Result<Self::Instance, SkypagerError>;

    /// JSON summary returned by the host lookup method.
    fn describe(instance: &Self::Instance) -> Value;
}

/// Per-attach overrides. Unset fields fall back to the kind's constants.
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    pub registry_prop: Option<String>,
    pub lookup_prop: Option<String>,
    pub is_cacheable: Option<bool>,
    /// Use this registry instead of calling `create_registry`.
    pub registry: Option<Arc<Registry>>,
    /// Default for the per-call `cacheHelper` flag.
    pub cache_helper: Option<bool>,
}

/// Introspection record for an attached helper kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperKindInfo {
    pub kind: String,
    pub registry_prop: String,
    pub lookup_prop: String,
    pub is_cacheable: bool,
    pub allow_anonymous_providers: bool,
}

/// A helper kind's registry and cache, owned by the runtime.
pub struct Attachment {
    pub info: HelperKindInfo,
    pub registry: Arc<Registry>,
    cache_helper: bool,
    cache: Arc<dyn Any + Send + Sync>,
}

impl Attachment {
    fn cache<K: HelperKind>(&self) -> Result<&HelperCache<K::Instance>, SkypagerError> {
        self.cache
            .downcast_ref::<HelperCache<K::Instance>>()
            .ok_or_else(|| {
                SkypagerError::Internal(format!("cache type mismatch for {}", K::KIND))
            })
    }

    /// Identity keys of every cached instance.
    pub fn cached_keys<K: HelperKind>(&self) -> Result<Vec<String>, SkypagerError> {
        Ok(self.cache::<K>()?.keys())
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("info", &self.info)
            .field("registry", &self.registry)
            .field("cache_helper", &self.cache_helper)
            .finish_non_exhaustive()
    }
}

/// Attach helper kind `K` to `runtime`.
///
/// Idempotent: a second call for the same kind keeps the existing registry,
/// cache and status map and returns immediately.
pub fn attach<K: HelperKind>(
    runtime: &Runtime,
    options: AttachOptions,
) -> Result<Runtime, SkypagerError> {
    if runtime.attachment::<K>().is_some() {
        debug!(kind = K::KIND, "helper kind already attached");
        return Ok(runtime.clone());
    }

    let registry = match options.registry {
        Some(registry) => registry,
        None => Arc::new(K::create_registry()?),
    };
    if runtime.config().runtime.strict_registry {
        registry.set_strict(true);
    }

    let info = HelperKindInfo {
        kind: K::KIND.to_string(),
        registry_prop: options
            .registry_prop
            .unwrap_or_else(|| K::REGISTRY_PROP.to_string()),
        lookup_prop: options
            .lookup_prop
            .unwrap_or_else(|| K::LOOKUP_PROP.to_string()),
        is_cacheable: K::IS_CACHEABLE && options.is_cacheable.unwrap_or(true),
        allow_anonymous_providers: K::ALLOW_ANONYMOUS_PROVIDERS,
    };
    let attachment = Arc::new(Attachment {
        info: info.clone(),
        registry: registry.clone(),
        cache_helper: options.cache_helper.unwrap_or(true),
        cache: Arc::new(HelperCache::<K::Instance>::new()),
    });

    if !runtime.insert_attachment(TypeId::of::<K>(), attachment) {
        debug!(kind = K::KIND, "helper kind attached concurrently");
        return Ok(runtime.clone());
    }

    runtime.feature_status();
    install_registry_accessor(runtime, &info.registry_prop, registry)?;
    install_factory::<K>(runtime, &info.lookup_prop)?;
    K::on_attach(runtime)?;

    info!(
        kind = K::KIND,
        registry = %info.registry_prop,
        lookup = %info.lookup_prop,
        cacheable = info.is_cacheable,
        "helper kind attached"
    );
    Ok(runtime.clone())
}

/// The cached factory: resolve `name` and return its instance.
///
/// The cache is consulted before the registry, so a cached instance is
/// returned even if its provider has since been re-registered.
pub fn create<K: HelperKind>(
    runtime: &Runtime,
    name: &str,
    mut options: Options,
    provider: Option<Provider>,
) -> Result<K::Instance, SkypagerError> {
    let attachment = runtime.ensure_attached::<K>()?;

    let call_flag = options
        .remove(CACHE_HELPER_KEY)
        .and_then(|v| v.as_bool())
        .unwrap_or(attachment.cache_helper);
    let cacheable = attachment.info.is_cacheable && call_flag;

    if provider.is_some() && !K::ALLOW_ANONYMOUS_PROVIDERS {
        return Err(SkypagerError::Config(format!(
            "{} does not accept anonymous providers",
            K::KIND
        )));
    }

    let build = || {
        let provider = match provider {
            Some(provider) => provider,
            None => attachment
                .registry
                .lookup(name)
                .ok_or_else(|| SkypagerError::HelperNotFound {
                    kind: K::KIND.to_string(),
                    name: name.to_string(),
                })?,
        };
        debug!(kind = K::KIND, helper = %name, cacheable, "constructing helper");
        K::construct(
            runtime,
            HelperSpec {
                name: name.to_string(),
                provider,
                options: options.clone(),
            },
        )
    };

    if !cacheable {
        return build();
    }
    let key = fingerprint(name, &options);
    attachment.cache::<K>()?.get_or_try_insert_with(&key, build)
}

fn install_registry_accessor(
    runtime: &Runtime,
    prop: &str,
    registry: Arc<Registry>,
) -> Result<(), SkypagerError> {
    let method = Method::new(move |_| Ok(Value::from(registry.available())));
    define_host(runtime, prop, method)
}

fn install_factory<K: HelperKind>(runtime: &Runtime, prop: &str) -> Result<(), SkypagerError> {
    let prop_name = prop.to_string();
    let method = Method::new(move |inv| {
        let runtime = inv.receiver.runtime().ok_or_else(|| SkypagerError::ScopeReleased {
            name: prop_name.clone(),
        })?;
        let position = inv.args.iter().position(Value::is_string).ok_or_else(|| {
            SkypagerError::Config(format!("{prop_name} expects a helper name"))
        })?;
        let name = inv.args[position].as_str().unwrap_or_default();
        let options = inv.args[position + 1..]
            .iter()
            .find_map(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let instance = create::<K>(&runtime, name, options, None)?;
        Ok(K::describe(&instance))
    });
    define_host(runtime, prop, method)
}

fn define_host(runtime: &Runtime, prop: &str, method: Method) -> Result<(), SkypagerError> {
    runtime.interface().define(
        prop,
        Property {
            bound: BoundMethod::new(method, Scope::Runtime(runtime.downgrade())),
            enumerable: true,
            configurable: true,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderModule;
    use serde_json::json;
    use skypager_config::SkypagerConfig;

    /// A minimal helper kind whose instances are their `HelperSpec`.
    struct Widget;

    impl HelperKind for Widget {
        type Instance = Arc<HelperSpec>;
        const KIND: &'static str = "Widget";
        const REGISTRY_PROP: &'static str = "widgets";
        const LOOKUP_PROP: &'static str = "widget";

        fn create_registry() -> Result<Registry, SkypagerError> {
            let registry = Registry::new(Self::REGISTRY_PROP);
            registry.register_provider("button", Provider::module(ProviderModule::new()))?;
            Ok(registry)
        }

        fn construct(_: &Runtime, spec: HelperSpec) -> Result<Self::Instance, SkypagerError> {
            Ok(Arc::new(spec))
        }

        fn describe(instance: &Self::Instance) -> Value {
            json!({"name": instance.name, "options": instance.options})
        }
    }

    fn runtime() -> Runtime {
        let runtime = Runtime::new(SkypagerConfig::default());
        attach::<Widget>(&runtime, AttachOptions::default()).unwrap();
        runtime
    }

    #[test]
    fn attach_is_idempotent() {
        let runtime = runtime();
        let first = create::<Widget>(&runtime, "button", Options::new(), None).unwrap();

        attach::<Widget>(&runtime, AttachOptions::default()).unwrap();
        let second = create::<Widget>(&runtime, "button", Options::new(), None).unwrap();

        assert!(Arc::ptr_eq(&first, &second), "cache survives a second attach");
        let attachment = runtime.attachment::<Widget>().unwrap();
        assert_eq!(attachment.cached_keys::<Widget>().unwrap().len(), 1);
        assert_eq!(
            runtime
                .helper_kinds()
                .iter()
                .filter(|k| k.kind == "Widget")
                .count(),
            1
        );
    }

    #[test]
    fn cache_helper_false_bypasses_the_cache() {
        let runtime = runtime();
        let mut options = Options::new();
        options.insert(CACHE_HELPER_KEY.into(), json!(false));

        let a = create::<Widget>(&runtime, "button", options.clone(), None).unwrap();
        let b = create::<Widget>(&runtime, "button", options, None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!a.options.contains_key(CACHE_HELPER_KEY), "flag is stripped");
    }

    #[test]
    fn non_cacheable_attach_never_caches() {
        let runtime = Runtime::new(SkypagerConfig::default());
        attach::<Widget>(
            &runtime,
            AttachOptions {
                is_cacheable: Some(false),
                ..AttachOptions::default()
            },
        )
        .unwrap();

        let a = create::<Widget>(&runtime, "button", Options::new(), None).unwrap();
        let b = create::<Widget>(&runtime, "button", Options::new(), None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_name_reports_kind() {
        let runtime = runtime();
        let err = create::<Widget>(&runtime, "slider", Options::new(), None).unwrap_err();
        assert_eq!(err.to_string(), "Widget not found: slider");
    }

    #[test]
    fn anonymous_providers_need_opt_in() {
        let runtime = runtime();
        let err = create::<Widget>(
            &runtime,
            "inline",
            Options::new(),
            Some(Provider::module(ProviderModule::new())),
        )
        .unwrap_err();
        assert!(matches!(err, SkypagerError::Config(_)));
    }

    #[tokio::test]
    async fn host_methods_expose_registry_and_factory() {
        let runtime = runtime();

        let names = runtime.call("widgets", vec![]).await.unwrap();
        assert_eq!(names, json!(["button"]));

        let described = runtime
            .call("widget", vec![json!("button"), json!({"size": "lg"})])
            .await
            .unwrap();
        assert_eq!(described, json!({"name": "button", "options": {"size": "lg"}}));
    }

    #[test]
    fn strict_registry_follows_config() {
        let mut config = SkypagerConfig::default();
        config.runtime.strict_registry = true;
        let runtime = Runtime::new(config);
        attach::<Widget>(&runtime, AttachOptions::default()).unwrap();

        let registry = runtime.registry("widgets").unwrap();
        assert!(registry.is_strict());
        assert!(
            registry
                .register_provider("button", Provider::module(ProviderModule::new()))
                .is_err()
        );
    }
}
