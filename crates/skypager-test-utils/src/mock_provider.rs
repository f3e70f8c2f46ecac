// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock feature providers for deterministic lifecycle tests.
//!
//! Every provider here is class-style and shares its counters across all
//! instances it constructs, so a test can keep a handle to the provider and
//! observe hooks run by features the runtime built from it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use skypager_core::{Options, SkypagerError};
use skypager_runtime::{Feature, FeatureProvider, Method, Provider, ProviderModule};

/// Shared record of `feature_was_enabled` calls.
#[derive(Debug, Clone, Default)]
struct HookLog {
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<(Option<Value>, Options)>>>,
}

impl HookLog {
    fn record(&self, cfg: Option<&Value>, options: &Options) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((cfg.cloned(), options.clone()));
    }

    fn last(&self) -> Option<(Option<Value>, Options)> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A provider that counts its lifecycle hook calls.
///
/// Methods are declared and implemented separately, so a test can declare a
/// capability the provider does not actually implement.
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    log: HookLog,
    host_methods: Vec<String>,
    feature_methods: Vec<String>,
    methods: BTreeMap<String, Method>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host methods this provider asks to have grafted onto its features.
    pub fn with_host_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_methods = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declare feature method names without implementing them.
    pub fn declare_feature_methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_methods
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare and implement a feature method.
    pub fn with_feature_method(mut self, name: &str, method: Method) -> Self {
        self.feature_methods.push(name.to_string());
        self.methods.insert(name.to_string(), method);
        self
    }

    /// How many times `feature_was_enabled` ran across all instances.
    pub fn hook_calls(&self) -> usize {
        self.log.calls.load(Ordering::SeqCst)
    }

    /// `(cfg, options)` passed to the most recent hook call.
    pub fn last_enable(&self) -> Option<(Option<Value>, Options)> {
        self.log.last()
    }

    /// A class-style provider whose instances share this recorder.
    pub fn provider(&self) -> Provider {
        let template = self.clone();
        Provider::class(move || template.clone())
    }
}

#[async_trait]
impl FeatureProvider for RecordingProvider {
    fn host_methods(&self) -> Vec<String> {
        self.host_methods.clone()
    }

    fn feature_methods(&self) -> Vec<String> {
        self.feature_methods.clone()
    }

    fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).cloned()
    }

    async fn feature_was_enabled(
        &self,
        _feature: &Feature,
        cfg: Option<&Value>,
        options: &Options,
    ) -> Result<(), SkypagerError> {
        self.log.record(cfg, options);
        Ok(())
    }
}

/// A provider whose lifecycle hook always fails.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hook_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn provider(&self) -> Provider {
        let template = self.clone();
        Provider::class(move || template.clone())
    }
}

#[async_trait]
impl FeatureProvider for FailingProvider {
    async fn feature_was_enabled(
        &self,
        feature: &Feature,
        _cfg: Option<&Value>,
        _options: &Options,
    ) -> Result<(), SkypagerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SkypagerError::lifecycle(feature.name(), self.message.clone()))
    }
}

/// Module-style provider exporting `sayHi`, which returns `"hi"`, and
/// grafting it onto the host. Its `featureWasEnabled` hook resolves
/// immediately.
pub fn greet_module() -> Provider {
    Provider::module(
        ProviderModule::new()
            .with_feature_methods(["sayHi"])
            .export("sayHi", Method::new(|_| Ok(json!("hi"))))
            .export(
                "featureWasEnabled",
                Method::future(|_| async { Ok(Value::Null) }),
            ),
    )
}
