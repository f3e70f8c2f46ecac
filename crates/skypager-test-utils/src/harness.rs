// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end lifecycle testing.
//!
//! `TestHarness` assembles a runtime from a configuration and a set of
//! providers registered in its feature registry.

use serde_json::Value;

use skypager_config::{load_and_validate_str, SkypagerConfig};
use skypager_core::{Options, SkypagerError};
use skypager_runtime::{Feature, Provider, Runtime, StatusEntry};

/// Builder for creating test runtimes.
pub struct TestHarnessBuilder {
    config: SkypagerConfig,
    providers: Vec<(String, Provider)>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: SkypagerConfig::default(),
            providers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SkypagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse and validate an inline TOML configuration.
    pub fn with_toml(mut self, toml: &str) -> Result<Self, SkypagerError> {
        self.config = load_and_validate_str(toml).map_err(|errors| {
            SkypagerError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(self)
    }

    /// Register `provider` under `name` in the feature registry.
    pub fn with_provider(mut self, name: &str, provider: Provider) -> Self {
        self.providers.push((name.to_string(), provider));
        self
    }

    pub fn build(self) -> Result<TestHarness, SkypagerError> {
        let runtime = Runtime::new(self.config);
        let registry = runtime.features()?;
        for (name, provider) in self.providers {
            registry.register_provider(&name, provider)?;
        }
        Ok(TestHarness { runtime })
    }
}

/// A runtime assembled for a test.
pub struct TestHarness {
    pub runtime: Runtime,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The cached feature instance for `name` with no factory options.
    pub fn feature(&self, name: &str) -> Result<Feature, SkypagerError> {
        self.runtime.feature(name, Options::new())
    }

    pub async fn enable(&self, name: &str, cfg: Option<Value>) -> Result<Feature, SkypagerError> {
        self.feature(name)?.enable(cfg).await
    }

    pub fn status(&self, name: &str) -> Option<StatusEntry> {
        self.runtime.feature_status().get(name)
    }
}
