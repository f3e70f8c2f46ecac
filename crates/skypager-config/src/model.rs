// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Skypager runtime.
//!
//! Fixed sections use `#[serde(deny_unknown_fields)]` so that typos are
//! rejected at startup with an actionable message. Feature option tables are
//! free-form: their shape belongs to each feature.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skypager_core::Options;

/// Top-level Skypager configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SkypagerConfig {
    /// Runtime identity and registry behavior.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Default capability mixin options.
    #[serde(default)]
    pub mixin: MixinConfig,

    /// Per-feature project configuration, keyed by registry name.
    #[serde(default)]
    pub features: BTreeMap<String, FeatureConfig>,
}

impl SkypagerConfig {
    /// Names of features marked `enabled = true`, in name order.
    pub fn enabled_features(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|(_, f)| f.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Project-level options for a feature, if any are configured.
    pub fn feature_options(&self, name: &str) -> Option<&Options> {
        self.features.get(name).map(|f| &f.options)
    }
}

/// Runtime identity and registry behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Display name of the runtime, exposed to features through their context.
    #[serde(default = "default_runtime_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reject duplicate registry names instead of letting the last one win.
    #[serde(default)]
    pub strict_registry: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: default_runtime_name(),
            log_level: default_log_level(),
            strict_registry: false,
        }
    }
}

fn default_runtime_name() -> String {
    "skypager".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Defaults applied whenever a feature grafts methods onto a target.
///
/// Providers may override each flag individually.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MixinConfig {
    /// Convert grafted method names to lowerCamelCase.
    #[serde(default = "default_true")]
    pub transform_keys: bool,

    /// Append an empty options object when the caller omits one.
    #[serde(default = "default_true")]
    pub insert_options: bool,

    /// Newly grafted methods replace existing ones on collision.
    #[serde(default = "default_true")]
    pub right: bool,

    /// Grafted methods are hidden from enumeration.
    #[serde(default)]
    pub hidden: bool,

    /// Grafted methods may later be replaced or removed.
    #[serde(default = "default_true")]
    pub configurable: bool,
}

impl Default for MixinConfig {
    fn default() -> Self {
        Self {
            transform_keys: true,
            insert_options: true,
            right: true,
            hidden: false,
            configurable: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Project configuration for a single feature.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    /// Enable this feature when the runtime enables its configured features.
    #[serde(default)]
    pub enabled: bool,

    /// Options merged underneath the options passed to the feature factory.
    #[serde(default)]
    pub options: Options,
}
