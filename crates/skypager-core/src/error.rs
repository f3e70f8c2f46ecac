// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Skypager runtime.

use std::sync::Arc;

use thiserror::Error;

/// The primary error type used across the registry, helper cache, mixin
/// engine and feature lifecycle.
///
/// The error is `Clone` so that a failed enable attempt can store the exact
/// error it hands back to the caller in the feature status map. Boxed
/// sources are held in an `Arc` for that reason.
#[derive(Debug, Clone, Error)]
pub enum SkypagerError {
    /// Configuration errors (invalid TOML, unsupported option shapes).
    #[error("configuration error: {0}")]
    Config(String),

    /// No provider is registered under the requested name.
    #[error("{kind} not found: {name}")]
    HelperNotFound { kind: String, name: String },

    /// A strict registry refused to overwrite an existing registration.
    #[error("duplicate registration in {registry}: {name}")]
    DuplicateName { registry: String, name: String },

    /// The requested method is not defined on the target interface.
    #[error("method not found: {name}")]
    MethodNotFound { name: String },

    /// A grafted property was defined as non-configurable and cannot be replaced.
    #[error("property `{name}` is not configurable")]
    NotConfigurable { name: String },

    /// The receiver a method was bound to has been dropped.
    #[error("receiver for `{name}` is no longer alive")]
    ScopeReleased { name: String },

    /// A feature's lifecycle hook (or a method it provides) failed.
    #[error("feature {feature} failed: {message}")]
    Lifecycle {
        feature: String,
        message: String,
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON serialization errors while fingerprinting or converting options.
    #[error("serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SkypagerError {
    /// Shorthand for a lifecycle failure without an underlying source.
    pub fn lifecycle(feature: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            feature: feature.into(),
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for SkypagerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}
