// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the registry, feature lifecycle and configuration.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Helper options: a JSON object keyed by option name.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// Option key that controls per-call instance caching. It is stripped from
/// the options before they are fingerprinted or stored on an instance.
pub const CACHE_HELPER_KEY: &str = "cacheHelper";

/// Outcome recorded in the feature status map after an enable attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeatureState {
    Enabled,
    Failed,
}

/// Lifecycle phase of a single feature instance.
///
/// `Unregistered` only describes names the registry cannot resolve; every
/// constructed instance starts out `Resolved`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeaturePhase {
    Unregistered,
    Resolved,
    Enabling,
    Enabled,
    Failed,
}

impl From<FeatureState> for FeaturePhase {
    fn from(state: FeatureState) -> Self {
        match state {
            FeatureState::Enabled => FeaturePhase::Enabled,
            FeatureState::Failed => FeaturePhase::Failed,
        }
    }
}
