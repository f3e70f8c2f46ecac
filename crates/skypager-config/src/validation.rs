// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::SkypagerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &SkypagerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.runtime.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "runtime.name must not be empty".to_string(),
        });
    }

    let level = config.runtime.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "runtime.log_level `{}` is not one of: {}",
                config.runtime.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    for name in config.features.keys() {
        if !is_valid_feature_name(name) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "features.{name}: feature names may only contain letters, digits, `-`, `_` and `/`"
                ),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_feature_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&SkypagerConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = SkypagerConfig::default();
        config.runtime.name = "  ".into();
        config.runtime.log_level = "loud".into();
        config
            .features
            .insert("bad name!".into(), FeatureConfig::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = SkypagerConfig::default();
        config.runtime.log_level = "DEBUG".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn namespaced_feature_names_are_allowed() {
        assert!(is_valid_feature_name("node/git"));
        assert!(is_valid_feature_name("portfolio-browser"));
        assert!(!is_valid_feature_name("/git"));
        assert!(!is_valid_feature_name(""));
    }
}
