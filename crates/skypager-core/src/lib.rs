// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Skypager runtime.
//!
//! This crate provides the error type, the shared lifecycle types and the
//! option merge/fingerprint utilities used throughout the Skypager
//! workspace.

pub mod error;
pub mod merge;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SkypagerError;
pub use merge::{canonical_json, deep_merge, deep_merge_options, fingerprint};
pub use types::{FeaturePhase, FeatureState, Options, CACHE_HELPER_KEY};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn skypager_error_is_cloneable_with_source() {
        let err = SkypagerError::Lifecycle {
            feature: "git".into(),
            message: "no repository".into(),
            source: Some(std::sync::Arc::new(std::io::Error::other("missing .git"))),
        };
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
        assert_eq!(copy.to_string(), "feature git failed: no repository");
    }

    #[test]
    fn serde_json_errors_convert() {
        let parse_err = serde_json::from_str::<Value>("{nope").unwrap_err();
        let err: SkypagerError = parse_err.into();
        assert!(matches!(err, SkypagerError::Serialization(_)));
    }

    #[test]
    fn feature_state_display_and_parse() {
        use std::str::FromStr;

        for state in [FeatureState::Enabled, FeatureState::Failed] {
            let s = state.to_string();
            assert_eq!(FeatureState::from_str(&s).expect("should parse back"), state);
        }
        assert_eq!(FeatureState::Enabled.to_string(), "enabled");
        assert_eq!(
            serde_json::to_string(&FeatureState::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn feature_phase_from_state() {
        assert_eq!(FeaturePhase::from(FeatureState::Enabled), FeaturePhase::Enabled);
        assert_eq!(FeaturePhase::from(FeatureState::Failed), FeaturePhase::Failed);
        assert_eq!(FeaturePhase::Enabling.to_string(), "enabling");
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ]
    }

    fn tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                prop::collection::btree_map("[a-d]", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn merging_a_value_over_itself_is_identity(value in tree()) {
            prop_assert_eq!(deep_merge(&value, &value), value);
        }

        #[test]
        fn merge_result_fingerprint_is_deterministic(a in tree(), b in tree()) {
            let merged = deep_merge(&a, &b);
            let again = deep_merge(&a, &b);
            prop_assert_eq!(canonical_json(&merged), canonical_json(&again));
        }
    }
}
