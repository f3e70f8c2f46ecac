// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skypager features` and `skypager enable` command implementations.

use serde::Serialize;
use serde_json::{Map, Value};
use skypager_core::{Options, SkypagerError};
use skypager_runtime::Runtime;

/// One row of `skypager features`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureListing {
    pub name: String,
    /// Marked `enabled = true` in the project configuration.
    pub configured: bool,
    /// Outcome of the last enable attempt in this process, if any.
    pub status: Option<String>,
}

/// List every registered feature.
pub fn run_features(runtime: &Runtime, json: bool) -> Result<(), SkypagerError> {
    let listings = list_features(runtime)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    println!();
    println!("  skypager features ({})", runtime.name());
    println!("  {}", "-".repeat(35));
    for listing in &listings {
        let marker = if listing.configured { "*" } else { " " };
        let status = listing.status.as_deref().unwrap_or("-");
        println!("  {marker} {:<24} {status}", listing.name);
    }
    println!();
    println!("  * enabled in configuration");
    println!();
    Ok(())
}

fn list_features(runtime: &Runtime) -> Result<Vec<FeatureListing>, SkypagerError> {
    let configured = runtime.config().enabled_features();
    let status = runtime.feature_status();

    Ok(runtime
        .features()?
        .available()
        .into_iter()
        .map(|name| FeatureListing {
            configured: configured.contains(&name.as_str()),
            status: status.get(&name).map(|entry| entry.status.to_string()),
            name,
        })
        .collect())
}

/// Enable `name` with `cfg` and print the resulting status entry as JSON.
///
/// The entry is printed for failures too; the hook's error is returned
/// afterwards so the process exits non-zero.
pub async fn run_enable(runtime: &Runtime, name: &str, cfg: Options) -> Result<(), SkypagerError> {
    let feature = runtime.feature(name, Options::new())?;
    let cfg = (!cfg.is_empty()).then_some(Value::Object(cfg));
    let outcome = feature.enable(cfg).await;

    if let Some(entry) = runtime.feature_status().get(name) {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    }
    outcome.map(|_| ())
}

/// Turn `key=value` assignments into a configuration object.
///
/// Values are parsed as JSON when possible and kept as strings otherwise.
/// Dotted keys build nested objects: `server.port=4000` becomes
/// `{"server": {"port": 4000}}`.
pub fn parse_assignments(assignments: &[String]) -> Result<Options, SkypagerError> {
    let mut root = Map::new();
    for assignment in assignments {
        let (key, raw) = assignment.split_once('=').ok_or_else(|| {
            SkypagerError::Config(format!("expected KEY=VALUE, got `{assignment}`"))
        })?;
        let path: Vec<&str> = key.split('.').map(str::trim).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(SkypagerError::Config(format!("invalid key `{key}`")));
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        insert_path(&mut root, &path, value)?;
    }
    Ok(root)
}

fn insert_path(target: &mut Map<String, Value>, path: &[&str], value: Value) -> Result<(), SkypagerError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut cursor = target;
    for segment in parents {
        let slot = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        cursor = slot.as_object_mut().ok_or_else(|| {
            SkypagerError::Config(format!("`{segment}` is already set to a non-object value"))
        })?;
    }
    cursor.insert(last.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skypager_config::SkypagerConfig;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assignments_parse_json_values_and_nest() {
        let cfg = parse_assignments(&strings(&[
            "lang=en",
            "server.port=4000",
            "server.tls=true",
            "tags=[\"a\",\"b\"]",
        ]))
        .unwrap();

        assert_eq!(
            Value::Object(cfg),
            json!({
                "lang": "en",
                "server": {"port": 4000, "tls": true},
                "tags": ["a", "b"],
            })
        );
    }

    #[test]
    fn malformed_assignments_are_rejected() {
        assert!(parse_assignments(&strings(&["no-equals"])).is_err());
        assert!(parse_assignments(&strings(&["a..b=1"])).is_err());
        assert!(parse_assignments(&strings(&["a=1", "a.b=2"])).is_err());
    }

    #[test]
    fn listing_includes_builtins_and_config_flags() {
        let config = skypager_config::load_and_validate_str(
            "[features.profiler]\nenabled = true\n",
        )
        .unwrap();
        let runtime = Runtime::new(config);

        let listings = list_features(&runtime).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "profiler");
        assert!(listings[0].configured);
        assert!(listings[0].status.is_none());

        let bare = Runtime::new(SkypagerConfig::default());
        assert!(!list_features(&bare).unwrap()[0].configured);
    }

    #[tokio::test]
    async fn enable_records_status() {
        let runtime = Runtime::new(SkypagerConfig::default());
        run_enable(&runtime, "profiler", Options::new()).await.unwrap();
        assert!(runtime.is_feature_enabled("profiler"));

        let err = run_enable(&runtime, "missing", Options::new()).await.unwrap_err();
        assert!(matches!(err, SkypagerError::HelperNotFound { .. }));
    }
}
