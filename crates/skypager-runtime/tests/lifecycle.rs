// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature lifecycle integration tests.

use serde_json::json;
use skypager_core::{FeaturePhase, FeatureState, Options, SkypagerError, CACHE_HELPER_KEY};
use std::sync::{Arc, Mutex};

use skypager_runtime::{Method, Provider, ProviderModule};
use skypager_test_utils::{greet_module, FailingProvider, RecordingProvider, TestHarness};

fn options(value: serde_json::Value) -> Options {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn greet_end_to_end() {
    let harness = TestHarness::builder()
        .with_provider("greet", greet_module())
        .build()
        .unwrap();

    harness.enable("greet", None).await.unwrap();

    assert_eq!(
        harness.runtime.call("sayHi", vec![]).await.unwrap(),
        json!("hi")
    );
    let status = harness.status("greet").unwrap();
    assert_eq!(status.status, FeatureState::Enabled);
    assert!(harness.runtime.is_feature_enabled("greet"));
}

#[test]
fn identical_arguments_return_the_cached_instance() {
    let harness = TestHarness::builder()
        .with_provider("greet", greet_module())
        .build()
        .unwrap();

    let a = harness.runtime.feature("greet", options(json!({"lang": "en"}))).unwrap();
    let b = harness.runtime.feature("greet", options(json!({"lang": "en"}))).unwrap();
    let c = harness.runtime.feature("greet", options(json!({"lang": "fr"}))).unwrap();

    assert_eq!(a.uuid(), b.uuid());
    assert_ne!(a.uuid(), c.uuid());
}

#[test]
fn cache_helper_false_yields_distinct_instances() {
    let harness = TestHarness::builder()
        .with_provider("greet", greet_module())
        .build()
        .unwrap();

    let uncached = options(json!({ CACHE_HELPER_KEY: false }));
    let a = harness.runtime.feature("greet", uncached.clone()).unwrap();
    let b = harness.runtime.feature("greet", uncached).unwrap();

    assert_ne!(a.uuid(), b.uuid());
    assert!(a.options().is_empty(), "cacheHelper is not stored on the instance");
}

#[tokio::test]
async fn re_enabling_with_the_same_config_short_circuits() {
    let recorder = RecordingProvider::new();
    let harness = TestHarness::builder()
        .with_provider("recorder", recorder.provider())
        .build()
        .unwrap();

    let cfg = json!({"port": 3000});
    let first = harness.enable("recorder", Some(cfg.clone())).await.unwrap();
    let second = harness.enable("recorder", Some(cfg)).await.unwrap();
    harness.enable("recorder", None).await.unwrap();

    assert_eq!(recorder.hook_calls(), 1);
    assert_eq!(first.uuid(), second.uuid());
}

#[tokio::test]
async fn changed_config_re_triggers_and_deep_merges() {
    let recorder = RecordingProvider::new();
    let harness = TestHarness::builder()
        .with_provider("recorder", recorder.provider())
        .build()
        .unwrap();

    let feature = harness
        .enable("recorder", Some(json!({"server": {"port": 3000, "host": "localhost"}})))
        .await
        .unwrap();
    let first_key = feature.cache_key();

    feature
        .enable(Some(json!({"server": {"port": 4000}, "tags": ["a"]})))
        .await
        .unwrap();

    assert_eq!(recorder.hook_calls(), 2);
    assert_eq!(
        feature.options(),
        options(json!({"server": {"port": 4000, "host": "localhost"}, "tags": ["a"]}))
    );
    assert_ne!(feature.cache_key(), first_key);

    let status = harness.status("recorder").unwrap();
    assert_eq!(status.cache_key, feature.cache_key());
    assert_eq!(status.cfg, Some(json!({"server": {"port": 4000}, "tags": ["a"]})));

    let (cfg, hook_options) = recorder.last_enable().unwrap();
    assert_eq!(cfg, status.cfg);
    assert_eq!(hook_options, feature.options());
}

#[tokio::test]
async fn hook_failure_is_recorded_and_returned() {
    let failing = FailingProvider::new("no repository found");
    let harness = TestHarness::builder()
        .with_provider("git", failing.provider())
        .build()
        .unwrap();

    let err = harness.enable("git", Some(json!({"remote": "origin"}))).await.unwrap_err();
    assert_eq!(err.to_string(), "feature git failed: no repository found");

    let status = harness.status("git").unwrap();
    assert_eq!(status.status, FeatureState::Failed);
    assert_eq!(status.cfg, Some(json!({"remote": "origin"})));
    assert_eq!(
        status.error.map(|e| e.to_string()),
        Some(err.to_string())
    );
    assert_eq!(harness.feature("git").unwrap().phase(), FeaturePhase::Failed);
    assert!(!harness.runtime.is_feature_enabled("git"));

    // A failed feature is retried even with an unchanged config.
    harness.enable("git", Some(json!({"remote": "origin"}))).await.unwrap_err();
    assert_eq!(failing.hook_calls(), 2);
}

#[tokio::test]
async fn mixin_directions_are_exclusive() {
    let recorder = RecordingProvider::new()
        .with_host_methods(["shared", "isFeatureEnabled"])
        .with_feature_method("shared", Method::new(|_| Ok(json!("from feature"))))
        .with_feature_method("own", Method::new(|_| Ok(json!("own"))));
    let harness = TestHarness::builder()
        .with_provider("mixer", recorder.provider())
        .build()
        .unwrap();
    harness
        .runtime
        .define_method("shared", Method::new(|_| Ok(json!("from host"))))
        .unwrap();

    let feature = harness.enable("mixer", None).await.unwrap();

    // feature -> host skips names claimed by hostMethods
    assert_eq!(
        harness.runtime.call("shared", vec![]).await.unwrap(),
        json!("from host")
    );
    assert_eq!(harness.runtime.call("own", vec![]).await.unwrap(), json!("own"));

    // host -> feature
    assert_eq!(feature.call("shared", vec![]).await.unwrap(), json!("from host"));
    assert_eq!(
        feature
            .call("isFeatureEnabled", vec![json!("mixer")])
            .await
            .unwrap(),
        json!(true)
    );
    assert!(!feature.interface().contains("own"));
}

#[tokio::test]
async fn claimed_host_methods_match_after_key_transformation() {
    let recorder = RecordingProvider::new()
        .with_host_methods(["getInfo"])
        .with_feature_method("get_info", Method::new(|_| Ok(json!("from feature"))))
        .with_feature_method("get_version", Method::new(|_| Ok(json!("1.0"))));
    let harness = TestHarness::builder()
        .with_provider("info", recorder.provider())
        .build()
        .unwrap();
    harness
        .runtime
        .define_method("getInfo", Method::new(|_| Ok(json!("from host"))))
        .unwrap();

    let feature = harness.enable("info", None).await.unwrap();

    assert_eq!(
        harness.runtime.call("getInfo", vec![]).await.unwrap(),
        json!("from host")
    );
    assert_eq!(
        harness.runtime.call("getVersion", vec![]).await.unwrap(),
        json!("1.0")
    );
    assert_eq!(
        feature.feature_mixin().keys().collect::<Vec<_>>(),
        vec!["get_version"]
    );
}

#[tokio::test]
async fn untransformed_keys_do_not_collide_with_claimed_names() {
    let recorder = RecordingProvider::new()
        .with_host_methods(["getInfo"])
        .with_feature_method("get_info", Method::new(|_| Ok(json!("from feature"))));
    let harness = TestHarness::builder()
        .with_toml("[mixin]\ntransform_keys = false\n")
        .unwrap()
        .with_provider("info", recorder.provider())
        .build()
        .unwrap();

    harness.enable("info", None).await.unwrap();

    assert!(!harness.runtime.has_method("getInfo"));
    assert_eq!(
        harness.runtime.call("get_info", vec![]).await.unwrap(),
        json!("from feature")
    );
}

#[tokio::test]
async fn declared_but_missing_capabilities_are_skipped() {
    let recorder = RecordingProvider::new()
        .with_host_methods(["notOnTheHost"])
        .declare_feature_methods(["notImplemented"])
        .with_feature_method("implemented", Method::new(|_| Ok(json!(1))));
    let harness = TestHarness::builder()
        .with_provider("partial", recorder.provider())
        .build()
        .unwrap();

    let feature = harness.enable("partial", None).await.unwrap();

    assert!(harness.runtime.has_method("implemented"));
    assert!(!harness.runtime.has_method("notImplemented"));
    assert!(!feature.interface().contains("notOnTheHost"));
    assert_eq!(feature.feature_mixin().keys().collect::<Vec<_>>(), vec!["implemented"]);
}

#[tokio::test]
async fn grafted_methods_receive_context_then_arguments() {
    let recorder = RecordingProvider::new().with_feature_method(
        "echo",
        Method::new(|inv| {
            assert!(inv.receiver.as_feature().is_some(), "runs against the feature");
            Ok(serde_json::Value::Array(inv.args))
        }),
    );
    let harness = TestHarness::builder()
        .with_provider("echo", recorder.provider())
        .build()
        .unwrap();
    let feature = harness.enable("echo", None).await.unwrap();

    let out = harness.runtime.call("echo", vec![json!("x")]).await.unwrap();
    assert_eq!(out, json!([feature.context().clone(), "x", {}]));
    assert_eq!(feature.context()["feature"], json!("echo"));
    assert_eq!(feature.context()["runtimeId"], json!(harness.runtime.uuid()));
}

#[tokio::test]
async fn overlapping_enables_run_the_hook_once() {
    let recorder = RecordingProvider::new();
    let harness = TestHarness::builder()
        .with_provider("recorder", recorder.provider())
        .build()
        .unwrap();
    let feature = harness.feature("recorder").unwrap();

    let (a, b) = tokio::join!(feature.enable(None), feature.enable(None));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(recorder.hook_calls(), 1);
}

#[tokio::test]
async fn status_changes_are_broadcast() {
    let harness = TestHarness::builder()
        .with_provider("greet", greet_module())
        .build()
        .unwrap();
    let mut changes = harness.runtime.feature_status().subscribe();

    harness.enable("greet", None).await.unwrap();

    let change = changes.recv().await.unwrap();
    assert_eq!(change.key, "greet");
    assert!(change.previous.is_none());
    assert_eq!(change.value.unwrap().status, FeatureState::Enabled);
}

#[tokio::test]
async fn configured_features_are_enabled_with_project_options() {
    let failing = FailingProvider::new("boom");
    let harness = TestHarness::builder()
        .with_toml(
            r#"
[features.greet]
enabled = true
options = { lang = "en" }

[features.broken]
enabled = true

[features.missing]
enabled = true

[features.idle]
enabled = false
"#,
        )
        .unwrap()
        .with_provider("greet", greet_module())
        .with_provider("broken", failing.provider())
        .build()
        .unwrap();

    let outcomes = harness.runtime.enable_configured().await;
    let names: Vec<&str> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["broken", "greet", "missing"]);

    assert!(outcomes[0].1.is_err());
    let greet = outcomes[1].1.as_ref().unwrap();
    assert_eq!(greet.options(), options(json!({"lang": "en"})));
    assert!(matches!(
        outcomes[2].1,
        Err(SkypagerError::HelperNotFound { ref name, .. }) if name == "missing"
    ));

    assert_eq!(harness.runtime.enabled_features(), vec!["greet"]);
}

#[tokio::test]
async fn inline_providers_need_no_registration() {
    let harness = TestHarness::builder().build().unwrap();
    let recorder = RecordingProvider::new();

    let feature = harness
        .runtime
        .feature_from("inline", recorder.provider(), Options::new())
        .unwrap();
    feature.enable(None).await.unwrap();

    assert_eq!(recorder.hook_calls(), 1);
    assert!(!harness.runtime.features().unwrap().contains("inline"));
}

/// Module-style provider whose `featureWasEnabled` export records its
/// arguments and resolves with `outcome`.
fn hooked_module(
    calls: Arc<Mutex<Vec<Vec<serde_json::Value>>>>,
    outcome: Result<(), &'static str>,
) -> Provider {
    Provider::module(ProviderModule::new().export(
        "featureWasEnabled",
        Method::future(move |inv| {
            calls.lock().unwrap().push(inv.args.clone());
            async move {
                match outcome {
                    Ok(()) => Ok(serde_json::Value::Null),
                    Err(message) => Err(SkypagerError::lifecycle("build", message)),
                }
            }
        }),
    ))
}

#[tokio::test]
async fn module_hook_receives_cfg_options_and_context() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let harness = TestHarness::builder()
        .with_provider("build", hooked_module(calls.clone(), Ok(())))
        .build()
        .unwrap();

    let feature = harness
        .enable("build", Some(json!({"watch": true})))
        .await
        .unwrap();

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![vec![
            json!({"watch": true}),
            json!({"watch": true}),
            feature.context().clone(),
        ]]
    );
    assert_eq!(harness.status("build").unwrap().status, FeatureState::Enabled);
}

#[tokio::test]
async fn module_hook_without_cfg_receives_null() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let harness = TestHarness::builder()
        .with_provider("build", hooked_module(calls.clone(), Ok(())))
        .build()
        .unwrap();

    let feature = harness.enable("build", None).await.unwrap();

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![vec![json!(null), json!({}), feature.context().clone()]]
    );
}

#[tokio::test]
async fn failing_module_hook_is_recorded_and_returned() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let harness = TestHarness::builder()
        .with_provider("build", hooked_module(calls.clone(), Err("bundler crashed")))
        .build()
        .unwrap();

    let err = harness.enable("build", None).await.unwrap_err();
    assert_eq!(err.to_string(), "feature build failed: bundler crashed");

    let status = harness.status("build").unwrap();
    assert_eq!(status.status, FeatureState::Failed);
    assert_eq!(
        status.error.map(|e| e.to_string()),
        Some(err.to_string())
    );
    assert!(!harness.runtime.is_feature_enabled("build"));
    assert_eq!(calls.lock().unwrap().len(), 1);
}
