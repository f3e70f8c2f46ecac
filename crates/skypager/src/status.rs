// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skypager status` command implementation.
//!
//! Enables every feature marked `enabled` in the project configuration and
//! reports the resulting status map.

use std::collections::BTreeMap;

use serde::Serialize;
use skypager_core::SkypagerError;
use skypager_runtime::{Runtime, StatusEntry};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub runtime: String,
    pub enabled: Vec<String>,
    pub features: BTreeMap<String, StatusEntry>,
}

/// Run the `skypager status` command.
///
/// Individual feature failures are part of the report, not command errors.
pub async fn run_status(runtime: &Runtime, json: bool) -> Result<(), SkypagerError> {
    let report = collect(runtime).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn collect(runtime: &Runtime) -> StatusReport {
    let outcomes = runtime.enable_configured().await;
    let status = runtime.feature_status();
    let mut features = status.snapshot();

    // Names that never resolved have no status entry; report them as failed.
    for (name, outcome) in outcomes {
        if let Err(err) = outcome
            && !features.contains_key(&name)
        {
            features.insert(
                name,
                StatusEntry {
                    cache_key: String::new(),
                    status: skypager_core::FeatureState::Failed,
                    cfg: None,
                    options: Default::default(),
                    error: Some(err),
                },
            );
        }
    }

    StatusReport {
        runtime: runtime.name().to_string(),
        enabled: status.enabled(),
        features,
    }
}

fn print_report(report: &StatusReport) {
    println!();
    println!("  skypager status ({})", report.runtime);
    println!("  {}", "-".repeat(35));

    if report.features.is_empty() {
        println!("    No features enabled in configuration.");
    }
    for (name, entry) in &report.features {
        match &entry.error {
            None => println!("    [OK]   {name:<20} {}", entry.cache_key),
            Some(err) => println!("    [FAIL] {name:<20} {err}"),
        }
    }
    println!();
}
