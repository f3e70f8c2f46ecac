// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in `profiler` feature.
//!
//! Grafts `profileStart(label)`, `profileEnd(label)` and `profileReport()`
//! onto the runtime. Timings are kept per feature instance.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use skypager_core::SkypagerError;

use crate::lock;
use crate::method::{Invocation, Method};
use crate::provider::FeatureProvider;

const PROFILE_START: &str = "profileStart";
const PROFILE_END: &str = "profileEnd";
const PROFILE_REPORT: &str = "profileReport";

#[derive(Debug, Clone, Copy)]
struct Timing {
    started: Instant,
    elapsed: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Profiler {
    timings: Arc<RwLock<BTreeMap<String, Timing>>>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(inv: &Invocation, method: &str) -> Result<String, SkypagerError> {
        inv.first_str()
            .map(str::to_string)
            .ok_or_else(|| SkypagerError::lifecycle("profiler", format!("{method} needs a label")))
    }

    fn start(&self) -> Method {
        let timings = self.timings.clone();
        Method::new(move |inv| {
            let label = Self::label(&inv, PROFILE_START)?;
            lock::write(&timings).insert(
                label.clone(),
                Timing {
                    started: Instant::now(),
                    elapsed: None,
                },
            );
            Ok(Value::String(label))
        })
    }

    fn end(&self) -> Method {
        let timings = self.timings.clone();
        Method::new(move |inv| {
            let label = Self::label(&inv, PROFILE_END)?;
            let mut timings = lock::write(&timings);
            let timing = timings.get_mut(&label).ok_or_else(|| {
                SkypagerError::lifecycle("profiler", format!("no timer started for `{label}`"))
            })?;
            let elapsed = timing.started.elapsed();
            timing.elapsed = Some(elapsed);
            Ok(json!(millis(elapsed)))
        })
    }

    fn report(&self) -> Method {
        let timings = self.timings.clone();
        Method::new(move |_| {
            let report: serde_json::Map<String, Value> = lock::read(&timings)
                .iter()
                .map(|(label, timing)| {
                    let entry = match timing.elapsed {
                        Some(elapsed) => json!({"duration": millis(elapsed), "running": false}),
                        None => json!({"duration": millis(timing.started.elapsed()), "running": true}),
                    };
                    (label.clone(), entry)
                })
                .collect();
            Ok(Value::Object(report))
        })
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[async_trait]
impl FeatureProvider for Profiler {
    fn feature_methods(&self) -> Vec<String> {
        [PROFILE_START, PROFILE_END, PROFILE_REPORT]
            .map(String::from)
            .to_vec()
    }

    fn method(&self, name: &str) -> Option<Method> {
        match name {
            PROFILE_START => Some(self.start()),
            PROFILE_END => Some(self.end()),
            PROFILE_REPORT => Some(self.report()),
            _ => None,
        }
    }
}
