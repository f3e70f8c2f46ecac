// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deep merge and stable fingerprinting of option values.
//!
//! Merge rules:
//! - objects are merged key by key, recursing into nested objects;
//! - on any other conflict the overlay value wins (scalars, `null`, and
//!   arrays, which are replaced wholesale rather than merged by index);
//! - keys only present in the base are preserved.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::Options;

/// Deep-merge `overlay` over `base`, returning a new value.
pub fn deep_merge(overlay: &Value, base: &Value) -> Value {
    match (overlay, base) {
        (Value::Object(over), Value::Object(under)) => {
            Value::Object(deep_merge_options(over, under))
        }
        (over, _) => over.clone(),
    }
}

/// Deep-merge two option maps. Keys from `overlay` win on conflicting leaves.
pub fn deep_merge_options(overlay: &Options, base: &Options) -> Options {
    let mut merged = base.clone();
    for (key, over) in overlay {
        let next = match merged.get(key) {
            Some(under) => deep_merge(over, under),
            None => over.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Serialize a value with object keys sorted at every level.
///
/// The output does not depend on map insertion order, so it is safe to use
/// as a cache identity even if `serde_json` is built with `preserve_order`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Fingerprint a helper name together with its options.
///
/// Used both as the instance cache identity and as a feature's `cacheKey`.
/// Two option maps with the same content always produce the same key.
pub fn fingerprint(name: &str, options: &Options) -> String {
    let canonical = canonical_json(&Value::Object(options.clone()));
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{name}:{}", hex::encode(&digest[..12]))
}
