// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//!
//! 1. compiled defaults
//! 2. the files returned by [`standard_paths`], system-wide first
//! 3. `SKYPAGER_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SkypagerConfig;

const FILE_NAME: &str = "skypager.toml";

/// Sections whose keys may be set from the environment.
const ENV_SECTIONS: &[&str] = &["runtime", "mixin"];

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn standard_paths() -> Vec<PathBuf> {
    let mut paths = vec![Path::new("/etc/skypager").join(FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("skypager").join(FILE_NAME));
    }
    paths.push(PathBuf::from(FILE_NAME));
    paths
}

/// Load configuration from the standard locations plus the environment.
pub fn load_config() -> Result<SkypagerConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. The environment is ignored
/// so results do not depend on the caller's shell.
pub fn load_config_from_str(toml_content: &str) -> Result<SkypagerConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Load configuration from one file plus the environment.
pub fn load_config_from_path(path: &Path) -> Result<SkypagerConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The un-extracted figment behind [`load_config`], for metadata inspection.
pub fn build_figment() -> Figment {
    standard_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(SkypagerConfig::default()))
}

/// `SKYPAGER_RUNTIME_LOG_LEVEL` maps to `runtime.log_level`. Only the first
/// segment names a section; the rest is the key, underscores included.
fn env_provider() -> Env {
    Env::prefixed("SKYPAGER_").map(|key| map_env_key(key.as_str()).into())
}

/// Keys arrive in their original case.
fn map_env_key(key: &str) -> String {
    let raw = key.to_ascii_lowercase();
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            raw.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(raw)
}
