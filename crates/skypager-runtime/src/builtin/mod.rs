// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Features every runtime's feature registry is seeded with.

pub mod profiler;

use skypager_core::SkypagerError;

use crate::provider::Provider;
use crate::registry::Registry;

/// Register all built-in features.
pub fn register_all(registry: &Registry) -> Result<(), SkypagerError> {
    registry.register("profiler", || Provider::class(profiler::Profiler::new))?;
    Ok(())
}
