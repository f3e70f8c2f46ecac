// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Skypager integration tests.
//!
//! # Components
//!
//! - [`RecordingProvider`] - class-style provider counting lifecycle hook calls
//! - [`FailingProvider`] - provider whose lifecycle hook always fails
//! - [`greet_module`] - module-style provider grafting `sayHi` onto the host
//! - [`TestHarness`] - runtime builder with pre-registered providers

pub mod harness;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_provider::{greet_module, FailingProvider, RecordingProvider};
