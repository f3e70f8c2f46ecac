// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper registry, instance cache, capability mixins and feature lifecycle.
//!
//! A [`Runtime`] hosts helper kinds. Each kind has a [`Registry`] of named
//! providers and a cached factory producing instances. Features are the
//! built-in kind: `runtime.feature(name, options)` returns a cached
//! [`Feature`] and [`Feature::enable`] grafts its methods onto the runtime,
//! awaits its lifecycle hook and records the outcome in the runtime's
//! [`FeatureStatusMap`].

pub mod builtin;
pub mod cache;
pub mod feature;
pub mod helper;
pub mod interface;
mod lock;
pub mod method;
pub mod observable;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod status;

pub use cache::HelperCache;
pub use feature::{Feature, FeatureKind, WeakFeature};
pub use helper::{attach, create, AttachOptions, Attachment, HelperKind, HelperKindInfo, HelperSpec};
pub use interface::{BoundMethod, Interface, MethodMap, MixinOptions, MixinOverrides, Property};
pub use method::{Invocation, Method, MethodResult, Receiver, Scope};
pub use observable::{MapChange, ObservableMap};
pub use provider::{FeatureProvider, Provider, ProviderModule, ProviderStyle};
pub use registry::{create_mock_context, MockContext, ModuleContext, ProviderFactory, Registry};
pub use runtime::{Runtime, WeakRuntime};
pub use state::StateStore;
pub use status::{FeatureStatusMap, StatusEntry};
