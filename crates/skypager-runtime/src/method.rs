// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callable methods and the receivers they run against.
//!
//! A [`Method`] is the unit the mixin engine grafts between the runtime and
//! its features. Every method is asynchronous from the caller's point of
//! view; synchronous bodies are wrapped in a ready future.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use skypager_core::SkypagerError;

use crate::feature::{Feature, WeakFeature};
use crate::runtime::{Runtime, WeakRuntime};

/// Result of invoking a method.
pub type MethodResult = Result<Value, SkypagerError>;

type MethodFn = dyn Fn(Invocation) -> BoxFuture<'static, MethodResult> + Send + Sync;

/// A shareable, type-erased method body.
#[derive(Clone)]
pub struct Method {
    body: Arc<MethodFn>,
}

impl Method {
    /// Wrap a synchronous function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> MethodResult + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(move |inv| future::ready(f(inv)).boxed()),
        }
    }

    /// Wrap an asynchronous function.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        Self {
            body: Arc::new(move |inv| f(inv).boxed()),
        }
    }

    /// Invoke the method with a fully assembled invocation.
    pub fn call(&self, invocation: Invocation) -> BoxFuture<'static, MethodResult> {
        (self.body)(invocation)
    }

    /// True if both handles point at the same body.
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("body", &Arc::as_ptr(&self.body))
            .finish()
    }
}

/// The object a method runs against (its `this`).
#[derive(Debug, Clone)]
pub enum Receiver {
    Runtime(Runtime),
    Feature(Feature),
}

impl Receiver {
    /// The runtime this receiver belongs to, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        match self {
            Receiver::Runtime(runtime) => Some(runtime.clone()),
            Receiver::Feature(feature) => feature.runtime().ok(),
        }
    }

    pub fn as_feature(&self) -> Option<&Feature> {
        match self {
            Receiver::Feature(feature) => Some(feature),
            Receiver::Runtime(_) => None,
        }
    }
}

/// A non-owning reference to a receiver, held by bound methods.
///
/// The runtime owns its features and both own their interfaces, so bound
/// methods must not keep their receiver alive.
#[derive(Debug, Clone)]
pub enum Scope {
    Runtime(WeakRuntime),
    Feature(WeakFeature),
}

impl Scope {
    pub fn upgrade(&self) -> Option<Receiver> {
        match self {
            Scope::Runtime(weak) => weak.upgrade().map(Receiver::Runtime),
            Scope::Feature(weak) => weak.upgrade().map(Receiver::Feature),
        }
    }
}

/// A single call: the receiver plus the final argument list
/// (partial arguments, caller arguments, inserted options).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub receiver: Receiver,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(receiver: Receiver, args: Vec<Value>) -> Self {
        Self { receiver, args }
    }

    /// The first string argument.
    ///
    /// Pre-bound context and inserted options are objects, so this finds the
    /// first caller-supplied name regardless of how the method was grafted.
    pub fn first_str(&self) -> Option<&str> {
        self.args.iter().find_map(Value::as_str)
    }

    /// The last object argument, typically the trailing options object.
    pub fn last_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.args.iter().rev().find_map(Value::as_object)
    }
}
