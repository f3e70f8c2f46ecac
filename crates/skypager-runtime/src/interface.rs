// SPDX-FileCopyrightText: 2026 Skypager Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability mixin engine.
//!
//! An [`Interface`] is the method table of a runtime or a feature. The mixin
//! engine grafts a [`MethodMap`] onto an interface with
//! [`Interface::apply`], binding every method to a [`Scope`] and pre-binding
//! arguments according to [`MixinOptions`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use heck::ToLowerCamelCase;
use serde::Deserialize;
use serde_json::{Map, Value};
use skypager_config::MixinConfig;
use skypager_core::SkypagerError;
use tracing::debug;

use crate::lock;
use crate::method::{Invocation, Method, MethodResult, Scope};

/// Method name to method body, as produced by a feature's mixin descriptors.
pub type MethodMap = BTreeMap<String, Method>;

/// Options controlling how a [`MethodMap`] is grafted onto an interface.
#[derive(Debug, Clone)]
pub struct MixinOptions {
    /// Convert method names to lowerCamelCase while grafting.
    pub transform_keys: bool,
    /// The receiver grafted methods run against.
    pub scope: Scope,
    /// Arguments placed ahead of the caller's arguments.
    pub partial: Vec<Value>,
    /// Append an empty options object when the caller's last argument is not an object.
    pub insert_options: bool,
    /// On a name collision the grafted method replaces the existing one.
    pub right: bool,
    /// Grafted properties are left out of [`Interface::keys`].
    pub hidden: bool,
    /// Grafted properties may later be replaced or removed.
    pub configurable: bool,
}

impl MixinOptions {
    /// Options bound to `scope` with every flag taken from the configured defaults.
    pub fn from_config(config: &MixinConfig, scope: Scope) -> Self {
        Self {
            transform_keys: config.transform_keys,
            scope,
            partial: Vec::new(),
            insert_options: config.insert_options,
            right: config.right,
            hidden: config.hidden,
            configurable: config.configurable,
        }
    }

    pub fn with_partial(mut self, partial: Vec<Value>) -> Self {
        self.partial = partial;
        self
    }

    /// Apply a provider's overrides on top of these options.
    pub fn with_overrides(mut self, overrides: &MixinOverrides) -> Self {
        if let Some(v) = overrides.transform_keys {
            self.transform_keys = v;
        }
        if let Some(partial) = &overrides.partial {
            self.partial = partial.clone();
        }
        if let Some(v) = overrides.insert_options {
            self.insert_options = v;
        }
        if let Some(v) = overrides.right {
            self.right = v;
        }
        if let Some(v) = overrides.hidden {
            self.hidden = v;
        }
        if let Some(v) = overrides.configurable {
            self.configurable = v;
        }
        self
    }
}

/// Per-provider overrides of the default mixin options. Unset fields keep
/// the default. The scope is always chosen by the feature.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MixinOverrides {
    pub transform_keys: Option<bool>,
    pub partial: Option<Vec<Value>>,
    pub insert_options: Option<bool>,
    pub right: Option<bool>,
    pub hidden: Option<bool>,
    pub configurable: Option<bool>,
}

/// A method bound to a receiver with its pre-bound arguments.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    method: Method,
    scope: Scope,
    partial: Vec<Value>,
    insert_options: bool,
}

impl BoundMethod {
    pub fn new(method: Method, scope: Scope) -> Self {
        Self {
            method,
            scope,
            partial: Vec::new(),
            insert_options: false,
        }
    }

    pub(crate) fn with_options(method: Method, options: &MixinOptions) -> Self {
        Self {
            method,
            scope: options.scope.clone(),
            partial: options.partial.clone(),
            insert_options: options.insert_options,
        }
    }

    /// The unbound method body.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Call with `args`, producing `partial ++ args ++ [options]`.
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> MethodResult {
        let receiver = self
            .scope
            .upgrade()
            .ok_or_else(|| SkypagerError::ScopeReleased {
                name: name.to_string(),
            })?;

        let needs_options = self.insert_options && !matches!(args.last(), Some(Value::Object(_)));
        let mut full = Vec::with_capacity(self.partial.len() + args.len() + 1);
        full.extend(self.partial.iter().cloned());
        full.extend(args);
        if needs_options {
            full.push(Value::Object(Map::new()));
        }

        self.method.call(Invocation::new(receiver, full)).await
    }
}

/// A grafted method plus its visibility flags.
#[derive(Debug, Clone)]
pub struct Property {
    pub bound: BoundMethod,
    pub enumerable: bool,
    pub configurable: bool,
}

/// A method table that mixins are grafted onto.
#[derive(Debug, Default)]
pub struct Interface {
    props: RwLock<BTreeMap<String, Property>>,
}

impl Interface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace a property.
    ///
    /// Fails with `NotConfigurable` if an existing property with that name
    /// was defined as non-configurable.
    pub fn define(&self, name: impl Into<String>, property: Property) -> Result<(), SkypagerError> {
        let name = name.into();
        let mut props = lock::write(&self.props);
        if let Some(existing) = props.get(&name)
            && !existing.configurable
        {
            return Err(SkypagerError::NotConfigurable { name });
        }
        props.insert(name, property);
        Ok(())
    }

    /// The bound method for `name`, if defined.
    pub fn get(&self, name: &str) -> Option<BoundMethod> {
        lock::read(&self.props).get(name).map(|p| p.bound.clone())
    }

    /// The unbound method body for `name`, if defined.
    pub fn method(&self, name: &str) -> Option<Method> {
        lock::read(&self.props)
            .get(name)
            .map(|p| p.bound.method().clone())
    }

    pub fn property(&self, name: &str) -> Option<Property> {
        lock::read(&self.props).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock::read(&self.props).contains_key(name)
    }

    /// Names of enumerable properties.
    pub fn keys(&self) -> Vec<String> {
        lock::read(&self.props)
            .iter()
            .filter(|(_, p)| p.enumerable)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of every property, hidden ones included.
    pub fn all_keys(&self) -> Vec<String> {
        lock::read(&self.props).keys().cloned().collect()
    }

    /// Remove a property. Returns `Ok(false)` if it was not defined.
    pub fn remove(&self, name: &str) -> Result<bool, SkypagerError> {
        let mut props = lock::write(&self.props);
        match props.get(name) {
            None => Ok(false),
            Some(p) if !p.configurable => Err(SkypagerError::NotConfigurable {
                name: name.to_string(),
            }),
            Some(_) => {
                props.remove(name);
                Ok(true)
            }
        }
    }

    /// Graft `methods` onto this interface.
    ///
    /// Returns the names actually defined. With `right == false` existing
    /// names are kept and skipped. Stops at the first collision with a
    /// non-configurable property; entries grafted before it stay defined.
    pub fn apply(
        &self,
        methods: &MethodMap,
        options: &MixinOptions,
    ) -> Result<Vec<String>, SkypagerError> {
        let mut applied = Vec::with_capacity(methods.len());
        let mut props = lock::write(&self.props);

        for (name, method) in methods {
            let key = if options.transform_keys {
                name.to_lower_camel_case()
            } else {
                name.clone()
            };

            if let Some(existing) = props.get(&key) {
                if !options.right {
                    debug!(method = %key, "keeping existing definition");
                    continue;
                }
                if !existing.configurable {
                    return Err(SkypagerError::NotConfigurable { name: key });
                }
            }

            props.insert(
                key.clone(),
                Property {
                    bound: BoundMethod::with_options(method.clone(), options),
                    enumerable: !options.hidden,
                    configurable: options.configurable,
                },
            );
            applied.push(key);
        }

        Ok(applied)
    }

    /// Invoke `name` on this interface.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> MethodResult {
        let bound = self.get(name).ok_or_else(|| SkypagerError::MethodNotFound {
            name: name.to_string(),
        })?;
        bound.invoke(name, args).await
    }
}
