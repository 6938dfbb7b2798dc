//! Action Registry - Manifest action creation by type tag
//!
//! The registry maps the `type` tag of a manifest action object to a
//! factory, so manifests can name actions without the pipeline knowing
//! every variant up front.
//!
//! # Example
//!
//! ```ignore
//! let registry = default_registry();
//!
//! // {"type": "excludeChannels", "channels": ["analytics"]}
//! let action = registry.create_from_json(&value)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::directive::{
    DropFactory, ExcludeChannelsFactory, MarkPiiFactory, RenameSuffixFactory, RouteFactory,
    ThrottleDirectiveFactory,
};
use crate::{Action, ActionError, ActionResult};

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Options of one manifest action, including its `type` tag
pub type ActionConfig = serde_json::Map<String, Value>;

/// Key holding the action type in a manifest action object
pub const TYPE_KEY: &str = "type";

/// Factory trait for creating manifest actions
pub trait ActionFactory: Send + Sync {
    /// Create an action from its manifest options
    ///
    /// # Errors
    /// Returns `ActionError::Config` if the options are invalid
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>>;

    /// Type tag this factory answers to
    fn name(&self) -> &'static str;
}

/// Registry of manifest action factories
pub struct ActionRegistry {
    factories: HashMap<String, Box<dyn ActionFactory>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under its own type tag
    ///
    /// Returns `false` if the tag is already taken.
    pub fn register<F: ActionFactory + 'static>(&mut self, factory: F) -> bool {
        let type_name = factory.name();
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    /// Create an action from its type tag and options
    ///
    /// # Errors
    /// - `ActionError::UnknownType` if the tag is not registered
    /// - `ActionError::Config` if the factory rejects the options or the
    ///   action fails validation
    pub fn create(&self, type_name: &str, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ActionError::UnknownType {
                type_name: type_name.to_string(),
                available: self.available_types().join(", "),
            })?;

        let action = factory.create(config)?;
        action.validate()?;
        Ok(action)
    }

    /// Create an action from a manifest action object
    ///
    /// # Errors
    /// `ActionError::Config` if the value is not an object with a string
    /// `type`, otherwise as [`ActionRegistry::create`].
    pub fn create_from_json(&self, value: &Value) -> ActionResult<Arc<dyn Action>> {
        let config = value
            .as_object()
            .ok_or_else(|| ActionError::config("action", "expected an object"))?;
        let type_name = config
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::config("action", "missing string field 'type'"))?;

        self.create(type_name, config)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type tags, sorted
    pub fn available_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("types", &self.available_types())
            .finish()
    }
}

/// Deserialize typed options from a manifest action object
///
/// Unknown keys (including `type`) are ignored.
pub fn parse_options<T: DeserializeOwned>(action: &str, config: &ActionConfig) -> ActionResult<T> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| ActionError::config(action, e.to_string()))
}

/// Create a registry with every manifest action registered
///
/// Includes `drop`, `markPii`, `throttle`, `excludeChannels`, `route` and
/// `renameSuffix`.
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(DropFactory);
    registry.register(MarkPiiFactory);
    registry.register(ThrottleDirectiveFactory);
    registry.register(ExcludeChannelsFactory);
    registry.register(RouteFactory);
    registry.register(RenameSuffixFactory);
    registry
}
