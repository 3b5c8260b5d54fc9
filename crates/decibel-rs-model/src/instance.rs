//! Model instances and the factory contract used to hydrate them.
//!
//! An instance is an explicit typed field store: a map from field name to
//! [`Value`] plus an accessor that fails on unknown properties. Hydration is
//! delegated to a [`ModelFactory`], which returns `UnknownModelInstance`
//! when an id no longer resolves to a live row; iteration catches that
//! specific error and skips the id.

use std::collections::HashMap;
use std::sync::Mutex;

use decibel_rs_core::error::{DecibelError, DecibelResult};
use indexmap::IndexMap;

use crate::value::Value;

/// One hydrated model row.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    qualified_name: String,
    id: i64,
    values: IndexMap<String, Value>,
}

impl ModelInstance {
    /// Creates an instance with no field values beyond its identity.
    #[must_use]
    pub fn new(qualified_name: impl Into<String>, id: i64) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            id,
            values: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Assigns a field value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Returns a field value, failing on unknown property names rather than
    /// resolving them dynamically.
    pub fn get(&self, name: &str) -> DecibelResult<&Value> {
        self.values.get(name).ok_or_else(|| {
            DecibelError::InvalidParameterValue(format!(
                "unknown property '{name}' on instance of '{}'",
                self.qualified_name
            ))
        })
    }

    /// Field values in assignment order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<&ModelInstance> for Value {
    /// Normalizes an instance to its id, the storage form of object
    /// references in filters.
    fn from(instance: &ModelInstance) -> Self {
        Self::Int(instance.id())
    }
}

/// Hydrates model instances by qualified name and id.
pub trait ModelFactory {
    /// Loads the instance, or fails with
    /// [`DecibelError::UnknownModelInstance`] when the id does not resolve
    /// to a live row.
    fn create(&self, qualified_name: &str, id: i64) -> DecibelResult<ModelInstance>;
}

/// An in-memory [`ModelFactory`] backed by a map of pre-built instances.
///
/// Serves tests and fixtures; production deployments wire a factory that
/// loads from the persistence layer.
#[derive(Debug, Default)]
pub struct InMemoryModelFactory {
    instances: Mutex<HashMap<(String, i64), ModelInstance>>,
}

impl InMemoryModelFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance to the store.
    pub fn insert(&self, instance: ModelInstance) {
        if let Ok(mut map) = self.instances.lock() {
            map.insert(
                (instance.qualified_name().to_string(), instance.id()),
                instance,
            );
        }
    }

    /// Removes an instance, simulating concurrent deletion.
    pub fn delete(&self, qualified_name: &str, id: i64) {
        if let Ok(mut map) = self.instances.lock() {
            map.remove(&(qualified_name.to_string(), id));
        }
    }
}

impl ModelFactory for InMemoryModelFactory {
    fn create(&self, qualified_name: &str, id: i64) -> DecibelResult<ModelInstance> {
        self.instances
            .lock()
            .ok()
            .and_then(|map| map.get(&(qualified_name.to_string(), id)).cloned())
            .ok_or_else(|| DecibelError::UnknownModelInstance {
                qualified_name: qualified_name.to_string(),
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_get_and_set() {
        let mut instance = ModelInstance::new("blog.Article", 1);
        instance.set("title", Value::from("hello"));
        assert_eq!(instance.get("title").unwrap(), &Value::from("hello"));
        assert!(instance.get("missing").is_err());
    }

    #[test]
    fn test_instance_to_value_is_id() {
        let instance = ModelInstance::new("blog.Article", 42);
        assert_eq!(Value::from(&instance), Value::Int(42));
    }

    #[test]
    fn test_factory_round_trip() {
        let factory = InMemoryModelFactory::new();
        factory.insert(ModelInstance::new("blog.Article", 1));
        let instance = factory.create("blog.Article", 1).unwrap();
        assert_eq!(instance.id(), 1);
    }

    #[test]
    fn test_factory_unknown_instance() {
        let factory = InMemoryModelFactory::new();
        let err = factory.create("blog.Article", 99).unwrap_err();
        assert!(matches!(
            err,
            DecibelError::UnknownModelInstance { id: 99, .. }
        ));
    }

    #[test]
    fn test_factory_delete() {
        let factory = InMemoryModelFactory::new();
        factory.insert(ModelInstance::new("blog.Article", 1));
        factory.delete("blog.Article", 1);
        assert!(factory.create("blog.Article", 1).is_err());
    }
}
