use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde_json::Value;

use super::{priority, PropertyMap, PropertySource};
use crate::ConfigResult;

/// In-memory property source
///
/// Backs both runtime overrides and static defaults. Writes replace the whole
/// map (copy-on-write), so a concurrent `load` sees either the map before or
/// after a write.
pub struct MemorySource {
    name: String,
    priority: i32,
    properties: ArcSwap<PropertyMap>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, priority: i32, properties: PropertyMap) -> Self {
        Self {
            name: name.into(),
            priority,
            properties: ArcSwap::from_pointee(properties),
        }
    }

    /// Runtime overrides, highest precedence
    pub fn overrides() -> Self {
        Self::new("overrides", priority::OVERRIDES, PropertyMap::new())
    }

    /// Static defaults, lowest precedence
    pub fn defaults(properties: PropertyMap) -> Self {
        Self::new("defaultProperties", priority::DEFAULTS, properties)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.properties.rcu(|current| {
            let mut next = PropertyMap::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
    }

    /// Returns whether the key was present.
    pub fn remove(&self, key: &str) -> bool {
        let previous = self.properties.rcu(|current| {
            let mut next = PropertyMap::clone(current);
            next.remove(key);
            next
        });
        previous.contains_key(key)
    }

    pub fn clear(&self) {
        self.properties.store(Arc::new(PropertyMap::new()));
    }

    pub fn snapshot(&self) -> Arc<PropertyMap> {
        self.properties.load_full()
    }
}

#[async_trait]
impl PropertySource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn load(&self) -> ConfigResult<PropertyMap> {
        Ok(PropertyMap::clone(&self.properties.load()))
    }
}
