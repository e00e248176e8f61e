//! Refreshable binding
//!
//! Holds the current [`ConfigurationSnapshot`] behind an [`ArcSwap`]. Reads are
//! lock-free loads of the current pointer; a refresh builds a complete new
//! snapshot off to the side and publishes it with a single store, so readers
//! see either the old snapshot or the new one, never a mixture.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::accessor::{ConfigAccessor, LoadMode, ResolvedEnvironment, Resolution};
use crate::settings::BindingConfig;
use crate::{ConfigError, ConfigResult};

/// Origin reported for keys that were absent everywhere
pub const DEFAULT_ORIGIN: &str = "default";

/// Which keys the binding tracks
#[derive(Debug, Clone)]
pub struct BindingSpec {
    /// Every environment key under `prefix.` is bound
    pub prefix: String,
    /// Declared keys, always present in a snapshot
    pub keys: Vec<String>,
    /// Fallbacks for declared keys, `""` when not listed
    pub defaults: BTreeMap<String, String>,
}

impl BindingSpec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            keys: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn default_for(&self, key: &str) -> &str {
        self.defaults.get(key).map(String::as_str).unwrap_or("")
    }
}

impl From<&BindingConfig> for BindingSpec {
    fn from(config: &BindingConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            keys: config.keys.clone(),
            defaults: config.defaults.clone(),
        }
    }
}

/// A single bound setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: String,
    /// Name of the property source that supplied the value
    pub origin: String,
}

/// Immutable bundle of every bound value at one generation
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationSnapshot {
    generation: u64,
    values: BTreeMap<String, ConfigValue>,
    created_at: DateTime<Utc>,
}

impl ConfigurationSnapshot {
    /// Bind every tracked key out of `environment`.
    ///
    /// Fails as a whole if any value is not a scalar.
    pub fn bind(
        environment: &ResolvedEnvironment,
        spec: &BindingSpec,
        generation: u64,
    ) -> ConfigResult<Self> {
        let mut keys = environment.keys_with_prefix(&spec.prefix);
        keys.extend(spec.keys.iter().cloned());
        keys.sort();
        keys.dedup();

        let mut values = BTreeMap::new();
        for key in keys {
            let bound = match environment.resolve(&key) {
                Resolution::Found { value, source } => ConfigValue {
                    value: scalar_to_string(&key, value)?,
                    origin: source.to_string(),
                    key: key.clone(),
                },
                Resolution::NotFound => ConfigValue {
                    value: spec.default_for(&key).to_string(),
                    origin: DEFAULT_ORIGIN.to_string(),
                    key: key.clone(),
                },
            };
            values.insert(key, bound);
        }

        Ok(Self {
            generation,
            values,
            created_at: Utc::now(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &ConfigValue> {
        self.values.values()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys added, removed or whose value differs between `self` and `next`.
    pub fn changed_keys(&self, next: &ConfigurationSnapshot) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(key, old)| next.values.get(*key).map(|new| new.value != old.value).unwrap_or(true))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(
            next.values
                .keys()
                .filter(|key| !self.values.contains_key(*key))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

fn scalar_to_string(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) => Err(ConfigError::binding(key, "expected a scalar, found an array")),
        Value::Object(_) => Err(ConfigError::binding(key, "expected a scalar, found an object")),
    }
}

/// What a successful refresh did
#[derive(Debug, Clone, Serialize)]
pub struct RefreshOutcome {
    pub changed_keys: Vec<String>,
    pub generation: u64,
}

/// Holder of the current configuration snapshot, re-populated on demand
pub struct RefreshableBinding {
    accessor: Arc<ConfigAccessor>,
    spec: BindingSpec,
    current: ArcSwap<ConfigurationSnapshot>,
    /// Serialises refreshes; readers never take it
    refresh_lock: Mutex<()>,
}

impl RefreshableBinding {
    /// Build generation 0 from the initial environment.
    pub async fn initialize(
        accessor: Arc<ConfigAccessor>,
        spec: BindingSpec,
        mode: LoadMode,
    ) -> ConfigResult<Self> {
        let environment = accessor.load(mode).await?;
        let snapshot = ConfigurationSnapshot::bind(&environment, &spec, 0)?;
        debug!(values = snapshot.len(), "initial configuration snapshot bound");

        Ok(Self {
            accessor,
            spec,
            current: ArcSwap::from_pointee(snapshot),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Current value of `key`, `""` when it is not bound.
    pub fn get(&self, key: &str) -> String {
        self.current
            .load()
            .get(key)
            .map(|bound| bound.value.clone())
            .unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<ConfigValue> {
        self.current.load().get(key).cloned()
    }

    pub fn snapshot(&self) -> Arc<ConfigurationSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    pub fn spec(&self) -> &BindingSpec {
        &self.spec
    }

    pub fn accessor(&self) -> &Arc<ConfigAccessor> {
        &self.accessor
    }

    /// Re-resolve every bound key and swap in the result.
    ///
    /// On error the current snapshot is left untouched.
    pub async fn refresh(&self) -> ConfigResult<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let environment = self.accessor.load(LoadMode::Strict).await?;
        let previous = self.current.load_full();
        let next = ConfigurationSnapshot::bind(&environment, &self.spec, previous.generation() + 1)?;

        let changed_keys = previous.changed_keys(&next);
        let generation = next.generation();
        self.current.store(Arc::new(next));

        Ok(RefreshOutcome {
            changed_keys,
            generation,
        })
    }
}
