//! Configuration store accessor
//!
//! Owns the ordered list of property sources and turns one pass over them into
//! a [`ResolvedEnvironment`], against which keys are resolved by precedence.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::settings::AppConfig;
use crate::sources::{
    flatten_into, EnvVarSource, FileSource, MemorySource, PropertyMap, PropertySource,
    RemoteSource,
};
use crate::{ConfigError, ConfigResult};

/// How source failures are treated during a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Any failing source fails the whole load (used by refresh).
    Strict,
    /// Failing optional sources are skipped (used at startup without fail-fast).
    Lenient,
}

/// Outcome of resolving one key
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Found { value: &'a Value, source: &'a str },
    NotFound,
}

impl Resolution<'_> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}

/// Properties of one source as seen during a single load
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSource {
    pub name: String,
    pub priority: i32,
    pub properties: PropertyMap,
}

/// Result of querying every source once, highest priority first
#[derive(Debug, Clone, Default)]
pub struct ResolvedEnvironment {
    sources: Vec<LoadedSource>,
}

impl ResolvedEnvironment {
    pub fn new(mut sources: Vec<LoadedSource>) -> Self {
        sources.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { sources }
    }

    /// First source defining `key` wins.
    pub fn resolve(&self, key: &str) -> Resolution<'_> {
        self.sources
            .iter()
            .find_map(|source| {
                source.properties.get(key).map(|value| Resolution::Found {
                    value,
                    source: source.name.as_str(),
                })
            })
            .unwrap_or(Resolution::NotFound)
    }

    /// Every key across all sources that lives under `prefix.`
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let scope = format!("{prefix}.");
        let mut keys: Vec<String> = self
            .sources
            .iter()
            .flat_map(|source| source.properties.keys())
            .filter(|key| key.starts_with(&scope))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn property_sources(&self) -> &[LoadedSource] {
        &self.sources
    }
}

/// Resolves configuration values from an ordered set of property sources
pub struct ConfigAccessor {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl ConfigAccessor {
    pub fn builder() -> ConfigAccessorBuilder {
        ConfigAccessorBuilder::default()
    }

    /// Standard source stack for the given settings.
    ///
    /// `overrides` is shared with the caller so runtime overrides can be written later.
    pub fn from_settings(config: &AppConfig, overrides: Arc<MemorySource>) -> ConfigResult<Self> {
        let mut builder = Self::builder().add_shared_source(overrides);

        if config.config_service.enabled {
            builder = builder.add_source(RemoteSource::from_settings(
                &config.application,
                &config.config_service,
            )?);
        }

        if !config.properties.env_prefixes.is_empty() {
            builder = builder.add_source(EnvVarSource::new(config.properties.env_prefixes.clone()));
        }

        if let Some(path) = &config.properties.file {
            builder = builder
                .add_source(FileSource::new(path.clone()).required(config.properties.required));
        }

        let mut defaults = PropertyMap::new();
        for (key, value) in &config.defaults {
            flatten_into(key, value, &mut defaults);
        }
        builder = builder.add_source(MemorySource::defaults(defaults));

        Ok(builder.build())
    }

    /// Source names and priorities, highest priority first.
    pub fn describe(&self) -> Vec<(String, i32)> {
        self.sources
            .iter()
            .map(|source| (source.name(), source.priority()))
            .collect()
    }

    /// Query every source exactly once.
    pub async fn load(&self, mode: LoadMode) -> ConfigResult<ResolvedEnvironment> {
        let mut loaded = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.load().await {
                Ok(properties) => {
                    debug!(
                        source = %source.name(),
                        properties = properties.len(),
                        "property source loaded"
                    );
                    loaded.push(LoadedSource {
                        name: source.name(),
                        priority: source.priority(),
                        properties,
                    });
                }
                Err(err) if mode == LoadMode::Lenient && source.is_optional() => {
                    warn!(source = %source.name(), error = %err, "跳过不可用的可选配置源");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(ResolvedEnvironment::new(loaded))
    }

    /// Resolve a single key with a fresh strict load.
    ///
    /// Absence is reported as [`ConfigError::NotFound`] here, at the top-level API only.
    pub async fn resolve(&self, key: &str) -> ConfigResult<Value> {
        let environment = self.load(LoadMode::Strict).await?;
        match environment.resolve(key) {
            Resolution::Found { value, .. } => Ok(value.clone()),
            Resolution::NotFound => Err(ConfigError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct ConfigAccessorBuilder {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl ConfigAccessorBuilder {
    pub fn add_source<S>(self, source: S) -> Self
    where
        S: PropertySource + 'static,
    {
        self.add_shared_source(Arc::new(source))
    }

    pub fn add_shared_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(mut self) -> ConfigAccessor {
        // stable: equal priorities keep registration order
        self.sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
        ConfigAccessor {
            sources: self.sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::priority;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingSource {
        optional: bool,
    }

    #[async_trait]
    impl PropertySource for FailingSource {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn priority(&self) -> i32 {
            priority::REMOTE
        }

        fn is_optional(&self) -> bool {
            self.optional
        }

        async fn load(&self) -> ConfigResult<PropertyMap> {
            Err(ConfigError::source_unavailable("failing", "connection refused"))
        }
    }

    fn memory(name: &str, priority: i32, pairs: &[(&str, &str)]) -> MemorySource {
        let properties = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        MemorySource::new(name, priority, properties)
    }

    #[tokio::test]
    async fn test_highest_priority_source_wins() {
        let accessor = ConfigAccessor::builder()
            .add_source(memory("low", 10, &[("app.message", "low"), ("app.only_low", "x")]))
            .add_source(memory("high", 20, &[("app.message", "high")]))
            .build();

        let environment = accessor.load(LoadMode::Strict).await.unwrap();
        assert_eq!(
            environment.resolve("app.message"),
            Resolution::Found {
                value: &json!("high"),
                source: "high"
            }
        );
        assert!(environment.resolve("app.only_low").is_found());
        assert_eq!(environment.resolve("app.missing"), Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_keys_with_prefix_are_merged_and_sorted() {
        let accessor = ConfigAccessor::builder()
            .add_source(memory("a", 1, &[("app.b", "1"), ("server.port", "80")]))
            .add_source(memory("b", 2, &[("app.a", "2"), ("app.b", "3")]))
            .build();

        let environment = accessor.load(LoadMode::Strict).await.unwrap();
        assert_eq!(environment.keys_with_prefix("app"), vec!["app.a", "app.b"]);
    }

    #[tokio::test]
    async fn test_strict_load_fails_on_any_source() {
        let accessor = ConfigAccessor::builder()
            .add_source(FailingSource { optional: true })
            .add_source(memory("defaults", 0, &[("app.message", "default")]))
            .build();

        let err = accessor.load(LoadMode::Strict).await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_lenient_load_skips_optional_sources_only() {
        let accessor = ConfigAccessor::builder()
            .add_source(FailingSource { optional: true })
            .add_source(memory("defaults", 0, &[("app.message", "default")]))
            .build();
        let environment = accessor.load(LoadMode::Lenient).await.unwrap();
        assert_eq!(environment.property_sources().len(), 1);
        assert!(environment.resolve("app.message").is_found());

        let accessor = ConfigAccessor::builder()
            .add_source(FailingSource { optional: false })
            .build();
        assert!(accessor.load(LoadMode::Lenient).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_reports_not_found() {
        let accessor = ConfigAccessor::builder()
            .add_source(memory("defaults", 0, &[("app.message", "hi")]))
            .build();

        assert_eq!(accessor.resolve("app.message").await.unwrap(), json!("hi"));
        assert!(matches!(
            accessor.resolve("app.other").await,
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_settings_orders_standard_stack() {
        let mut config = AppConfig::default();
        config.config_service.enabled = true;
        config
            .defaults
            .insert("app".to_string(), json!({ "message": "fallback" }));

        let accessor =
            ConfigAccessor::from_settings(&config, Arc::new(MemorySource::overrides())).unwrap();
        let priorities: Vec<i32> = accessor.describe().into_iter().map(|(_, p)| p).collect();
        assert_eq!(
            priorities,
            vec![
                priority::OVERRIDES,
                priority::REMOTE,
                priority::ENVIRONMENT,
                priority::FILE,
                priority::DEFAULTS
            ]
        );
    }
}
