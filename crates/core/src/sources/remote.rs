use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{priority, PropertyMap, PropertySource};
use crate::settings::{ApplicationConfig, ConfigServiceConfig};
use crate::{ConfigError, ConfigResult};

/// Body returned by a configuration service for `/{application}/{profile}[/{label}]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentResponse {
    pub name: String,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Highest precedence first
    #[serde(default)]
    pub property_sources: Vec<RemotePropertySource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemotePropertySource {
    pub name: String,
    #[serde(default)]
    pub source: PropertyMap,
}

impl EnvironmentResponse {
    /// Merge all property sources, earlier sources shadowing later ones.
    pub fn into_properties(self) -> PropertyMap {
        let mut merged = PropertyMap::new();
        for property_source in self.property_sources {
            for (key, value) in property_source.source {
                merged.entry(key).or_insert(value);
            }
        }
        merged
    }
}

/// Remote configuration service queried by application name and profile
///
/// Every `load` is one GET bounded by the client timeout, with no retries.
pub struct RemoteSource {
    client: reqwest::Client,
    uri: String,
    application: String,
    profile: String,
    label: Option<String>,
    fail_fast: bool,
}

impl RemoteSource {
    pub fn new(
        uri: impl Into<String>,
        application: impl Into<String>,
        profile: impl Into<String>,
        timeout: Duration,
    ) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Configuration(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            uri: uri.into().trim_end_matches('/').to_string(),
            application: application.into(),
            profile: profile.into(),
            label: None,
            fail_fast: false,
        })
    }

    pub fn from_settings(
        application: &ApplicationConfig,
        service: &ConfigServiceConfig,
    ) -> ConfigResult<Self> {
        let source = Self::new(
            &service.uri,
            &application.name,
            &application.profile,
            service.timeout(),
        )?
        .with_fail_fast(service.fail_fast);

        Ok(match &service.label {
            Some(label) => source.with_label(label),
            None => source,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn endpoint(&self) -> String {
        match &self.label {
            Some(label) => format!(
                "{}/{}/{}/{}",
                self.uri, self.application, self.profile, label
            ),
            None => format!("{}/{}/{}", self.uri, self.application, self.profile),
        }
    }

    pub async fn fetch(&self) -> ConfigResult<EnvironmentResponse> {
        let endpoint = self.endpoint();
        debug!(%endpoint, "fetching remote configuration");

        let response = self
            .client
            .get(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ConfigError::source_unavailable(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::source_unavailable(
                self.name(),
                format!("unexpected status {status}"),
            ));
        }

        response
            .json::<EnvironmentResponse>()
            .await
            .map_err(|e| ConfigError::source_unavailable(self.name(), e))
    }
}

#[async_trait]
impl PropertySource for RemoteSource {
    fn name(&self) -> String {
        format!("configService:{}", self.endpoint())
    }

    fn priority(&self) -> i32 {
        priority::REMOTE
    }

    fn is_optional(&self) -> bool {
        !self.fail_fast
    }

    async fn load(&self) -> ConfigResult<PropertyMap> {
        let environment = self.fetch().await?;
        debug!(
            version = environment.version.as_deref().unwrap_or("-"),
            sources = environment.property_sources.len(),
            "remote configuration received"
        );
        Ok(environment.into_properties())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    #[test]
    fn test_endpoint_with_and_without_label() {
        let source = RemoteSource::new(
            "http://config:8888/",
            "orders",
            "prod",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(source.endpoint(), "http://config:8888/orders/prod");

        let source = source.with_label("main");
        assert_eq!(source.endpoint(), "http://config:8888/orders/prod/main");
    }

    #[test]
    fn test_first_property_source_wins() {
        let response: EnvironmentResponse = serde_json::from_value(json!({
            "name": "orders",
            "profiles": ["prod"],
            "propertySources": [
                { "name": "orders-prod.yml", "source": { "app.message": "prod" } },
                { "name": "orders.yml", "source": { "app.message": "base", "app.extra": "x" } }
            ]
        }))
        .unwrap();

        let merged = response.into_properties();
        assert_eq!(merged["app.message"], "prod");
        assert_eq!(merged["app.extra"], "x");
    }

    #[tokio::test]
    async fn test_load_from_service() {
        let router = Router::new().route(
            "/orders/default",
            get(|| async {
                Json(json!({
                    "name": "orders",
                    "profiles": ["default"],
                    "version": "abc123",
                    "propertySources": [
                        { "name": "orders.yml", "source": { "app.message": "remote" } }
                    ]
                }))
            }),
        );
        let uri = serve(router).await;

        let source = RemoteSource::new(uri, "orders", "default", Duration::from_secs(2)).unwrap();
        let loaded = source.load().await.unwrap();
        assert_eq!(loaded["app.message"], "remote");
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let router = Router::new().route(
            "/orders/default",
            get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let uri = serve(router).await;

        let source = RemoteSource::new(uri, "orders", "default", Duration::from_secs(2)).unwrap();
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let source = RemoteSource::new(
            format!("http://{address}"),
            "orders",
            "default",
            Duration::from_millis(500),
        )
        .unwrap();
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_fail_fast_makes_source_mandatory() {
        let source = RemoteSource::new("http://config", "a", "b", Duration::from_secs(1)).unwrap();
        assert!(source.is_optional());
        assert!(!source.with_fail_fast(true).is_optional());
    }
}
