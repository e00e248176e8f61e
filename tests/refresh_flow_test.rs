//! 端到端测试：客户端进程对接一个进程内的模拟配置服务

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use config_client::{Application, ShutdownManager};
use config_client_core::AppConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// 可修改、可下线的模拟配置服务
#[derive(Clone, Default)]
struct MockConfigService {
    properties: Arc<RwLock<Value>>,
    down: Arc<AtomicBool>,
}

impl MockConfigService {
    fn set(&self, properties: Value) {
        *self.properties.write().unwrap() = properties;
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    async fn start(&self) -> String {
        async fn environment(State(service): State<MockConfigService>) -> impl IntoResponse {
            if service.down.load(Ordering::SeqCst) {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
            let source = service.properties.read().unwrap().clone();
            Json(json!({
                "name": "configuration-client",
                "profiles": ["default"],
                "label": null,
                "version": "1",
                "state": null,
                "propertySources": [
                    { "name": "mock:configuration-client.yml", "source": source }
                ]
            }))
            .into_response()
        }

        let router = Router::new()
            .route("/configuration-client/default", get(environment))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }
}

fn client_config(service_uri: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.config_service.enabled = true;
    config.config_service.uri = service_uri.to_string();
    config.config_service.timeout_seconds = 2;
    config.properties.file = None;
    config.properties.env_prefixes.clear();
    config
}

struct RunningClient {
    base_url: String,
    http: reqwest::Client,
    shutdown: ShutdownManager,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningClient {
    async fn start(config: AppConfig) -> RunningClient {
        let app = Arc::new(Application::build(config).await.expect("build client"));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let shutdown = ShutdownManager::new();
        let shutdown_rx = shutdown.subscribe().await;
        let handle = tokio::spawn(async move {
            app.serve(listener, shutdown_rx).await.unwrap();
        });

        RunningClient {
            base_url,
            http: reqwest::Client::new(),
            shutdown,
            handle,
        }
    }

    async fn message(&self) -> String {
        let response = self
            .http
            .get(format!("{}/message", self.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.text().await.unwrap()
    }

    async fn refresh(&self) -> (reqwest::StatusCode, Value) {
        let response = self
            .http
            .post(format!("{}/actuator/refresh", self.base_url))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn stop(self) {
        self.shutdown.shutdown().await;
        self.handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_remote_change_is_served_after_refresh() {
    let service = MockConfigService::default();
    service.set(json!({ "app.message": "Hello from service" }));
    let uri = service.start().await;

    let client = RunningClient::start(client_config(&uri)).await;
    assert_eq!(client.message().await, "Hello from service");

    service.set(json!({ "app.message": "Hello again" }));
    // 刷新前仍然是旧值
    assert_eq!(client.message().await, "Hello from service");

    let (status, changed) = client.refresh().await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(changed, json!(["app.message"]));
    assert_eq!(client.message().await, "Hello again");

    client.stop().await;
}

#[tokio::test]
async fn test_service_outage_keeps_last_good_value() {
    let service = MockConfigService::default();
    service.set(json!({ "app.message": "stable" }));
    let uri = service.start().await;

    let client = RunningClient::start(client_config(&uri)).await;

    service.set(json!({ "app.message": "never seen" }));
    service.set_down(true);

    let (status, body) = client.refresh().await;
    assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "SOURCE_UNAVAILABLE");
    assert_eq!(client.message().await, "stable");

    service.set(json!({ "app.message": "recovered" }));
    service.set_down(false);
    let (status, _) = client.refresh().await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(client.message().await, "recovered");

    client.stop().await;
}

#[tokio::test]
async fn test_startup_without_service_is_lenient_unless_fail_fast() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let unreachable = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut config = client_config(&unreachable);
    config
        .binding
        .defaults
        .insert("app.message".to_string(), "offline default".to_string());

    let client = RunningClient::start(config.clone()).await;
    assert_eq!(client.message().await, "offline default");
    client.stop().await;

    config.config_service.fail_fast = true;
    assert!(Application::build(config).await.is_err());
}
