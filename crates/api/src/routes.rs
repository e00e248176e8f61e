use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use config_client_core::{MemorySource, RefreshTrigger, RefreshableBinding};

use crate::handlers::{
    actuator::{clear_overrides, get_environment, refresh, set_override},
    health::health_check,
    message::get_message,
};

/// Key served by `GET /message`
pub const MESSAGE_KEY: &str = "app.message";

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub binding: Arc<RefreshableBinding>,
    pub trigger: Arc<RefreshTrigger>,
    /// Runtime overrides written by `POST /actuator/env`
    pub overrides: Arc<MemorySource>,
}

impl AppState {
    pub fn new(trigger: Arc<RefreshTrigger>, overrides: Arc<MemorySource>) -> Self {
        Self {
            binding: trigger.binding().clone(),
            trigger,
            overrides,
        }
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 业务端点
        .route("/message", get(get_message))
        // 管理端点
        .route("/actuator/refresh", post(refresh))
        .route(
            "/actuator/env",
            get(get_environment)
                .post(set_override)
                .delete(clear_overrides),
        )
        .with_state(state)
}
