//! # Config Client API
//!
//! 可刷新配置客户端的HTTP接口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET /message` - 当前 `app.message` 的值（纯文本）
//! - `POST /actuator/refresh` - 重新解析配置并原子替换快照，返回变更的键
//! - `GET /actuator/env` - 当前快照与配置源
//! - `POST /actuator/env` - 写入运行时覆盖配置（刷新后生效）
//! - `DELETE /actuator/env` - 清除运行时覆盖配置（刷新后生效）
//! - `GET /health` - 健康检查
//!
//! ### API 调用示例
//!
//! ```bash
//! curl -X POST http://localhost:8080/actuator/env \
//!   -H "Content-Type: application/json" \
//!   -d '{"name": "app.message", "value": "Hello test"}'
//!
//! curl -X POST http://localhost:8080/actuator/refresh
//! # ["app.message"]
//!
//! curl http://localhost:8080/message
//! # Hello test
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;

use config_client_core::{MemorySource, RefreshTrigger};
use middleware::{request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(trigger: Arc<RefreshTrigger>, overrides: Arc<MemorySource>) -> Router {
    let state = AppState::new(trigger, overrides);

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
