use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use config_client_core::ConfigError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(ConfigError::SourceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(ConfigError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_message, error_type, suggestions) = match &self {
            ApiError::Config(err @ ConfigError::SourceUnavailable { .. }) => (
                format!("配置源不可用，已保留当前配置: {}", err),
                err.kind(),
                vec![
                    "请检查远程配置服务是否可达".to_string(),
                    "恢复后重新调用 POST /actuator/refresh".to_string(),
                ],
            ),
            ApiError::Config(err @ ConfigError::Binding { .. }) => (
                format!("配置值无法绑定，已保留当前配置: {}", err),
                err.kind(),
                vec!["请检查配置源中的值是否为标量".to_string()],
            ),
            ApiError::Config(err) => (
                err.to_string(),
                err.kind(),
                vec!["查看 GET /health 检查客户端状态".to_string()],
            ),
            ApiError::BadRequest(msg) => (
                format!("请求参数错误: {}", msg),
                "BAD_REQUEST",
                vec![
                    "请检查请求格式和参数".to_string(),
                    "确保Content-Type正确设置".to_string(),
                ],
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
