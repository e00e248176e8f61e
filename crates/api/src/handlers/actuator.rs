use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use config_client_core::{ConfigValue, PropertyMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::routes::AppState;

/// `POST /actuator/refresh`: re-resolve configuration and return the changed keys.
pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let report = state.trigger.trigger().await?;
    Ok(Json(report.changed_keys))
}

#[derive(Debug, Serialize)]
pub struct PropertySourceView {
    pub name: String,
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentView {
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub values: Vec<ConfigValue>,
    pub property_sources: Vec<PropertySourceView>,
    /// Overrides written since startup; bound only after the next refresh
    pub overrides: PropertyMap,
}

/// `GET /actuator/env`: the bound snapshot and the configured sources.
pub async fn get_environment(State(state): State<AppState>) -> ApiResponse<EnvironmentView> {
    let snapshot = state.binding.snapshot();
    let property_sources = state
        .binding
        .accessor()
        .describe()
        .into_iter()
        .map(|(name, priority)| PropertySourceView { name, priority })
        .collect();

    ApiResponse::success(EnvironmentView {
        generation: snapshot.generation(),
        created_at: snapshot.created_at(),
        values: snapshot.values().cloned().collect(),
        property_sources,
        overrides: PropertyMap::clone(&state.overrides.snapshot()),
    })
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub name: String,
    pub value: Value,
}

/// `POST /actuator/env`: write a runtime override.
pub async fn set_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> ApiResult<ApiResponse<BTreeMap<String, Value>>> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name 不能为空".to_string()));
    }
    if matches!(request.value, Value::Array(_) | Value::Object(_)) {
        return Err(ApiError::BadRequest(format!("{name} 的值必须是标量")));
    }

    state.overrides.set(name, request.value.clone());
    info!(key = name, "已写入运行时覆盖配置");

    let mut written = BTreeMap::new();
    written.insert(name.to_string(), request.value);
    Ok(ApiResponse::success_with_message(
        written,
        "调用 POST /actuator/refresh 后生效".to_string(),
    ))
}

/// `DELETE /actuator/env`: drop every runtime override.
pub async fn clear_overrides(State(state): State<AppState>) -> ApiResponse<()> {
    state.overrides.clear();
    info!("已清除所有运行时覆盖配置");
    ApiResponse::success_empty_with_message("调用 POST /actuator/refresh 后生效".to_string())
}
