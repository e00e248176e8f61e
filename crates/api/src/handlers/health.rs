use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let stats = state.trigger.stats().await;

    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "configuration-client",
        "version": env!("CARGO_PKG_VERSION"),
        "generation": state.binding.generation(),
        "refresh": stats,
    }))
}
