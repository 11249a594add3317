use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::services::{AppServices, ServiceMode};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Mode and, when workers are embedded, their counters.
pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let mode = match services.mode() {
        ServiceMode::InMemory => "in_memory",
        ServiceMode::Persistent => "persistent",
    };
    Json(json!({
        "mode": mode,
        "workers": services.worker_stats(),
    }))
}
