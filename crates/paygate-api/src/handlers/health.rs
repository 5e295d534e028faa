//! Health endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.engine.store().health_check().await.is_ok();
    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if store_ok { "ok" } else { "degraded" }.to_string(),
        store: store_ok,
        uptime_secs: state.started_at.elapsed().as_secs(),
    };
    (status, Json(body))
}
