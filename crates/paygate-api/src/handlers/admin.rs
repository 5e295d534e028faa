//! Admin surface: team reads and limit updates behind the shared
//! bearer token. Never touches payment state.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use paygate_auth::{verify_admin_token, ADMIN_TOKEN_HEADER};
use paygate_engine::team_ops::TeamProfile;
use paygate_types::{GatewayError, OpFamily, TeamLimits};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn admin_guard(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_admin_token(provided, &state.admin_token) {
        return Err(ApiError::new(
            GatewayError::Forbidden("admin token required".into()),
            OpFamily::ConfirmRegister,
        ));
    }
    Ok(())
}

pub async fn get_team(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> ApiResult<Json<TeamProfile>> {
    admin_guard(&state, &headers)?;
    let profile = state
        .engine
        .admin_team(&slug)
        .await
        .map_err(|e| ApiError::new(e, OpFamily::ConfirmRegister))?;
    Ok(Json(profile))
}

pub async fn update_limits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(limits): Json<TeamLimits>,
) -> ApiResult<Json<TeamProfile>> {
    admin_guard(&state, &headers)?;
    let profile = state
        .engine
        .admin_update_limits(&slug, limits)
        .await
        .map_err(|e| ApiError::new(e, OpFamily::ConfirmRegister))?;
    Ok(Json(profile))
}
