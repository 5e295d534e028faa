//! Team registration and self-service profile

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use paygate_engine::team_ops::TeamProfile;
use paygate_types::{GatewayError, OpFamily};

use crate::dto::RegisterRequest;
use crate::error::{ApiError, ApiResult};
use crate::handlers::rate_guard;
use crate::state::AppState;

pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TeamProfile>)> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::ConfirmRegister).await?;
    let profile = state
        .engine
        .register_team(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::ConfirmRegister))?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Self-service profile read under `slug:password` basic auth.
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<TeamProfile>> {
    let (slug, password) = parse_basic(&headers).ok_or_else(|| {
        ApiError::new(
            GatewayError::auth("missing or malformed Authorization header"),
            OpFamily::ConfirmRegister,
        )
    })?;
    rate_guard(&state, &headers, &slug, OpFamily::ConfirmRegister).await?;

    let profile = state
        .engine
        .team_profile(&slug, &password)
        .await
        .map_err(|e| ApiError::new(e, OpFamily::ConfirmRegister))?;
    Ok(Json(profile))
}

fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let pair = String::from_utf8(decoded).ok()?;
    let (slug, password) = pair.split_once(':')?;
    Some((slug.to_string(), password.to_string()))
}
