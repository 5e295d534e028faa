//! Merchant payment endpoints: init, confirm, cancel, check/status

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use paygate_engine::cancel::CancelOutcome;
use paygate_engine::check::CheckOutcome;
use paygate_engine::confirm::ConfirmOutcome;
use paygate_engine::init::InitOutcome;
use paygate_types::OpFamily;

use crate::dto::{CancelRequest, CheckRequest, ConfirmRequest, InitRequest};
use crate::error::{ApiError, ApiResult};
use crate::handlers::rate_guard;
use crate::state::AppState;

pub async fn init(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InitRequest>,
) -> ApiResult<Json<InitOutcome>> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::InitCheck).await?;
    let outcome = state
        .engine
        .init(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::InitCheck))?;
    Ok(Json(outcome))
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<ConfirmOutcome>> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::ConfirmRegister).await?;
    let outcome = state
        .engine
        .confirm(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::ConfirmRegister))?;
    Ok(Json(outcome))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<CancelOutcome>> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::Cancel).await?;
    let outcome = state
        .engine
        .cancel(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::Cancel))?;
    Ok(Json(outcome))
}

pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> ApiResult<Json<CheckOutcome>> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::InitCheck).await?;
    let outcome = state
        .engine
        .check(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::InitCheck))?;
    Ok(Json(outcome))
}

/// GET variant of check; the signed fields arrive as query parameters.
pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(req): Query<CheckRequest>,
) -> ApiResult<Json<CheckOutcome>> {
    rate_guard(&state, &headers, &req.team_slug, OpFamily::InitCheck).await?;
    let outcome = state
        .engine
        .check(req.into())
        .await
        .map_err(|e| ApiError::new(e, OpFamily::InitCheck))?;
    Ok(Json(outcome))
}
