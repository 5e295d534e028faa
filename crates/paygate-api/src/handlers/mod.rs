//! Request handlers

pub mod admin;
pub mod form;
pub mod health;
pub mod payment;
pub mod team;

use axum::http::HeaderMap;

use paygate_types::{GatewayError, OpFamily};

use crate::error::{ApiError, ApiResult};
use crate::rate_limit::client_ip;
use crate::state::AppState;

/// Per-team and per-IP rate limiting, applied before authentication.
pub(crate) async fn rate_guard(
    state: &AppState,
    headers: &HeaderMap,
    team_slug: &str,
    family: OpFamily,
) -> ApiResult<()> {
    let keys = [
        format!("team:{team_slug}"),
        format!("ip:{}", client_ip(headers)),
    ];
    for key in keys {
        if let Err(retry_after) = state.limiter.check(&key).await {
            return Err(ApiError::new(
                GatewayError::RateLimited {
                    retry_after_secs: retry_after.as_secs().max(1),
                },
                family,
            ));
        }
    }
    Ok(())
}
