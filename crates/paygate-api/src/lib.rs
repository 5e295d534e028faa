//! Paygate HTTP surface
//!
//! axum router over the lifecycle engine: JSON endpoints for the
//! merchant API, HTML pages for the hosted card form, the registration
//! and admin surfaces, and a health probe. Decoding, error-envelope
//! mapping and rate limiting live here; everything stateful is the
//! engine's problem.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod templates;

use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use paygate_engine::PaymentEngine;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use state::AppState;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enable_cors: bool,
    pub rate_limit: RateLimitConfig,
    pub admin_token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: false,
            rate_limit: RateLimitConfig::default(),
            admin_token: String::new(),
        }
    }
}

pub fn create_router(engine: Arc<PaymentEngine>, config: ApiConfig) -> Router {
    let state = Arc::new(AppState {
        engine,
        limiter: RateLimiter::new(config.rate_limit),
        admin_token: config.admin_token,
        started_at: Instant::now(),
    });

    let mut router = Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .nest("/api/v1", routes::api_v1_routes())
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    if config.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}
