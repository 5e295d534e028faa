//! Shared application state

use std::sync::Arc;
use std::time::Instant;

use paygate_engine::PaymentEngine;

use crate::rate_limit::RateLimiter;

pub struct AppState {
    pub engine: Arc<PaymentEngine>,
    pub limiter: RateLimiter,
    pub admin_token: String,
    pub started_at: Instant,
}
