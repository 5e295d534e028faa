//! Route definitions

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Merchant lifecycle
        .route("/paymentinit/init", post(handlers::payment::init))
        .route("/paymentconfirm/confirm", post(handlers::payment::confirm))
        .route("/paymentcancel/cancel", post(handlers::payment::cancel))
        .route("/paymentcheck/check", post(handlers::payment::check))
        .route("/paymentcheck/status", get(handlers::payment::status))
        // Hosted form (cardholder-facing)
        .route("/paymentform/render/:payment_id", get(handlers::form::render))
        .route("/paymentform/submit", post(handlers::form::submit))
        .route("/paymentform/result/:payment_id", get(handlers::form::result))
        // Teams
        .route("/teamregistration/register", post(handlers::team::register))
        .route("/teamregistration/me", get(handlers::team::me))
        // Admin
        .nest("/admin", admin_routes())
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/teams/:slug", get(handlers::admin::get_team))
        .route("/teams/:slug/limits", put(handlers::admin::update_limits))
}
