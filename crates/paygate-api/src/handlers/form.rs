//! Hosted form pages: render, submit, result

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};

use paygate_engine::form::{RenderOutcome, SubmitCommand};
use paygate_engine::CardForm;
use paygate_types::GatewayError;

use crate::dto::SubmitFormRequest;
use crate::state::AppState;
use crate::templates;

pub async fn render(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
) -> Response {
    match state.engine.render_form(&payment_id).await {
        Ok(RenderOutcome::Form(view)) => {
            Html(templates::render_form(&view)).into_response()
        }
        Ok(RenderOutcome::Status(view)) => {
            Html(templates::render_status(&view)).into_response()
        }
        Err(GatewayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Html(templates::render_error("Payment not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(templates::render_error(&e.to_string())),
        )
            .into_response(),
    }
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Form(req): Form<SubmitFormRequest>,
) -> Response {
    let cmd = SubmitCommand {
        payment_id: req.payment_id,
        card: CardForm {
            card_number: req.card_number,
            exp_date: req.exp_date,
            cvv: req.cvv,
            holder: req.holder,
        },
    };

    match state.engine.submit_form(cmd).await {
        Ok(outcome) => {
            let target = outcome.redirect_url.unwrap_or_else(|| {
                format!("/api/v1/paymentform/result/{}", outcome.payment_id)
            });
            (StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
        }
        Err(GatewayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Html(templates::render_error("Payment not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(templates::render_error(&e.to_string())),
        )
            .into_response(),
    }
}

pub async fn result(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<String>,
) -> Response {
    match state.engine.result_view(&payment_id).await {
        Ok(view) => Html(templates::render_status(&view)).into_response(),
        Err(GatewayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Html(templates::render_error("Payment not found")),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(templates::render_error(&e.to_string())),
        )
            .into_response(),
    }
}
