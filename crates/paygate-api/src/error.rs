//! API error mapping
//!
//! Every failure leaves the handler as an [`ApiError`]: the engine's
//! error plus the operation family that owns the four-digit wire code.
//! Internal errors are logged with full context and surface sanitized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use paygate_types::{GatewayError, OpFamily};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Uniform error envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub family: OpFamily,
}

impl ApiError {
    pub fn new(error: GatewayError, family: OpFamily) -> Self {
        Self { error, family }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self.error {
            GatewayError::Internal(detail) => {
                error!(detail = %detail, "internal error surfaced to caller");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            error_code: self.error.wire_code(self.family),
            message,
            details: None,
        };
        (status, Json(body)).into_response()
    }
}
