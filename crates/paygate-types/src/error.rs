//! Gateway error taxonomy
//!
//! Every operation returns an explicit `GatewayError` instead of raising;
//! only truly unexpected conditions surface as `Internal` at the HTTP
//! boundary. Each error maps to a four-digit wire code whose leading
//! digit is the operation family (1 init/check, 2 confirm/register,
//! 3 cancel) and whose offset determines the HTTP status.

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Operation family used as the leading digit of wire error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFamily {
    /// Init and status-check operations (1xxx)
    InitCheck,
    /// Confirm and team-registration operations (2xxx)
    ConfirmRegister,
    /// Cancel/reverse/refund operations (3xxx)
    Cancel,
}

impl OpFamily {
    fn digit(self) -> u16 {
        match self {
            Self::InitCheck => 1,
            Self::ConfirmRegister => 2,
            Self::Cancel => 3,
        }
    }
}

/// Gateway error kinds
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Malformed or invalid input, constraint violation
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid token, unknown team, team locked
    #[error("{0}")]
    Auth(String),

    /// Admin-only surface or inactive team
    #[error("{0}")]
    Forbidden(String),

    /// Payment/order not visible to the authenticated team
    #[error("{0}")]
    NotFound(String),

    /// Status machine rejected the transition
    #[error("{0}")]
    InvalidState(String),

    /// Optimistic-version collision, caller may retry with refresh
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// Amount or velocity limit breached
    #[error("{0}")]
    LimitExceeded(String),

    /// Too many requests
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Deadline exceeded while waiting on a dependency
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Bank adapter returned a non-terminal error
    #[error("bank adapter failure: {0}")]
    AdapterFailure(String),

    /// Catch-all; logged with full context, surfaced sanitized
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Offset within the wire-code family; doubles as the source of the
    /// HTTP status mapping.
    pub fn code_offset(&self) -> u16 {
        match self {
            Self::Validation(_) => 100,
            Self::Auth(_) => 1,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidState(_) | Self::Conflict(_) => 409,
            Self::LimitExceeded(_) => 422,
            Self::RateLimited { .. } => 429,
            Self::Timeout(_) => 408,
            Self::AdapterFailure(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Four-digit wire code, e.g. auth failure on init is `1001`,
    /// invalid-state cancel is `3409`. Internal errors are always `9999`.
    pub fn wire_code(&self, family: OpFamily) -> String {
        if matches!(self, Self::Internal(_)) {
            return "9999".to_string();
        }
        format!("{}{:03}", family.digit(), self.code_offset())
    }

    /// HTTP status derived from the code offset
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidState(_) | Self::Conflict(_) => 409,
            Self::LimitExceeded(_) => 422,
            Self::RateLimited { .. } => 429,
            Self::Timeout(_) => 408,
            Self::AdapterFailure(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry the identical request
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::RateLimited { .. } | Self::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_follow_family_and_offset() {
        let auth = GatewayError::auth("bad token");
        assert_eq!(auth.wire_code(OpFamily::InitCheck), "1001");
        assert_eq!(auth.http_status(), 401);

        let state = GatewayError::invalid_state("cannot be cancelled");
        assert_eq!(state.wire_code(OpFamily::Cancel), "3409");
        assert_eq!(state.http_status(), 409);

        let validation = GatewayError::validation("missing PaymentId");
        assert_eq!(validation.wire_code(OpFamily::Cancel), "3100");
        assert_eq!(validation.http_status(), 400);

        let register_dup = GatewayError::Conflict("slug taken".into());
        assert_eq!(register_dup.wire_code(OpFamily::ConfirmRegister), "2409");
    }

    #[test]
    fn internal_is_always_9999() {
        let err = GatewayError::internal("boom");
        assert_eq!(err.wire_code(OpFamily::InitCheck), "9999");
        assert_eq!(err.wire_code(OpFamily::Cancel), "9999");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn conflict_is_retriable() {
        assert!(GatewayError::Conflict("version".into()).is_retriable());
        assert!(!GatewayError::auth("nope").is_retriable());
    }
}
