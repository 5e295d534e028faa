//! Auth error types

use chrono::{DateTime, Utc};
use paygate_types::GatewayError;
use thiserror::Error;

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request token is missing")]
    MissingToken,

    #[error("request token does not match")]
    BadToken,

    #[error("unknown team")]
    UnknownTeam,

    #[error("team is locked until {until}")]
    TeamLocked { until: DateTime<Utc> },

    #[error("team is inactive")]
    TeamInactive,

    #[error("invalid credentials")]
    BadCredentials,

    #[error("password hashing failed")]
    HashingFailed,

    #[error("internal auth error: {0}")]
    Internal(String),
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TeamInactive => GatewayError::Forbidden(err.to_string()),
            AuthError::Internal(msg) => GatewayError::Internal(msg),
            AuthError::HashingFailed => GatewayError::Internal(err.to_string()),
            other => GatewayError::Auth(other.to_string()),
        }
    }
}

impl From<paygate_store::StoreError> for AuthError {
    fn from(err: paygate_store::StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
