//! Paygate authentication layer
//!
//! Three surfaces share this crate:
//! - the merchant API, authenticated by a SHA-256 request token over
//!   the operation's signed fields plus the team password,
//! - the self-service surface, authenticated by `slug:password` basic
//!   auth against an Argon2id hash with failed-attempt lockout,
//! - the admin surface, authenticated by one shared bearer token.
//!
//! All secret comparisons are constant-time.

pub mod admin;
pub mod authenticator;
pub mod error;
pub mod password;
pub mod token;

pub use admin::{verify_admin_token, ADMIN_TOKEN_HEADER};
pub use authenticator::{AuthConfig, Authenticator, MerchantContext};
pub use error::{AuthError, AuthResult};
pub use password::{hash_password, verify_password};
pub use token::{compute_token, verify_token, SignedFields};
