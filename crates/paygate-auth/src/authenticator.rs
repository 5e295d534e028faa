//! Request authentication
//!
//! Validates merchant calls against the team credential, maintains the
//! failed-attempt lockout, and binds every authenticated mutating call
//! to a server-assigned request id recorded in the response cache for
//! the replay window. A repeated signed payload is flagged rather than
//! rejected; the status machine and the idempotency cache make the
//! duplicate effect-free.

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use paygate_cache::{keys, ResponseCache};
use paygate_store::Store;
use paygate_types::{new_request_id, Clock, Team};

use crate::error::{AuthError, AuthResult};
use crate::password::verify_password;
use crate::token::{verify_token, SignedFields};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Failed attempts before the team is locked
    pub lockout_threshold: i32,
    /// How long a lock lasts
    pub lockout_duration: Duration,
    /// Replay-binding marker lifetime
    pub replay_window: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: 5,
            lockout_duration: Duration::minutes(15),
            replay_window: Duration::minutes(10),
        }
    }
}

/// Outcome of a successful merchant authentication
#[derive(Debug, Clone)]
pub struct MerchantContext {
    pub team: Team,
    /// Server-assigned id, echoed as `X-Request-Id` and bound to the
    /// replay marker
    pub request_id: String,
    /// A live marker for the same signed payload already existed
    pub replayed: bool,
}

pub struct Authenticator {
    store: Arc<dyn Store>,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<ResponseCache>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            config,
        }
    }

    /// Validate an HMAC-signed merchant call.
    pub async fn verify_merchant(
        &self,
        op: &str,
        team_slug: &str,
        token: Option<&str>,
        fields: &SignedFields,
    ) -> AuthResult<MerchantContext> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::MissingToken),
        };

        let team = self
            .store
            .team_by_slug(team_slug)
            .await?
            .ok_or(AuthError::UnknownTeam)?;

        let now = self.clock.now();
        if let Some(until) = team.locked_until {
            if now < until {
                return Err(AuthError::TeamLocked { until });
            }
        }
        if !team.is_active {
            return Err(AuthError::TeamInactive);
        }

        if !verify_token(token, fields, &team.secret) {
            self.note_failure(&team.slug).await?;
            return Err(AuthError::BadToken);
        }

        if team.failed_auth_attempts > 0 {
            self.store.reset_failed_auth(&team.slug).await?;
        }

        let replayed = !self.cache.mark(
            keys::replay(team.id, op, token),
            self.config.replay_window,
        );
        if replayed {
            warn!(team = %team.slug, op, "repeated signed payload within replay window");
        }

        Ok(MerchantContext {
            team,
            request_id: new_request_id(),
            replayed,
        })
    }

    /// Validate a `slug:password` basic-auth pair for the self-service
    /// surface.
    pub async fn verify_basic(&self, team_slug: &str, password: &str) -> AuthResult<Team> {
        let team = self
            .store
            .team_by_slug(team_slug)
            .await?
            .ok_or(AuthError::UnknownTeam)?;

        let now = self.clock.now();
        if let Some(until) = team.locked_until {
            if now < until {
                return Err(AuthError::TeamLocked { until });
            }
        }
        if !team.is_active {
            return Err(AuthError::TeamInactive);
        }

        if !verify_password(password, &team.password_hash)? {
            self.note_failure(&team.slug).await?;
            return Err(AuthError::BadCredentials);
        }

        if team.failed_auth_attempts > 0 {
            self.store.reset_failed_auth(&team.slug).await?;
        }
        Ok(team)
    }

    async fn note_failure(&self, slug: &str) -> AuthResult<()> {
        let attempts = self.store.record_failed_auth(slug).await?;
        if attempts >= self.config.lockout_threshold {
            let until = self.clock.now() + self.config.lockout_duration;
            self.store.lock_team(slug, until).await?;
            warn!(team = slug, attempts, %until, "team locked after failed auth attempts");
        }
        Ok(())
    }
}
