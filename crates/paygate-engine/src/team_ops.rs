//! Team registration, self-service profile, admin maintenance

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use paygate_auth::hash_password;
use paygate_types::{
    team::validate_slug, AuditEntry, AuditOutcome, Currency, FeeConfig, GatewayError,
    GatewayResult, Team, TeamFeatures, TeamLimits,
};

use crate::metrics::{names, result_label};
use crate::PaymentEngine;

#[derive(Debug, Clone, Default)]
pub struct RegisterCommand {
    pub slug: String,
    pub name: String,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
    pub cancel_url: Option<String>,
    /// Defaults to RUB when empty
    pub supported_currencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamProfile {
    pub team_slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_active: bool,
    pub supported_currencies: Vec<Currency>,
    pub limits: TeamLimits,
    pub features: TeamFeatures,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TeamProfile {
    fn from_team(team: &Team) -> Self {
        Self {
            team_slug: team.slug.clone(),
            name: team.name.clone(),
            email: team.email.clone(),
            is_active: team.is_active,
            supported_currencies: team.supported_currencies.clone(),
            limits: team.limits.clone(),
            features: team.features.clone(),
            created_at: team.created_at,
        }
    }
}

impl PaymentEngine {
    /// Open registration; produces a team whose password doubles as the
    /// request-signing secret.
    pub async fn register_team(&self, cmd: RegisterCommand) -> GatewayResult<TeamProfile> {
        let result = self.register_inner(cmd).await;
        if let Err(err) = &result {
            self.metrics.counter(
                names::TEAM_REGISTRATIONS,
                &[("result", result_label(err).to_string())],
                1,
            );
        }
        result
    }

    async fn register_inner(&self, cmd: RegisterCommand) -> GatewayResult<TeamProfile> {
        validate_slug(&cmd.slug)?;
        if cmd.name.trim().is_empty() {
            return Err(GatewayError::validation("team name is required"));
        }
        if cmd.password.len() < paygate_auth::password::MIN_PASSWORD_LEN {
            return Err(GatewayError::validation(format!(
                "password must be at least {} characters",
                paygate_auth::password::MIN_PASSWORD_LEN
            )));
        }

        let mut currencies = Vec::new();
        for raw in &cmd.supported_currencies {
            let currency: Currency = raw.parse()?;
            if !currencies.contains(&currency) {
                currencies.push(currency);
            }
        }
        if currencies.is_empty() {
            currencies.push(Currency::RUB);
        }

        let password_hash =
            hash_password(&cmd.password).map_err(|e| GatewayError::internal(e.to_string()))?;

        let now = self.clock.now();
        let team = Team {
            id: Uuid::new_v4(),
            slug: cmd.slug.clone(),
            name: cmd.name.trim().to_string(),
            secret: cmd.password.clone(),
            password_hash,
            email: cmd.email,
            phone: cmd.phone,
            success_url: cmd.success_url,
            fail_url: cmd.fail_url,
            notification_url: cmd.notification_url,
            cancel_url: cmd.cancel_url,
            supported_currencies: currencies,
            limits: TeamLimits::default(),
            features: TeamFeatures::default(),
            fees: FeeConfig::default(),
            metadata: Default::default(),
            failed_auth_attempts: 0,
            locked_until: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.store.create_team(&team).await.map_err(|e| match e {
            paygate_store::StoreError::Duplicate(_) => {
                GatewayError::Conflict(format!("team slug {} is already taken", team.slug))
            }
            other => other.into(),
        })?;

        info!(team = %team.slug, "team registered");
        self.audit(
            AuditEntry::new("registration", "team_register", AuditOutcome::Success, now)
                .with_team(&team.slug),
        )
        .await;
        self.metrics.counter(
            names::TEAM_REGISTRATIONS,
            &[("result", "success".to_string())],
            1,
        );

        Ok(TeamProfile::from_team(&team))
    }

    /// Self-service profile read under basic auth.
    pub async fn team_profile(&self, slug: &str, password: &str) -> GatewayResult<TeamProfile> {
        let team = self
            .authenticator
            .verify_basic(slug, password)
            .await
            .map_err(GatewayError::from)?;
        Ok(TeamProfile::from_team(&team))
    }

    /// Admin read; the caller has already presented the bearer token.
    pub async fn admin_team(&self, slug: &str) -> GatewayResult<TeamProfile> {
        let team = self
            .store
            .team_by_slug(slug)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("team {slug} not found")))?;
        Ok(TeamProfile::from_team(&team))
    }

    /// Admin limit update. Never touches payment state.
    pub async fn admin_update_limits(
        &self,
        slug: &str,
        limits: TeamLimits,
    ) -> GatewayResult<TeamProfile> {
        limits.validate()?;
        let mut team = self
            .store
            .team_by_slug(slug)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("team {slug} not found")))?;

        let now = self.clock.now();
        team.limits = limits;
        team.updated_at = now;
        self.store.update_team(&team).await?;

        self.audit(
            AuditEntry::new("admin", "team_update_limits", AuditOutcome::Success, now)
                .with_team(&team.slug)
                .with_detail(serde_json::json!({ "limits": team.limits })),
        )
        .await;

        Ok(TeamProfile::from_team(&team))
    }
}
