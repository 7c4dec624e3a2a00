//! # Token Manager
//!
//! Hands out a usable bearer token for an integration, renewing it through
//! the refresh-token grant when the stored expiry has passed or when a call
//! was rejected with 401/403. Integrations past their 365-day window are
//! never refreshed.

use chrono::Utc;
use metrics::counter;
use tracing::{info, instrument, warn};

use super::error::MarketplaceError;
use super::oauth::MercadoLivreOAuth;
use crate::models::ml_integration;
use crate::repositories::MlIntegrationRepository;

/// An integration row together with the plaintext access token to use.
#[derive(Debug, Clone)]
pub struct Bearer {
    pub integration: ml_integration::Model,
    pub access_token: String,
}

pub struct TokenManager {
    oauth: MercadoLivreOAuth,
    integrations: MlIntegrationRepository,
}

impl TokenManager {
    pub fn new(oauth: MercadoLivreOAuth, integrations: MlIntegrationRepository) -> Self {
        Self {
            oauth,
            integrations,
        }
    }

    pub fn oauth(&self) -> &MercadoLivreOAuth {
        &self.oauth
    }

    /// Stored access token, refreshed first when missing or stale.
    #[instrument(skip_all, fields(integration_id = %integration.id))]
    pub async fn bearer(
        &self,
        integration: ml_integration::Model,
    ) -> Result<Bearer, MarketplaceError> {
        ensure_not_expired(&integration)?;

        if !integration.access_token_stale_at(Utc::now()) {
            if let Some(access_token) = self.integrations.access_token(&integration)? {
                return Ok(Bearer {
                    integration,
                    access_token,
                });
            }
        }
        self.refresh(integration).await
    }

    /// Renews the pair regardless of the stored expiry.
    #[instrument(skip_all, fields(integration_id = %integration.id))]
    pub async fn refresh(
        &self,
        integration: ml_integration::Model,
    ) -> Result<Bearer, MarketplaceError> {
        ensure_not_expired(&integration)?;
        self.oauth.check_credentials()?;

        let Some(refresh_token) = self.integrations.refresh_token(&integration)? else {
            let integration_id = integration.id;
            warn!("Integration has no refresh token; marking as error");
            self.integrations.mark_error(integration).await?;
            counter!("ml_token_refresh_total", "outcome" => "missing_refresh_token").increment(1);
            return Err(MarketplaceError::MissingRefreshToken { integration_id });
        };

        let tokens = match self.oauth.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(err) => {
                counter!("ml_token_refresh_total", "outcome" => "error").increment(1);
                if let MarketplaceError::TokenRefreshFailed { status, body } = &err {
                    warn!(status, body = %body, "Token refresh rejected by Mercado Livre");
                    // invalid_grant: only a new authorization fixes this
                    if matches!(*status, 400 | 401) {
                        self.integrations.mark_error(integration).await?;
                    }
                }
                return Err(err);
            }
        };

        let access_token = tokens.access_token.clone();
        let integration = self.integrations.store_refreshed(integration, &tokens).await?;
        counter!("ml_token_refresh_total", "outcome" => "ok").increment(1);
        info!(
            expires_at = ?integration.token_expires_at,
            rotated = tokens.refresh_token.is_some(),
            "Mercado Livre access token refreshed"
        );
        Ok(Bearer {
            integration,
            access_token,
        })
    }
}

fn ensure_not_expired(integration: &ml_integration::Model) -> Result<(), MarketplaceError> {
    if integration.is_expired() {
        counter!("ml_token_refresh_total", "outcome" => "integration_expired").increment(1);
        return Err(MarketplaceError::IntegrationExpired {
            integration_id: integration.id,
            expired_at: integration.expires_at(),
        });
    }
    Ok(())
}
