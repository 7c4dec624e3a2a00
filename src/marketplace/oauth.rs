//! # Mercado Livre OAuth Client
//!
//! Authorization-code flow with PKCE (S256), refresh-token grant and the
//! `/users/me` lookup that identifies the connected seller.

use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

use super::error::MarketplaceError;
use super::types::{SellerProfile, TokenResponse};
use crate::config::MercadoLivreConfig;
use crate::repositories::ml_integration::TokenPair;

/// Provider name stored alongside OAuth states.
pub const PROVIDER: &str = "mercadolivre";

/// Verifier/challenge pair for one authorization.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = random_urlsafe();
        let challenge = base64_url::encode(&Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// 32 random bytes, base64url without padding.
pub fn generate_state() -> String {
    random_urlsafe()
}

fn random_urlsafe() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}

struct Credentials<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Clone)]
pub struct MercadoLivreOAuth {
    http: Client,
    config: MercadoLivreConfig,
}

impl MercadoLivreOAuth {
    pub fn new(http: Client, config: MercadoLivreConfig) -> Self {
        Self { http, config }
    }

    pub fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    fn credentials(&self) -> Result<Credentials<'_>, MarketplaceError> {
        match (
            self.config.client_id.as_deref().filter(|v| !v.is_empty()),
            self.config.client_secret.as_deref().filter(|v| !v.is_empty()),
        ) {
            (Some(client_id), Some(client_secret)) => Ok(Credentials {
                client_id,
                client_secret,
            }),
            _ => Err(MarketplaceError::MissingClientCredentials),
        }
    }

    /// Fails with `missing_client_credentials` before any state is touched.
    pub fn check_credentials(&self) -> Result<(), MarketplaceError> {
        self.credentials()?;
        self.redirect_uri().map(|_| ())
    }

    fn redirect_uri(&self) -> Result<&str, MarketplaceError> {
        self.config
            .redirect_uri
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(MarketplaceError::MissingClientCredentials)
    }

    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<Url, MarketplaceError> {
        let credentials = self.credentials()?;
        let mut url = Url::parse(&format!(
            "{}/authorization",
            self.config.auth_base.trim_end_matches('/')
        ))
        .map_err(|e| MarketplaceError::InvalidConfiguration(format!("ML_AUTH_BASE: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", credentials.client_id)
            .append_pair("redirect_uri", self.redirect_uri()?)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenPair, MarketplaceError> {
        let credentials = self.credentials()?;
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", credentials.client_id),
            ("client_secret", credentials.client_secret),
            ("code", code),
            ("redirect_uri", self.redirect_uri()?),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self.post_token(&form).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Authorization code exchange rejected");
            return Err(MarketplaceError::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }
        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| MarketplaceError::MalformedResponse(format!("token response: {e}")))?;
        Ok(tokens.into_pair(Utc::now()))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, MarketplaceError> {
        let credentials = self.credentials()?;
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", credentials.client_id),
            ("client_secret", credentials.client_secret),
            ("refresh_token", refresh_token),
        ];

        let response = self.post_token(&form).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketplaceError::TokenRefreshFailed {
                status: status.as_u16(),
                body,
            });
        }
        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| MarketplaceError::MalformedResponse(format!("token response: {e}")))?;
        Ok(tokens.into_pair(Utc::now()))
    }

    pub async fn current_user(&self, access_token: &str) -> Result<SellerProfile, MarketplaceError> {
        let response = self
            .http
            .get(format!("{}/users/me", self.api_base()))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Seller profile lookup failed");
            return Err(MarketplaceError::UserFetchFailed {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| MarketplaceError::MalformedResponse(format!("users/me: {e}")))
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<reqwest::Response, MarketplaceError> {
        Ok(self
            .http
            .post(format!("{}/oauth/token", self.api_base()))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> MercadoLivreConfig {
        MercadoLivreConfig {
            client_id: Some("client-1".into()),
            client_secret: Some("secret".into()),
            redirect_uri: Some("https://api.example.com/integrations/mercadolivre/callback".into()),
            ..MercadoLivreConfig::default()
        }
    }

    #[test]
    fn pkce_challenge_is_s256_of_verifier() {
        let pkce = Pkce::generate();
        let expected = base64_url::encode(&Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
        assert_eq!(pkce.verifier.len(), 43);
    }

    #[test]
    fn authorize_url_carries_state_and_challenge() {
        let oauth = MercadoLivreOAuth::new(Client::new(), configured());
        let url = oauth.authorize_url("state-1", "challenge-1").unwrap();
        assert_eq!(url.path(), "/authorization");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-1");
        assert_eq!(pairs["state"], "state-1");
        assert_eq!(pairs["code_challenge"], "challenge-1");
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let oauth = MercadoLivreOAuth::new(Client::new(), MercadoLivreConfig::default());
        let err = oauth.authorize_url("s", "c").unwrap_err();
        assert_eq!(err.code(), "missing_client_credentials");
    }
}
