//! OAuth2 authorization code and refresh token grants

use oauth2::{AuthorizationCode, RefreshToken};
use serde::Deserialize;
use uuid::Uuid;

use super::tokens::{TokenRecord, TokenStore};
use super::AuthConfig;
use crate::error::{Error, ErrorKind, Result};

/// Body returned by the token endpoint for both grant types.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
    refresh_token: String,
}

/// Client for the provider's token endpoint.
///
/// Successful exchanges are written straight into the [`TokenStore`]; the
/// exchanging user becomes the session's current user.
#[derive(Clone)]
pub struct TokenExchangeClient {
    http: reqwest::Client,
    config: AuthConfig,
    store: TokenStore,
}

impl TokenExchangeClient {
    pub fn new(http: reqwest::Client, config: AuthConfig, store: TokenStore) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Exchange an authorization code from the connect callback for tokens.
    ///
    /// The session's current user key is reused so a reconnect replaces
    /// that user's record; a key is minted only for a session without one.
    /// Returns the access token.
    pub async fn exchange_code(&self, code: &str, callback_uri: &str) -> Result<String> {
        let code = AuthorizationCode::new(code.to_string());
        // an unreadable current user is replaced by the new connection
        let user = match self.store.current_user() {
            Ok(Some(user)) => user,
            _ => Uuid::new_v4().to_string(),
        };

        tracing::debug!(user = %user, "Exchanging authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code.secret().as_str()),
            ("redirect_uri", callback_uri),
        ];
        self.perform_exchange(&user, &params).await
    }

    /// Trade a refresh token for a new token pair stored under `user`.
    pub async fn refresh(&self, user: &str, refresh_token: &str) -> Result<String> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());

        tracing::info!(user = %user, "Refreshing tokens");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.secret().as_str()),
        ];
        self.perform_exchange(user, &params).await
    }

    async fn perform_exchange(&self, user: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = self.config.token_url.url().clone();

        let resp = self
            .http
            .post(url)
            .basic_auth(
                self.config.client_id.as_str(),
                Some(self.config.client_secret.secret()),
            )
            .form(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Token endpoint request failed: {}", e);
                Error::TokenExchangeTransport(e)
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::TokenExchangeTransport)?;

        if !status.is_success() {
            let err = Error::status(
                ErrorKind::TokenExchange,
                "Token exchange",
                status.as_u16(),
                status.canonical_reason(),
                &body,
            );
            tracing::error!("{}", err);
            return Err(err);
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            let err = Error::deserialize(
                ErrorKind::TokenExchange,
                "Token exchange",
                status.as_u16(),
                &body,
                &e,
            );
            tracing::error!("{}", err);
            err
        })?;

        let record = TokenRecord::new(
            parsed.access_token.clone(),
            parsed.refresh_token.clone(),
            parsed.expires_in,
        );
        let access_token = record.access_token.clone();

        // Current user first: if the record write then fails, the user has
        // no record and the next call reports MissingToken.
        self.store.set_current_user(user)?;
        self.store.set(user, record)?;

        tracing::debug!(
            user = %user,
            token_type = ?parsed.token_type,
            expires_in = parsed.expires_in,
            "Tokens stored"
        );
        Ok(access_token)
    }
}
