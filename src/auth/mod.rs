//! Authentication module for the Smartcar API
//!
//! Implements the OAuth2 authorization code flow: building the connect URL,
//! exchanging the returned code for tokens, and refreshing them.

pub mod connect;
pub mod oauth;
pub mod tokens;

pub use connect::{build_connect_url, CONNECT_SCOPE};
pub use oauth::TokenExchangeClient;
pub use tokens::{TokenRecord, TokenStore, REFRESH_SKEW_MINUTES};

use oauth2::{AuthUrl, ClientId, ClientSecret, TokenUrl};

pub const DEFAULT_CONNECT_URL: &str = "https://connect.smartcar.com/oauth/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://auth.smartcar.com/oauth/token";

/// OAuth2 client configuration for the provider
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Application client ID
    pub client_id: ClientId,
    /// Application client secret (confidential client)
    pub client_secret: ClientSecret,
    /// Authorization (connect) endpoint
    pub connect_url: AuthUrl,
    /// Token endpoint for code and refresh grants
    pub token_url: TokenUrl,
}

impl AuthConfig {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, url::ParseError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            connect_url: AuthUrl::new(DEFAULT_CONNECT_URL.to_string())?,
            token_url: TokenUrl::new(DEFAULT_TOKEN_URL.to_string())?,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(token_base: &str) -> Self {
        let mut config = Self::new("test-client".to_string(), "test-secret".to_string())
            .expect("default URLs parse");
        config.token_url =
            TokenUrl::new(format!("{}/oauth/token", token_base)).expect("stub URL parses");
        config
    }
}
