//! Authenticated HTTP client for the Smartcar vehicle API
//!
//! Wraps reqwest::Client with bearer token injection and proactive refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{build_connect_url, AuthConfig, TokenExchangeClient, TokenStore};
use crate::error::{Error, ErrorKind, Result};
use crate::session::SessionStore;

pub const DEFAULT_VEHICLES_URL: &str = "https://api.smartcar.com/v2.0/vehicles";

/// Raw outcome of a resource call, interpreted by each operation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub body: String,
    pub status: u16,
    pub reason: Option<String>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Turn a non-success status into a typed error.
    pub fn check(&self, kind: ErrorKind, operation: &str) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        let err = Error::status(
            kind,
            operation,
            self.status,
            self.reason.as_deref(),
            &self.body,
        );
        tracing::error!("{}", err);
        Err(err)
    }

    /// Check the status, then parse the body as `T`.
    pub fn parse<T: DeserializeOwned>(&self, kind: ErrorKind, operation: &str) -> Result<T> {
        self.check(kind, operation)?;
        serde_json::from_str(&self.body).map_err(|e| {
            let err = Error::deserialize(kind, operation, self.status, &self.body, &e);
            tracing::error!("{}", err);
            err
        })
    }
}

/// Build the shared transport with a request-level timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Caller-facing client: connect flow, token exchange and vehicle resources.
pub struct VehicleClient {
    http: reqwest::Client,
    vehicles_url: Url,
    exchange: TokenExchangeClient,
    store: TokenStore,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VehicleClient {
    pub fn new(
        http: reqwest::Client,
        auth_config: AuthConfig,
        vehicles_url: &str,
        session: Arc<dyn SessionStore>,
    ) -> std::result::Result<Self, url::ParseError> {
        let vehicles_url = Url::parse(vehicles_url)?;
        if vehicles_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }

        let store = TokenStore::new(session);
        let exchange = TokenExchangeClient::new(http.clone(), auth_config, store.clone());
        Ok(Self {
            http,
            vehicles_url,
            exchange,
            store,
            refresh_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn build_connect_url(&self, test_mode: bool, callback_uri: &str) -> String {
        build_connect_url(self.exchange.config(), test_mode, callback_uri)
    }

    /// Complete the connect flow; the exchanging user becomes current.
    pub async fn exchange_code(&self, code: &str, callback_uri: &str) -> Result<String> {
        self.exchange.exchange_code(code, callback_uri).await
    }

    fn refresh_lock(&self, user: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(user.to_string()).or_default().clone()
    }

    /// Access token for `user`, refreshed first if it is inside the skew window.
    ///
    /// The read-check-refresh-write sequence runs under a per-user lock, so
    /// concurrent callers see the refreshed record instead of refreshing again.
    pub async fn get_access_token(&self, user: &str) -> Result<String> {
        let lock = self.refresh_lock(user);
        let _guard = lock.lock().await;

        let record = self.store.get(user)?;
        tracing::trace!(user = %user, expires_at = %record.expires_at, "Found token");

        if record.refresh_due(Utc::now()) {
            tracing::info!(user = %user, "Token near expiry, refreshing");
            return self.exchange.refresh(user, &record.refresh_token).await;
        }

        Ok(record.access_token)
    }

    async fn current_access_token(&self) -> Result<String> {
        let user = self.store.current_user()?.ok_or(Error::NoCurrentUser)?;
        self.get_access_token(&user).await
    }

    /// Vehicles URL with `segments` appended, each percent-encoded as a
    /// single path segment (`/` becomes `%2F`).
    fn resource_url(&self, segments: &[&str]) -> Url {
        let mut url = self.vehicles_url.clone();
        // cannot-be-a-base URLs are rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `segments` under the vehicles URL, or POST `body` as JSON when given.
    ///
    /// Transport failures propagate as [`Error::Transport`]; status handling
    /// is left to the caller.
    pub(crate) async fn send(
        &self,
        segments: &[&str],
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let token = self.current_access_token().await?;
        let url = self.resource_url(segments);

        let request = match body {
            Some(json) => {
                tracing::debug!("POST {}", url);
                self.http.post(url.clone()).json(json)
            }
            None => {
                tracing::debug!("GET {}", url);
                self.http.get(url.clone())
            }
        };

        let resp = request.bearer_auth(&token).send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", url, e);
            Error::Transport(e)
        })?;

        let status = resp.status();
        let body = resp.text().await?;

        Ok(ApiResponse {
            body,
            status: status.as_u16(),
            reason: status.canonical_reason().map(String::from),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::TokenRecord;
    use crate::session::MemorySession;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn client_for(server: &MockServer) -> VehicleClient {
        VehicleClient::new(
            reqwest::Client::new(),
            AuthConfig::for_tests(&server.uri()),
            &format!("{}/v2.0/vehicles", server.uri()),
            Arc::new(MemorySession::new()),
        )
        .unwrap()
    }

    /// Store a record for `user` expiring `expires_in` seconds from now.
    pub(crate) fn seed(client: &VehicleClient, user: &str, access: &str, expires_in: u64) {
        client
            .store()
            .set(
                user,
                TokenRecord::new(access.to_string(), "R1".to_string(), expires_in),
            )
            .unwrap();
        client.store().set_current_user(user).unwrap();
    }

    fn refresh_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A2",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "R2"
        }))
    }

    #[tokio::test]
    async fn test_refresh_once_inside_skew() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("refresh_token=R1"))
            .respond_with(refresh_response())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        seed(&client, "u1", "A1", 9 * 60);

        assert_eq!(client.get_access_token("u1").await.unwrap(), "A2");
        assert_eq!(client.get_access_token("u1").await.unwrap(), "A2");
        assert_eq!(client.store().get("u1").unwrap().refresh_token, "R2");
    }

    #[tokio::test]
    async fn test_concurrent_callers_refresh_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(refresh_response().set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        seed(&client, "u1", "A1", 9 * 60);

        let (a, b) = tokio::join!(client.get_access_token("u1"), client.get_access_token("u1"));
        assert_eq!(a.unwrap(), "A2");
        assert_eq!(b.unwrap(), "A2");
    }

    #[tokio::test]
    async fn test_fresh_token_not_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(refresh_response())
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        seed(&client, "u1", "A1", 3600);
        assert_eq!(client.get_access_token("u1").await.unwrap(), "A1");
    }

    #[tokio::test]
    async fn test_missing_token() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client.get_access_token("nobody").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingToken);

        let err = client.send(&[], None).await.unwrap_err();
        assert!(matches!(err, Error::NoCurrentUser));
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_and_wraps_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/vehicles/v1"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        seed(&client, "u1", "A1", 3600);

        let resp = client.send(&["v1"], None).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.reason.as_deref(), Some("Not Found"));
        assert_eq!(resp.body, "nope");
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let server = MockServer::start().await;
        let client = VehicleClient::new(
            reqwest::Client::new(),
            AuthConfig::for_tests(&server.uri()),
            "http://127.0.0.1:1/v2.0/vehicles",
            Arc::new(MemorySession::new()),
        )
        .unwrap();
        seed(&client, "u1", "A1", 3600);

        let err = client.send(&[], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_request_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/vehicles"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "vehicles": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = VehicleClient::new(
            http_client(Duration::from_millis(50)).unwrap(),
            AuthConfig::for_tests(&server.uri()),
            &format!("{}/v2.0/vehicles", server.uri()),
            Arc::new(MemorySession::new()),
        )
        .unwrap();
        seed(&client, "u1", "A1", 3600);

        let err = client.send(&[], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(&err, Error::Transport(e) if e.is_timeout()), "{}", err);
    }

    #[test]
    fn test_resource_url_encodes_segments() {
        let client = VehicleClient::new(
            reqwest::Client::new(),
            AuthConfig::for_tests("http://localhost"),
            "https://api.example.com/v2.0/vehicles/",
            Arc::new(MemorySession::new()),
        )
        .unwrap();

        assert_eq!(
            client.resource_url(&[]).as_str(),
            "https://api.example.com/v2.0/vehicles"
        );
        assert_eq!(
            client.resource_url(&["v1", "security"]).as_str(),
            "https://api.example.com/v2.0/vehicles/v1/security"
        );
        assert_eq!(
            client.resource_url(&["../other?x#y"]).as_str(),
            "https://api.example.com/v2.0/vehicles/..%2Fother%3Fx%23y"
        );
    }

    #[test]
    fn test_rejects_unusable_vehicles_url() {
        let new = |url: &str| {
            VehicleClient::new(
                reqwest::Client::new(),
                AuthConfig::for_tests("http://localhost"),
                url,
                Arc::new(MemorySession::new()),
            )
        };
        assert!(new("not a url").is_err());
        assert!(new("mailto:fleet@example.com").is_err());
    }

    #[test]
    fn test_api_response_check() {
        let ok = ApiResponse {
            body: "{}".into(),
            status: 204,
            reason: None,
        };
        assert!(ok.check(ErrorKind::LockOrUnlock, "Lock").is_ok());

        let forbidden = ApiResponse {
            body: "denied".into(),
            status: 403,
            reason: Some("Forbidden".into()),
        };
        let err = forbidden.check(ErrorKind::LockStatus, "Lock status").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockStatus);
        assert_eq!(err.upstream_status(), Some(403));
        assert_eq!(err.upstream_body(), Some("denied"));
    }
}
