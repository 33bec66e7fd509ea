//! Token storage and management

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::SessionStore;

const USER_KEY: &str = "User";
const TOKENS_KEY: &str = "Tokens";

/// Tokens expiring sooner than this are refreshed before use.
pub const REFRESH_SKEW_MINUTES: i64 = 10;

/// Upper bound on a provider-declared lifetime (ten years).
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Access/refresh token pair for one user.
///
/// `expires_at` is fixed when the record is issued; a refresh produces a new
/// record rather than touching this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(access_token: String, refresh_token: String, expires_in_secs: u64) -> Self {
        Self::issued_at(access_token, refresh_token, expires_in_secs, Utc::now())
    }

    pub fn issued_at(
        access_token: String,
        refresh_token: String,
        expires_in_secs: u64,
        issued: DateTime<Utc>,
    ) -> Self {
        let secs = i64::try_from(expires_in_secs)
            .unwrap_or(MAX_TTL_SECS)
            .min(MAX_TTL_SECS);
        let ttl = Duration::seconds(secs);
        Self {
            access_token,
            refresh_token,
            expires_at: issued + ttl,
        }
    }

    /// True when the token expires within `skew` of `now`.
    pub fn needs_refresh(&self, skew: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at < now + skew
    }

    /// True when the next access would refresh this token first.
    pub fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        self.needs_refresh(Duration::minutes(REFRESH_SKEW_MINUTES), now)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Per-session map of user key to token record.
///
/// Nothing is cached: every call re-reads the session, and every write
/// replaces the whole serialized map.
#[derive(Clone)]
pub struct TokenStore {
    session: Arc<dyn SessionStore>,
}

impl TokenStore {
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self { session }
    }

    fn load(&self) -> Result<HashMap<String, TokenRecord>> {
        match self.session.get(TOKENS_KEY)? {
            Some(data) => serde_json::from_slice(&data).map_err(|source| Error::StoreCorrupt {
                key: TOKENS_KEY.to_string(),
                source,
            }),
            None => Ok(HashMap::new()),
        }
    }

    fn save(&self, tokens: &HashMap<String, TokenRecord>) -> Result<()> {
        let data = serde_json::to_vec(tokens).map_err(|source| Error::StoreCorrupt {
            key: TOKENS_KEY.to_string(),
            source,
        })?;
        self.session.set(TOKENS_KEY, &data)?;
        Ok(())
    }

    pub fn get(&self, user: &str) -> Result<TokenRecord> {
        self.load()?
            .remove(user)
            .ok_or_else(|| Error::MissingToken {
                user: user.to_string(),
            })
    }

    pub fn set(&self, user: &str, record: TokenRecord) -> Result<()> {
        let mut tokens = self.load()?;
        tokens.insert(user.to_string(), record);
        self.save(&tokens)
    }

    /// User key of whoever last completed a code exchange in this session.
    pub fn current_user(&self) -> Result<Option<String>> {
        match self.session.get(USER_KEY)? {
            Some(data) => String::from_utf8(data)
                .map(|user| Some(user).filter(|u| !u.is_empty()))
                .map_err(|source| Error::StoreNotText {
                    key: USER_KEY.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set_current_user(&self, user: &str) -> Result<()> {
        self.session.set(USER_KEY, user.as_bytes())?;
        Ok(())
    }

    /// Forget the current user and every stored token.
    pub fn clear(&self) -> Result<()> {
        self.session.remove(USER_KEY)?;
        self.session.remove(TOKENS_KEY)?;
        Ok(())
    }
}
