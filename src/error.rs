//! Error taxonomy for the token manager and vehicle API client
//!
//! Every failure carries an [`ErrorKind`] so callers can branch on which step
//! failed without matching individual variants. Upstream failures keep the
//! provider's status code and raw body for diagnostics.

use std::fmt;

/// Which step of the flow failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No token stored for the session yet; the connect flow must be restarted.
    MissingToken,
    /// Session payload could not be deserialized.
    StoreCorrupt,
    /// Session backend failed to read or write.
    Session,
    /// Token endpoint rejected the request or returned unusable data.
    TokenExchange,
    VehicleList,
    VehicleInfo,
    LockStatus,
    LockOrUnlock,
    /// Network, DNS or timeout failure talking to the resource API.
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingToken => "missing token",
            ErrorKind::StoreCorrupt => "token store corrupt",
            ErrorKind::Session => "session backend",
            ErrorKind::TokenExchange => "token exchange",
            ErrorKind::VehicleList => "vehicle list",
            ErrorKind::VehicleInfo => "vehicle info",
            ErrorKind::LockStatus => "lock status",
            ErrorKind::LockOrUnlock => "lock or unlock",
            ErrorKind::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no token stored for user '{user}'")]
    MissingToken { user: String },

    #[error("no user connected in this session")]
    NoCurrentUser,

    #[error("session payload under '{key}' is unreadable: {source}")]
    StoreCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("session payload under '{key}' is not valid UTF-8: {source}")]
    StoreNotText {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("session backend error: {0}")]
    Session(#[from] std::io::Error),

    /// Vehicle ID that cannot name a single path segment.
    #[error("{kind} error: invalid vehicle id '{id}'")]
    InvalidVehicleId { kind: ErrorKind, id: String },

    /// Provider answered, but not with something usable.
    #[error("{kind} error: {message}")]
    Upstream {
        kind: ErrorKind,
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("token exchange request failed: {0}")]
    TokenExchangeTransport(#[source] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// Upstream error from a non-success HTTP status.
    pub fn status(
        kind: ErrorKind,
        operation: &str,
        status: u16,
        reason: Option<&str>,
        body: &str,
    ) -> Self {
        Self::Upstream {
            kind,
            message: format!(
                "{} failed: {} - {} content: '{}'",
                operation,
                status,
                reason.unwrap_or(""),
                body
            ),
            status: Some(status),
            body: Some(body.to_string()),
        }
    }

    /// Upstream error from a success status whose body could not be parsed.
    pub fn deserialize(
        kind: ErrorKind,
        operation: &str,
        status: u16,
        body: &str,
        err: &serde_json::Error,
    ) -> Self {
        Self::Upstream {
            kind,
            message: format!(
                "{} failed: response deserialization failed ({}). Response content: '{}'",
                operation, err, body
            ),
            status: Some(status),
            body: Some(body.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingToken { .. } | Error::NoCurrentUser => ErrorKind::MissingToken,
            Error::StoreCorrupt { .. } | Error::StoreNotText { .. } => ErrorKind::StoreCorrupt,
            Error::Session(_) => ErrorKind::Session,
            Error::Upstream { kind, .. } | Error::InvalidVehicleId { kind, .. } => *kind,
            Error::TokenExchangeTransport(_) => ErrorKind::TokenExchange,
            Error::Transport(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status the provider answered with, if the failure came from a response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Raw response body, for logging only.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            Error::Upstream { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_carries_status_and_body() {
        let err = Error::status(
            ErrorKind::VehicleList,
            "list vehicles",
            401,
            Some("Unauthorized"),
            r#"{"type":"AUTHENTICATION"}"#,
        );
        assert_eq!(err.kind(), ErrorKind::VehicleList);
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(err.upstream_body(), Some(r#"{"type":"AUTHENTICATION"}"#));

        let msg = err.to_string();
        assert!(msg.starts_with("vehicle list error:"), "{}", msg);
        assert!(msg.contains("401 - Unauthorized"), "{}", msg);
    }

    #[test]
    fn test_missing_token_kinds() {
        let err = Error::MissingToken {
            user: "u1".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::MissingToken);
        assert_eq!(Error::NoCurrentUser.kind(), ErrorKind::MissingToken);
        assert!(err.upstream_status().is_none());
    }

    #[test]
    fn test_invalid_vehicle_id_keeps_operation_kind() {
        let err = Error::InvalidVehicleId {
            kind: ErrorKind::LockOrUnlock,
            id: "..".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::LockOrUnlock);
        assert!(err.upstream_status().is_none());
        assert!(err.to_string().contains("invalid vehicle id '..'"));
    }

    #[test]
    fn test_deserialize_error_message() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = Error::deserialize(
            ErrorKind::TokenExchange,
            "token exchange",
            200,
            "not json",
            &parse_err,
        );
        assert_eq!(err.kind(), ErrorKind::TokenExchange);
        assert!(err.to_string().contains("deserialization failed"));
    }
}
