//! Configuration loading and storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use oauth2::{AuthUrl, TokenUrl};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_VEHICLES_URL;
use crate::auth::{AuthConfig, DEFAULT_CONNECT_URL, DEFAULT_TOKEN_URL};

const ENV_CLIENT_ID: &str = "SMARTCAR_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SMARTCAR_CLIENT_SECRET";
const ENV_CALLBACK_URI: &str = "SMARTCAR_CALLBACK_URI";

/// Provider endpoint URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub connect_url: String,
    pub token_url: String,
    pub vehicles_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            connect_url: DEFAULT_CONNECT_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            vehicles_url: DEFAULT_VEHICLES_URL.to_string(),
        }
    }
}

/// Application settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth2 client ID issued by the provider
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub callback_uri: String,
    /// When off, connect URLs always use test mode
    pub live_mode_enabled: bool,
    /// Request-level timeout for every provider call
    pub request_timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            callback_uri: "http://localhost:8000/callback".to_string(),
            live_mode_enabled: false,
            request_timeout_secs: 30,
            endpoints: Endpoints::default(),
        }
    }
}

impl Settings {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "vehicle-connect", "vehicle-connect")
            .context("Could not determine config directory")
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the CLI's session files
    pub fn session_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("session"))
    }

    /// Load settings from the default path, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::config_path()?)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Override credentials and callback with non-empty values from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_CLIENT_ID) {
            self.client_id = v;
        }
        if let Some(v) = get(ENV_CLIENT_SECRET) {
            self.client_secret = v;
        }
        if let Some(v) = get(ENV_CALLBACK_URI) {
            self.callback_uri = v;
        }
    }

    /// Save settings to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the client secret)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn auth_config(&self) -> Result<AuthConfig> {
        if self.client_id.is_empty() {
            anyhow::bail!(
                "No client ID configured. Set {} or add client_id to the config file.",
                ENV_CLIENT_ID
            );
        }

        let mut config = AuthConfig::new(self.client_id.clone(), self.client_secret.clone())
            .context("Invalid default OAuth URLs")?;
        config.connect_url = AuthUrl::new(self.endpoints.connect_url.clone())
            .context("Invalid connect_url in config")?;
        config.token_url = TokenUrl::new(self.endpoints.token_url.clone())
            .context("Invalid token_url in config")?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Test mode actually used for a connect request; live mode requires the
    /// `live_mode_enabled` switch.
    pub fn effective_test_mode(&self, requested_test_mode: bool) -> bool {
        requested_test_mode || !self.live_mode_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(settings == Settings::default());
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.toml");

        let settings = Settings {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            live_mode_enabled: true,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert!(loaded == settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "client_id = \"abc\"\n[endpoints]\ntoken_url = \"http://localhost:9/oauth/token\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.client_id, "abc");
        assert_eq!(settings.endpoints.token_url, "http://localhost:9/oauth/token");
        assert_eq!(settings.endpoints.vehicles_url, DEFAULT_VEHICLES_URL);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "from-env"),
            (ENV_CLIENT_SECRET, ""),
            (ENV_CALLBACK_URI, "https://x/cb"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings {
            client_secret: "kept".to_string(),
            ..Settings::default()
        };
        settings.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.client_id, "from-env");
        assert_eq!(settings.client_secret, "kept");
        assert_eq!(settings.callback_uri, "https://x/cb");
    }

    #[test]
    fn test_auth_config_requires_client_id() {
        assert!(Settings::default().auth_config().is_err());

        let settings = Settings {
            client_id: "id".to_string(),
            ..Settings::default()
        };
        let config = settings.auth_config().unwrap();
        assert_eq!(config.client_id.as_str(), "id");
        assert_eq!(config.token_url.url().as_str(), DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_auth_config_rejects_bad_url() {
        let mut settings = Settings {
            client_id: "id".to_string(),
            ..Settings::default()
        };
        settings.endpoints.token_url = "not a url".to_string();
        assert!(settings.auth_config().is_err());
    }

    #[test]
    fn test_live_mode_gate() {
        let mut settings = Settings::default();
        assert!(settings.effective_test_mode(false));
        assert!(settings.effective_test_mode(true));

        settings.live_mode_enabled = true;
        assert!(!settings.effective_test_mode(false));
        assert!(settings.effective_test_mode(true));
    }
}
