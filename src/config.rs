//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Production control-plane endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.usetero.com/graphql";
/// Local control plane used by debug builds.
pub const DEV_API_ENDPOINT: &str = "http://localhost:8081/graphql";
/// OAuth provider base URL.
pub const DEFAULT_AUTH_URL: &str = "https://api.workos.com";

/// CLI configuration, resolved from the environment and then command-line flags.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// GraphQL endpoint of the control plane.
    pub api_endpoint: String,
    /// Base URL of the OAuth device-authorization provider.
    pub auth_url: String,
    /// OAuth client id registered with the provider.
    pub client_id: Option<String>,
    /// Verbose logging.
    pub debug: bool,
    /// State directory (preferences, credentials, logs).
    pub home: PathBuf,
}

impl CliConfig {
    /// Build from environment variables.
    ///
    /// `TERO_API_ENDPOINT`, `TERO_AUTH_URL`, `TERO_CLIENT_ID`, `TERO_DEBUG`
    /// and `TERO_HOME` are all optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let home = match std::env::var("TERO_HOME").ok().filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(".tero"),
        };

        let api_endpoint = std::env::var("TERO_API_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_api_endpoint().to_string());

        let auth_url = std::env::var("TERO_AUTH_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());

        let client_id = std::env::var("TERO_CLIENT_ID")
            .ok()
            .filter(|s| !s.is_empty());

        let debug = std::env::var("TERO_DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            api_endpoint,
            auth_url,
            client_id,
            debug,
            home,
        })
    }

    /// The OAuth client id, or a configuration error naming how to set it.
    pub fn require_client_id(&self) -> Result<&str, ConfigError> {
        self.client_id
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "TERO_CLIENT_ID".to_string(),
                hint: "Set TERO_CLIENT_ID or pass --client-id".to_string(),
            })
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.home.join("config.yaml")
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.home.join("credentials.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }
}

fn default_api_endpoint() -> &'static str {
    if cfg!(debug_assertions) {
        DEV_API_ENDPOINT
    } else {
        DEFAULT_API_ENDPOINT
    }
}
