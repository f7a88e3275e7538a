//! OAuth device-authorization provider seam.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ProviderError;

/// Response of the device-authorization endpoint (RFC 8628 §3.2).
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: String,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Recommended poll interval in seconds. Zero means the provider did not say.
    #[serde(default)]
    pub interval: u64,
}

/// The authenticated user as reported by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Tokens returned once the user approves the device.
#[derive(Debug)]
pub struct AuthenticationResponse {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user: User,
}

/// An OAuth provider that supports the device-authorization grant.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Request a device code / user code pair.
    async fn authorize_device(&self) -> Result<DeviceAuthResponse, ProviderError>;

    /// Exchange the device code for tokens.
    ///
    /// Pending, slow-down, expired and denied states come back as the matching
    /// `ProviderError` variants.
    async fn poll_token(&self, device_code: &str) -> Result<AuthenticationResponse, ProviderError>;
}
