//! WorkOS user-management client implementing [`OAuthProvider`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use super::provider::{AuthenticationResponse, DeviceAuthResponse, OAuthProvider, User};
use crate::error::ProviderError;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the WorkOS device-authorization endpoints.
pub struct WorkOsClient {
    base_url: String,
    client_id: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: String,
    user: User,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl WorkOsClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            http,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<(u16, String), ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok((status, body))
    }
}

/// Map an RFC 8628 error code to its provider error.
pub fn classify_error_code(code: &str, description: Option<String>, status: u16) -> ProviderError {
    match code {
        "authorization_pending" => ProviderError::AuthorizationPending,
        "slow_down" => ProviderError::SlowDown,
        "expired_token" => ProviderError::ExpiredToken,
        "access_denied" => ProviderError::AccessDenied,
        other => ProviderError::Unknown {
            code: other.to_string(),
            description,
            status,
        },
    }
}

fn parse_token_response(status: u16, body: &str) -> Result<AuthenticationResponse, ProviderError> {
    if status != 200 {
        return match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) if !err.error.is_empty() => {
                Err(classify_error_code(&err.error, err.error_description, status))
            }
            _ => Err(ProviderError::Status {
                status,
                body: body.to_string(),
            }),
        };
    }

    let tokens: TokenBody =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(AuthenticationResponse {
        access_token: SecretString::from(tokens.access_token),
        refresh_token: SecretString::from(tokens.refresh_token),
        user: tokens.user,
    })
}

#[async_trait]
impl OAuthProvider for WorkOsClient {
    async fn authorize_device(&self) -> Result<DeviceAuthResponse, ProviderError> {
        let (status, body) = self
            .post_form(
                "/user_management/authorize/device",
                &[("client_id", self.client_id.as_str())],
            )
            .await?;

        if status != 200 {
            return Err(ProviderError::Status { status, body });
        }

        let resp: DeviceAuthResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        debug!(expires_in = resp.expires_in, interval = resp.interval, "Device code issued");
        Ok(resp)
    }

    async fn poll_token(&self, device_code: &str) -> Result<AuthenticationResponse, ProviderError> {
        let (status, body) = self
            .post_form(
                "/user_management/authenticate",
                &[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device_code),
                    ("grant_type", DEVICE_CODE_GRANT),
                ],
            )
            .await?;
        parse_token_response(status, &body)
    }
}
