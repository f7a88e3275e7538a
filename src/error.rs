//! Error types for the tero CLI.

use std::time::Duration;

/// Top-level error type. Every step keeps at most one of these in its error slot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Failed to save preferences: {0}")]
    Preferences(#[from] PreferencesError),

    #[error("{0}")]
    Api(#[from] ApiError),

    /// The control plane rejected user-supplied credentials.
    #[error("{0}")]
    Validation(String),

    /// A background discovery job reported its last error. Polling continues.
    #[error("{0}")]
    Discovery(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Could not determine the home directory")]
    NoHomeDir,
}

/// Raw responses from the OAuth provider's token endpoint.
///
/// The first four variants are the RFC 8628 error codes; they are inputs to
/// the poll classifier, not failures in their own right.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("authorization pending: user has not completed authentication")]
    AuthorizationPending,

    #[error("slow down: polling too frequently")]
    SlowDown,

    #[error("expired token: device code has expired")]
    ExpiredToken,

    #[error("access denied: user denied authorization")]
    AccessDenied,

    #[error("{}", unknown_message(.code, .description.as_deref(), *.status))]
    Unknown {
        code: String,
        description: Option<String>,
        status: u16,
    },

    #[error("Auth provider request failed: {0}")]
    Http(String),

    #[error("Auth provider error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from auth provider: {0}")]
    InvalidResponse(String),
}

fn unknown_message(code: &str, description: Option<&str>, status: u16) -> String {
    match description {
        Some(d) if !d.is_empty() => format!("Auth provider error {code}: {d} (status {status})"),
        _ => format!("Auth provider error {code} (status {status})"),
    }
}

/// Outcomes of the device-authorization flow that end it.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("device code expired - please restart authentication")]
    Expired,

    #[error("user denied authorization")]
    Denied,

    #[error("authentication cancelled")]
    Cancelled,

    #[error("device authorization timed out after {0:?}")]
    Timeout(Duration),

    #[error("no access token found")]
    NoAccessToken,

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("failed to store credentials: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Whether restarting the device flow from scratch can fix this.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Expired | Self::Denied)
    }
}

/// Secure credential storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Preference persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Control-plane API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Control plane returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// GraphQL `errors[].message` values, newline-joined.
    #[error("{0}")]
    GraphQl(String),

    #[error("Invalid response from control plane: {0}")]
    InvalidResponse(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}
