//! Control-plane API: domain types and the request/response seam the
//! onboarding steps call.

pub mod graphql;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

pub use graphql::{GraphQlClient, GraphQlFactory};

use crate::error::ApiError;

/// Message shown when the control plane rejects a key without saying why.
pub const DEFAULT_INVALID_KEY_MESSAGE: &str = "Invalid API key";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

/// Everything created alongside a new organization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrganizationBootstrap {
    pub organization: Organization,
    pub account: Account,
    pub workspace: Workspace,
}

/// A connected Datadog integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatadogAccount {
    pub id: String,
    pub name: String,
    /// Region code (`US1`, `EU1`, ...).
    pub site: String,
}

/// Input for connecting a Datadog account with credentials.
#[derive(Debug)]
pub struct NewDatadogAccount {
    pub account_id: String,
    pub name: String,
    pub site: String,
    pub api_key: SecretString,
    pub app_key: SecretString,
}

/// Result of an API key check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl KeyValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }

    /// The rejection message, defaulting when the server gave none.
    pub fn message(&self) -> &str {
        match self.error.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => DEFAULT_INVALID_KEY_MESSAGE,
        }
    }
}

/// Lifecycle of a background discovery job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryStatus {
    Pending,
    Discovering,
    Ready,
    Error,
    #[serde(other)]
    Unknown,
}

impl DiscoveryStatus {
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDiscoveryStatus {
    pub status: DiscoveryStatus,
    pub services_discovered: u32,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogDiscoveryProgress {
    pub status: DiscoveryStatus,
    /// Total weekly log volume, in events.
    pub weekly_volume: i64,
    /// Weekly volume analysed so far.
    pub discovered_weekly_volume: f64,
    /// `None` until the job reports progress.
    pub percent_complete: Option<f64>,
    pub last_error: Option<String>,
}

/// Control-plane operations used during onboarding.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError>;

    /// Create an organization plus its first account and workspace.
    async fn create_organization(&self, name: &str) -> Result<OrganizationBootstrap, ApiError>;

    async fn list_accounts(&self, organization_id: &str) -> Result<Vec<Account>, ApiError>;

    async fn create_account(&self, organization_id: &str, name: &str) -> Result<Account, ApiError>;

    /// The Datadog integration attached to an account, if any.
    async fn datadog_account(&self, account_id: &str) -> Result<Option<DatadogAccount>, ApiError>;

    async fn validate_datadog_api_key(
        &self,
        api_key: &SecretString,
        site: &str,
    ) -> Result<KeyValidation, ApiError>;

    async fn create_datadog_account(
        &self,
        input: NewDatadogAccount,
    ) -> Result<DatadogAccount, ApiError>;

    async fn service_discovery_status(
        &self,
        datadog_account_id: &str,
    ) -> Result<Option<ServiceDiscoveryStatus>, ApiError>;

    async fn log_discovery_progress(
        &self,
        datadog_account_id: &str,
    ) -> Result<Option<LogDiscoveryProgress>, ApiError>;
}

/// Builds an authenticated control-plane client once an access token is known.
pub trait ControlPlaneFactory: Send + Sync {
    fn connect(&self, access_token: &SecretString) -> Arc<dyn ControlPlane>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_default_message() {
        let rejected = KeyValidation {
            valid: false,
            error: None,
        };
        assert_eq!(rejected.message(), "Invalid API key");
        assert_eq!(
            KeyValidation::invalid("Key is for a different site").message(),
            "Key is for a different site"
        );
        assert!(KeyValidation::valid().valid);
    }

    #[test]
    fn discovery_status_parses_wire_names() {
        let statuses: Vec<DiscoveryStatus> =
            serde_json::from_str(r#"["PENDING","DISCOVERING","READY","ERROR","PAUSED"]"#).unwrap();
        assert_eq!(
            statuses,
            vec![
                DiscoveryStatus::Pending,
                DiscoveryStatus::Discovering,
                DiscoveryStatus::Ready,
                DiscoveryStatus::Error,
                DiscoveryStatus::Unknown,
            ]
        );
        assert!(DiscoveryStatus::Ready.is_ready());
    }
}
