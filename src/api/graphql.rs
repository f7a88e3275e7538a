//! GraphQL-over-HTTP implementation of [`ControlPlane`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::{
    Account, ControlPlane, ControlPlaneFactory, DatadogAccount, DiscoveryStatus, KeyValidation,
    LogDiscoveryProgress, NewDatadogAccount, Organization, OrganizationBootstrap,
    ServiceDiscoveryStatus,
};
use crate::auth::duplicate_secret;
use crate::error::ApiError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const LIST_ORGANIZATIONS: &str = r#"
query ListOrganizations {
  organizations { edges { node { id name } } }
}"#;

const CREATE_ORGANIZATION: &str = r#"
mutation CreateOrganizationAndBootstrap($input: CreateOrganizationInput!) {
  createOrganizationAndBootstrap(input: $input) {
    organization { id name }
    account { id name }
    workspace { id name }
  }
}"#;

const LIST_ACCOUNTS: &str = r#"
query ListAccounts($organizationId: ID!) {
  accounts(where: { organizationID: $organizationId }) { edges { node { id name } } }
}"#;

const CREATE_ACCOUNT: &str = r#"
mutation CreateAccount($input: CreateAccountInput!) {
  createAccount(input: $input) { id name }
}"#;

const GET_ACCOUNT: &str = r#"
query GetAccount($id: ID!) {
  accounts(where: { id: $id }) {
    edges { node { id name datadogAccount { id name site } } }
  }
}"#;

const VALIDATE_DATADOG_API_KEY: &str = r#"
mutation ValidateDatadogApiKey($input: ValidateDatadogApiKeyInput!) {
  validateDatadogApiKey(input: $input) { valid error }
}"#;

const CREATE_DATADOG_ACCOUNT: &str = r#"
mutation CreateDatadogAccountWithCredentials($input: CreateDatadogAccountWithCredentialsInput!) {
  createDatadogAccount(input: $input) { id name site }
}"#;

const SERVICE_DISCOVERY_PROGRESS: &str = r#"
query GetDatadogAccountServiceDiscoveryProgress($id: ID!) {
  datadogAccounts(where: { id: $id }) {
    edges { node { serviceDiscoveryProgress {
      status servicesDiscovered lastError startedAt completedAt consecutiveFailures
    } } }
  }
}"#;

const LOG_DISCOVERY_PROGRESS: &str = r#"
query GetDatadogAccountLogDiscoveryProgress($id: ID!) {
  datadogAccounts(where: { id: $id }) {
    edges { node { logEventDiscoveryProgress {
      status percentComplete weeklyVolume weeklyDiscoveredVolume lastError
    } } }
  }
}"#;

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

impl<T> Connection<T> {
    fn nodes(self) -> Vec<T> {
        self.edges.into_iter().map(|e| e.node).collect()
    }

    fn first(self) -> Option<T> {
        self.edges.into_iter().next().map(|e| e.node)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountNode {
    #[serde(default)]
    datadog_account: Option<DatadogAccount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceProgressNode {
    service_discovery_progress: Option<ServiceProgress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceProgress {
    status: DiscoveryStatus,
    #[serde(default)]
    services_discovered: u32,
    #[serde(default)]
    last_error: Option<String>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    consecutive_failures: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogProgressNode {
    log_event_discovery_progress: Option<LogProgress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogProgress {
    status: Option<DiscoveryStatus>,
    #[serde(default)]
    percent_complete: Option<f64>,
    #[serde(default)]
    weekly_volume: f64,
    #[serde(default)]
    weekly_discovered_volume: f64,
    #[serde(default)]
    last_error: Option<String>,
}

#[derive(Deserialize)]
struct KeyValidationNode {
    valid: bool,
    #[serde(default)]
    error: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

/// Authenticated GraphQL client.
pub struct GraphQlClient {
    endpoint: String,
    access_token: SecretString,
    http: reqwest::Client,
}

impl GraphQlClient {
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ApiError> {
        debug!(operation, "GraphQL request");

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| {
                error!(operation, error = %e, "GraphQL request failed");
                ApiError::Http(e.to_string())
            })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        decode_response(status.as_u16(), &body)
    }
}

/// Decode a GraphQL HTTP response, preferring the server's error messages.
fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    let envelope = match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ApiError::Status {
                status,
                body: body.to_string(),
            });
        }
        Err(e) => return Err(ApiError::InvalidResponse(e.to_string())),
    };

    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(ApiError::GraphQl(messages.join("\n")));
    }

    if !(200..300).contains(&status) {
        return Err(ApiError::Status {
            status,
            body: body.to_string(),
        });
    }

    envelope
        .data
        .ok_or_else(|| ApiError::InvalidResponse("response has no data".to_string()))
}

#[async_trait]
impl ControlPlane for GraphQlClient {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            organizations: Connection<Organization>,
        }
        let data: Data = self
            .execute("ListOrganizations", LIST_ORGANIZATIONS, json!({}))
            .await?;
        Ok(data.organizations.nodes())
    }

    async fn create_organization(&self, name: &str) -> Result<OrganizationBootstrap, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_organization_and_bootstrap: OrganizationBootstrap,
        }
        let data: Data = self
            .execute(
                "CreateOrganizationAndBootstrap",
                CREATE_ORGANIZATION,
                json!({ "input": { "name": name } }),
            )
            .await?;
        Ok(data.create_organization_and_bootstrap)
    }

    async fn list_accounts(&self, organization_id: &str) -> Result<Vec<Account>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            accounts: Connection<Account>,
        }
        let data: Data = self
            .execute(
                "ListAccounts",
                LIST_ACCOUNTS,
                json!({ "organizationId": organization_id }),
            )
            .await?;
        Ok(data.accounts.nodes())
    }

    async fn create_account(&self, organization_id: &str, name: &str) -> Result<Account, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_account: Account,
        }
        let data: Data = self
            .execute(
                "CreateAccount",
                CREATE_ACCOUNT,
                json!({ "input": { "organizationID": organization_id, "name": name } }),
            )
            .await?;
        Ok(data.create_account)
    }

    async fn datadog_account(&self, account_id: &str) -> Result<Option<DatadogAccount>, ApiError> {
        #[derive(Deserialize)]
        struct Data {
            accounts: Connection<AccountNode>,
        }
        let data: Data = self
            .execute("GetAccount", GET_ACCOUNT, json!({ "id": account_id }))
            .await?;
        Ok(data
            .accounts
            .first()
            .and_then(|a| a.datadog_account)
            .filter(|d| !d.id.is_empty()))
    }

    async fn validate_datadog_api_key(
        &self,
        api_key: &SecretString,
        site: &str,
    ) -> Result<KeyValidation, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            validate_datadog_api_key: KeyValidationNode,
        }
        let data: Data = self
            .execute(
                "ValidateDatadogApiKey",
                VALIDATE_DATADOG_API_KEY,
                json!({ "input": { "apiKey": api_key.expose_secret(), "site": site } }),
            )
            .await?;
        let node = data.validate_datadog_api_key;
        Ok(KeyValidation {
            valid: node.valid,
            error: non_empty(node.error),
        })
    }

    async fn create_datadog_account(
        &self,
        input: NewDatadogAccount,
    ) -> Result<DatadogAccount, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            create_datadog_account: DatadogAccount,
        }
        let variables = json!({
            "input": {
                "attributes": {
                    "accountID": input.account_id,
                    "name": input.name,
                    "site": input.site,
                },
                "credentials": {
                    "apiKey": input.api_key.expose_secret(),
                    "appKey": input.app_key.expose_secret(),
                },
            }
        });
        let data: Data = self
            .execute(
                "CreateDatadogAccountWithCredentials",
                CREATE_DATADOG_ACCOUNT,
                variables,
            )
            .await?;
        Ok(data.create_datadog_account)
    }

    async fn service_discovery_status(
        &self,
        datadog_account_id: &str,
    ) -> Result<Option<ServiceDiscoveryStatus>, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            datadog_accounts: Connection<ServiceProgressNode>,
        }
        let data: Data = self
            .execute(
                "GetDatadogAccountServiceDiscoveryProgress",
                SERVICE_DISCOVERY_PROGRESS,
                json!({ "id": datadog_account_id }),
            )
            .await?;
        Ok(data
            .datadog_accounts
            .first()
            .and_then(|n| n.service_discovery_progress)
            .map(|p| ServiceDiscoveryStatus {
                status: p.status,
                services_discovered: p.services_discovered,
                last_error: non_empty(p.last_error),
                started_at: p.started_at,
                completed_at: p.completed_at,
                consecutive_failures: p.consecutive_failures,
            }))
    }

    async fn log_discovery_progress(
        &self,
        datadog_account_id: &str,
    ) -> Result<Option<LogDiscoveryProgress>, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            datadog_accounts: Connection<LogProgressNode>,
        }
        let data: Data = self
            .execute(
                "GetDatadogAccountLogDiscoveryProgress",
                LOG_DISCOVERY_PROGRESS,
                json!({ "id": datadog_account_id }),
            )
            .await?;

        let Some(progress) = data
            .datadog_accounts
            .first()
            .and_then(|n| n.log_event_discovery_progress)
        else {
            return Ok(None);
        };
        let Some(status) = progress.status else {
            return Ok(None);
        };

        Ok(Some(LogDiscoveryProgress {
            status,
            weekly_volume: progress.weekly_volume as i64,
            discovered_weekly_volume: progress.weekly_discovered_volume,
            percent_complete: progress.percent_complete.filter(|p| *p != 0.0),
            last_error: non_empty(progress.last_error),
        }))
    }
}

/// Creates [`GraphQlClient`]s sharing one HTTP connection pool.
pub struct GraphQlFactory {
    endpoint: String,
    http: reqwest::Client,
}

impl GraphQlFactory {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn client(&self, access_token: &SecretString) -> GraphQlClient {
        GraphQlClient {
            endpoint: self.endpoint.clone(),
            access_token: duplicate_secret(access_token),
            http: self.http.clone(),
        }
    }
}

impl ControlPlaneFactory for GraphQlFactory {
    fn connect(&self, access_token: &SecretString) -> Arc<dyn ControlPlane> {
        Arc::new(self.client(access_token))
    }
}
