//! Stub collaborators for step unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::time::Instant;

use super::command::Command;
use super::services::{Launcher, Services};
use super::step::Step;
use crate::api::{
    Account, ControlPlane, ControlPlaneFactory, DatadogAccount, DiscoveryStatus, KeyValidation,
    LogDiscoveryProgress, NewDatadogAccount, Organization, OrganizationBootstrap,
    ServiceDiscoveryStatus, Workspace,
};
use crate::auth::{AuthResult, Authenticator, CancelSignal, DeviceAuth, User};
use crate::error::{ApiError, AuthError, PreferencesError};
use crate::preferences::{MemoryStore, PreferenceStore, PreferencesService};

pub fn device_auth() -> DeviceAuth {
    DeviceAuth {
        user_code: "WXYZ-1234".into(),
        verification_uri: "https://auth.example.com/device".into(),
        verification_uri_complete: "https://auth.example.com/device?code=WXYZ-1234".into(),
        device_code: "dev_code".into(),
        expires_in: Duration::from_secs(300),
        interval: Duration::from_secs(5),
        issued_at: Instant::now(),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum WaitOutcome {
    Success,
    Expired,
    Denied,
    /// Never resolves on its own; only cancellation ends it.
    Hang,
}

#[derive(Default)]
pub struct StubAuthenticator {
    pub token: Mutex<Option<String>>,
    pub token_unreadable: AtomicBool,
    pub fail_clear: AtomicBool,
    pub fail_start: AtomicBool,
    pub waits: Mutex<VecDeque<WaitOutcome>>,
    pub starts: AtomicUsize,
    pub wait_calls: AtomicUsize,
    pub clears: AtomicUsize,
}

impl StubAuthenticator {
    pub fn script(&self, outcomes: &[WaitOutcome]) {
        self.waits.lock().unwrap().extend(outcomes.iter().copied());
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    fn is_authenticated(&self) -> bool {
        self.token.lock().unwrap().is_some()
    }

    fn access_token(&self) -> Result<SecretString, AuthError> {
        if self.token_unreadable.load(Ordering::SeqCst) {
            return Err(AuthError::NoAccessToken);
        }
        self.token
            .lock()
            .unwrap()
            .clone()
            .map(SecretString::from)
            .ok_or(AuthError::NoAccessToken)
    }

    fn clear_tokens(&self) -> Result<(), AuthError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(AuthError::Storage(crate::error::StorageError::Io(
                std::io::Error::other("keychain locked"),
            )));
        }
        *self.token.lock().unwrap() = None;
        Ok(())
    }

    async fn start_device_auth(&self) -> Result<DeviceAuth, AuthError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(AuthError::Timeout(Duration::from_secs(10)));
        }
        Ok(device_auth())
    }

    async fn wait_for_auth(
        &self,
        _device_code: &str,
        _interval: Duration,
        mut cancel: CancelSignal,
    ) -> Result<AuthResult, AuthError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .waits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WaitOutcome::Hang);
        match outcome {
            WaitOutcome::Success => {
                *self.token.lock().unwrap() = Some("at_new".into());
                Ok(AuthResult {
                    access_token: SecretString::from("at_new".to_string()),
                    refresh_token: SecretString::from("rt_new".to_string()),
                    user: User {
                        id: "user_1".into(),
                        email: "dev@example.com".into(),
                        ..User::default()
                    },
                })
            }
            WaitOutcome::Expired => Err(AuthError::Expired),
            WaitOutcome::Denied => Err(AuthError::Denied),
            WaitOutcome::Hang => {
                cancel.cancelled().await;
                Err(AuthError::Cancelled)
            }
        }
    }
}

pub fn org(id: &str, name: &str) -> Organization {
    Organization {
        id: id.into(),
        name: name.into(),
    }
}

pub fn account(id: &str, name: &str) -> Account {
    Account {
        id: id.into(),
        name: name.into(),
    }
}

pub fn datadog_account(id: &str) -> DatadogAccount {
    DatadogAccount {
        id: id.into(),
        name: "Datadog".into(),
        site: "US1".into(),
    }
}

pub fn service_status(
    status: DiscoveryStatus,
    count: u32,
    error: Option<&str>,
) -> ServiceDiscoveryStatus {
    ServiceDiscoveryStatus {
        status,
        services_discovered: count,
        last_error: error.map(str::to_string),
        started_at: None,
        completed_at: None,
        consecutive_failures: 0,
    }
}

pub fn log_progress(status: DiscoveryStatus, percent: Option<f64>) -> LogDiscoveryProgress {
    LogDiscoveryProgress {
        status,
        weekly_volume: 2_500_000,
        discovered_weekly_volume: 1_300_000.0,
        percent_complete: percent,
        last_error: None,
    }
}

#[derive(Default)]
pub struct StubControlPlane {
    pub organizations: Mutex<Vec<Organization>>,
    pub accounts: Mutex<Vec<Account>>,
    pub datadog: Mutex<Option<DatadogAccount>>,
    pub validations: Mutex<VecDeque<KeyValidation>>,
    pub service_statuses: Mutex<VecDeque<ServiceDiscoveryStatus>>,
    pub log_statuses: Mutex<VecDeque<LogDiscoveryProgress>>,
    /// Operation names that fail on their next call.
    pub failures: Mutex<HashSet<&'static str>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl StubControlPlane {
    pub fn fail_next(&self, op: &'static str) {
        self.failures.lock().unwrap().insert(op);
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn call(&self, op: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(op);
        if self.failures.lock().unwrap().remove(op) {
            return Err(ApiError::Http("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for StubControlPlane {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ApiError> {
        self.call("list_organizations")?;
        Ok(self.organizations.lock().unwrap().clone())
    }

    async fn create_organization(&self, name: &str) -> Result<OrganizationBootstrap, ApiError> {
        self.call("create_organization")?;
        Ok(OrganizationBootstrap {
            organization: org("org_new", name),
            account: account("acct_new", "Default"),
            workspace: Workspace {
                id: "ws_new".into(),
                name: "Default".into(),
            },
        })
    }

    async fn list_accounts(&self, _organization_id: &str) -> Result<Vec<Account>, ApiError> {
        self.call("list_accounts")?;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn create_account(
        &self,
        _organization_id: &str,
        name: &str,
    ) -> Result<Account, ApiError> {
        self.call("create_account")?;
        Ok(account("acct_created", name))
    }

    async fn datadog_account(&self, _account_id: &str) -> Result<Option<DatadogAccount>, ApiError> {
        self.call("datadog_account")?;
        Ok(self.datadog.lock().unwrap().clone())
    }

    async fn validate_datadog_api_key(
        &self,
        _api_key: &SecretString,
        _site: &str,
    ) -> Result<KeyValidation, ApiError> {
        self.call("validate_datadog_api_key")?;
        Ok(self
            .validations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(KeyValidation::valid))
    }

    async fn create_datadog_account(
        &self,
        input: NewDatadogAccount,
    ) -> Result<DatadogAccount, ApiError> {
        self.call("create_datadog_account")?;
        Ok(DatadogAccount {
            id: "dd_new".into(),
            name: input.name,
            site: input.site,
        })
    }

    async fn service_discovery_status(
        &self,
        _datadog_account_id: &str,
    ) -> Result<Option<ServiceDiscoveryStatus>, ApiError> {
        self.call("service_discovery_status")?;
        Ok(Some(
            self.service_statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| service_status(DiscoveryStatus::Ready, 3, None)),
        ))
    }

    async fn log_discovery_progress(
        &self,
        _datadog_account_id: &str,
    ) -> Result<Option<LogDiscoveryProgress>, ApiError> {
        self.call("log_discovery_progress")?;
        Ok(Some(
            self.log_statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| log_progress(DiscoveryStatus::Ready, Some(100.0))),
        ))
    }
}

pub struct StubFactory(pub Arc<StubControlPlane>);

impl ControlPlaneFactory for StubFactory {
    fn connect(&self, _access_token: &SecretString) -> Arc<dyn ControlPlane> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub opened: Mutex<Vec<String>>,
    pub copied: Mutex<Vec<String>>,
    pub fail_open: AtomicBool,
}

impl Launcher for RecordingLauncher {
    fn open_url(&self, url: &str) -> std::io::Result<()> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("no browser"));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }

    fn copy(&self, text: &str) -> std::io::Result<()> {
        self.copied.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Memory store whose saves can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_saves: AtomicBool,
}

impl PreferenceStore for FlakyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) {
        self.inner.set(key, value)
    }
    fn get_bool(&self, key: &str) -> bool {
        self.inner.get_bool(key)
    }
    fn set_bool(&self, key: &str, value: bool) {
        self.inner.set_bool(key, value)
    }
    fn get_list(&self, key: &str) -> Vec<String> {
        self.inner.get_list(key)
    }
    fn set_list(&self, key: &str, values: &[String]) {
        self.inner.set_list(key, values)
    }
    fn unset(&self, key: &str) {
        self.inner.unset(key)
    }
    fn save(&self) -> Result<(), PreferencesError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PreferencesError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

pub struct Fixture {
    pub auth: Arc<StubAuthenticator>,
    pub api: Arc<StubControlPlane>,
    pub launcher: Arc<RecordingLauncher>,
    pub store: Arc<FlakyStore>,
    pub services: Services,
}

impl Fixture {
    pub fn new() -> Self {
        let auth = Arc::new(StubAuthenticator::default());
        let api = Arc::new(StubControlPlane::default());
        let launcher = Arc::new(RecordingLauncher::default());
        let store = Arc::new(FlakyStore::default());
        let services = Services::new(
            auth.clone(),
            PreferencesService::new(store.clone()),
            Arc::new(StubFactory(api.clone())),
            launcher.clone(),
        );
        Self {
            auth,
            api,
            launcher,
            store,
            services,
        }
    }

    pub fn prefs(&self) -> &PreferencesService {
        &self.services.preferences
    }

    pub fn control_plane(&self) -> Arc<dyn ControlPlane> {
        self.api.clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.store.fail_saves.store(fail, Ordering::SeqCst);
    }
}

/// Run `cmd`, feed every resulting message to `step`, return what it issued next.
pub async fn pump(step: &mut dyn Step, cmd: Command) -> Command {
    let mut next = Command::none();
    for msg in cmd.resolve().await {
        next = next.and(step.update(msg));
    }
    next
}

/// Keep pumping until the step stops issuing commands or `rounds` runs out.
pub async fn settle(step: &mut dyn Step, mut cmd: Command, rounds: usize) -> Command {
    for _ in 0..rounds {
        if cmd.is_none() {
            break;
        }
        cmd = pump(step, cmd).await;
    }
    cmd
}
