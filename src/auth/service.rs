//! Device-authorization service: starts the grant, polls for tokens, persists them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::cancel::CancelSignal;
use super::provider::{AuthenticationResponse, OAuthProvider, User};
use super::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SecureStorage};
use crate::error::{AuthError, ProviderError};

/// Upper bound on the device-authorization request.
pub const START_TIMEOUT: Duration = Duration::from_secs(10);
/// RFC 8628 default when the provider does not recommend an interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// An issued device authorization. Immutable once created.
#[derive(Debug, Clone)]
pub struct DeviceAuth {
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: String,
    /// Only used for polling, never displayed.
    pub device_code: String,
    pub expires_in: Duration,
    pub interval: Duration,
    pub issued_at: Instant,
}

impl DeviceAuth {
    /// The URL to send the user to, preferring the pre-filled one.
    pub fn url(&self) -> &str {
        if self.verification_uri_complete.is_empty() {
            &self.verification_uri
        } else {
            &self.verification_uri_complete
        }
    }

    /// Time left before the device code expires.
    pub fn remaining(&self) -> Duration {
        self.expires_in.saturating_sub(self.issued_at.elapsed())
    }
}

/// Tokens and user once the device flow succeeds. Tokens are already persisted.
#[derive(Debug)]
pub struct AuthResult {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user: User,
}

/// What the onboarding steps need from authentication.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// True when a non-empty access token is stored.
    fn is_authenticated(&self) -> bool;

    fn access_token(&self) -> Result<SecretString, AuthError>;

    /// Delete both stored tokens.
    fn clear_tokens(&self) -> Result<(), AuthError>;

    /// Request a device code. Bounded by [`START_TIMEOUT`].
    async fn start_device_auth(&self) -> Result<DeviceAuth, AuthError>;

    /// Poll until the user approves, a terminal outcome occurs, or `cancel` fires.
    async fn wait_for_auth(
        &self,
        device_code: &str,
        interval: Duration,
        cancel: CancelSignal,
    ) -> Result<AuthResult, AuthError>;
}

/// Next move for the poll loop after one token response.
#[derive(Debug)]
pub enum PollStep {
    /// Keep polling at the current interval.
    Wait,
    /// Keep polling at the new, longer interval.
    Backoff(Duration),
    Done(Result<AuthenticationResponse, AuthError>),
}

/// Interval bookkeeping for one polling session.
#[derive(Debug, Clone)]
pub struct PollState {
    interval: Duration,
}

impl PollState {
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Classify one poll response. `slow_down` doubles the interval; it never shrinks.
    pub fn apply(&mut self, outcome: Result<AuthenticationResponse, ProviderError>) -> PollStep {
        match outcome {
            Ok(resp) => PollStep::Done(Ok(resp)),
            Err(ProviderError::AuthorizationPending) => PollStep::Wait,
            Err(ProviderError::SlowDown) => {
                self.interval = self.interval.saturating_mul(2);
                PollStep::Backoff(self.interval)
            }
            Err(ProviderError::ExpiredToken) => PollStep::Done(Err(AuthError::Expired)),
            Err(ProviderError::AccessDenied) => PollStep::Done(Err(AuthError::Denied)),
            Err(other) => PollStep::Done(Err(AuthError::Provider(other))),
        }
    }
}

/// Ticker that first fires one full `period` from now.
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut tick = tokio::time::interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}

/// Default [`Authenticator`] backed by an OAuth provider and a secure store.
pub struct AuthService {
    provider: Arc<dyn OAuthProvider>,
    storage: Arc<dyn SecureStorage>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn OAuthProvider>, storage: Arc<dyn SecureStorage>) -> Self {
        Self { provider, storage }
    }

    fn save_tokens(&self, resp: &AuthenticationResponse) -> Result<(), AuthError> {
        self.storage.set(ACCESS_TOKEN_KEY, &resp.access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, &resp.refresh_token)?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for AuthService {
    fn is_authenticated(&self) -> bool {
        use secrecy::ExposeSecret;

        match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => !token.expose_secret().is_empty(),
            Ok(None) => false,
            Err(e) => {
                error!(error = %e, "Failed to check authentication");
                false
            }
        }
    }

    fn access_token(&self) -> Result<SecretString, AuthError> {
        use secrecy::ExposeSecret;

        match self.storage.get(ACCESS_TOKEN_KEY)? {
            Some(token) if !token.expose_secret().is_empty() => Ok(token),
            _ => Err(AuthError::NoAccessToken),
        }
    }

    fn clear_tokens(&self) -> Result<(), AuthError> {
        info!("Clearing authentication tokens");
        self.storage.delete(ACCESS_TOKEN_KEY)?;
        self.storage.delete(REFRESH_TOKEN_KEY)?;
        Ok(())
    }

    async fn start_device_auth(&self) -> Result<DeviceAuth, AuthError> {
        debug!("Starting device authorization flow");

        let resp = tokio::time::timeout(START_TIMEOUT, self.provider.authorize_device())
            .await
            .map_err(|_| AuthError::Timeout(START_TIMEOUT))?
            .map_err(|e| {
                error!(error = %e, "Failed to start device authorization");
                AuthError::Provider(e)
            })?;

        let interval = PollState::new(Duration::from_secs(resp.interval)).interval();
        debug!(
            expires_in = resp.expires_in,
            interval_secs = interval.as_secs(),
            "Device authorization started"
        );

        Ok(DeviceAuth {
            user_code: resp.user_code,
            verification_uri: resp.verification_uri,
            verification_uri_complete: resp.verification_uri_complete,
            device_code: resp.device_code,
            expires_in: Duration::from_secs(resp.expires_in),
            interval,
            issued_at: Instant::now(),
        })
    }

    async fn wait_for_auth(
        &self,
        device_code: &str,
        interval: Duration,
        mut cancel: CancelSignal,
    ) -> Result<AuthResult, AuthError> {
        let mut state = PollState::new(interval);
        let mut tick = ticker(state.interval());
        debug!(interval_secs = state.interval().as_secs(), "Polling for authentication");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tick.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                outcome = self.provider.poll_token(device_code) => outcome,
            };

            match state.apply(outcome) {
                PollStep::Wait => debug!("Authorization pending"),
                PollStep::Backoff(next) => {
                    debug!(interval_secs = next.as_secs(), "Provider asked to slow down");
                    tick = ticker(next);
                }
                PollStep::Done(Ok(resp)) => {
                    info!(user_id = %resp.user.id, "Authentication successful");
                    if let Err(e) = self.save_tokens(&resp) {
                        error!(error = %e, "Failed to save tokens");
                        return Err(e);
                    }
                    return Ok(AuthResult {
                        access_token: resp.access_token,
                        refresh_token: resp.refresh_token,
                        user: resp.user,
                    });
                }
                PollStep::Done(Err(e)) => {
                    warn!(error = %e, "Authentication polling stopped");
                    return Err(e);
                }
            }
        }
    }
}
