//! Events that drive the wizard: key presses, resizes, and completed commands.

use std::sync::atomic::{AtomicU64, Ordering};

use secrecy::SecretString;

use crate::api::{
    Account, DatadogAccount, KeyValidation, LogDiscoveryProgress, Organization,
    OrganizationBootstrap, ServiceDiscoveryStatus,
};
use crate::auth::{AuthResult, DeviceAuth};
use crate::error::{ApiError, AuthError};

/// Identity of one step instance. Completions addressed to an old id are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(u64);

impl StepId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A key press, normalized away from the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Esc,
    Up,
    Down,
    Backspace,
    Char(char),
    Ctrl(char),
}

/// Result of one asynchronous command.
#[derive(Debug)]
pub enum Completion {
    /// `Some(token)` when a usable access token is stored.
    AuthChecked(Result<Option<SecretString>, AuthError>),
    DeviceAuthStarted(Result<DeviceAuth, AuthError>),
    Authenticated(Result<AuthResult, AuthError>),
    OrganizationsLoaded(Result<Vec<Organization>, ApiError>),
    OrganizationCreated(Result<OrganizationBootstrap, ApiError>),
    AccountsLoaded(Result<Vec<Account>, ApiError>),
    AccountCreated(Result<Account, ApiError>),
    DatadogAccountChecked(Result<Option<DatadogAccount>, ApiError>),
    ApiKeyValidated(Result<KeyValidation, ApiError>),
    DatadogAccountCreated(Result<DatadogAccount, ApiError>),
    ServiceDiscovery(Result<Option<ServiceDiscoveryStatus>, ApiError>),
    LogDiscovery(Result<Option<LogDiscoveryProgress>, ApiError>),
    /// A timer scheduled by the step fired.
    Tick,
}

/// Everything that enters the event loop.
#[derive(Debug)]
pub enum Msg {
    Key(Key),
    Resize { width: u16, height: u16 },
    Completed { step: StepId, completion: Completion },
}

impl Msg {
    pub fn completed(step: StepId, completion: Completion) -> Self {
        Self::Completed { step, completion }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_ids_are_unique() {
        let a = StepId::next();
        let b = StepId::next();
        assert_ne!(a, b);
    }
}
