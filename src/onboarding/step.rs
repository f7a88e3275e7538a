//! The step contract every wizard stage implements.

use super::command::Command;
use super::event::{Msg, StepId};
use crate::error::Error;

/// Which stage a step is. Used for logging and by the host; control flow
/// never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    AuthCheck,
    Authenticate,
    Role,
    OrganizationSelect,
    OrganizationCreate,
    AccountSelect,
    AccountCreate,
    DatadogCheck,
    DatadogRegion,
    DatadogApiKey,
    DatadogAppKey,
    ServiceDiscovery,
    LogDiscovery,
    Complete,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AuthCheck => "auth_check",
            Self::Authenticate => "authenticate",
            Self::Role => "role",
            Self::OrganizationSelect => "organization_select",
            Self::OrganizationCreate => "organization_create",
            Self::AccountSelect => "account_select",
            Self::AccountCreate => "account_create",
            Self::DatadogCheck => "datadog_check",
            Self::DatadogRegion => "datadog_region",
            Self::DatadogApiKey => "datadog_api_key",
            Self::DatadogAppKey => "datadog_app_key",
            Self::ServiceDiscovery => "service_discovery",
            Self::LogDiscovery => "log_discovery",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// One entry in the footer help line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub keys: &'static str,
    pub help: &'static str,
}

impl KeyBinding {
    pub const fn new(keys: &'static str, help: &'static str) -> Self {
        Self { keys, help }
    }
}

pub const RETRY: KeyBinding = KeyBinding::new("r", "retry");

/// A self-contained stage of the wizard.
///
/// A step becomes complete at most once. After that, `next` must build the
/// same successor every time it is asked, from state the step already holds.
pub trait Step: Send {
    fn id(&self) -> StepId;

    fn kind(&self) -> StepKind;

    /// Called once, right after the step becomes current.
    fn init(&mut self) -> Command {
        Command::none()
    }

    fn update(&mut self, msg: Msg) -> Command;

    fn view(&self) -> String;

    fn set_size(&mut self, _width: u16, _height: u16) {}

    fn is_complete(&self) -> bool;

    fn is_busy(&self) -> bool {
        false
    }

    fn error(&self) -> Option<&Error>;

    fn has_error(&self) -> bool {
        self.error().is_some()
    }

    fn help(&self) -> Vec<KeyBinding>;

    /// The successor, or `None` when the wizard is finished.
    fn next(&self) -> Option<Box<dyn Step>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(StepKind::OrganizationSelect.to_string(), "organization_select");
        assert_eq!(StepKind::DatadogApiKey.to_string(), "datadog_api_key");
    }
}
