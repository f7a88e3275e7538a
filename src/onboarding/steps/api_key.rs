//! Datadog API key entry and validation.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::api::{ControlPlane, KeyValidation};
use crate::auth::duplicate_secret;
use crate::datadog::api_key_url;
use crate::error::{ApiError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};

use super::AppKeyStep;
use super::input::TextInput;

const CONNECT_FAILED: &str = "Failed to connect to control plane";

pub struct ApiKeyStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    account_id: String,
    site: &'static str,
    input: TextInput,
    show_input: bool,
    validating: bool,
    submitted: Option<SecretString>,
    api_key: Option<SecretString>,
    error: Option<Error>,
}

impl ApiKeyStep {
    pub fn new(
        services: Services,
        api: Arc<dyn ControlPlane>,
        account_id: String,
        site: &'static str,
    ) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            account_id,
            site,
            input: TextInput::masked("Paste your API key"),
            show_input: false,
            validating: false,
            submitted: None,
            api_key: None,
            error: None,
        }
    }

    fn open_settings(&self) {
        if let Err(e) = self.services.launcher.open_url(&api_key_url(self.site)) {
            warn!(error = %e, "Failed to open Datadog settings");
        }
    }

    fn copy_settings(&self) {
        if let Err(e) = self.services.launcher.copy(&api_key_url(self.site)) {
            warn!(error = %e, "Failed to copy Datadog settings URL");
        }
    }

    fn submit(&mut self) -> Command {
        if self.validating || self.input.is_empty() {
            return Command::none();
        }
        self.error = None;
        self.validating = true;

        let key = SecretString::from(self.input.value().to_string());
        let probe = duplicate_secret(&key);
        self.submitted = Some(key);

        let api = self.api.clone();
        let site = self.site;
        Command::perform(self.id, async move {
            Completion::ApiKeyValidated(api.validate_datadog_api_key(&probe, site).await)
        })
    }

    fn on_validated(&mut self, result: Result<KeyValidation, ApiError>) {
        self.validating = false;
        let submitted = self.submitted.take();
        match result {
            Ok(validation) if validation.valid => {
                info!(site = self.site, "Datadog API key validated");
                self.api_key = submitted;
            }
            Ok(validation) => {
                self.error = Some(Error::Validation(validation.message().to_string()));
            }
            Err(e) => {
                warn!(error = %e, "API key validation request failed");
                self.error = Some(Error::Validation(CONNECT_FAILED.into()));
            }
        }
    }
}

impl Step for ApiKeyStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::DatadogApiKey
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::ApiKeyValidated(result),
                ..
            } => {
                self.on_validated(result);
                Command::none()
            }
            Msg::Key(_) if self.validating || self.api_key.is_some() => Command::none(),
            Msg::Key(key) if !self.show_input => {
                match key {
                    Key::Enter => {
                        self.open_settings();
                        self.show_input = true;
                    }
                    Key::Char('c') => {
                        self.copy_settings();
                        self.show_input = true;
                    }
                    _ => {}
                }
                Command::none()
            }
            Msg::Key(key) => match key {
                Key::Enter => self.submit(),
                Key::Ctrl('o') => {
                    self.open_settings();
                    Command::none()
                }
                Key::Ctrl('y') => {
                    self.copy_settings();
                    Command::none()
                }
                key => {
                    self.input.handle(key);
                    Command::none()
                }
            },
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        let url = api_key_url(self.site);
        if !self.show_input {
            return format!(
                "Datadog API key\n\nCreate an API key for Tero at:\n{url}\n\nPress Enter to open in browser, or press 'c' to copy the URL"
            );
        }
        let status = if self.validating {
            "\n\nValidating API key..."
        } else {
            ""
        };
        format!("Datadog API key\n\n{url}\n\n{}{status}", self.input.view())
    }

    fn is_complete(&self) -> bool {
        self.api_key.is_some()
    }

    fn is_busy(&self) -> bool {
        self.validating
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if !self.show_input {
            return vec![
                KeyBinding::new("enter", "open in browser"),
                KeyBinding::new("c", "copy URL"),
            ];
        }
        vec![
            KeyBinding::new("enter", if self.error.is_some() { "retry" } else { "validate" }),
            KeyBinding::new("ctrl+o", "open in browser"),
            KeyBinding::new("ctrl+y", "copy URL"),
        ]
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let api_key = self.api_key.as_ref()?;
        Some(Box::new(AppKeyStep::new(
            self.services.clone(),
            self.api.clone(),
            self.account_id.clone(),
            self.site,
            duplicate_secret(api_key),
        )))
    }
}
