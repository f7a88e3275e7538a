//! Datadog application key entry; connects the integration.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::api::{ControlPlane, DatadogAccount, NewDatadogAccount};
use crate::auth::duplicate_secret;
use crate::datadog::app_key_url;
use crate::error::{ApiError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};

use super::ServiceDiscoveryStep;
use super::input::TextInput;

const INTEGRATION_NAME: &str = "Datadog";

pub struct AppKeyStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    account_id: String,
    site: &'static str,
    api_key: SecretString,
    input: TextInput,
    show_input: bool,
    creating: bool,
    created: Option<DatadogAccount>,
    error: Option<Error>,
}

impl AppKeyStep {
    pub fn new(
        services: Services,
        api: Arc<dyn ControlPlane>,
        account_id: String,
        site: &'static str,
        api_key: SecretString,
    ) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            account_id,
            site,
            api_key,
            input: TextInput::masked("Paste your application key"),
            show_input: false,
            creating: false,
            created: None,
            error: None,
        }
    }

    fn open_settings(&self) {
        if let Err(e) = self.services.launcher.open_url(&app_key_url(self.site)) {
            warn!(error = %e, "Failed to open Datadog settings");
        }
    }

    fn copy_settings(&self) {
        if let Err(e) = self.services.launcher.copy(&app_key_url(self.site)) {
            warn!(error = %e, "Failed to copy Datadog settings URL");
        }
    }

    fn submit(&mut self) -> Command {
        if self.creating || self.input.is_empty() {
            return Command::none();
        }
        self.error = None;
        self.creating = true;

        let input = NewDatadogAccount {
            account_id: self.account_id.clone(),
            name: INTEGRATION_NAME.into(),
            site: self.site.into(),
            api_key: duplicate_secret(&self.api_key),
            app_key: SecretString::from(self.input.value().to_string()),
        };
        let api = self.api.clone();
        Command::perform(self.id, async move {
            Completion::DatadogAccountCreated(api.create_datadog_account(input).await)
        })
    }

    fn on_created(&mut self, result: Result<DatadogAccount, ApiError>) {
        self.creating = false;
        match result {
            Ok(dd) => {
                info!(datadog_account_id = %dd.id, site = %dd.site, "Datadog connected");
                self.created = Some(dd);
            }
            Err(e) => self.error = Some(e.into()),
        }
    }
}

impl Step for AppKeyStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::DatadogAppKey
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::DatadogAccountCreated(result),
                ..
            } => {
                self.on_created(result);
                Command::none()
            }
            Msg::Key(_) if self.creating || self.created.is_some() => Command::none(),
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
        let url = app_key_url(self.site);
        if !self.show_input {
            return format!(
                "Datadog application key\n\nCreate a service account and application key at:\n{url}\n\nPress Enter to open in browser, or press 'c' to copy the URL"
            );
        }
        let status = if self.creating {
            "\n\nConnecting Datadog..."
        } else {
            ""
        };
        format!(
            "Datadog application key\n\n{url}\n\n{}{status}",
            self.input.view()
        )
    }

    fn is_complete(&self) -> bool {
        self.created.is_some()
    }

    fn is_busy(&self) -> bool {
        self.creating
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
            KeyBinding::new("enter", if self.error.is_some() { "retry" } else { "connect" }),
            KeyBinding::new("ctrl+o", "open in browser"),
            KeyBinding::new("ctrl+y", "copy URL"),
        ]
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let dd = self.created.as_ref()?;
        Some(Box::new(ServiceDiscoveryStep::new(
            self.services.clone(),
            self.api.clone(),
            dd.id.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::testing::{Fixture, pump};

    fn ready(fx: &Fixture) -> AppKeyStep {
        let mut step = AppKeyStep::new(
            fx.services.clone(),
            fx.control_plane(),
            "acct_1".into(),
            "EU1",
            SecretString::from("api_key".to_string()),
        );
        let _ = step.update(Msg::Key(Key::Char('c')));
        assert_eq!(
            fx.launcher.copied.lock().unwrap().as_slice(),
            ["https://datadoghq.eu/organization-settings/service-accounts"]
        );
        for c in "app".chars() {
            let _ = step.update(Msg::Key(Key::Char(c)));
        }
        step
    }

    #[tokio::test]
    async fn connects_once_and_advances() {
        let fx = Fixture::new();
        let mut step = ready(&fx);

        let first = step.update(Msg::Key(Key::Enter));
        assert!(step.update(Msg::Key(Key::Enter)).is_none());
        pump(&mut step, first).await;

        assert_eq!(fx.api.count("create_datadog_account"), 1);
        assert!(step.is_complete());
        assert_eq!(step.next().unwrap().kind(), StepKind::ServiceDiscovery);
    }

    #[tokio::test]
    async fn failure_retries_on_enter() {
        let fx = Fixture::new();
        fx.api.fail_next("create_datadog_account");
        let mut step = ready(&fx);

        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        assert!(step.has_error());

        let cmd = step.update(Msg::Key(Key::Enter));
        assert!(!step.has_error());
        pump(&mut step, cmd).await;
        assert!(step.is_complete());
    }
}
