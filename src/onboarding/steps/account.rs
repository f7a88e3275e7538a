//! Account selection and creation within the chosen organization.

use std::sync::Arc;

use tracing::info;

use crate::api::{Account, ControlPlane, Organization};
use crate::error::Error;
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::selection::{Picker, PickerAction};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};
use crate::preferences::PreferencesService;

use super::DatadogCheckStep;
use super::input::TextInput;

pub struct AccountSelectStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    organization: Organization,
    picker: Picker<Account>,
}

impl AccountSelectStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, organization: Organization) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            organization,
            picker: Picker::new(
                "account",
                PreferencesService::default_account_id,
                PreferencesService::set_default_account_id,
            ),
        }
    }

    pub fn selected(&self) -> Option<&Account> {
        self.picker.selected()
    }

    fn load(&mut self) -> Command {
        self.picker.start_loading();
        let api = self.api.clone();
        let org_id = self.organization.id.clone();
        Command::perform(self.id, async move {
            Completion::AccountsLoaded(api.list_accounts(&org_id).await)
        })
    }
}

impl Step for AccountSelectStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::AccountSelect
    }

    fn init(&mut self) -> Command {
        self.load()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::AccountsLoaded(result),
                ..
            } => {
                self.picker.on_loaded(&self.services.preferences, result);
                Command::none()
            }
            Msg::Key(key) => match self.picker.handle_key(&self.services.preferences, key) {
                PickerAction::Reload => self.load(),
                PickerAction::None => Command::none(),
            },
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        if self.picker.is_loading() {
            return "Loading accounts...".into();
        }
        format!(
            "Select an account in {}\n\n{}",
            self.organization.name,
            self.picker.render()
        )
    }

    fn is_complete(&self) -> bool {
        self.picker.is_decided()
    }

    fn is_busy(&self) -> bool {
        self.picker.is_loading()
    }

    fn error(&self) -> Option<&Error> {
        self.picker.error()
    }

    fn help(&self) -> Vec<KeyBinding> {
        self.picker.help("new account")
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        if let Some(account) = self.picker.selected() {
            return Some(Box::new(DatadogCheckStep::new(
                self.services.clone(),
                self.api.clone(),
                account.id.clone(),
            )));
        }
        if self.picker.wants_create() {
            return Some(Box::new(AccountCreateStep::new(
                self.services.clone(),
                self.api.clone(),
                self.organization.clone(),
            )));
        }
        None
    }
}

pub struct AccountCreateStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    organization: Organization,
    input: TextInput,
    creating: bool,
    created: Option<Account>,
    persisted: bool,
    error: Option<Error>,
}

impl AccountCreateStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, organization: Organization) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            organization,
            input: TextInput::new("Production"),
            creating: false,
            created: None,
            persisted: false,
            error: None,
        }
    }

    fn submit(&mut self) -> Command {
        if self.creating || self.input.is_empty() {
            return Command::none();
        }
        self.creating = true;
        let api = self.api.clone();
        let org_id = self.organization.id.clone();
        let name = self.input.value().to_string();
        Command::perform(self.id, async move {
            Completion::AccountCreated(api.create_account(&org_id, &name).await)
        })
    }

    fn persist(&mut self) {
        let Some(account) = &self.created else {
            return;
        };
        match self.services.preferences.set_default_account_id(&account.id) {
            Ok(()) => {
                info!(account_id = %account.id, "Account created");
                self.persisted = true;
            }
            Err(e) => self.error = Some(e.into()),
        }
    }
}

impl Step for AccountCreateStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::AccountCreate
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::AccountCreated(result),
                ..
            } => {
                self.creating = false;
                match result {
                    Ok(account) => {
                        self.created = Some(account);
                        self.persist();
                    }
                    Err(e) => self.error = Some(e.into()),
                }
                Command::none()
            }
            Msg::Key(_) if self.creating || self.persisted => Command::none(),
            Msg::Key(Key::Enter) => {
                self.error = None;
                if self.created.is_some() {
                    self.persist();
                    return Command::none();
                }
                self.submit()
            }
            Msg::Key(key) if self.created.is_none() => {
                self.input.handle(key);
                Command::none()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        if self.creating {
            return "Creating account...".into();
        }
        format!(
            "Create an account in {}\n\nAccount name:\n{}",
            self.organization.name,
            self.input.view()
        )
    }

    fn is_complete(&self) -> bool {
        self.persisted
    }

    fn is_busy(&self) -> bool {
        self.creating
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if self.error.is_some() {
            vec![KeyBinding::new("enter", "retry")]
        } else {
            vec![KeyBinding::new("enter", "create")]
        }
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let account = self.created.as_ref().filter(|_| self.persisted)?;
        Some(Box::new(DatadogCheckStep::new(
            self.services.clone(),
            self.api.clone(),
            account.id.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::testing::{Fixture, account, org, pump};

    fn acme() -> Organization {
        org("org_1", "Acme")
    }

    #[tokio::test]
    async fn single_account_auto_selects() {
        let fx = Fixture::new();
        *fx.api.accounts.lock().unwrap() = vec![account("acct_1", "Production")];

        let mut step = AccountSelectStep::new(fx.services.clone(), fx.control_plane(), acme());
        let cmd = step.init();
        pump(&mut step, cmd).await;

        assert_eq!(step.selected().unwrap().id, "acct_1");
        assert_eq!(fx.prefs().default_account_id().as_deref(), Some("acct_1"));
        assert_eq!(step.next().unwrap().kind(), StepKind::DatadogCheck);
    }

    #[tokio::test]
    async fn stale_preference_requires_choice() {
        let fx = Fixture::new();
        fx.prefs().set_default_account_id("acct_gone").unwrap();
        *fx.api.accounts.lock().unwrap() = vec![account("acct_1", "Production")];

        let mut step = AccountSelectStep::new(fx.services.clone(), fx.control_plane(), acme());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(!step.is_complete());
        assert!(step.view().contains("Select an account in Acme"));
    }

    #[tokio::test]
    async fn new_account_key_routes_to_create() {
        let fx = Fixture::new();
        *fx.api.accounts.lock().unwrap() =
            vec![account("acct_1", "Production"), account("acct_2", "Staging")];

        let mut step = AccountSelectStep::new(fx.services.clone(), fx.control_plane(), acme());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        let _ = step.update(Msg::Key(Key::Char('n')));
        assert_eq!(step.next().unwrap().kind(), StepKind::AccountCreate);
    }

    #[tokio::test]
    async fn create_submits_once() {
        let fx = Fixture::new();
        let mut step = AccountCreateStep::new(fx.services.clone(), fx.control_plane(), acme());
        for c in "Staging".chars() {
            let _ = step.update(Msg::Key(Key::Char(c)));
        }

        let first = step.update(Msg::Key(Key::Enter));
        let second = step.update(Msg::Key(Key::Enter));
        assert_eq!(first.len(), 1);
        assert!(second.is_none());
        assert!(step.is_busy());

        pump(&mut step, first).await;
        assert_eq!(fx.api.count("create_account"), 1);
        assert_eq!(fx.prefs().default_account_id().as_deref(), Some("acct_created"));
        assert_eq!(step.next().unwrap().kind(), StepKind::DatadogCheck);
    }
}
