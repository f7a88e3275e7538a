//! Organization selection and creation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ControlPlane, Organization, OrganizationBootstrap};
use crate::error::Error;
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::selection::{Picker, PickerAction};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};
use crate::preferences::PreferencesService;

use super::input::TextInput;
use super::{AccountSelectStep, DatadogRegionStep};

pub struct OrganizationSelectStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    picker: Picker<Organization>,
}

impl OrganizationSelectStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            picker: Picker::new(
                "organization",
                PreferencesService::default_org_id,
                PreferencesService::set_default_org_id,
            ),
        }
    }

    pub fn selected(&self) -> Option<&Organization> {
        self.picker.selected()
    }

    fn load(&mut self) -> Command {
        self.picker.start_loading();
        let api = self.api.clone();
        Command::perform(self.id, async move {
            Completion::OrganizationsLoaded(api.list_organizations().await)
        })
    }
}

impl Step for OrganizationSelectStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::OrganizationSelect
    }

    fn init(&mut self) -> Command {
        self.load()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::OrganizationsLoaded(result),
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
            return "Loading organizations...".into();
        }
        format!("Select your organization\n\n{}", self.picker.render())
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
        self.picker.help("new organization")
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        if let Some(org) = self.picker.selected() {
            return Some(Box::new(AccountSelectStep::new(
                self.services.clone(),
                self.api.clone(),
                org.clone(),
            )));
        }
        if self.picker.wants_create() {
            return Some(Box::new(OrganizationCreateStep::new(
                self.services.clone(),
                self.api.clone(),
            )));
        }
        None
    }
}

pub struct OrganizationCreateStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    input: TextInput,
    creating: bool,
    created: Option<OrganizationBootstrap>,
    persisted: bool,
    error: Option<Error>,
}

impl OrganizationCreateStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            input: TextInput::new("Acme Inc"),
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
        let name = self.input.value().to_string();
        Command::perform(self.id, async move {
            Completion::OrganizationCreated(api.create_organization(&name).await)
        })
    }

    /// Save every id the bootstrap created. Stops at the first failed write.
    fn persist(&mut self) {
        let Some(created) = &self.created else {
            return;
        };
        let prefs = &self.services.preferences;
        let result = prefs
            .set_default_org_id(&created.organization.id)
            .and_then(|()| prefs.set_default_account_id(&created.account.id))
            .and_then(|()| prefs.set_default_workspace_id(&created.workspace.id));
        match result {
            Ok(()) => {
                info!(
                    org_id = %created.organization.id,
                    account_id = %created.account.id,
                    "Organization created"
                );
                self.persisted = true;
            }
            Err(e) => {
                warn!(error = %e, "Organization created but preferences not saved");
                self.error = Some(e.into());
            }
        }
    }
}

impl Step for OrganizationCreateStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::OrganizationCreate
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::OrganizationCreated(result),
                ..
            } => {
                self.creating = false;
                match result {
                    Ok(created) => {
                        self.created = Some(created);
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
            return "Creating organization...".into();
        }
        format!(
            "Create your organization\n\nOrganization name:\n{}",
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
        let created = self.created.as_ref().filter(|_| self.persisted)?;
        Some(Box::new(DatadogRegionStep::new(
            self.services.clone(),
            self.api.clone(),
            created.account.id.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::testing::{Fixture, org, pump};

    fn type_text(step: &mut dyn Step, text: &str) {
        for c in text.chars() {
            let _ = step.update(Msg::Key(Key::Char(c)));
        }
    }

    #[tokio::test]
    async fn single_org_auto_selects_and_persists() {
        let fx = Fixture::new();
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme")];

        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        assert!(step.is_busy());
        pump(&mut step, cmd).await;

        assert!(step.is_complete());
        assert_eq!(fx.prefs().default_org_id().as_deref(), Some("org_1"));
        assert_eq!(step.next().unwrap().kind(), StepKind::AccountSelect);
    }

    #[tokio::test]
    async fn saved_preference_wins_over_list_order() {
        let fx = Fixture::new();
        fx.prefs().set_default_org_id("org_2").unwrap();
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme"), org("org_2", "Globex")];

        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert_eq!(step.selected().unwrap().id, "org_2");
    }

    #[tokio::test]
    async fn several_orgs_wait_for_user() {
        let fx = Fixture::new();
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme"), org("org_2", "Globex")];

        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(!step.is_complete());
        assert!(step.view().contains("> Acme"));

        let _ = step.update(Msg::Key(Key::Down));
        let _ = step.update(Msg::Key(Key::Enter));
        assert_eq!(step.selected().unwrap().id, "org_2");
        assert_eq!(fx.prefs().default_org_id().as_deref(), Some("org_2"));
    }

    #[tokio::test]
    async fn empty_list_routes_to_create() {
        let fx = Fixture::new();
        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(step.is_complete());
        assert_eq!(step.next().unwrap().kind(), StepKind::OrganizationCreate);
    }

    #[tokio::test]
    async fn load_failure_retries_with_cleared_error() {
        let fx = Fixture::new();
        fx.api.fail_next("list_organizations");
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme")];

        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(step.has_error());

        let cmd = step.update(Msg::Key(Key::Char('r')));
        assert!(!step.has_error());
        pump(&mut step, cmd).await;
        assert!(step.is_complete());
        assert_eq!(fx.api.count("list_organizations"), 2);
    }

    #[tokio::test]
    async fn auto_select_persist_failure_is_retryable() {
        let fx = Fixture::new();
        fx.fail_saves(true);
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme")];

        let mut step = OrganizationSelectStep::new(fx.services.clone(), fx.control_plane());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(step.has_error());
        assert!(!step.is_complete());

        fx.fail_saves(false);
        let cmd = step.update(Msg::Key(Key::Char('r')));
        assert!(cmd.is_none());
        assert!(step.is_complete());
        assert_eq!(fx.api.count("list_organizations"), 1);
    }

    #[tokio::test]
    async fn create_is_single_flight() {
        let fx = Fixture::new();
        let mut step = OrganizationCreateStep::new(fx.services.clone(), fx.control_plane());
        type_text(&mut step, "Acme");

        let first = step.update(Msg::Key(Key::Enter));
        let second = step.update(Msg::Key(Key::Enter));
        assert_eq!(first.len(), 1);
        assert!(second.is_none());

        pump(&mut step, first).await;
        assert!(step.is_complete());
        assert_eq!(fx.api.count("create_organization"), 1);
        assert_eq!(fx.prefs().default_org_id().as_deref(), Some("org_new"));
        assert_eq!(fx.prefs().default_account_id().as_deref(), Some("acct_new"));
        assert_eq!(fx.prefs().default_workspace_id().as_deref(), Some("ws_new"));
        assert_eq!(step.next().unwrap().kind(), StepKind::DatadogRegion);
    }

    #[tokio::test]
    async fn empty_name_is_ignored() {
        let fx = Fixture::new();
        let mut step = OrganizationCreateStep::new(fx.services.clone(), fx.control_plane());
        type_text(&mut step, "   ");
        assert!(step.update(Msg::Key(Key::Enter)).is_none());
    }

    #[tokio::test]
    async fn persist_failure_does_not_create_twice() {
        let fx = Fixture::new();
        fx.fail_saves(true);
        let mut step = OrganizationCreateStep::new(fx.services.clone(), fx.control_plane());
        type_text(&mut step, "Acme");
        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        assert!(step.has_error());

        fx.fail_saves(false);
        let cmd = step.update(Msg::Key(Key::Enter));
        assert!(cmd.is_none());
        assert!(!step.has_error());
        assert!(step.is_complete());
        assert_eq!(fx.api.count("create_organization"), 1);
    }

    #[tokio::test]
    async fn create_failure_retries_on_enter() {
        let fx = Fixture::new();
        fx.api.fail_next("create_organization");
        let mut step = OrganizationCreateStep::new(fx.services.clone(), fx.control_plane());
        type_text(&mut step, "Acme");
        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        assert!(step.has_error());

        let cmd = step.update(Msg::Key(Key::Enter));
        assert!(!step.has_error());
        pump(&mut step, cmd).await;
        assert!(step.is_complete());
    }
}
