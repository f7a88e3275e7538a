//! Datadog integration: detect an existing connection, otherwise pick a region.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{ControlPlane, DatadogAccount};
use crate::datadog::{REGIONS, Region};
use crate::error::{ApiError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::selection::{Cursor, render_list};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, RETRY, Step, StepKind};

use super::{ApiKeyStep, ServiceDiscoveryStep};

pub const DOCS_URL: &str = "https://usetero.com/docs/integrations/datadog";

/// Looks up the account's Datadog integration.
pub struct DatadogCheckStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    account_id: String,
    checking: bool,
    checked: bool,
    existing: Option<DatadogAccount>,
    error: Option<Error>,
}

impl DatadogCheckStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, account_id: String) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            account_id,
            checking: false,
            checked: false,
            existing: None,
            error: None,
        }
    }

    fn check(&mut self) -> Command {
        self.checking = true;
        let api = self.api.clone();
        let account_id = self.account_id.clone();
        Command::perform(self.id, async move {
            Completion::DatadogAccountChecked(api.datadog_account(&account_id).await)
        })
    }

    fn on_checked(&mut self, result: Result<Option<DatadogAccount>, ApiError>) {
        self.checking = false;
        match result {
            Ok(existing) => {
                if let Some(dd) = &existing {
                    info!(datadog_account_id = %dd.id, site = %dd.site, "Datadog already connected");
                }
                self.existing = existing;
                self.checked = true;
            }
            Err(e) => self.error = Some(e.into()),
        }
    }
}

impl Step for DatadogCheckStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::DatadogCheck
    }

    fn init(&mut self) -> Command {
        self.check()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::DatadogAccountChecked(result),
                ..
            } => {
                self.on_checked(result);
                Command::none()
            }
            Msg::Key(Key::Char('r')) if self.error.is_some() && !self.checking => {
                self.error = None;
                self.check()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        if self.checking {
            "Checking Datadog integration...".into()
        } else {
            String::new()
        }
    }

    fn is_complete(&self) -> bool {
        self.checked
    }

    fn is_busy(&self) -> bool {
        self.checking
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if self.error.is_some() { vec![RETRY] } else { Vec::new() }
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        if !self.checked {
            return None;
        }
        match &self.existing {
            Some(dd) => Some(Box::new(ServiceDiscoveryStep::new(
                self.services.clone(),
                self.api.clone(),
                dd.id.clone(),
            ))),
            None => Some(Box::new(DatadogRegionStep::new(
                self.services.clone(),
                self.api.clone(),
                self.account_id.clone(),
            ))),
        }
    }
}

/// Choose which Datadog site the account lives on.
pub struct DatadogRegionStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    account_id: String,
    cursor: Cursor,
    selected: Option<&'static Region>,
}

impl DatadogRegionStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, account_id: String) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            account_id,
            cursor: Cursor::default(),
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&'static Region> {
        self.selected
    }
}

impl Step for DatadogRegionStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::DatadogRegion
    }

    fn update(&mut self, msg: Msg) -> Command {
        let Msg::Key(key) = msg else {
            return Command::none();
        };
        if self.selected.is_some() {
            return Command::none();
        }
        match key {
            Key::Up | Key::Char('k') => self.cursor.up(),
            Key::Down | Key::Char('j') => self.cursor.down(REGIONS.len()),
            Key::Enter => {
                self.selected = REGIONS.get(self.cursor.index());
                if let Some(region) = self.selected {
                    info!(site = region.site, "Datadog region selected");
                }
            }
            Key::Char('o') => {
                if let Err(e) = self.services.launcher.open_url(DOCS_URL) {
                    warn!(error = %e, "Failed to open docs");
                }
            }
            _ => {}
        }
        Command::none()
    }

    fn view(&self) -> String {
        let names: Vec<String> = REGIONS
            .iter()
            .map(|r| format!("{:<12} {}", r.display_name, r.domain))
            .collect();
        let list = render_list(names.iter().map(String::as_str), self.cursor);
        format!(
            "Connect Datadog\n\nWhich Datadog site does your organization use?\n\n{list}\n\nSee {DOCS_URL} for details."
        )
    }

    fn is_complete(&self) -> bool {
        self.selected.is_some()
    }

    fn error(&self) -> Option<&Error> {
        None
    }

    fn help(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("↑/k", "up"),
            KeyBinding::new("↓/j", "down"),
            KeyBinding::new("enter", "select"),
            KeyBinding::new("o", "open docs"),
        ]
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let region = self.selected?;
        Some(Box::new(ApiKeyStep::new(
            self.services.clone(),
            self.api.clone(),
            self.account_id.clone(),
            region.site,
        )))
    }
}
