//! Role selection. A previously saved role skips the step.
//!
//! The role lives only in preferences. Later steps do not take it as a
//! constructor argument; anything that needs it reads `PreferencesService::role`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::api::ControlPlane;
use crate::error::Error;
use crate::onboarding::command::Command;
use crate::onboarding::event::{Key, Msg, StepId};
use crate::onboarding::selection::Cursor;
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, RETRY, Step, StepKind};

use super::OrganizationSelectStep;

pub struct Role {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub const ROLES: &[Role] = &[
    Role {
        id: "platform",
        title: "Platform / Observability Team",
        description: "I'm responsible for observability across the organization",
    },
    Role {
        id: "engineer",
        title: "Service Owner / Engineer",
        description: "I work on specific services and own their observability",
    },
];

fn is_known(role: &str) -> bool {
    ROLES.iter().any(|r| r.id == role)
}

pub struct RoleStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    cursor: Cursor,
    selected: Option<&'static str>,
    complete: bool,
    error: Option<Error>,
}

impl RoleStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>) -> Self {
        let saved = services
            .preferences
            .role()
            .and_then(|r| ROLES.iter().find(|known| known.id == r))
            .map(|r| r.id);
        Self {
            id: StepId::next(),
            services,
            api,
            cursor: Cursor::default(),
            complete: saved.is_some(),
            selected: saved,
            error: None,
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        self.selected
    }

    fn persist(&mut self) {
        let Some(role) = self.selected else {
            return;
        };
        match self.services.preferences.set_role(role) {
            Ok(()) => {
                info!(role, "Role selected");
                self.complete = true;
            }
            Err(e) => self.error = Some(e.into()),
        }
    }
}

impl Step for RoleStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::Role
    }

    fn update(&mut self, msg: Msg) -> Command {
        let Msg::Key(key) = msg else {
            return Command::none();
        };
        if self.complete {
            return Command::none();
        }

        match key {
            Key::Char('r') if self.error.is_some() => {
                self.error = None;
                self.persist();
            }
            Key::Up | Key::Char('k') => self.cursor.up(),
            Key::Down | Key::Char('j') => self.cursor.down(ROLES.len()),
            Key::Enter => {
                self.error = None;
                self.selected = ROLES.get(self.cursor.index()).map(|r| r.id);
                self.persist();
            }
            _ => {}
        }
        Command::none()
    }

    fn view(&self) -> String {
        let mut lines = vec!["What's your role in this organization?".to_string(), String::new()];
        for (i, role) in ROLES.iter().enumerate() {
            let marker = if i == self.cursor.index() { ">" } else { " " };
            lines.push(format!("{marker} {}", role.title));
            lines.push(format!("    {}", role.description));
        }
        lines.join("\n")
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        let mut bindings = vec![
            KeyBinding::new("↑/k", "up"),
            KeyBinding::new("↓/j", "down"),
            KeyBinding::new("enter", "select"),
        ];
        if self.error.is_some() {
            bindings.push(RETRY);
        }
        bindings
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let role = self.selected.filter(|r| is_known(r))?;
        debug!(role, "Continuing to organization selection");
        Some(Box::new(OrganizationSelectStep::new(
            self.services.clone(),
            self.api.clone(),
        )))
    }
}
