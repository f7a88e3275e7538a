//! Checks for stored credentials before anything else runs.

use secrecy::SecretString;
use tracing::warn;

use crate::auth::duplicate_secret;
use crate::error::{AuthError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, RETRY, Step, StepKind};

use super::{AuthenticateStep, RoleStep};

pub struct AuthCheckStep {
    id: StepId,
    services: Services,
    checking: bool,
    checked: bool,
    token: Option<SecretString>,
    error: Option<Error>,
}

impl AuthCheckStep {
    pub fn new(services: Services) -> Self {
        Self {
            id: StepId::next(),
            services,
            checking: false,
            checked: false,
            token: None,
            error: None,
        }
    }

    /// True once checked and no usable token was found.
    pub fn needs_auth(&self) -> bool {
        self.checked && self.token.is_none()
    }

    fn check(&mut self) -> Command {
        self.checking = true;
        let auth = self.services.authenticator.clone();
        Command::perform(self.id, async move {
            if !auth.is_authenticated() {
                return Completion::AuthChecked(Ok(None));
            }
            let result = match auth.access_token() {
                Ok(token) => Ok(Some(token)),
                Err(e) => {
                    warn!(error = %e, "Stored credentials unreadable, clearing");
                    auth.clear_tokens().map(|()| None)
                }
            };
            Completion::AuthChecked(result)
        })
    }

    fn on_checked(&mut self, result: Result<Option<SecretString>, AuthError>) {
        self.checking = false;
        match result {
            Ok(token) => {
                self.token = token;
                self.checked = true;
            }
            Err(e) => self.error = Some(e.into()),
        }
    }
}

impl Step for AuthCheckStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::AuthCheck
    }

    fn init(&mut self) -> Command {
        self.check()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed {
                completion: Completion::AuthChecked(result),
                ..
            } => {
                self.on_checked(result);
                Command::none()
            }
            Msg::Key(Key::Char('r')) if self.error.is_some() => {
                self.error = None;
                self.check()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        if self.checking {
            "Checking authentication...".into()
        } else if self.token.is_some() {
            "✓ Already authenticated".into()
        } else if self.checked {
            "No authentication found".into()
        } else {
            String::new()
        }
    }

    fn is_complete(&self) -> bool {
        self.checked && self.error.is_none()
    }

    fn is_busy(&self) -> bool {
        self.checking
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if self.error.is_some() {
            vec![RETRY]
        } else {
            Vec::new()
        }
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        match &self.token {
            Some(token) => {
                let api = self.services.control_plane.connect(&duplicate_secret(token));
                Some(Box::new(RoleStep::new(self.services.clone(), api)))
            }
            None => Some(Box::new(AuthenticateStep::new(self.services.clone()))),
        }
    }
}
