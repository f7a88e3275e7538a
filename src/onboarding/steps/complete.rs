//! Final screen. `enter` finishes the flow.

use crate::error::Error;
use crate::onboarding::command::Command;
use crate::onboarding::event::{Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};

pub struct CompleteStep {
    id: StepId,
    services: Services,
    done: bool,
}

impl CompleteStep {
    pub fn new(services: Services) -> Self {
        Self {
            id: StepId::next(),
            services,
            done: false,
        }
    }
}

impl Step for CompleteStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::Complete
    }

    fn update(&mut self, msg: Msg) -> Command {
        if let Msg::Key(Key::Enter) = msg {
            self.done = true;
        }
        Command::none()
    }

    fn view(&self) -> String {
        let greeting = match self.services.preferences.email() {
            Some(email) => format!("You're all set, {email}!"),
            None => "You're all set!".to_string(),
        };
        format!(
            "{greeting}\n\n\
             Tero is analyzing your telemetry and will surface waste and quality\n\
             issues as discovery finishes.\n\n\
             Questions? Reach us at team@usetero.com"
        )
    }

    fn is_complete(&self) -> bool {
        self.done
    }

    fn error(&self) -> Option<&Error> {
        None
    }

    fn help(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("enter", "finish")]
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        None
    }
}
