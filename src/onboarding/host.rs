//! Host: wraps the flow with the global key bindings and reports the outcome.

use tracing::info;

use super::command::Command;
use super::event::{Key, Msg};
use super::flow::Flow;
use super::services::Services;
use super::step::KeyBinding;
use super::steps::AuthCheckStep;
use crate::tui::layout::Screen;

const QUIT: KeyBinding = KeyBinding::new("ctrl+c", "quit");

/// How the wizard ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every step finished. Ids are read back from preferences.
    Finished {
        organization_id: Option<String>,
        account_id: Option<String>,
    },
    /// The user quit before the end.
    Quit,
}

pub struct Onboarding {
    flow: Flow,
    services: Services,
    quit: bool,
}

impl Onboarding {
    pub fn new(services: Services) -> Self {
        let first = Box::new(AuthCheckStep::new(services.clone()));
        Self {
            flow: Flow::new(first),
            services,
            quit: false,
        }
    }

    pub fn init(&mut self) -> Command {
        self.flow.init()
    }

    pub fn update(&mut self, msg: Msg) -> Command {
        if let Msg::Key(Key::Ctrl('c') | Key::Esc) = msg {
            info!(step = ?self.flow.current_kind(), "Onboarding cancelled");
            self.quit = true;
            return Command::none();
        }
        if let Msg::Resize { width, height } = msg {
            self.flow.set_size(width, height);
            return Command::none();
        }
        self.flow.update(msg)
    }

    pub fn is_done(&self) -> bool {
        self.quit || self.flow.is_complete()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if self.quit {
            return Some(Outcome::Quit);
        }
        if !self.flow.is_complete() {
            return None;
        }
        let prefs = &self.services.preferences;
        Some(Outcome::Finished {
            organization_id: prefs.default_org_id(),
            account_id: prefs.default_account_id(),
        })
    }

    /// Current step's bindings followed by the global ones.
    pub fn bindings(&self) -> Vec<KeyBinding> {
        let mut bindings = self.flow.help();
        bindings.push(QUIT);
        bindings
    }

    pub fn screen(&self) -> Screen<'_> {
        Screen {
            content: self.flow.view(),
            error: self.flow.error(),
            bindings: self.bindings(),
            busy: self.flow.is_busy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::testing::{Fixture, account, datadog_account, org};

    async fn drive(host: &mut Onboarding, mut cmd: Command) {
        while !cmd.is_none() {
            let mut next = Command::none();
            for msg in cmd.resolve().await {
                next = next.and(host.update(msg));
            }
            cmd = next;
        }
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_any_step() {
        let fx = Fixture::new();
        let mut host = Onboarding::new(fx.services.clone());
        let _ = host.init();
        assert!(!host.is_done());
        assert_eq!(host.outcome(), None);

        let _ = host.update(Msg::Key(Key::Ctrl('c')));
        assert!(host.is_done());
        assert_eq!(host.outcome(), Some(Outcome::Quit));
    }

    #[tokio::test]
    async fn returning_user_reaches_the_end() {
        let fx = Fixture::new();
        *fx.auth.token.lock().unwrap() = Some("at_saved".into());
        fx.prefs().set_role("platform").unwrap();
        *fx.api.organizations.lock().unwrap() = vec![org("org_1", "Acme")];
        *fx.api.accounts.lock().unwrap() = vec![account("acct_1", "Production")];
        *fx.api.datadog.lock().unwrap() = Some(datadog_account("dd_1"));

        let mut host = Onboarding::new(fx.services.clone());
        let cmd = host.init();
        drive(&mut host, cmd).await;

        assert!(host.screen().content.starts_with("You're all set!"));
        assert_eq!(host.bindings().last(), Some(&QUIT));
        assert!(!host.is_done());

        let _ = host.update(Msg::Key(Key::Enter));
        assert_eq!(
            host.outcome(),
            Some(Outcome::Finished {
                organization_id: Some("org_1".into()),
                account_id: Some("acct_1".into()),
            })
        );
    }
}
