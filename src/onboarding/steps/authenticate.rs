//! Device-authorization step: show the code, open the browser, wait for approval.

use std::time::Duration;

use secrecy::SecretString;
use tracing::{info, warn};

use crate::auth::{AuthResult, CancelHandle, DeviceAuth, cancel_pair, duplicate_secret};
use crate::error::{AuthError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};

use super::RoleStep;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initializing,
    Ready,
    Complete,
}

pub struct AuthenticateStep {
    id: StepId,
    services: Services,
    state: State,
    device_auth: Option<DeviceAuth>,
    access_token: Option<SecretString>,
    polling: bool,
    /// A countdown tick is in flight. At most one chain runs across restarts.
    ticking: bool,
    cancel: Option<CancelHandle>,
    open_failed: bool,
    copied: bool,
    error: Option<Error>,
}

impl AuthenticateStep {
    pub fn new(services: Services) -> Self {
        Self {
            id: StepId::next(),
            services,
            state: State::Initializing,
            device_auth: None,
            access_token: None,
            polling: false,
            ticking: false,
            cancel: None,
            open_failed: false,
            copied: false,
            error: None,
        }
    }

    fn start(&mut self) -> Command {
        let auth = self.services.authenticator.clone();
        Command::perform(self.id, async move {
            Completion::DeviceAuthStarted(auth.start_device_auth().await)
        })
    }

    /// Begin waiting for approval unless a wait is already outstanding.
    fn poll(&mut self) -> Command {
        if self.polling {
            return Command::none();
        }
        let Some(device) = self.device_auth.as_ref() else {
            return Command::none();
        };

        let (handle, signal) = cancel_pair();
        self.cancel = Some(handle);
        self.polling = true;

        let auth = self.services.authenticator.clone();
        let device_code = device.device_code.clone();
        let interval = device.interval;
        Command::perform(self.id, async move {
            Completion::Authenticated(auth.wait_for_auth(&device_code, interval, signal).await)
        })
    }

    fn schedule_tick(&mut self) -> Command {
        if self.ticking {
            return Command::none();
        }
        self.ticking = true;
        Command::tick_after(self.id, COUNTDOWN_TICK)
    }

    fn on_tick(&mut self) -> Command {
        self.ticking = false;
        match self.device_auth.as_ref() {
            Some(d) if self.state == State::Ready && !d.remaining().is_zero() => {
                self.schedule_tick()
            }
            _ => Command::none(),
        }
    }

    fn open_browser(&mut self) -> Command {
        let Some(url) = self.device_auth.as_ref().map(|d| d.url().to_string()) else {
            return Command::none();
        };
        match self.services.launcher.open_url(&url) {
            Ok(()) => {
                self.open_failed = false;
                self.error = None;
                self.poll()
            }
            Err(e) => {
                warn!(error = %e, "Failed to open browser");
                self.open_failed = true;
                Command::none()
            }
        }
    }

    fn copy_url(&mut self) -> Command {
        let Some(url) = self.device_auth.as_ref().map(|d| d.url().to_string()) else {
            return Command::none();
        };
        match self.services.launcher.copy(&url) {
            Ok(()) => self.copied = true,
            Err(e) => warn!(error = %e, "Failed to copy URL"),
        }
        self.error = None;
        self.poll()
    }

    fn can_restart(&self) -> bool {
        match &self.error {
            Some(Error::Auth(e)) if e.is_recoverable() => true,
            Some(_) => self.device_auth.is_none(),
            None => false,
        }
    }

    fn restart(&mut self) -> Command {
        info!("Restarting device authorization");
        self.cancel = None;
        self.polling = false;
        self.device_auth = None;
        self.open_failed = false;
        self.copied = false;
        self.error = None;
        self.state = State::Initializing;
        self.start()
    }

    fn on_started(&mut self, result: Result<DeviceAuth, AuthError>) -> Command {
        match result {
            Ok(device) => {
                info!(user_code = %device.user_code, "Device authorization issued");
                self.device_auth = Some(device);
                self.state = State::Ready;
                self.schedule_tick()
            }
            Err(e) => {
                self.error = Some(e.into());
                Command::none()
            }
        }
    }

    fn on_authenticated(&mut self, result: Result<AuthResult, AuthError>) {
        self.polling = false;
        self.cancel = None;
        match result {
            Ok(auth) => {
                if !auth.user.email.is_empty() {
                    if let Err(e) = self.services.preferences.set_email(&auth.user.email) {
                        warn!(error = %e, "Failed to save email");
                    }
                }
                self.access_token = Some(auth.access_token);
                self.state = State::Complete;
            }
            Err(AuthError::Cancelled) => {}
            Err(e) => self.error = Some(e.into()),
        }
    }

    fn countdown(&self) -> Option<String> {
        let remaining = self.device_auth.as_ref()?.remaining().as_secs();
        Some(format!(
            "Code expires in {}:{:02}",
            remaining / 60,
            remaining % 60
        ))
    }
}

impl Step for AuthenticateStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::Authenticate
    }

    fn init(&mut self) -> Command {
        let auth = &self.services.authenticator;
        if auth.is_authenticated() {
            if let Ok(token) = auth.access_token() {
                self.access_token = Some(token);
                self.state = State::Complete;
                return Command::none();
            }
        }
        self.start()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed { completion, .. } => match completion {
                Completion::DeviceAuthStarted(result) => self.on_started(result),
                Completion::Authenticated(result) => {
                    self.on_authenticated(result);
                    Command::none()
                }
                Completion::Tick => self.on_tick(),
                _ => Command::none(),
            },
            Msg::Key(key) if self.state == State::Ready => match key {
                Key::Enter => self.open_browser(),
                Key::Char('c') => self.copy_url(),
                Key::Char('r') if self.can_restart() => self.restart(),
                _ => Command::none(),
            },
            Msg::Key(Key::Char('r')) if self.state == State::Initializing && self.can_restart() => {
                self.restart()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        match self.state {
            State::Initializing => "Starting authentication...".into(),
            State::Complete => "✓ Authentication successful!".into(),
            State::Ready => {
                let Some(device) = self.device_auth.as_ref() else {
                    return String::new();
                };
                let mut lines = vec![
                    "Authenticate with Tero".to_string(),
                    String::new(),
                    "Visit this URL to sign in:".to_string(),
                    device.url().to_string(),
                    String::new(),
                    format!("Code: {}", device.user_code),
                ];
                lines.extend(self.countdown());
                lines.push(String::new());
                if self.polling {
                    lines.push("Waiting for authentication...".into());
                }
                if self.copied {
                    lines.push("✓ URL copied to clipboard".into());
                }
                if self.open_failed {
                    lines.push("Couldn't open browser. Press 'c' to copy URL".into());
                } else if !self.polling {
                    lines.push(
                        "Press Enter to open in browser, or press 'c' to copy the URL".into(),
                    );
                }
                lines.join("\n")
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    fn is_busy(&self) -> bool {
        (self.state == State::Initializing && self.error.is_none()) || self.polling
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        let mut bindings = Vec::new();
        if self.state == State::Ready {
            bindings.push(KeyBinding::new("enter", "open in browser"));
            bindings.push(KeyBinding::new("c", "copy URL"));
        }
        if self.can_restart() {
            bindings.push(KeyBinding::new("r", "restart authentication"));
        }
        bindings
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        let token = self.access_token.as_ref()?;
        let api = self.services.control_plane.connect(&duplicate_secret(token));
        Some(Box::new(RoleStep::new(self.services.clone(), api)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::onboarding::testing::{Fixture, WaitOutcome, pump};

    async fn ready(fx: &Fixture) -> AuthenticateStep {
        let mut step = AuthenticateStep::new(fx.services.clone());
        let cmd = step.init();
        assert!(step.is_busy());
        // Drop the countdown tick; tests drive ticks explicitly.
        let _ = pump(&mut step, cmd).await;
        assert_eq!(step.state, State::Ready);
        step
    }

    #[tokio::test]
    async fn enter_opens_browser_and_polls_until_success() {
        let fx = Fixture::new();
        fx.auth.script(&[WaitOutcome::Success]);
        let mut step = ready(&fx).await;
        assert!(step.view().contains("https://auth.example.com/device?code=WXYZ-1234"));

        let cmd = step.update(Msg::Key(Key::Enter));
        assert!(step.is_busy());
        assert_eq!(
            fx.launcher.opened.lock().unwrap().as_slice(),
            ["https://auth.example.com/device?code=WXYZ-1234"]
        );
        pump(&mut step, cmd).await;

        assert!(step.is_complete());
        assert_eq!(fx.prefs().email().as_deref(), Some("dev@example.com"));
        assert_eq!(step.next().unwrap().kind(), StepKind::Role);
    }

    #[tokio::test]
    async fn polling_is_single_flight() {
        let fx = Fixture::new();
        let mut step = ready(&fx).await;

        let first = step.update(Msg::Key(Key::Enter));
        let second = step.update(Msg::Key(Key::Char('c')));
        assert_eq!(first.len(), 1);
        assert!(second.is_none());
        assert_eq!(fx.launcher.copied.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn browser_failure_hints_at_copy() {
        let fx = Fixture::new();
        fx.launcher.fail_open.store(true, Ordering::SeqCst);
        let mut step = ready(&fx).await;

        let cmd = step.update(Msg::Key(Key::Enter));
        assert!(cmd.is_none());
        assert!(step.view().contains("Press 'c' to copy URL"));

        let cmd = step.update(Msg::Key(Key::Char('c')));
        assert_eq!(cmd.len(), 1);
        assert!(step.view().contains("✓ URL copied to clipboard"));
    }

    #[tokio::test]
    async fn expired_code_restarts_from_scratch() {
        let fx = Fixture::new();
        fx.auth.script(&[WaitOutcome::Expired, WaitOutcome::Success]);
        let mut step = ready(&fx).await;

        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        assert!(step.has_error());
        assert!(step.help().iter().any(|b| b.keys == "r"));

        let cmd = step.update(Msg::Key(Key::Char('r')));
        assert!(!step.has_error());
        assert_eq!(step.state, State::Initializing);
        let _ = pump(&mut step, cmd).await;
        assert_eq!(fx.auth.starts.load(Ordering::SeqCst), 2);

        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        assert!(step.is_complete());
    }

    #[tokio::test]
    async fn start_failure_is_retryable() {
        let fx = Fixture::new();
        fx.auth.fail_start.store(true, Ordering::SeqCst);
        let mut step = AuthenticateStep::new(fx.services.clone());
        let cmd = step.init();
        pump(&mut step, cmd).await;
        assert!(step.has_error());
        assert!(!step.is_busy());

        fx.auth.fail_start.store(false, Ordering::SeqCst);
        let cmd = step.update(Msg::Key(Key::Char('r')));
        assert!(!step.has_error());
        let _ = pump(&mut step, cmd).await;
        assert_eq!(step.state, State::Ready);
    }

    #[tokio::test]
    async fn dropping_step_cancels_wait() {
        let fx = Fixture::new();
        fx.auth.script(&[WaitOutcome::Hang]);
        let mut step = ready(&fx).await;

        let cmd = step.update(Msg::Key(Key::Enter));
        let handles: Vec<_> = cmd.into_tasks().into_iter().map(tokio::spawn).collect();
        tokio::task::yield_now().await;
        drop(step);

        for handle in handles {
            let msg = handle.await.unwrap();
            assert!(matches!(
                msg,
                Msg::Completed {
                    completion: Completion::Authenticated(Err(AuthError::Cancelled)),
                    ..
                }
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_a_single_countdown() {
        let fx = Fixture::new();
        fx.auth.script(&[WaitOutcome::Expired]);
        let mut step = AuthenticateStep::new(fx.services.clone());
        let cmd = step.init();
        let first_tick = pump(&mut step, cmd).await;
        assert_eq!(first_tick.len(), 1);

        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        let cmd = step.update(Msg::Key(Key::Char('r')));
        let after_restart = pump(&mut step, cmd).await;
        assert_eq!(step.state, State::Ready);
        assert!(after_restart.is_none());

        // The tick from before the restart carries the countdown on.
        let next = pump(&mut step, first_tick).await;
        assert_eq!(next.len(), 1);
        assert!(step.ticking);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_during_restart_hands_over_to_new_code() {
        let fx = Fixture::new();
        fx.auth.script(&[WaitOutcome::Expired]);
        let mut step = AuthenticateStep::new(fx.services.clone());
        let cmd = step.init();
        let first_tick = pump(&mut step, cmd).await;

        let cmd = step.update(Msg::Key(Key::Enter));
        pump(&mut step, cmd).await;
        let start = step.update(Msg::Key(Key::Char('r')));
        assert!(pump(&mut step, first_tick).await.is_none());
        assert!(!step.ticking);

        let tick = pump(&mut step, start).await;
        assert_eq!(tick.len(), 1);
    }

    #[tokio::test]
    async fn already_authenticated_completes_on_init() {
        let fx = Fixture::new();
        *fx.auth.token.lock().unwrap() = Some("at_saved".into());
        let mut step = AuthenticateStep::new(fx.services.clone());
        assert!(step.init().is_none());
        assert!(step.is_complete());
        assert_eq!(fx.auth.starts.load(Ordering::SeqCst), 0);
    }
}
