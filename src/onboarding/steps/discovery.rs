//! Waits for the background discovery jobs started when Datadog is connected.
//!
//! Both steps poll every [`POLL_INTERVAL`] until the job reports `READY`. A
//! job-side error is shown but polling goes on; a failed request stops polling
//! until the user retries with `enter`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{ControlPlane, LogDiscoveryProgress, ServiceDiscoveryStatus};
use crate::error::{ApiError, Error};
use crate::onboarding::command::Command;
use crate::onboarding::event::{Completion, Key, Msg, StepId};
use crate::onboarding::services::Services;
use crate::onboarding::step::{KeyBinding, Step, StepKind};

use super::CompleteStep;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

const RETRY_ENTER: KeyBinding = KeyBinding::new("enter", "retry");

fn not_found(id: &str) -> Error {
    ApiError::NotFound {
        entity: "datadog account".into(),
        id: id.into(),
    }
    .into()
}

/// Poll bookkeeping shared by both discovery steps.
#[derive(Debug, Default)]
struct Poller {
    fetching: bool,
    stopped: bool,
    ready: bool,
}

impl Poller {
    fn can_fetch(&self) -> bool {
        !self.fetching && !self.stopped && !self.ready
    }
}

pub struct ServiceDiscoveryStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    datadog_account_id: String,
    poller: Poller,
    status: Option<ServiceDiscoveryStatus>,
    error: Option<Error>,
}

impl ServiceDiscoveryStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, datadog_account_id: String) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            datadog_account_id,
            poller: Poller::default(),
            status: None,
            error: None,
        }
    }

    fn fetch(&mut self) -> Command {
        if !self.poller.can_fetch() {
            return Command::none();
        }
        self.poller.fetching = true;
        let api = self.api.clone();
        let id = self.datadog_account_id.clone();
        Command::perform(self.id, async move {
            Completion::ServiceDiscovery(api.service_discovery_status(&id).await)
        })
    }

    fn on_status(&mut self, result: Result<Option<ServiceDiscoveryStatus>, ApiError>) -> Command {
        self.poller.fetching = false;
        match result {
            Ok(Some(status)) => {
                debug!(status = ?status.status, discovered = status.services_discovered, "Service discovery status");
                self.error = status.last_error.clone().map(Error::Discovery);
                if status.status.is_ready() {
                    info!(discovered = status.services_discovered, "Service discovery complete");
                    self.poller.ready = true;
                    self.status = Some(status);
                    return Command::none();
                }
                self.status = Some(status);
                Command::tick_after(self.id, POLL_INTERVAL)
            }
            Ok(None) => {
                self.poller.stopped = true;
                self.error = Some(not_found(&self.datadog_account_id));
                Command::none()
            }
            Err(e) => {
                self.poller.stopped = true;
                self.error = Some(e.into());
                Command::none()
            }
        }
    }
}

impl Step for ServiceDiscoveryStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::ServiceDiscovery
    }

    fn init(&mut self) -> Command {
        self.fetch()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed { completion, .. } => match completion {
                Completion::ServiceDiscovery(result) => self.on_status(result),
                Completion::Tick => self.fetch(),
                _ => Command::none(),
            },
            Msg::Key(Key::Enter) if self.poller.stopped => {
                self.error = None;
                self.poller.stopped = false;
                self.fetch()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        let progress = match &self.status {
            Some(s) if s.services_discovered > 0 => {
                format!("{} services discovered so far", s.services_discovered)
            }
            _ => "Starting discovery...".into(),
        };
        format!("Discovering services...\n\nThis usually takes 30-60 seconds.\n\n{progress}")
    }

    fn is_complete(&self) -> bool {
        self.poller.ready
    }

    fn is_busy(&self) -> bool {
        !self.poller.ready && !self.poller.stopped
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if self.poller.stopped {
            vec![RETRY_ENTER]
        } else {
            Vec::new()
        }
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        if !self.poller.ready {
            return None;
        }
        Some(Box::new(LogDiscoveryStep::new(
            self.services.clone(),
            self.api.clone(),
            self.datadog_account_id.clone(),
        )))
    }
}

/// Render an event count as `950`, `12.5K`, `3.2M`, `1.1B`.
pub fn format_volume(volume: f64) -> String {
    const UNITS: [(f64, &str); 3] = [(1e9, "B"), (1e6, "M"), (1e3, "K")];
    for (scale, suffix) in UNITS {
        if volume >= scale {
            return format!("{:.1}{suffix}", volume / scale);
        }
    }
    format!("{volume:.0}")
}

pub struct LogDiscoveryStep {
    id: StepId,
    services: Services,
    api: Arc<dyn ControlPlane>,
    datadog_account_id: String,
    poller: Poller,
    progress: Option<LogDiscoveryProgress>,
    error: Option<Error>,
}

impl LogDiscoveryStep {
    pub fn new(services: Services, api: Arc<dyn ControlPlane>, datadog_account_id: String) -> Self {
        Self {
            id: StepId::next(),
            services,
            api,
            datadog_account_id,
            poller: Poller::default(),
            progress: None,
            error: None,
        }
    }

    fn fetch(&mut self) -> Command {
        if !self.poller.can_fetch() {
            return Command::none();
        }
        self.poller.fetching = true;
        let api = self.api.clone();
        let id = self.datadog_account_id.clone();
        Command::perform(self.id, async move {
            Completion::LogDiscovery(api.log_discovery_progress(&id).await)
        })
    }

    fn on_progress(&mut self, result: Result<Option<LogDiscoveryProgress>, ApiError>) -> Command {
        self.poller.fetching = false;
        match result {
            Ok(Some(progress)) => {
                self.error = progress.last_error.clone().map(Error::Discovery);
                let ready = progress.status.is_ready();
                self.progress = Some(progress);
                if ready {
                    info!("Log discovery complete");
                    self.poller.ready = true;
                    return Command::none();
                }
                Command::tick_after(self.id, POLL_INTERVAL)
            }
            Ok(None) => {
                self.poller.stopped = true;
                self.error = Some(not_found(&self.datadog_account_id));
                Command::none()
            }
            Err(e) => {
                self.poller.stopped = true;
                self.error = Some(e.into());
                Command::none()
            }
        }
    }
}

impl Step for LogDiscoveryStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn kind(&self) -> StepKind {
        StepKind::LogDiscovery
    }

    fn init(&mut self) -> Command {
        self.fetch()
    }

    fn update(&mut self, msg: Msg) -> Command {
        match msg {
            Msg::Completed { completion, .. } => match completion {
                Completion::LogDiscovery(result) => self.on_progress(result),
                Completion::Tick => self.fetch(),
                _ => Command::none(),
            },
            Msg::Key(Key::Enter) if self.poller.stopped => {
                self.error = None;
                self.poller.stopped = false;
                self.fetch()
            }
            _ => Command::none(),
        }
    }

    fn view(&self) -> String {
        let mut lines = vec!["Analyzing your logs...".to_string(), String::new()];
        match &self.progress {
            Some(p) => {
                if let Some(percent) = p.percent_complete {
                    lines.push(format!("{percent:.0}% complete"));
                }
                lines.push(format!(
                    "Weekly volume: {} events",
                    format_volume(p.weekly_volume as f64)
                ));
                lines.push(format!(
                    "Analyzed: {} events",
                    format_volume(p.discovered_weekly_volume)
                ));
            }
            None => lines.push("Starting discovery...".into()),
        }
        lines.join("\n")
    }

    fn is_complete(&self) -> bool {
        self.poller.ready
    }

    fn is_busy(&self) -> bool {
        !self.poller.ready && !self.poller.stopped
    }

    fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn help(&self) -> Vec<KeyBinding> {
        if self.poller.stopped {
            vec![RETRY_ENTER]
        } else {
            Vec::new()
        }
    }

    fn next(&self) -> Option<Box<dyn Step>> {
        if !self.poller.ready {
            return None;
        }
        Some(Box::new(CompleteStep::new(self.services.clone())))
    }
}
