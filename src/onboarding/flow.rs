//! Flow: owns the current step and advances through completed ones.

use tracing::{debug, info};

use super::command::Command;
use super::event::Msg;
use super::step::{KeyBinding, Step, StepKind};
use crate::error::Error;

/// Holds exactly one step at a time. Complete once the last step yields no successor.
pub struct Flow {
    current: Option<Box<dyn Step>>,
    width: u16,
    height: u16,
}

impl Flow {
    pub fn new(first: Box<dyn Step>) -> Self {
        Self {
            current: Some(first),
            width: 80,
            height: 24,
        }
    }

    /// Initialize the first step. Steps that are already complete are skipped.
    pub fn init(&mut self) -> Command {
        let cmd = match self.current.as_mut() {
            Some(step) => {
                step.set_size(self.width, self.height);
                step.init()
            }
            None => Command::none(),
        };
        self.advance(cmd)
    }

    pub fn update(&mut self, msg: Msg) -> Command {
        let Some(step) = self.current.as_mut() else {
            return Command::none();
        };

        let cmd = match msg {
            Msg::Resize { width, height } => {
                self.width = width;
                self.height = height;
                step.set_size(width, height);
                return Command::none();
            }
            Msg::Completed { step: id, .. } if id != step.id() => {
                debug!(stale = %id, current = %step.id(), "Dropping completion for a finished step");
                return Command::none();
            }
            msg => step.update(msg),
        };

        self.advance(cmd)
    }

    /// While the current step is complete, replace it with its successor.
    fn advance(&mut self, mut cmd: Command) -> Command {
        while let Some(step) = self.current.as_ref() {
            if !step.is_complete() {
                break;
            }

            match step.next() {
                Some(mut next) => {
                    info!(from = %step.kind(), to = %next.kind(), "Step complete");
                    next.set_size(self.width, self.height);
                    cmd = cmd.and(next.init());
                    self.current = Some(next);
                }
                None => {
                    info!(last = %step.kind(), "Onboarding flow complete");
                    self.current = None;
                }
            }
        }
        cmd
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        if let Some(step) = self.current.as_mut() {
            step.set_size(width, height);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }

    pub fn current_kind(&self) -> Option<StepKind> {
        self.current.as_ref().map(|s| s.kind())
    }

    pub fn view(&self) -> String {
        self.current.as_ref().map(|s| s.view()).unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.is_busy())
    }

    pub fn error(&self) -> Option<&Error> {
        self.current.as_ref().and_then(|s| s.error())
    }

    pub fn has_error(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.has_error())
    }

    pub fn help(&self) -> Vec<KeyBinding> {
        self.current.as_ref().map(|s| s.help()).unwrap_or_default()
    }
}
