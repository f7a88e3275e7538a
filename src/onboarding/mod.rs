//! Onboarding wizard.
//!
//! A [`Flow`] holds the current [`Step`]. Key presses and completed commands
//! are routed to it as [`Msg`] values; each step returns a [`Command`] of
//! asynchronous work whose results come back as new messages. When a step
//! reports complete, the flow replaces it with its successor, skipping any
//! successor that is already complete.

pub mod command;
pub mod event;
pub mod flow;
pub mod host;
pub mod selection;
pub mod services;
pub mod step;
pub mod steps;

#[cfg(test)]
pub(crate) mod testing;

pub use command::Command;
pub use event::{Completion, Key, Msg, StepId};
pub use flow::Flow;
pub use host::{Onboarding, Outcome};
pub use services::{Launcher, Services, SystemLauncher};
pub use step::{KeyBinding, Step, StepKind};
