//! Tero CLI: interactive onboarding for the Tero telemetry control plane.

pub mod api;
pub mod auth;
pub mod config;
pub mod datadog;
pub mod error;
mod fs;
pub mod onboarding;
pub mod preferences;
pub mod tui;
