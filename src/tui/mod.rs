//! Terminal front end for the onboarding wizard.

pub mod layout;
pub mod terminal;

pub use layout::{HeaderLayout, Layout, Screen};
pub use terminal::run;
