//! Collaborators shared by every step, built once at startup.

use std::io::Write;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::api::ControlPlaneFactory;
use crate::auth::Authenticator;
use crate::preferences::PreferencesService;

/// Opens URLs and copies text for the user.
pub trait Launcher: Send + Sync {
    fn open_url(&self, url: &str) -> std::io::Result<()>;
    fn copy(&self, text: &str) -> std::io::Result<()>;
}

/// Browser via the platform opener, clipboard via the OSC 52 terminal escape.
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }

    fn copy(&self, text: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout();
        out.write_all(osc52(text).as_bytes())?;
        out.flush()
    }
}

fn osc52(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

/// The wizard's collaborators. Cloning is cheap.
#[derive(Clone)]
pub struct Services {
    pub authenticator: Arc<dyn Authenticator>,
    pub preferences: PreferencesService,
    pub control_plane: Arc<dyn ControlPlaneFactory>,
    pub launcher: Arc<dyn Launcher>,
}

impl Services {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        preferences: PreferencesService,
        control_plane: Arc<dyn ControlPlaneFactory>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            authenticator,
            preferences,
            control_plane,
            launcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osc52_encodes_payload() {
        assert_eq!(osc52("hi"), "\x1b]52;c;aGk=\x07");
    }
}
