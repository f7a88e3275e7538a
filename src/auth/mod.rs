//! Authentication: OAuth device-authorization grant and credential storage.

pub mod cancel;
pub mod provider;
pub mod service;
pub mod storage;
pub mod workos;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use provider::{AuthenticationResponse, DeviceAuthResponse, OAuthProvider, User};
pub use service::{AuthResult, AuthService, Authenticator, DeviceAuth, PollState, PollStep};
pub use storage::{FileStorage, MemoryStorage, SecureStorage};
pub use workos::WorkOsClient;

use secrecy::{ExposeSecret, SecretString};

/// Copy a secret into a new owned secret.
pub fn duplicate_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
