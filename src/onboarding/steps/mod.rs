//! The wizard's stages, in flow order.

mod account;
mod api_key;
mod app_key;
mod auth_check;
mod authenticate;
mod complete;
mod datadog;
mod discovery;
mod input;
mod organization;
mod role;

pub use account::{AccountCreateStep, AccountSelectStep};
pub use api_key::ApiKeyStep;
pub use app_key::AppKeyStep;
pub use auth_check::AuthCheckStep;
pub use authenticate::AuthenticateStep;
pub use complete::CompleteStep;
pub use datadog::{DOCS_URL, DatadogCheckStep, DatadogRegionStep};
pub use discovery::{LogDiscoveryStep, POLL_INTERVAL, ServiceDiscoveryStep, format_volume};
pub use input::TextInput;
pub use organization::{OrganizationCreateStep, OrganizationSelectStep};
pub use role::{ROLES, Role, RoleStep};
