//! User preferences: typed accessors over a [`PreferenceStore`].
//!
//! Every setter persists immediately and reports the save error, so callers
//! can treat a successful return as durable.

pub mod store;

use std::sync::Arc;

use tracing::debug;

pub use store::{MemoryStore, PreferenceStore, YamlStore};

use crate::error::PreferencesError;

const ROLE: &str = "role";
const DEFAULT_ORG_ID: &str = "default_org_id";
const DEFAULT_ACCOUNT_ID: &str = "default_account_id";
const DEFAULT_WORKSPACE_ID: &str = "default_workspace_id";
const EMAIL: &str = "email";
const HAS_SEEN_GREETING: &str = "has_seen_greeting";
const SERVICES: &str = "services";

/// Preferences service shared by the onboarding steps.
#[derive(Clone)]
pub struct PreferencesService {
    store: Arc<dyn PreferenceStore>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Service over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError> {
        debug!(key, "Saving preference");
        self.store.set(key, value);
        self.store.save()
    }

    fn clear(&self, key: &str) -> Result<(), PreferencesError> {
        self.store.unset(key);
        self.store.save()
    }

    pub fn role(&self) -> Option<String> {
        self.store.get(ROLE)
    }

    pub fn set_role(&self, role: &str) -> Result<(), PreferencesError> {
        self.set(ROLE, role)
    }

    pub fn clear_role(&self) -> Result<(), PreferencesError> {
        self.clear(ROLE)
    }

    pub fn default_org_id(&self) -> Option<String> {
        self.store.get(DEFAULT_ORG_ID)
    }

    pub fn set_default_org_id(&self, id: &str) -> Result<(), PreferencesError> {
        self.set(DEFAULT_ORG_ID, id)
    }

    pub fn clear_default_org_id(&self) -> Result<(), PreferencesError> {
        self.clear(DEFAULT_ORG_ID)
    }

    pub fn default_account_id(&self) -> Option<String> {
        self.store.get(DEFAULT_ACCOUNT_ID)
    }

    pub fn set_default_account_id(&self, id: &str) -> Result<(), PreferencesError> {
        self.set(DEFAULT_ACCOUNT_ID, id)
    }

    pub fn default_workspace_id(&self) -> Option<String> {
        self.store.get(DEFAULT_WORKSPACE_ID)
    }

    pub fn set_default_workspace_id(&self, id: &str) -> Result<(), PreferencesError> {
        self.set(DEFAULT_WORKSPACE_ID, id)
    }

    pub fn email(&self) -> Option<String> {
        self.store.get(EMAIL)
    }

    pub fn set_email(&self, email: &str) -> Result<(), PreferencesError> {
        self.set(EMAIL, email)
    }

    pub fn clear_email(&self) -> Result<(), PreferencesError> {
        self.clear(EMAIL)
    }

    pub fn has_seen_greeting(&self) -> bool {
        self.store.get_bool(HAS_SEEN_GREETING)
    }

    pub fn set_has_seen_greeting(&self, seen: bool) -> Result<(), PreferencesError> {
        self.store.set_bool(HAS_SEEN_GREETING, seen);
        self.store.save()
    }

    pub fn services(&self) -> Vec<String> {
        self.store.get_list(SERVICES)
    }

    pub fn set_services(&self, services: &[String]) -> Result<(), PreferencesError> {
        self.store.set_list(SERVICES, services);
        self.store.save()
    }

    pub fn clear_services(&self) -> Result<(), PreferencesError> {
        self.clear(SERVICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let prefs = PreferencesService::in_memory();
        assert!(prefs.role().is_none());

        prefs.set_role("platform").unwrap();
        prefs.set_default_org_id("org_1").unwrap();
        prefs.set_default_account_id("acct_1").unwrap();
        prefs.set_default_workspace_id("ws_1").unwrap();
        prefs.set_email("dev@example.com").unwrap();
        prefs.set_has_seen_greeting(true).unwrap();
        prefs.set_services(&["checkout".to_string()]).unwrap();

        assert_eq!(prefs.role().as_deref(), Some("platform"));
        assert_eq!(prefs.default_org_id().as_deref(), Some("org_1"));
        assert_eq!(prefs.default_account_id().as_deref(), Some("acct_1"));
        assert_eq!(prefs.default_workspace_id().as_deref(), Some("ws_1"));
        assert_eq!(prefs.email().as_deref(), Some("dev@example.com"));
        assert!(prefs.has_seen_greeting());
        assert_eq!(prefs.services(), vec!["checkout"]);

        prefs.clear_role().unwrap();
        prefs.clear_default_org_id().unwrap();
        prefs.clear_email().unwrap();
        prefs.clear_services().unwrap();
        assert!(prefs.role().is_none());
        assert!(prefs.default_org_id().is_none());
        assert!(prefs.email().is_none());
        assert!(prefs.services().is_empty());
    }

    #[test]
    fn yaml_backed_service_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let prefs = PreferencesService::new(Arc::new(YamlStore::load(&path).unwrap()));
        prefs.set_default_org_id("org_9").unwrap();

        let reloaded = PreferencesService::new(Arc::new(YamlStore::load(&path).unwrap()));
        assert_eq!(reloaded.default_org_id().as_deref(), Some("org_9"));
    }
}
