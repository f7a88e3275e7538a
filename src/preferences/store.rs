//! Key-value preference stores.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_yaml::Value;

use crate::error::PreferencesError;
use crate::fs::{read_optional, write_private};

/// Untyped preference storage. Setters only mutate memory; `save` persists.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn get_bool(&self, key: &str) -> bool;
    fn set_bool(&self, key: &str, value: bool);
    fn get_list(&self, key: &str) -> Vec<String>;
    fn set_list(&self, key: &str, values: &[String]);
    fn unset(&self, key: &str);
    fn save(&self) -> Result<(), PreferencesError>;
}

type Entries = BTreeMap<String, Value>;

fn get_string(entries: &Entries, key: &str) -> Option<String> {
    match entries.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn get_bool(entries: &Entries, key: &str) -> bool {
    matches!(entries.get(key), Some(Value::Bool(true)))
}

fn get_list(entries: &Entries, key: &str) -> Vec<String> {
    match entries.get(key) {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn list_value(values: &[String]) -> Value {
    Value::Sequence(values.iter().cloned().map(Value::String).collect())
}

/// YAML file store (`config.yaml`). A missing file loads as empty.
pub struct YamlStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl YamlStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let entries = match read_optional(&path)? {
            Some(bytes) if !bytes.is_empty() => serde_yaml::from_slice::<Option<Entries>>(&bytes)
                .map_err(|e| PreferencesError::Serialization(e.to_string()))?
                .unwrap_or_default(),
            _ => Entries::new(),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for YamlStore {
    fn get(&self, key: &str) -> Option<String> {
        get_string(&self.entries(), key)
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), Value::String(value.to_string()));
    }

    fn get_bool(&self, key: &str) -> bool {
        get_bool(&self.entries(), key)
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.entries().insert(key.to_string(), Value::Bool(value));
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        get_list(&self.entries(), key)
    }

    fn set_list(&self, key: &str, values: &[String]) {
        self.entries().insert(key.to_string(), list_value(values));
    }

    fn unset(&self, key: &str) {
        self.entries().remove(key);
    }

    fn save(&self) -> Result<(), PreferencesError> {
        let yaml = serde_yaml::to_string(&*self.entries())
            .map_err(|e| PreferencesError::Serialization(e.to_string()))?;
        write_private(&self.path, yaml.as_bytes())?;
        Ok(())
    }
}

/// In-memory store; `save` is a no-op.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        get_string(&self.entries(), key)
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), Value::String(value.to_string()));
    }

    fn get_bool(&self, key: &str) -> bool {
        get_bool(&self.entries(), key)
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.entries().insert(key.to_string(), Value::Bool(value));
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        get_list(&self.entries(), key)
    }

    fn set_list(&self, key: &str, values: &[String]) {
        self.entries().insert(key.to_string(), list_value(values));
    }

    fn unset(&self, key: &str) {
        self.entries().remove(key);
    }

    fn save(&self) -> Result<(), PreferencesError> {
        Ok(())
    }
}
