//! Secure key-value storage for credentials.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};

use crate::error::StorageError;
use crate::fs::{read_optional, write_private};

/// Key under which the access token is stored.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key under which the refresh token is stored.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Generic secret store. Absence of a key is `Ok(None)`, not an error.
pub trait SecureStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StorageError>;
    fn set(&self, key: &str, value: &SecretString) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON credentials file, written with mode 0600.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match read_optional(&self.path)? {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            _ => Ok(BTreeMap::new()),
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_private(&self.path, &bytes)?;
        Ok(())
    }
}

impl SecureStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key).map(SecretString::from))
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.expose_secret().to_string());
        self.store(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

/// In-process store, used by tests and as a fallback.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<SecretString>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned().map(SecretString::from))
    }

    fn set(&self, key: &str, value: &SecretString) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.expose_secret().to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_roundtrip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("credentials.json"));

        assert!(storage.get(ACCESS_TOKEN_KEY).unwrap().is_none());

        storage
            .set(ACCESS_TOKEN_KEY, &SecretString::from("at_123".to_string()))
            .unwrap();
        storage
            .set(REFRESH_TOKEN_KEY, &SecretString::from("rt_456".to_string()))
            .unwrap();

        let reopened = FileStorage::new(dir.path().join("credentials.json"));
        let token = reopened.get(ACCESS_TOKEN_KEY).unwrap().unwrap();
        assert_eq!(token.expose_secret(), "at_123");

        reopened.delete(ACCESS_TOKEN_KEY).unwrap();
        assert!(reopened.get(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(reopened.get(REFRESH_TOKEN_KEY).unwrap().is_some());
    }

    #[test]
    fn deleting_absent_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("credentials.json"));
        storage.delete("nope").unwrap();
        assert!(!dir.path().join("credentials.json").exists());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();
        let storage = FileStorage::new(path);
        assert!(matches!(
            storage.get(ACCESS_TOKEN_KEY),
            Err(StorageError::Serialization(_))
        ));
    }
}
