//! Storage for the remote data API key.
//!
//! The key never lands in `config.toml`; the config only names the keychain
//! entry (`credential_key`) to read it from.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rally_core::error::RallyError;

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store a secret under the given key.
    fn store(&self, key: &str, secret: &str) -> Result<(), RallyError>;

    /// Retrieve a secret by key.
    fn get(&self, key: &str) -> Result<Option<String>, RallyError>;

    /// Delete a stored secret. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), RallyError>;
}

fn credential_error(e: keyring::Error) -> RallyError {
    RallyError::CredentialError {
        message: e.to_string(),
    }
}

/// OS keychain-backed credential store using the `keyring` crate.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: "rally".to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, RallyError> {
        keyring::Entry::new(&self.service, key).map_err(credential_error)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, key: &str, secret: &str) -> Result<(), RallyError> {
        self.entry(key)?
            .set_password(secret)
            .map_err(credential_error)?;
        tracing::debug!(service = %self.service, key, "stored credential in keychain");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, RallyError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(credential_error(e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), RallyError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(credential_error(e)),
        }
    }
}

/// In-memory credential store for testing.
pub struct MemoryStore {
    store: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }
}

impl MemoryStore {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, key: &str, secret: &str) -> Result<(), RallyError> {
        self.entries().insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, RallyError> {
        Ok(self.entries().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), RallyError> {
        self.entries().remove(key);
        Ok(())
    }
}
