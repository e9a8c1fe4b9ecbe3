//! Credential storage backends.

use crate::error::StoreError;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Named slots in the secure store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Long-lived administrator API key.
    ApiKey,
    /// Short-lived bearer token obtained by exchanging the API key.
    AccessToken,
}

impl Slot {
    /// Name under which the slot is persisted.
    pub fn name(&self) -> &'static str {
        match self {
            Slot::ApiKey => "api_key",
            Slot::AccessToken => "access_token",
        }
    }
}

/// Platform secure store backend.
///
/// Keyring calls are blocking, so every operation runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store scoped to the given keyring service name.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Read a slot. A missing entry is `None`, not an error.
    pub async fn get(&self, slot: Slot) -> Result<Option<SecretString>, StoreError> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, slot.name())
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            match entry.get_password() {
                Ok(value) => Ok(Some(SecretString::new(value))),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(StoreError::Backend(e.to_string())),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Write a slot, replacing any existing value.
    pub async fn set(&self, slot: Slot, value: SecretString) -> Result<(), StoreError> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, slot.name())
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            entry
                .set_password(value.expose_secret())
                .map_err(|e| StoreError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Remove a slot. Removing an absent slot succeeds.
    pub async fn delete(&self, slot: Slot) -> Result<(), StoreError> {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, slot.name())
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(StoreError::Backend(e.to_string())),
            }
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// In-memory backend for tests or hosts without a keyring.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<&'static str, SecretString>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, slot: Slot) -> Result<Option<SecretString>, StoreError> {
        let slots = self.slots.read().await;
        Ok(slots.get(slot.name()).cloned())
    }

    pub async fn set(&self, slot: Slot, value: SecretString) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.insert(slot.name(), value);
        Ok(())
    }

    pub async fn delete(&self, slot: Slot) -> Result<(), StoreError> {
        let mut slots = self.slots.write().await;
        slots.remove(slot.name());
        Ok(())
    }
}

/// Storage backend selection.
#[derive(Debug, Clone)]
pub enum CredentialStore {
    /// Platform secure store.
    Keyring(KeyringStore),
    /// In-memory only (no persistence).
    Memory(MemoryStore),
}

impl CredentialStore {
    /// Platform keyring store under the given service name.
    pub fn keyring(service: impl Into<String>) -> Self {
        CredentialStore::Keyring(KeyringStore::new(service))
    }

    /// In-memory store.
    pub fn memory() -> Self {
        CredentialStore::Memory(MemoryStore::new())
    }

    /// Read a slot.
    #[instrument(skip(self))]
    pub async fn get(&self, slot: Slot) -> Result<Option<SecretString>, StoreError> {
        let value = match self {
            CredentialStore::Keyring(s) => s.get(slot).await?,
            CredentialStore::Memory(s) => s.get(slot).await?,
        };
        debug!("Slot {} is {}", slot.name(), if value.is_some() { "set" } else { "empty" });
        Ok(value)
    }

    /// Write a slot, replacing any existing value.
    #[instrument(skip(self, value))]
    pub async fn set(&self, slot: Slot, value: SecretString) -> Result<(), StoreError> {
        match self {
            CredentialStore::Keyring(s) => s.set(slot, value).await,
            CredentialStore::Memory(s) => s.set(slot, value).await,
        }
    }

    /// Remove a slot. Idempotent.
    #[instrument(skip(self))]
    pub async fn delete(&self, slot: Slot) -> Result<(), StoreError> {
        match self {
            CredentialStore::Keyring(s) => s.delete(slot).await,
            CredentialStore::Memory(s) => s.delete(slot).await,
        }
    }
}
