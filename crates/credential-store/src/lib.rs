//! Secure credential storage for the registrations watcher.
//!
//! Two named slots (`api_key`, `access_token`) backed by the platform
//! keyring, with an in-memory backend for tests and hosts without a
//! secure store.

mod error;
mod store;

pub use error::StoreError;
pub use secrecy::{ExposeSecret, SecretString};
pub use store::{CredentialStore, KeyringStore, MemoryStore, Slot};
