//! Client for the admin registrations service.
//!
//! Exchanges a stored API key for a bearer token, fetches the
//! registration list, and drives a fixed-interval poll loop with
//! observable state.

mod client;
mod error;
mod types;
mod watcher;

pub use client::RegistrationsClient;
pub use error::RegistrationsError;
pub use types::*;
pub use watcher::{RegistrationWatcher, WatcherState};
