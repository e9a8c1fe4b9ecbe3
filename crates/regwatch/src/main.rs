//! Admin live-registrations watcher - main entry point.

mod config;
mod error;

use crate::config::Config;
use crate::error::AppResult;
use anyhow::Context;
use credential_store::{CredentialStore, SecretString, Slot};
use registrations_client::{RegistrationsClient, RegistrationWatcher};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_logging(&config.app.log_level);

    info!("Starting registrations watcher...");

    let store = CredentialStore::keyring(&config.credentials.service);

    // Seed the API key from the environment when provided
    if let Some(key) = &config.credentials.api_key {
        store
            .set(Slot::ApiKey, SecretString::new(key.clone()))
            .await?;
        info!("API key saved to the secure store");
    }

    if store.get(Slot::ApiKey).await?.is_some() {
        info!("API key on file");
    } else {
        warn!("No API key on file - set CREDENTIALS__API_KEY to save one");
    }

    let client = RegistrationsClient::new(&config.api.base_url, store, config.api.timeout)?;
    let watcher = RegistrationWatcher::new(client, config.poll.interval);

    // Log every state change on behalf of the absent presentation layer
    let mut updates = watcher.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if let Some(error) = &state.last_error {
                warn!("Fetch failed: {}", error);
            } else if !state.loading {
                info!("{} registrations on file", state.registrations.len());
            }
        }
    });

    info!(
        "Polling {} every {:?}",
        config.api.base_url, config.poll.interval
    );
    watcher.start_polling();

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    watcher.stop_polling();
    info!("Shutting down...");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
