//! Poll controller with observable state.

use crate::client::RegistrationsClient;
use crate::error::RegistrationsError;
use crate::types::Registration;
use chrono::{DateTime, Utc};
use credential_store::{SecretString, Slot, StoreError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

/// Observable state published to subscribers.
#[derive(Debug, Clone, Default)]
pub struct WatcherState {
    /// Latest registration list, replaced wholesale on each successful fetch.
    pub registrations: Vec<Registration>,
    /// A fetch is currently in flight.
    pub loading: bool,
    /// The repeating poll timer is armed.
    pub polling: bool,
    /// Last fetch failure, cleared by the next success.
    pub last_error: Option<String>,
    /// When the list was last refreshed.
    pub last_updated: Option<DateTime<Utc>>,
}

/// The active poll task and its shutdown signal.
struct PollTask {
    handle: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

struct WatcherInner {
    client: RegistrationsClient,
    state: watch::Sender<WatcherState>,
    fetch_gate: AsyncMutex<()>,
}

impl WatcherInner {
    /// Run a single fetch, updating the published state.
    ///
    /// The gate keeps a tick and an on-demand fetch from overlapping;
    /// the loser is skipped, not queued.
    async fn run_fetch(&self) -> Result<(), RegistrationsError> {
        let _guard = match self.fetch_gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Fetch already in flight, skipping");
                return Ok(());
            }
        };

        self.state.send_modify(|s| s.loading = true);

        match self.client.fetch_registrations().await {
            Ok(registrations) => {
                debug!("List refreshed: {} registrations", registrations.len());
                self.state.send_modify(|s| {
                    s.registrations = registrations;
                    s.loading = false;
                    s.last_error = None;
                    s.last_updated = Some(Utc::now());
                });
                Ok(())
            }
            Err(e) => {
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.last_error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }
}

/// Polls the registrations endpoint on a fixed interval and publishes
/// results through a watch channel.
///
/// Holds at most one poll task at a time; arming while armed and
/// cancelling while idle are both no-ops.
pub struct RegistrationWatcher {
    inner: Arc<WatcherInner>,
    interval: Duration,
    timer: Mutex<Option<PollTask>>,
}

impl RegistrationWatcher {
    /// Create a watcher polling at the given interval.
    pub fn new(client: RegistrationsClient, interval: Duration) -> Self {
        let (state, _) = watch::channel(WatcherState::default());

        Self {
            inner: Arc::new(WatcherInner {
                client,
                state,
                fetch_gate: AsyncMutex::new(()),
            }),
            interval,
            timer: Mutex::new(None),
        }
    }

    /// Subscribe to state updates.
    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.inner.state.subscribe()
    }

    /// State updates as an async stream.
    pub fn updates(&self) -> WatchStream<WatcherState> {
        WatchStream::new(self.subscribe())
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WatcherState {
        self.inner.state.borrow().clone()
    }

    /// Whether the poll timer is armed.
    pub fn is_polling(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Arm the repeating poll timer.
    ///
    /// Fetches immediately, then on every interval tick. Tick failures
    /// are logged and never stop the loop. A no-op when polling is
    /// already active.
    pub fn start_polling(&self) {
        let mut timer = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if timer.is_some() {
            debug!("Polling already active");
            return;
        }

        self.inner.state.send_modify(|s| s.polling = true);

        let inner = self.inner.clone();
        let period = self.interval;
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = inner.run_fetch().await {
                            warn!("Poll tick failed: {}", e);
                        }
                    }
                    _ = &mut stopped => break,
                }
            }
        });

        *timer = Some(PollTask { handle, stop });
    }

    /// Cancel the repeating poll timer.
    ///
    /// A fetch already issued by the current tick is left to complete
    /// and may still update state. A no-op when idle.
    pub fn stop_polling(&self) {
        let task = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match task {
            Some(PollTask { stop, .. }) => {
                let _ = stop.send(());
                self.inner.state.send_modify(|s| s.polling = false);
            }
            None => debug!("Polling not active"),
        }
    }

    /// Fetch once, regardless of polling state.
    pub async fn fetch_now(&self) -> Result<(), RegistrationsError> {
        self.inner.run_fetch().await
    }

    /// Stored API key, if any.
    pub async fn stored_api_key(&self) -> Result<Option<SecretString>, StoreError> {
        self.inner.client.store().get(Slot::ApiKey).await
    }

    /// Persist the API key, replacing any existing one.
    pub async fn save_api_key(&self, key: impl Into<String>) -> Result<(), StoreError> {
        self.inner
            .client
            .store()
            .set(Slot::ApiKey, SecretString::new(key.into()))
            .await
    }

    /// Remove the stored API key.
    pub async fn clear_api_key(&self) -> Result<(), StoreError> {
        self.inner.client.store().delete(Slot::ApiKey).await
    }
}

impl Drop for RegistrationWatcher {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(task) = timer.take() {
                task.handle.abort();
            }
        }
    }
}
