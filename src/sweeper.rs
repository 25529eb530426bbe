use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::store::{SharedStore, StoreError};

pub const MESSAGE_TTL: Duration = Duration::from_secs(30);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// How long messages live and how often the backstop sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub ttl: Duration,
    pub interval: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            ttl: MESSAGE_TTL,
            interval: SWEEP_INTERVAL,
        }
    }
}

/// Current time in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Deletes expired messages from one room.
///
/// The reactive and polling triggers are not coordinated and may both try to
/// delete the same message. Deletes are idempotent in every store.
pub struct Sweeper {
    store: SharedStore,
    room: String,
    ttl: Duration,
    clock: Clock,
}

impl Sweeper {
    pub fn new(store: SharedStore, room: &str, ttl: Duration) -> Self {
        Self {
            store,
            room: room.to_owned(),
            ttl,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reads the room once and deletes every expired message.
    /// Returns how many deletes succeeded; a failed delete does not stop the rest.
    pub async fn sweep(&self) -> Result<usize, StoreError> {
        let entries = self.store.get(&self.room).await?;
        let now = (self.clock)();

        let deletes = entries
            .iter()
            .filter(|entry| entry.message.is_expired(now, self.ttl))
            .map(|entry| async move {
                match self.store.remove(&self.room, &entry.key).await {
                    Ok(()) => {
                        info!("Deleted old message {} in {}", entry.key, self.room);
                        true
                    }
                    Err(e) => {
                        warn!("Auto-delete of {} in {} failed: {}", entry.key, self.room, e);
                        false
                    }
                }
            });

        Ok(join_all(deletes).await.into_iter().filter(|ok| *ok).count())
    }

    /// Starts the reactive and polling triggers. They stop when the handle drops.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let sweeper = Arc::new(self);

        let reactive = tokio::spawn(run_reactive(sweeper.clone()));
        let polling = tokio::spawn(run_polling(sweeper, interval));

        SweeperHandle { reactive, polling }
    }

    async fn sweep_logged(&self) {
        if let Err(e) = self.sweep().await {
            warn!("Expiry sweep of {} failed: {}", self.room, e);
        }
    }
}

async fn run_reactive(sweeper: Arc<Sweeper>) {
    let mut changes = match sweeper.store.changes(&sweeper.room).await {
        Ok(changes) => changes,
        Err(e) => {
            warn!("Could not watch {} for changes: {}", sweeper.room, e);
            return;
        }
    };

    sweeper.sweep_logged().await;
    while changes.next().await.is_some() {
        // one sweep covers every change queued so far
        changes.drain();
        sweeper.sweep_logged().await;
    }
}

async fn run_polling(sweeper: Arc<Sweeper>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);
    interval.tick().await;

    loop {
        interval.tick().await;
        sweeper.sweep_logged().await;
    }
}

pub struct SweeperHandle {
    reactive: JoinHandle<()>,
    polling: JoinHandle<()>,
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.reactive.abort();
        self.polling.abort();
    }
}
