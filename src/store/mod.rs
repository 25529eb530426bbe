//! The realtime store port and its adapters.
//!
//! Messages live under `messages/<room>/<key>`. Every adapter keeps append
//! order per room, delivers notifications in that order, and treats deleting
//! an absent key as success.

mod firebase;
mod memory;
mod notify;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{config::Backend, message::{Entry, Message}};

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type SharedStore = Arc<dyn RealtimeStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A change to the set of children under a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    Added(Entry),
    Removed(String),
}

/// Child events for one room, in store order. Ends only when the store goes away.
pub struct ChildEvents(mpsc::UnboundedReceiver<ChildEvent>);

impl ChildEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<ChildEvent>) -> Self {
        Self(rx)
    }

    pub async fn next(&mut self) -> Option<ChildEvent> {
        self.0.recv().await
    }
}

/// Fires once per change anywhere under a room.
pub struct Changes(mpsc::UnboundedReceiver<()>);

impl Changes {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<()>) -> Self {
        Self(rx)
    }

    pub async fn next(&mut self) -> Option<()> {
        self.0.recv().await
    }

    /// Drops notifications that are already queued.
    pub fn drain(&mut self) {
        while self.0.try_recv().is_ok() {}
    }
}

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Appends a message and returns its generated key.
    async fn push(&self, room: &str, message: &Message) -> Result<String, StoreError>;

    /// Subscribes to children added to or removed from `room` from now on.
    async fn child_events(&self, room: &str) -> Result<ChildEvents, StoreError>;

    /// Subscribes to any change under `room`.
    async fn changes(&self, room: &str) -> Result<Changes, StoreError>;

    /// Reads every message currently in `room`, oldest first.
    async fn get(&self, room: &str) -> Result<Vec<Entry>, StoreError>;

    async fn remove(&self, room: &str, key: &str) -> Result<(), StoreError>;

    async fn remove_room(&self, room: &str) -> Result<(), StoreError>;
}

pub async fn open(backend: &Backend) -> Result<SharedStore, StoreError> {
    Ok(match backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Sqlite(url) => Arc::new(SqliteStore::connect(url).await?),
        Backend::Firebase { url, auth } => Arc::new(FirebaseStore::new(url, auth.clone())),
    })
}
