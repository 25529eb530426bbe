use std::{collections::HashMap, sync::{Mutex, PoisonError}};

use async_trait::async_trait;
use uuid::Uuid;

use crate::message::{Entry, Message};

use super::{notify::Notifier, ChildEvents, Changes, RealtimeStore, StoreError};

/// In-process store. Rooms vanish when their last message is removed.
#[derive(Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, Vec<Entry>>>,
    notifier: Notifier,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live child-event subscriptions on `room`.
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.notifier.subscriber_count(room)
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn push(&self, room: &str, message: &Message) -> Result<String, StoreError> {
        let entry = Entry {
            key: Uuid::now_v7().simple().to_string(),
            message: message.clone(),
        };

        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.entry(room.to_owned()).or_default().push(entry.clone());
        self.notifier.added(room, &entry);

        Ok(entry.key)
    }

    async fn child_events(&self, room: &str) -> Result<ChildEvents, StoreError> {
        Ok(self.notifier.child_events(room))
    }

    async fn changes(&self, room: &str) -> Result<Changes, StoreError> {
        Ok(self.notifier.changes(room))
    }

    async fn get(&self, room: &str) -> Result<Vec<Entry>, StoreError> {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rooms.get(room).cloned().unwrap_or_default())
    }

    async fn remove(&self, room: &str, key: &str) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = rooms.get_mut(room) else {
            return Ok(());
        };

        let before = entries.len();
        entries.retain(|e| e.key != key);
        let removed = entries.len() != before;
        if entries.is_empty() {
            rooms.remove(room);
        }

        if removed {
            self.notifier.removed(room, [key]);
        }
        Ok(())
    }

    async fn remove_room(&self, room: &str) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = rooms.remove(room) {
            self.notifier.removed(room, entries.iter().map(|e| e.key.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::ChildEvent;

    use super::*;

    fn msg(text: &str) -> Message {
        Message {
            name: "Alice".into(),
            text: text.into(),
            time: String::new(),
            timestamp: 1,
            reply_to: None,
            reply_user: None,
        }
    }

    #[tokio::test]
    async fn test_push_get_keeps_order() {
        let store = MemoryStore::new();
        for text in ["a", "b", "c"] {
            store.push("R", &msg(text)).await.unwrap();
        }
        store.push("other", &msg("x")).await.unwrap();

        let texts: Vec<_> = store.get("R").await.unwrap().into_iter().map(|e| e.message.text).collect();
        assert_eq!(texts, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryStore::new();
        let key = store.push("R", &msg("a")).await.unwrap();
        let keep = store.push("R", &msg("b")).await.unwrap();

        store.remove("R", &key).await.unwrap();
        store.remove("R", &key).await.unwrap();
        store.remove("nowhere", &key).await.unwrap();

        let keys: Vec<_> = store.get("R").await.unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, [keep]);
    }

    #[tokio::test]
    async fn test_subscription_sees_only_later_children() {
        let store = MemoryStore::new();
        store.push("R", &msg("before")).await.unwrap();

        let mut events = store.child_events("R").await.unwrap();
        let key = store.push("R", &msg("after")).await.unwrap();
        store.remove_room("R").await.unwrap();

        match events.next().await {
            Some(ChildEvent::Added(entry)) => {
                assert_eq!(entry.key, key);
                assert_eq!(entry.message.text, "after");
            }
            other => panic!("unexpected {other:?}"),
        }
        let mut removed = vec![];
        for _ in 0..2 {
            match events.next().await {
                Some(ChildEvent::Removed(k)) => removed.push(k),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&key));
        assert!(store.get("R").await.unwrap().is_empty());
    }
}
