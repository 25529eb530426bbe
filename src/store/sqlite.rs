use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::message::{Entry, Message};

use super::{notify::Notifier, ChildEvents, Changes, RealtimeStore, StoreError};

type MessageRow = (String, String, String, String, i64, Option<String>, Option<String>);

/// SQLite-backed store. Notifications are local to this process.
pub struct SqliteStore {
    db_pool: SqlitePool,
    notifier: Notifier,
    // serializes write + notify so subscribers see commit order
    write: Mutex<()>,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every connection to :memory: is its own database
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(16)
        };

        Self::from_pool(pool.connect_with(options).await?).await
    }

    pub async fn from_pool(db_pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                room TEXT NOT NULL,
                name TEXT NOT NULL,
                text TEXT NOT NULL,
                time TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                reply_to TEXT,
                reply_user TEXT
            )",
        )
        .execute(&db_pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS messages_room ON messages (room, seq)")
            .execute(&db_pool)
            .await?;

        Ok(Self {
            db_pool,
            notifier: Notifier::default(),
            write: Mutex::new(()),
        })
    }
}

fn row_to_entry((key, name, text, time, timestamp, reply_to, reply_user): MessageRow) -> Entry {
    Entry {
        key,
        message: Message { name, text, time, timestamp, reply_to, reply_user },
    }
}

#[async_trait]
impl RealtimeStore for SqliteStore {
    async fn push(&self, room: &str, message: &Message) -> Result<String, StoreError> {
        let key = Uuid::now_v7().simple().to_string();

        let _guard = self.write.lock().await;
        sqlx::query("INSERT INTO messages (key,room,name,text,time,timestamp,reply_to,reply_user) VALUES (?,?,?,?,?,?,?,?)")
            .bind(&key)
            .bind(room)
            .bind(&message.name)
            .bind(&message.text)
            .bind(&message.time)
            .bind(message.timestamp)
            .bind(&message.reply_to)
            .bind(&message.reply_user)
            .execute(&self.db_pool)
            .await?;

        let entry = Entry { key, message: message.clone() };
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
        let rows: Vec<MessageRow> =
            sqlx::query_as("SELECT key,name,text,time,timestamp,reply_to,reply_user FROM messages WHERE room=? ORDER BY seq")
                .bind(room)
                .fetch_all(&self.db_pool)
                .await?;

        Ok(rows.into_iter().map(row_to_entry).collect())
    }

    async fn remove(&self, room: &str, key: &str) -> Result<(), StoreError> {
        let _guard = self.write.lock().await;
        let result = sqlx::query("DELETE FROM messages WHERE room=? AND key=?")
            .bind(room)
            .bind(key)
            .execute(&self.db_pool)
            .await?;

        if result.rows_affected() > 0 {
            self.notifier.removed(room, [key]);
        }
        Ok(())
    }

    async fn remove_room(&self, room: &str) -> Result<(), StoreError> {
        let _guard = self.write.lock().await;
        let keys: Vec<(String,)> = sqlx::query_as("SELECT key FROM messages WHERE room=? ORDER BY seq")
            .bind(room)
            .fetch_all(&self.db_pool)
            .await?;
        sqlx::query("DELETE FROM messages WHERE room=?")
            .bind(room)
            .execute(&self.db_pool)
            .await?;

        if !keys.is_empty() {
            self.notifier.removed(room, keys.iter().map(|(k,)| k.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::ChildEvent;

    use super::*;

    fn msg(text: &str, reply: Option<(&str, &str)>) -> Message {
        Message {
            name: "Bob".into(),
            text: text.into(),
            time: "1:00:00 PM".into(),
            timestamp: 1_700_000_000_000,
            reply_to: reply.map(|(_, t)| t.to_owned()),
            reply_user: reply.map(|(n, _)| n.to_owned()),
        }
    }

    #[tokio::test]
    async fn test_roundtrip_through_sqlite() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let mut events = store.child_events("AB12CD").await.unwrap();

        let plain = store.push("AB12CD", &msg("hi", None)).await.unwrap();
        let reply = store.push("AB12CD", &msg("hello", Some(("Alice", "hi")))).await.unwrap();
        store.push("ZZZZZZ", &msg("elsewhere", None)).await.unwrap();

        let entries = store.get("AB12CD").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, plain);
        assert_eq!(entries[1].key, reply);
        assert_eq!(entries[1].message, msg("hello", Some(("Alice", "hi"))));

        assert!(matches!(events.next().await, Some(ChildEvent::Added(e)) if e.key == plain));
        assert!(matches!(events.next().await, Some(ChildEvent::Added(e)) if e.key == reply));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let a = store.push("R", &msg("a", None)).await.unwrap();
        store.push("R", &msg("b", None)).await.unwrap();
        let mut events = store.child_events("R").await.unwrap();

        store.remove("R", &a).await.unwrap();
        store.remove("R", &a).await.unwrap();
        assert_eq!(store.get("R").await.unwrap().len(), 1);
        assert_eq!(events.next().await, Some(ChildEvent::Removed(a)));

        store.remove_room("R").await.unwrap();
        assert!(store.get("R").await.unwrap().is_empty());
        assert!(matches!(events.next().await, Some(ChildEvent::Removed(_))));
    }
}
