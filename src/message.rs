use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A chat message as stored under `messages/<room>/<key>`.
///
/// Field names match the record layout of the realtime database so records
/// written by other clients decode unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub name: String,
    pub text: String,
    pub time: String,
    /// Creation time in epoch milliseconds. Zero for records written without one.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_user: Option<String>,
}

/// The quoted part of a message, embedded by value into a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub name: String,
    pub text: String,
}

impl ReplyTarget {
    pub fn of(message: &Message) -> Self {
        Self {
            name: message.name.clone(),
            text: message.text.clone(),
        }
    }
}

/// A message together with the key the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub message: Message,
}

impl Message {
    pub fn compose(
        author: &str,
        text: &str,
        reply: Option<&ReplyTarget>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            name: author.to_owned(),
            text: text.to_owned(),
            time: now.format("%-I:%M:%S %p").to_string(),
            timestamp: now.timestamp_millis(),
            reply_to: reply.map(|r| r.text.clone()),
            reply_user: reply.map(|r| r.name.clone()),
        }
    }

    pub fn reply_target(&self) -> Option<ReplyTarget> {
        Some(ReplyTarget {
            name: self.reply_user.clone().unwrap_or_default(),
            text: self.reply_to.clone().filter(|text| !text.is_empty())?,
        })
    }

    /// Whether the message is strictly older than `ttl` at `now_ms`.
    pub fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.timestamp > 0 && now_ms.saturating_sub(self.timestamp) > ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(timestamp: i64) -> Message {
        Message {
            name: "Alice".into(),
            text: "hi".into(),
            time: "1:00:00 PM".into(),
            timestamp,
            reply_to: None,
            reply_user: None,
        }
    }

    #[test]
    fn test_compose_embeds_reply_by_value() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        let target = ReplyTarget { name: "Alice".into(), text: "hi".into() };
        let msg = Message::compose("Bob", "hello", Some(&target), now);

        assert_eq!(msg.name, "Bob");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.time, "1:04:05 PM");
        assert_eq!(msg.timestamp, now.timestamp_millis());
        assert_eq!(msg.reply_to.as_deref(), Some("hi"));
        assert_eq!(msg.reply_user.as_deref(), Some("Alice"));
        assert_eq!(msg.reply_target(), Some(target));
    }

    #[test]
    fn test_empty_reply_is_no_reply() {
        let mut msg = at(42);
        msg.reply_to = Some(String::new());
        msg.reply_user = Some("Alice".into());
        assert_eq!(msg.reply_target(), None);
    }

    #[test]
    fn test_wire_layout() {
        let mut msg = at(42);
        msg.reply_to = Some("hi".into());
        msg.reply_user = Some("Alice".into());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["replyTo"], "hi");
        assert_eq!(json["replyUser"], "Alice");
        assert_eq!(json["timestamp"], 42);

        let plain = serde_json::to_value(at(42)).unwrap();
        assert!(plain.get("replyTo").is_none());
    }

    #[test]
    fn test_decode_legacy_record_without_timestamp() {
        let msg: Message =
            serde_json::from_str(r#"{"name":"A","text":"t","time":"x"}"#).unwrap();
        assert_eq!(msg.timestamp, 0);
        assert!(!msg.is_expired(i64::MAX, Duration::from_secs(1)));
    }

    #[test]
    fn test_expiry_is_strict() {
        let ttl = Duration::from_secs(30);
        let msg = at(1_000);
        assert!(!msg.is_expired(1_000 + 30_000, ttl));
        assert!(msg.is_expired(1_000 + 30_001, ttl));
        assert!(!msg.is_expired(500, ttl));
    }
}
