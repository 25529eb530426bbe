use thiserror::Error;

use crate::{device::Device, message::Message, reply::ReplyContext};

/// Characters that cannot appear in a store path segment.
const FORBIDDEN_IN_ROOM: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Why a join was refused. `Display` is the text shown to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("Please enter your name!")]
    MissingName,
    #[error("Please enter or create a chat ID to join.")]
    MissingRoom,
    #[error("Chat ID can't contain / . # $ [ or ]")]
    InvalidRoom,
    #[error("Already in chat {0}.")]
    AlreadyJoined(String),
}

/// State of a joined connection.
///
/// Ownership of a message is decided by comparing display names, so two
/// connections that pick the same name see each other's messages as their own.
#[derive(Debug)]
pub struct Session {
    author: String,
    room: String,
    device: Device,
    reply: ReplyContext,
}

impl Session {
    pub fn join(name: &str, room: &str, device: Device) -> Result<Self, JoinError> {
        let author = name.trim();
        let room = room.trim();

        if author.is_empty() {
            return Err(JoinError::MissingName);
        }
        if room.is_empty() {
            return Err(JoinError::MissingRoom);
        }
        if room.contains(FORBIDDEN_IN_ROOM) {
            return Err(JoinError::InvalidRoom);
        }

        Ok(Self {
            author: author.to_owned(),
            room: room.to_owned(),
            device,
            reply: ReplyContext::default(),
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn reply(&self) -> &ReplyContext {
        &self.reply
    }

    pub fn reply_mut(&mut self) -> &mut ReplyContext {
        &mut self.reply
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.name == self.author
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_trims() {
        let session = Session::join("  Alice ", " AB12CD ", Device::Pointer).unwrap();
        assert_eq!(session.author(), "Alice");
        assert_eq!(session.room(), "AB12CD");
        assert!(!session.reply().is_armed());
    }

    #[test]
    fn test_join_validation() {
        assert_eq!(Session::join("", "AB12CD", Device::Pointer).unwrap_err(), JoinError::MissingName);
        assert_eq!(Session::join("   ", "AB12CD", Device::Pointer).unwrap_err(), JoinError::MissingName);
        assert_eq!(Session::join("Alice", " ", Device::Pointer).unwrap_err(), JoinError::MissingRoom);
        assert_eq!(Session::join("Alice", "a/b", Device::Pointer).unwrap_err(), JoinError::InvalidRoom);
        assert_eq!(
            JoinError::MissingName.to_string(),
            "Please enter your name!"
        );
    }

    #[test]
    fn test_ownership_is_by_name() {
        let session = Session::join("Alice", "R", Device::Pointer).unwrap();
        let mut msg = Message {
            name: "Alice".into(),
            text: "hi".into(),
            time: String::new(),
            timestamp: 1,
            reply_to: None,
            reply_user: None,
        };
        assert!(session.is_own(&msg));
        msg.name = "Bob".into();
        assert!(!session.is_own(&msg));
    }
}
