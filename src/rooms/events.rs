use serde::{Deserialize, Serialize};

/// Commands the page sends over the socket.
///
/// Confirmation dialogs run in the page; `confirmed` carries the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Command {
    GenerateCode,
    Join { name: String, room: String },
    Send { text: String },
    Reply { key: String },
    Swipe { key: String, start_x: f64, end_x: f64 },
    CancelReply,
    Delete { key: String, confirmed: bool },
    Clear { confirmed: bool },
}

/// Updates the page applies to its view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Blocking alert with a message for the user
    Alert { text: String },
    CodeGenerated { code: String },
    /// Switch to in-room mode with an empty transcript
    Joined { room: String },
    Append { key: String, html: String },
    Remove { key: String },
    ReplyPreview { html: String },
    ReplyCleared,
    InputCleared,
    TranscriptCleared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let cmd: Command =
            serde_json::from_str(r#"{"type":"join","data":{"name":"Alice","room":"AB12CD"}}"#).unwrap();
        assert_eq!(cmd, Command::Join { name: "Alice".into(), room: "AB12CD".into() });

        let cmd: Command = serde_json::from_str(r#"{"type":"cancel_reply"}"#).unwrap();
        assert_eq!(cmd, Command::CancelReply);

        let cmd: Command =
            serde_json::from_str(r#"{"type":"swipe","data":{"key":"k","start_x":3,"end_x":120.5}}"#).unwrap();
        assert_eq!(cmd, Command::Swipe { key: "k".into(), start_x: 3.0, end_x: 120.5 });
    }

    #[test]
    fn test_view_event_wire_format() {
        let json = serde_json::to_string(&ViewEvent::Remove { key: "k".into() }).unwrap();
        assert_eq!(json, r#"{"type":"remove","data":{"key":"k"}}"#);

        let json = serde_json::to_string(&ViewEvent::InputCleared).unwrap();
        assert_eq!(json, r#"{"type":"input_cleared"}"#);
    }
}
