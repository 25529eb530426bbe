use crate::{
    device::Device,
    include_res,
    message::{Entry, ReplyTarget},
    res::{escape_html, fill},
    session::Session,
};

const REPLY_BUTTON: &str = r#"<button class="reply-btn" type="button">💬</button>"#;
const DELETE_BUTTON: &str = r#"<button class="delete-btn" type="button">⛔</button>"#;

/// Renders a transcript entry for `session`. Every stored field is escaped.
pub(crate) fn msg_to_html(entry: &Entry, session: &Session) -> String {
    let message = &entry.message;
    let own = session.is_own(message);

    let reply_block = match message.reply_target() {
        Some(target) => reply_html(include_res!(str, "/pages/rooms/reply_block.html"), &target),
        None => String::new(),
    };

    let (reply_button, swipe) = match session.device() {
        Device::Pointer => (REPLY_BUTTON, ""),
        Device::Touch => ("", r#" data-swipe="reply""#),
    };

    let key = escape_html(&entry.key);
    let text = escape_html(&message.text);
    let name = escape_html(&message.name);
    let time = escape_html(&message.time);

    fill(
        include_res!(str, "/pages/rooms/message.html"),
        &[
            ("class", if own { "user" } else { "other" }),
            ("key", key.as_str()),
            ("swipe", swipe),
            ("reply_block", reply_block.as_str()),
            ("text", text.as_str()),
            ("name", name.as_str()),
            ("time", time.as_str()),
            ("reply_button", reply_button),
            ("delete_button", if own { DELETE_BUTTON } else { "" }),
        ],
    )
}

pub(crate) fn reply_preview_html(target: &ReplyTarget) -> String {
    reply_html(include_res!(str, "/pages/rooms/reply_preview.html"), target)
}

fn reply_html(template: &str, target: &ReplyTarget) -> String {
    let name = escape_html(&target.name);
    let text = escape_html(&target.text);
    fill(template, &[("name", name.as_str()), ("text", text.as_str())])
}

#[cfg(test)]
mod tests {
    use crate::message::Message;

    use super::*;

    fn entry(name: &str, text: &str) -> Entry {
        Entry {
            key: "k1".into(),
            message: Message {
                name: name.into(),
                text: text.into(),
                time: "1:00:00 PM".into(),
                timestamp: 1,
                reply_to: None,
                reply_user: None,
            },
        }
    }

    fn session(name: &str, device: Device) -> Session {
        Session::join(name, "AB12CD", device).unwrap()
    }

    #[test]
    fn test_own_message_has_delete_control() {
        let html = msg_to_html(&entry("Alice", "hi"), &session("Alice", Device::Pointer));
        assert!(html.contains(r#"class="message user""#));
        assert!(html.contains("delete-btn"));
        assert!(html.contains("reply-btn"));
        assert!(!html.contains("reply-block"));
    }

    #[test]
    fn test_other_message_on_touch_device() {
        let html = msg_to_html(&entry("Alice", "hi"), &session("Bob", Device::Touch));
        assert!(html.contains(r#"class="message other""#));
        assert!(!html.contains("delete-btn"));
        assert!(!html.contains("reply-btn"));
        assert!(html.contains(r#"data-swipe="reply""#));
    }

    #[test]
    fn test_markup_is_escaped() {
        let mut e = entry("<b>Mallory</b>", "<img src=x onerror=alert(1)>");
        e.message.reply_to = Some("<script>x</script>".into());
        e.message.reply_user = Some("\"q\"".into());
        let html = msg_to_html(&e, &session("Bob", Device::Pointer));

        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;b&gt;Mallory&lt;/b&gt;"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(html.contains("&quot;q&quot;"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn test_reply_block_precedes_body() {
        let mut e = entry("Bob", "hello");
        e.message.reply_to = Some("hi".into());
        e.message.reply_user = Some("Alice".into());
        let html = msg_to_html(&e, &session("Bob", Device::Pointer));

        let block = html.find("reply-block").unwrap();
        let body = html.find("msg-text").unwrap();
        assert!(block < body);
        assert!(html.contains(r#"<strong class="reply-name">Alice</strong>"#));
        assert!(html.contains(r#"<p class="reply-text">hi</p>"#));
    }

    #[test]
    fn test_empty_reply_renders_no_block() {
        let mut e = entry("Bob", "hello");
        e.message.reply_to = Some(String::new());
        e.message.reply_user = Some("Alice".into());
        let html = msg_to_html(&e, &session("Bob", Device::Pointer));
        assert!(!html.contains("reply-block"));
    }

    #[test]
    fn test_placeholder_text_is_not_expanded() {
        let html = msg_to_html(&entry("Alice", "{name}"), &session("Bob", Device::Pointer));
        assert!(html.contains(r#"<p class="msg-text">{name}</p>"#));
    }

    #[test]
    fn test_reply_preview() {
        let html = reply_preview_html(&ReplyTarget { name: "Alice".into(), text: "<hi>".into() });
        assert!(html.contains("<strong>Alice:</strong> &lt;hi&gt;"));
        assert!(html.contains("cancel-reply"));
    }
}
