use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    code::{generate_room_code, ROOM_CODE_LEN},
    device::Device,
    message::{Entry, Message, ReplyTarget},
    session::{JoinError, Session},
    store::{ChildEvent, ChildEvents, SharedStore},
    sweeper::{ExpiryPolicy, Sweeper, SweeperHandle},
};

use super::{
    events::{Command, ViewEvent},
    msg::{msg_to_html, reply_preview_html},
};

/// Messages currently shown, in the order they were rendered.
#[derive(Debug, Default)]
pub struct Transcript(Vec<Entry>);

impl Transcript {
    /// Returns false when the key is already shown.
    pub fn append(&mut self, entry: Entry) -> bool {
        if self.get(&entry.key).is_some() {
            return false;
        }
        self.0.push(entry);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let pos = self.0.iter().position(|e| e.key == key)?;
        Some(self.0.remove(pos))
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.0.iter().find(|e| e.key == key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn entries(&self) -> &[Entry] {
        &self.0
    }
}

struct JoinedRoom {
    session: Session,
    children: Option<ChildEvents>,
    transcript: Transcript,
    _sweeper: SweeperHandle,
}

/// One connected page: its session, transcript and room subscription.
///
/// Owned by a single task. Commands and child events are handled one at a
/// time, so nothing here is shared.
pub struct ChatClient {
    store: SharedStore,
    expiry: ExpiryPolicy,
    device: Device,
    view: mpsc::UnboundedSender<ViewEvent>,
    room: Option<JoinedRoom>,
}

impl ChatClient {
    pub fn new(
        store: SharedStore,
        expiry: ExpiryPolicy,
        device: Device,
        view: mpsc::UnboundedSender<ViewEvent>,
    ) -> Self {
        Self { store, expiry, device, view, room: None }
    }

    pub fn session(&self) -> Option<&Session> {
        self.room.as_ref().map(|r| &r.session)
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.room.as_ref().map(|r| &r.transcript)
    }

    pub async fn handle(&mut self, command: Command) {
        match command {
            Command::GenerateCode => self.emit(ViewEvent::CodeGenerated {
                code: generate_room_code(ROOM_CODE_LEN),
            }),
            Command::Join { name, room } => self.join(&name, &room).await,
            Command::Send { text } => self.send(&text).await,
            Command::Reply { key } => {
                if self.device.arms_on_click() {
                    self.arm_reply(&key);
                } else {
                    debug!("Ignoring reply click from a touch device");
                }
            }
            Command::Swipe { key, start_x, end_x } => {
                if self.device.arms_on_swipe(start_x, end_x) {
                    self.arm_reply(&key);
                }
            }
            Command::CancelReply => self.cancel_reply(),
            Command::Delete { key, confirmed } => {
                if confirmed {
                    self.delete(&key).await;
                }
            }
            Command::Clear { confirmed } => self.clear_room(confirmed).await,
        }
    }

    /// Waits for the next child event of the joined room. Pending forever
    /// before a join or after the subscription ends.
    pub async fn next_child_event(&mut self) -> ChildEvent {
        let Some(children) = self.room.as_mut().and_then(|r| r.children.as_mut()) else {
            return std::future::pending().await;
        };

        match children.next().await {
            Some(event) => event,
            None => {
                warn!("Room subscription ended");
                if let Some(room) = self.room.as_mut() {
                    room.children = None;
                }
                std::future::pending().await
            }
        }
    }

    pub fn on_child_event(&mut self, event: ChildEvent) {
        let Some(room) = self.room.as_mut() else {
            return;
        };

        match event {
            ChildEvent::Added(entry) => {
                let html = msg_to_html(&entry, &room.session);
                let key = entry.key.clone();
                if room.transcript.append(entry) {
                    self.emit(ViewEvent::Append { key, html });
                }
            }
            ChildEvent::Removed(key) => {
                if room.transcript.remove(&key).is_some() {
                    self.emit(ViewEvent::Remove { key });
                }
            }
        }
    }

    async fn join(&mut self, name: &str, room: &str) {
        if let Some(joined) = &self.room {
            let err = JoinError::AlreadyJoined(joined.session.room().to_owned());
            return self.alert(err.to_string());
        }

        let session = match Session::join(name, room, self.device) {
            Ok(session) => session,
            Err(e) => return self.alert(e.to_string()),
        };

        let children = match self.store.child_events(session.room()).await {
            Ok(children) => children,
            Err(e) => {
                error!("Subscribe error for {}: {}", session.room(), e);
                return self.alert("Could not open the chat right now.".to_owned());
            }
        };

        let sweeper = Sweeper::new(self.store.clone(), session.room(), self.expiry.ttl)
            .spawn(self.expiry.interval);

        info!("{} joined {}", session.author(), session.room());
        self.emit(ViewEvent::Joined { room: session.room().to_owned() });
        self.room = Some(JoinedRoom {
            session,
            children: Some(children),
            transcript: Transcript::default(),
            _sweeper: sweeper,
        });
    }

    async fn send(&mut self, text: &str) {
        let Some(room) = self.room.as_mut() else {
            debug!("Ignoring send before join");
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let reply = room.session.reply_mut().take();
        let message = Message::compose(room.session.author(), text, reply.as_ref(), Local::now());

        if let Err(e) = self.store.push(room.session.room(), &message).await {
            error!("Push error: {}", e);
        }

        self.emit(ViewEvent::InputCleared);
        self.emit(ViewEvent::ReplyCleared);
    }

    fn arm_reply(&mut self, key: &str) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(entry) = room.transcript.get(key) else {
            debug!("Reply to unknown message {}", key);
            return;
        };

        let target = ReplyTarget::of(&entry.message);
        let html = reply_preview_html(&target);
        room.session.reply_mut().arm(target);
        self.emit(ViewEvent::ReplyPreview { html });
    }

    fn cancel_reply(&mut self) {
        if let Some(room) = self.room.as_mut() {
            room.session.reply_mut().clear();
        }
        self.emit(ViewEvent::ReplyCleared);
    }

    async fn delete(&mut self, key: &str) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        let Some(entry) = room.transcript.get(key) else {
            debug!("Delete of unknown message {}", key);
            return;
        };
        if !room.session.is_own(&entry.message) {
            warn!("{} tried to delete a message by {}", room.session.author(), entry.message.name);
            return;
        }

        match self.store.remove(room.session.room(), key).await {
            Ok(()) => {
                // the removal may already have arrived as a child event
                if room.transcript.remove(key).is_some() {
                    self.emit(ViewEvent::Remove { key: key.to_owned() });
                }
            }
            Err(e) => error!("Delete error: {}", e),
        }
    }

    async fn clear_room(&mut self, confirmed: bool) {
        let Some(room) = self.room.as_mut() else {
            return self.alert("No chat joined.".to_owned());
        };
        if !confirmed {
            return;
        }

        let code = room.session.room().to_owned();
        match self.store.remove_room(&code).await {
            Ok(()) => {
                room.transcript.clear();
                self.emit(ViewEvent::TranscriptCleared);
                self.alert(format!("All messages deleted in chat: {code}"));
            }
            Err(e) => error!("Error deleting messages: {}", e),
        }
    }

    fn alert(&self, text: String) {
        self.emit(ViewEvent::Alert { text });
    }

    fn emit(&self, event: ViewEvent) {
        // the page is gone once the receiver drops; the socket loop ends soon after
        let _ = self.view.send(event);
    }
}
