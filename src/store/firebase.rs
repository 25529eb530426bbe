use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{Entry, Message};

use super::{ChildEvent, ChildEvents, Changes, RealtimeStore, StoreError};

/// Firebase Realtime Database over its REST and event-stream API.
#[derive(Clone)]
pub struct FirebaseStore {
    http: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseStore {
    pub fn new(base_url: &str, auth: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, format!("{}/{path}.json", self.base_url));
        match &self.auth {
            Some(auth) => request.query(&[("auth", auth)]),
            None => request,
        }
    }

    async fn stream(&self, room: &str) -> Result<reqwest::Response, StoreError> {
        Ok(self.request(Method::GET, &room_path(room))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?)
    }
}

fn room_path(room: &str) -> String {
    format!("messages/{room}")
}

#[async_trait]
impl RealtimeStore for FirebaseStore {
    async fn push(&self, room: &str, message: &Message) -> Result<String, StoreError> {
        let PushResponse { name } = self.request(Method::POST, &room_path(room))
            .json(message)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(name)
    }

    async fn child_events(&self, room: &str) -> Result<ChildEvents, StoreError> {
        let response = self.stream(room).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(follow(self.clone(), room.to_owned(), response, Sink::Children(tx, ChildTracker::default())));
        Ok(ChildEvents::new(rx))
    }

    async fn changes(&self, room: &str) -> Result<Changes, StoreError> {
        let response = self.stream(room).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(follow(self.clone(), room.to_owned(), response, Sink::Changes(tx)));
        Ok(Changes::new(rx))
    }

    async fn get(&self, room: &str) -> Result<Vec<Entry>, StoreError> {
        let body: Value = self.request(Method::GET, &room_path(room))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Value::Object(children) = body else {
            return Ok(vec![]);
        };

        Ok(by_key(children)
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value(value) {
                Ok(message) => Some(Entry { key, message }),
                Err(e) => {
                    warn!("Skipping malformed message {}: {}", key, e);
                    None
                }
            })
            .collect())
    }

    async fn remove(&self, room: &str, key: &str) -> Result<(), StoreError> {
        self.request(Method::DELETE, &format!("{}/{key}", room_path(room)))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn remove_room(&self, room: &str) -> Result<(), StoreError> {
        self.request(Method::DELETE, &room_path(room))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Push keys sort chronologically.
fn by_key(children: serde_json::Map<String, Value>) -> Vec<(String, Value)> {
    let mut children: Vec<_> = children.into_iter().collect();
    children.sort_by(|a, b| a.0.cmp(&b.0));
    children
}

enum Sink {
    Children(mpsc::UnboundedSender<ChildEvent>, ChildTracker),
    Changes(mpsc::UnboundedSender<()>),
}

impl Sink {
    /// Returns false once the subscriber is gone.
    fn deliver(&mut self, kind: &str, update: Update) -> bool {
        match self {
            Sink::Children(tx, tracker) => tracker
                .apply(kind, update)
                .into_iter()
                .all(|event| tx.send(event).is_ok()),
            Sink::Changes(tx) => tx.send(()).is_ok(),
        }
    }

    async fn closed(&self) {
        match self {
            Sink::Children(tx, _) => tx.closed().await,
            Sink::Changes(tx) => tx.closed().await,
        }
    }
}

enum StreamEnd {
    /// The subscriber went away or the server cancelled the listener.
    Done,
    /// The connection dropped and should be reopened.
    Dropped,
}

/// Keeps one room subscription alive across dropped connections.
///
/// A reconnect starts with a fresh root `put`, which the child tracker diffs
/// against what it already announced.
async fn follow(store: FirebaseStore, room: String, mut response: reqwest::Response, mut sink: Sink) {
    let mut delay = RECONNECT_DELAY;

    loop {
        if let StreamEnd::Done = pump(response, &mut sink).await {
            return;
        }

        response = loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = sink.closed() => return,
            }
            match store.stream(&room).await {
                Ok(response) => break response,
                Err(e) => {
                    warn!("Reconnect to {} failed: {}", room, e);
                    delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                }
            }
        };

        info!("Event stream for {} reconnected", room);
        delay = RECONNECT_DELAY;
    }
}

async fn pump(response: reqwest::Response, sink: &mut Sink) -> StreamEnd {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::default();

    loop {
        let chunk = tokio::select! {
            chunk = body.next() => chunk,
            _ = sink.closed() => return StreamEnd::Done,
        };

        let chunk = match chunk {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                warn!("Event stream error: {}", e);
                return StreamEnd::Dropped;
            }
            None => {
                debug!("Event stream closed");
                return StreamEnd::Dropped;
            }
        };

        for event in parser.feed(&chunk) {
            match event.name.as_str() {
                "put" | "patch" => {}
                "keep-alive" => continue,
                "cancel" | "auth_revoked" => {
                    warn!("Event stream closed by server: {}", event.name);
                    return StreamEnd::Done;
                }
                other => {
                    debug!("Ignoring event {}", other);
                    continue;
                }
            }

            let update: Update = match serde_json::from_str(&event.data) {
                Ok(update) => update,
                Err(e) => {
                    warn!("Malformed {} event: {}", event.name, e);
                    continue;
                }
            };

            if !sink.deliver(&event.name, update) {
                return StreamEnd::Done;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SseEvent {
    name: String,
    data: String,
}

/// Incremental `text/event-stream` decoder.
#[derive(Default)]
struct SseParser {
    buf: Vec<u8>,
    name: String,
    data: String,
}

impl SseParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.name.is_empty() || !self.data.is_empty() {
                    events.push(SseEvent {
                        name: std::mem::take(&mut self.name),
                        data: std::mem::take(&mut self.data),
                    });
                }
            } else if let Some(name) = line.strip_prefix("event:") {
                self.name = name.trim_start().to_owned();
            } else if let Some(data) = line.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(data.trim_start());
            }
        }

        events
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    path: String,
    data: Value,
}

/// Turns path-level updates into child added/removed events.
///
/// The first update at the root is the state at subscription time; its
/// children are recorded but not announced.
#[derive(Default)]
struct ChildTracker {
    known: HashSet<String>,
    primed: bool,
}

impl ChildTracker {
    fn apply(&mut self, kind: &str, update: Update) -> Vec<ChildEvent> {
        let mut events = Vec::new();
        let path = update.path.trim_matches('/');

        if path.is_empty() {
            let announce = std::mem::replace(&mut self.primed, true);
            match update.data {
                Value::Object(children) => {
                    if kind == "put" {
                        let gone: Vec<String> = self.known
                            .iter()
                            .filter(|key| !children.contains_key(*key))
                            .cloned()
                            .collect();
                        for key in gone {
                            self.known.remove(&key);
                            events.push(ChildEvent::Removed(key));
                        }
                    }
                    for (key, value) in by_key(children) {
                        self.child(key, value, announce, &mut events);
                    }
                }
                Value::Null if kind == "put" => {
                    events.extend(self.known.drain().map(ChildEvent::Removed));
                }
                _ => {}
            }
        } else if !path.contains('/') {
            self.child(path.to_owned(), update.data, true, &mut events);
        }
        // deeper paths touch fields of a message, which are never rewritten

        events
    }

    fn child(&mut self, key: String, value: Value, announce: bool, events: &mut Vec<ChildEvent>) {
        if value.is_null() {
            if self.known.remove(&key) {
                events.push(ChildEvent::Removed(key));
            }
            return;
        }
        if !self.known.insert(key.clone()) || !announce {
            return;
        }
        match serde_json::from_value::<Message>(value) {
            Ok(message) => events.push(ChildEvent::Added(Entry { key, message })),
            Err(e) => warn!("Skipping malformed message {}: {}", key, e),
        }
    }
}
