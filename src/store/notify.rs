use std::{collections::HashMap, sync::{Mutex, PoisonError}};

use tokio::sync::mpsc;

use crate::message::Entry;

use super::{ChildEvent, ChildEvents, Changes};

#[derive(Default)]
struct Listeners {
    children: Vec<mpsc::UnboundedSender<ChildEvent>>,
    changes: Vec<mpsc::UnboundedSender<()>>,
}

impl Listeners {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.changes.is_empty()
    }
}

/// Per-room fan-out for the in-process adapters.
///
/// Callers notify while holding their write lock so subscribers see events
/// in commit order. Closed subscribers are pruned on the next send.
#[derive(Default)]
pub(crate) struct Notifier {
    rooms: Mutex<HashMap<String, Listeners>>,
}

impl Notifier {
    pub(crate) fn child_events(&self, room: &str) -> ChildEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with_room(room, |l| l.children.push(tx));
        ChildEvents::new(rx)
    }

    pub(crate) fn changes(&self, room: &str) -> Changes {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with_room(room, |l| l.changes.push(tx));
        Changes::new(rx)
    }

    pub(crate) fn added(&self, room: &str, entry: &Entry) {
        self.child(room, ChildEvent::Added(entry.clone()));
    }

    pub(crate) fn removed<'a>(&self, room: &str, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.child(room, ChildEvent::Removed(key.to_owned()));
        }
        self.changed(room);
    }

    /// Number of live child-event subscribers for `room`.
    pub(crate) fn subscriber_count(&self, room: &str) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .get(room)
            .map(|l| l.children.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn child(&self, room: &str, event: ChildEvent) {
        let is_add = matches!(event, ChildEvent::Added(_));
        self.with_room(room, |l| l.children.retain(|tx| tx.send(event.clone()).is_ok()));
        if is_add {
            self.changed(room);
        }
    }

    fn changed(&self, room: &str) {
        self.with_room(room, |l| l.changes.retain(|tx| tx.send(()).is_ok()));
    }

    fn with_room(&self, room: &str, f: impl FnOnce(&mut Listeners)) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let listeners = rooms.entry(room.to_owned()).or_default();
        f(listeners);
        if listeners.is_empty() {
            rooms.remove(room);
        }
    }
}
