use crate::message::ReplyTarget;

/// Single-slot reply state. Arming replaces whatever was there.
#[derive(Debug, Default)]
pub struct ReplyContext(Option<ReplyTarget>);

impl ReplyContext {
    pub fn arm(&mut self, target: ReplyTarget) {
        self.0 = Some(target);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn take(&mut self) -> Option<ReplyTarget> {
        self.0.take()
    }

    pub fn get(&self) -> Option<&ReplyTarget> {
        self.0.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }
}
