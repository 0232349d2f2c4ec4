use coinhunt_net::{Message, Recipient};

/// Messages produced while applying events, sent at the end of the tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    messages: Vec<(Recipient, Message)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, recipient: Recipient, message: Message) {
        self.messages.push((recipient, message));
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[(Recipient, Message)] {
        &self.messages
    }

    /// Keep only the queued messages for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&(Recipient, Message)) -> bool) {
        self.messages.retain(keep);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (Recipient, Message)> + '_ {
        self.messages.drain(..)
    }
}
