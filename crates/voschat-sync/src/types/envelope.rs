use crate::types::{Message, PresenceEvent};

/// A decoded realtime frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Message(Message),
    Presence(PresenceEvent),
}

impl From<Message> for Envelope {
    fn from(msg: Message) -> Self {
        Envelope::Message(msg)
    }
}

impl From<PresenceEvent> for Envelope {
    fn from(event: PresenceEvent) -> Self {
        Envelope::Presence(event)
    }
}
