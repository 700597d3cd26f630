use xssnake_core::crash::Seat;
use xssnake_core::net::messages::ServerMessage;

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Room,
    Seat(Seat),
    AllExcept(Seat),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub audience: Audience,
    pub message: ServerMessage,
}

/// Outbound events produced while handling one stimulus. Immediate messages
/// go straight to the send queue; buffered ones wait for `flush`, which wraps
/// them in a single `Combined` message for the whole room.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<Outgoing>,
    batch: Vec<ServerMessage>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, audience: Audience, message: ServerMessage) {
        self.queued.push(Outgoing { audience, message });
    }

    pub fn buffer(&mut self, message: ServerMessage) {
        self.batch.push(message);
    }

    pub fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        self.queued.push(Outgoing {
            audience: Audience::Room,
            message: ServerMessage::Combined(batch),
        });
    }

    /// Takes everything ready to send, leaving buffered events in place.
    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.queued)
    }

    pub fn has_buffered(&self) -> bool {
        !self.batch.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.batch.is_empty()
    }
}
