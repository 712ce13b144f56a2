use elink_frame::{Packet, Response};

/// A value response captured for a blocking caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Command id of the response.
    pub command: u16,
    /// The header's correlation/value field.
    pub value: u32,
    /// Number of arguments carried.
    pub argc: u16,
    /// The full packet, for callers that want the arguments.
    pub packet: Packet,
}

impl Reply {
    /// Capture a validated packet.
    pub fn from_packet(packet: Packet) -> Self {
        Self {
            command: packet.command(),
            value: packet.correlation(),
            argc: packet.argc(),
            packet,
        }
    }

    /// True when the reply carries only the header value.
    ///
    /// The engine attaches no meaning to this; some commands use a bare
    /// reply as a completion marker, others return data in arguments.
    pub fn is_bare(&self) -> bool {
        self.argc == 0
    }

    /// Read the reply's arguments.
    pub fn response(&self) -> Response<'_> {
        self.packet.response()
    }
}

/// Wait state saved by [`PendingCall::arm`], restored by
/// [`PendingCall::settle`].
#[derive(Debug)]
pub(crate) struct SavedWait {
    armed: bool,
    reply: Option<Reply>,
}

/// The single synchronous wait slot.
///
/// Nested waits (a callback blocking inside an outer wait) save the outer
/// state and restore it on exit; the innermost wait receives the next value.
#[derive(Debug, Default)]
pub(crate) struct PendingCall {
    armed: bool,
    reply: Option<Reply>,
}

impl PendingCall {
    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    pub(crate) fn arm(&mut self) -> SavedWait {
        let saved = SavedWait {
            armed: self.armed,
            reply: self.reply.take(),
        };
        self.armed = true;
        saved
    }

    /// Hand a value response to the wait. Returns false if nothing is
    /// waiting or the wait already has its reply.
    pub(crate) fn offer(&mut self, packet: Packet) -> bool {
        if !self.armed || self.reply.is_some() {
            return false;
        }
        self.reply = Some(Reply::from_packet(packet));
        true
    }

    pub(crate) fn take(&mut self) -> Option<Reply> {
        self.reply.take()
    }

    pub(crate) fn settle(&mut self, saved: SavedWait) {
        self.armed = saved.armed;
        self.reply = saved.reply;
    }
}
