//! Scripted companion used by the integration tests.
//!
//! The fake sits on the port side of the client: every request the client
//! writes is decoded as it arrives, recorded, and passed to a handler whose
//! replies are queued for the client to read. Raw bytes can also be injected
//! to simulate unsolicited traffic and line noise.

#![allow(dead_code)]

use std::collections::VecDeque;

use elink_frame::{
    FrameDecoder, FrameEvent, OutboundPacket, Packet, CALLBACK_RESPONSE, SYNC, VALUE_RESPONSE,
};
use elink_transport::{ByteSink, Result, SerialPort};

pub type Handler = Box<dyn FnMut(&Packet) -> Vec<OutboundPacket> + Send>;

pub struct FakeCompanion {
    rx: VecDeque<u8>,
    decoder: FrameDecoder,
    handler: Handler,
    /// Every valid request received, in order.
    pub requests: Vec<Packet>,
    /// Every raw byte the client wrote.
    pub written: Vec<u8>,
    /// Upper bound on bytes handed out per read, to exercise partial reads.
    pub read_limit: usize,
}

impl FakeCompanion {
    /// A companion that never answers.
    pub fn silent() -> Self {
        Self::with_handler(|_| Vec::new())
    }

    /// A companion that answers each request through `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: FnMut(&Packet) -> Vec<OutboundPacket> + Send + 'static,
    {
        Self {
            rx: VecDeque::new(),
            decoder: FrameDecoder::with_capacity(1024, 0),
            handler: Box::new(handler),
            requests: Vec::new(),
            written: Vec::new(),
            read_limit: 7,
        }
    }

    /// A companion that echoes SYNC nonces and otherwise stays silent.
    pub fn syncing() -> Self {
        Self::with_handler(|request| {
            if request.command() == SYNC {
                vec![value(request.correlation())]
            } else {
                Vec::new()
            }
        })
    }

    /// Queue raw bytes for the client.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Queue a packet for the client.
    pub fn inject_packet(&mut self, packet: &OutboundPacket) {
        let wire = packet.to_wire().expect("test packet encodes");
        self.inject(&wire);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl ByteSink for FakeCompanion {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        let mut frames = Vec::new();
        self.decoder.push_slice(bytes, |event| {
            if let FrameEvent::Frame(frame) = event {
                frames.push(frame);
            }
        });
        for frame in frames {
            let packet = Packet::validate(frame).expect("client sent a valid frame");
            for reply in (self.handler)(&packet) {
                self.inject_packet(&reply);
            }
            self.requests.push(packet);
        }
        Ok(())
    }
}

impl SerialPort for FakeCompanion {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.read_limit).min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// A bare value response.
pub fn value(value: u32) -> OutboundPacket {
    OutboundPacket::new(VALUE_RESPONSE, value)
}

/// A callback response addressed to `token`.
pub fn callback(token: u32, args: &[&'static [u8]]) -> OutboundPacket {
    args.iter().fold(
        OutboundPacket::new(CALLBACK_RESPONSE, token),
        |packet, arg| packet.with_argument(*arg),
    )
}
