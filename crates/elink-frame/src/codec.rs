//! `tokio_util` codec for async transports.
//!
//! Decoding yields only packets that pass validation; runts, overflows,
//! corrupt frames and out-of-band text are logged and skipped, the same
//! drop-and-continue policy the synchronous engine applies.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::decoder::{FrameDecoder, FrameEvent, DEFAULT_RX_CAPACITY, DEFAULT_TEXT_CAPACITY};
use crate::error::FrameError;
use crate::packet::{OutboundPacket, Packet};

/// Packet codec for `FramedRead`/`FramedWrite`.
#[derive(Debug, Default)]
pub struct PacketCodec {
    decoder: FrameDecoder,
}

impl PacketCodec {
    /// Codec with the default receive capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RX_CAPACITY)
    }

    /// Codec accepting frames up to `capacity` unescaped bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            decoder: FrameDecoder::with_capacity(capacity, DEFAULT_TEXT_CAPACITY),
        }
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        while src.has_remaining() {
            let event = match self.decoder.push(src.get_u8()) {
                Some(event) => event,
                None => continue,
            };
            match event {
                FrameEvent::Frame(frame) => match Packet::validate(frame) {
                    Ok(packet) => return Ok(Some(packet)),
                    Err(err) => debug!(error = %err, "dropping invalid frame"),
                },
                FrameEvent::Runt(len) => debug!(len, "dropping runt frame"),
                FrameEvent::Overflow(len) => debug!(len, "dropping oversized frame"),
                FrameEvent::Text(line) => {
                    debug!(text = %String::from_utf8_lossy(&line), "companion text");
                }
            }
        }
        Ok(None)
    }
}

impl Encoder<OutboundPacket> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: OutboundPacket, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode_into(dst)
    }
}
