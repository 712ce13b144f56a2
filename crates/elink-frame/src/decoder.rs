use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::escape::{END, ESCAPE, ESCAPE_MASK, START};
use crate::packet::MIN_FRAME_SIZE;

/// Default receive buffer size, in unescaped bytes.
pub const DEFAULT_RX_CAPACITY: usize = 128;

/// Default size of the out-of-band text buffer.
pub const DEFAULT_TEXT_CAPACITY: usize = 80;

/// Where the decoder is in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Outside a frame; bytes are treated as diagnostic text.
    WaitingForFrame,
    /// Between START and END.
    InFrame,
}

/// Something the decoder noticed while consuming bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, unescaped frame. Not yet checksum-validated.
    Frame(Bytes),
    /// A frame shorter than header plus checksum; discarded.
    Runt(usize),
    /// A frame larger than the receive buffer; discarded.
    Overflow(usize),
    /// A line of text the companion printed outside any frame.
    Text(Bytes),
}

/// Incremental frame reassembly over an escaped byte stream.
///
/// Bytes are fed one at a time. A completed frame is split off the internal
/// buffer before it is returned, so the decoder is ready for the next frame
/// even while the caller still holds the previous one.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    capacity: usize,
    text: BytesMut,
    text_capacity: usize,
    state: DecoderState,
    escaped: bool,
    // Unescaped bytes seen in the current frame, including dropped ones.
    received: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with the default buffer sizes.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RX_CAPACITY, DEFAULT_TEXT_CAPACITY)
    }

    /// Create a decoder with explicit frame and text buffer sizes.
    ///
    /// A `text_capacity` of zero discards out-of-band bytes entirely.
    pub fn with_capacity(capacity: usize, text_capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            text: BytesMut::with_capacity(text_capacity),
            text_capacity,
            state: DecoderState::WaitingForFrame,
            escaped: false,
            received: 0,
        }
    }

    /// Current framing state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Maximum unescaped frame size kept in memory.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Abandon any partial frame or text.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.text.clear();
        self.state = DecoderState::WaitingForFrame;
        self.escaped = false;
        self.received = 0;
    }

    /// Consume one byte from the wire.
    pub fn push(&mut self, byte: u8) -> Option<FrameEvent> {
        match self.state {
            DecoderState::WaitingForFrame => self.push_outside(byte),
            DecoderState::InFrame => self.push_inside(byte),
        }
    }

    /// Consume a run of bytes, handing every event to `on_event`.
    pub fn push_slice(&mut self, bytes: &[u8], mut on_event: impl FnMut(FrameEvent)) {
        for &b in bytes {
            if let Some(event) = self.push(b) {
                on_event(event);
            }
        }
    }

    fn push_outside(&mut self, byte: u8) -> Option<FrameEvent> {
        match byte {
            START => {
                let text = self.take_text();
                self.begin_frame();
                text
            }
            b'\n' => self.take_text(),
            END | ESCAPE | b'\r' => None,
            _ => {
                if self.text_capacity == 0 {
                    return None;
                }
                self.text.put_u8(byte);
                if self.text.len() >= self.text_capacity {
                    return self.take_text();
                }
                None
            }
        }
    }

    fn push_inside(&mut self, byte: u8) -> Option<FrameEvent> {
        match byte {
            START => {
                trace!(dropped = self.received, "frame restarted before END");
                self.begin_frame();
                None
            }
            END => Some(self.finish_frame()),
            ESCAPE if !self.escaped => {
                self.escaped = true;
                None
            }
            _ => {
                let value = if self.escaped {
                    self.escaped = false;
                    byte ^ ESCAPE_MASK
                } else {
                    byte
                };
                self.received += 1;
                if self.buf.len() < self.capacity {
                    self.buf.put_u8(value);
                }
                None
            }
        }
    }

    fn begin_frame(&mut self) {
        self.buf.clear();
        // Reclaims the previous frame's allocation once its `Bytes` is gone.
        self.buf.reserve(self.capacity);
        self.state = DecoderState::InFrame;
        self.escaped = false;
        self.received = 0;
    }

    fn finish_frame(&mut self) -> FrameEvent {
        let received = self.received;
        self.state = DecoderState::WaitingForFrame;
        self.escaped = false;
        self.received = 0;

        if received > self.buf.len() {
            self.buf.clear();
            return FrameEvent::Overflow(received);
        }
        if received < MIN_FRAME_SIZE {
            self.buf.clear();
            return FrameEvent::Runt(received);
        }
        FrameEvent::Frame(self.buf.split().freeze())
    }

    fn take_text(&mut self) -> Option<FrameEvent> {
        if self.text.is_empty() {
            return None;
        }
        let line = self.text.split().freeze();
        self.text.reserve(self.text_capacity);
        Some(FrameEvent::Text(line))
    }
}
