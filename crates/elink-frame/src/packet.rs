use bytes::{Bytes, BytesMut};

use crate::builder::RequestBuilder;
use crate::checksum::checksum;
use crate::error::{FrameError, Result};
use crate::response::Response;

/// Packet header: command (2) + argc (2) + correlation (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Trailing checksum size.
pub const CHECKSUM_SIZE: usize = 2;

/// Length prefix of every argument block.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Smallest frame that can hold a packet.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Zero bytes that follow an argument payload of `len` bytes.
///
/// Only the payload is counted; the length prefix is not.
pub const fn padding_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Total wire size (unescaped) of an argument block with `len` payload bytes.
pub const fn block_size(len: usize) -> usize {
    LENGTH_PREFIX_SIZE + len + padding_for(len)
}

/// Fixed packet header.
///
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────┐
/// │ Command (2B) │ Argc (2B)    │ Correlation (4B)     │
/// │ LE           │ LE           │ LE                   │
/// └──────────────┴──────────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Opcode.
    pub command: u16,
    /// Number of argument blocks that follow.
    pub argc: u16,
    /// Callback token or correlation on requests; echo or value on responses.
    pub correlation: u32,
}

impl PacketHeader {
    /// Create a header.
    pub const fn new(command: u16, argc: u16, correlation: u32) -> Self {
        Self {
            command,
            argc,
            correlation,
        }
    }

    /// Serialize to wire order.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..2].copy_from_slice(&self.command.to_le_bytes());
        out[2..4].copy_from_slice(&self.argc.to_le_bytes());
        out[4..8].copy_from_slice(&self.correlation.to_le_bytes());
        out
    }

    /// Parse from the front of a frame.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header: &[u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self {
            command: u16::from_le_bytes([header[0], header[1]]),
            argc: u16::from_le_bytes([header[2], header[3]]),
            correlation: u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
        })
    }
}

/// A received frame that passed checksum and structure validation.
///
/// Cloning is cheap; the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    frame: Bytes,
}

impl Packet {
    /// Validate an unescaped frame and wrap it.
    ///
    /// Checks, in order: minimum length, the trailing checksum over everything
    /// before it, and that exactly `argc` argument blocks fill the space
    /// between header and checksum.
    pub fn validate(frame: Bytes) -> Result<Self> {
        if frame.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                len: frame.len(),
                min: MIN_FRAME_SIZE,
            });
        }

        let body_len = frame.len() - CHECKSUM_SIZE;
        let received = u16::from_le_bytes([frame[body_len], frame[body_len + 1]]);
        let computed = checksum(&frame[..body_len]);
        if computed != received {
            return Err(FrameError::ChecksumMismatch { computed, received });
        }

        let header = PacketHeader::parse(&frame).ok_or(FrameError::Malformed("missing header"))?;
        let mut offset = HEADER_SIZE;
        for _ in 0..header.argc {
            if offset + LENGTH_PREFIX_SIZE > body_len {
                return Err(FrameError::Malformed("argument length runs past packet"));
            }
            let len = u16::from_le_bytes([frame[offset], frame[offset + 1]]) as usize;
            offset += block_size(len);
            if offset > body_len {
                return Err(FrameError::Malformed("argument runs past packet"));
            }
        }
        if offset != body_len {
            return Err(FrameError::Malformed("trailing bytes after last argument"));
        }

        Ok(Self { header, frame })
    }

    /// The packet header.
    pub fn header(&self) -> PacketHeader {
        self.header
    }

    /// Opcode.
    pub fn command(&self) -> u16 {
        self.header.command
    }

    /// Declared argument count.
    pub fn argc(&self) -> u16 {
        self.header.argc
    }

    /// Correlation or value field.
    pub fn correlation(&self) -> u32 {
        self.header.correlation
    }

    /// Argument blocks, without header or checksum.
    pub fn arguments(&self) -> &[u8] {
        &self.frame[HEADER_SIZE..self.frame.len() - CHECKSUM_SIZE]
    }

    /// The whole unescaped frame, including the trailing checksum.
    pub fn as_bytes(&self) -> &Bytes {
        &self.frame
    }

    /// Start consuming arguments.
    pub fn response(&self) -> Response<'_> {
        Response::new(self)
    }
}

/// A complete packet held in memory, for simulators, tests and the async codec.
///
/// The live request path does not use this; it streams through
/// [`RequestBuilder`] straight to the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Opcode.
    pub command: u16,
    /// Correlation or value field.
    pub correlation: u32,
    /// Argument payloads, unpadded.
    pub arguments: Vec<Bytes>,
}

impl OutboundPacket {
    /// A packet with no arguments.
    pub fn new(command: u16, correlation: u32) -> Self {
        Self {
            command,
            correlation,
            arguments: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn with_argument(mut self, argument: impl Into<Bytes>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Escape and frame the packet onto the end of `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        let argc = u16::try_from(self.arguments.len())
            .map_err(|_| FrameError::Malformed("too many arguments"))?;
        let mut request = RequestBuilder::begin(dst, self.command, self.correlation, argc)?;
        for argument in &self.arguments {
            request.arg(argument)?;
        }
        request.finish()
    }

    /// Escape and frame the packet into a fresh buffer.
    pub fn to_wire(&self) -> Result<BytesMut> {
        let mut dst = BytesMut::new();
        self.encode_into(&mut dst)?;
        Ok(dst)
    }
}
