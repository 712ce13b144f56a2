//! Framing and packet layout for the elink serial protocol.
//!
//! On the wire every packet is:
//! - a START byte (0x7E)
//! - an 8-byte header: command, argument count, correlation value (all LE)
//! - zero or more argument blocks: 2-byte length, payload, zero padding to a
//!   multiple of four payload bytes
//! - a 2-byte checksum over everything above
//! - an END byte (0x7F)
//!
//! Control bytes inside the frame are escaped. Requests are streamed
//! straight to the port through [`builder`]; received frames are reassembled
//! by [`FrameDecoder`], checked by [`Packet::validate`] and read with
//! [`Response`].

pub mod builder;
pub mod checksum;
#[cfg(feature = "async")]
pub mod codec;
pub mod command;
pub mod decoder;
pub mod error;
pub mod escape;
pub mod packet;
pub mod response;

pub use builder::{
    append_argument, append_argument_staged, begin_request, finish_request, RequestBuilder,
};
pub use checksum::{checksum, Checksum};
#[cfg(feature = "async")]
pub use codec::PacketCodec;
pub use command::{
    command_name, is_reserved, APP_COMMAND_START, CALLBACK_RESPONSE, NULL, SYNC, VALUE_RESPONSE,
};
pub use decoder::{
    DecoderState, FrameDecoder, FrameEvent, DEFAULT_RX_CAPACITY, DEFAULT_TEXT_CAPACITY,
};
pub use error::{FrameError, Result};
pub use escape::{escape, unescape, END, ESCAPE, START};
pub use packet::{
    block_size, padding_for, OutboundPacket, Packet, PacketHeader, CHECKSUM_SIZE, HEADER_SIZE,
    MIN_FRAME_SIZE,
};
pub use response::Response;
