//! Streaming request serialization.
//!
//! A request is written in three phases: [`begin_request`] (START and the
//! header), any number of [`append_argument`] calls, and [`finish_request`]
//! (checksum and END). Every byte goes straight to the sink through the
//! escaper; nothing larger than a small staging array is buffered.
//!
//! The caller is responsible for supplying exactly as many arguments as it
//! declared. A mismatch is not reported here; the companion rejects the
//! frame.

use elink_transport::ByteSink;
use tracing::{trace, warn};

use crate::checksum::Checksum;
use crate::command::command_name;
use crate::error::{FrameError, Result};
use crate::escape::{escape_byte_into, END, START};
use crate::packet::{padding_for, PacketHeader};

const STAGE_SIZE: usize = 64;
const ZERO_PAD: [u8; 3] = [0; 3];

/// Write START and the header. Returns the running checksum.
pub fn begin_request<W: ByteSink + ?Sized>(
    sink: &mut W,
    command: u16,
    correlation: u32,
    argc: u16,
) -> Result<Checksum> {
    let header = PacketHeader::new(command, argc, correlation).encode();
    sink.write_bytes(&[START])?;
    write_escaped(sink, &header)?;
    Ok(Checksum::new().fold_bytes(&header))
}

/// Write one argument block: length, payload, zero padding.
pub fn append_argument<W: ByteSink + ?Sized>(
    sink: &mut W,
    state: Checksum,
    bytes: &[u8],
) -> Result<Checksum> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| FrameError::Malformed("argument longer than 65535 bytes"))?;
    let prefix = len.to_le_bytes();
    let pad = &ZERO_PAD[..padding_for(bytes.len())];

    write_escaped(sink, &prefix)?;
    write_escaped(sink, bytes)?;
    write_escaped(sink, pad)?;

    Ok(state.fold_bytes(&prefix).fold_bytes(bytes).fold_bytes(pad))
}

/// Write one argument block whose payload is produced a byte at a time.
///
/// For data that cannot be borrowed as a slice, such as values read out of
/// program memory. Exactly `len` bytes are written: a short source is
/// zero-filled, a long one is cut off.
pub fn append_argument_staged<W, I>(
    sink: &mut W,
    state: Checksum,
    len: u16,
    bytes: I,
) -> Result<Checksum>
where
    W: ByteSink + ?Sized,
    I: IntoIterator<Item = u8>,
{
    let prefix = len.to_le_bytes();
    write_escaped(sink, &prefix)?;
    let mut state = state.fold_bytes(&prefix);

    let mut source = bytes.into_iter();
    let mut chunk = [0u8; STAGE_SIZE / 2];
    let mut remaining = len as usize;
    let mut short = false;
    while remaining > 0 {
        let take = remaining.min(chunk.len());
        for slot in &mut chunk[..take] {
            *slot = match source.next() {
                Some(b) => b,
                None => {
                    short = true;
                    0
                }
            };
        }
        write_escaped(sink, &chunk[..take])?;
        state = state.fold_bytes(&chunk[..take]);
        remaining -= take;
    }
    if short {
        warn!(len, "staged argument source ended early; zero-filled");
    }

    let pad = &ZERO_PAD[..padding_for(len as usize)];
    write_escaped(sink, pad)?;
    Ok(state.fold_bytes(pad))
}

/// Write the checksum and END, then flush the sink.
pub fn finish_request<W: ByteSink + ?Sized>(sink: &mut W, state: Checksum) -> Result<()> {
    write_escaped(sink, &state.value().to_le_bytes())?;
    sink.write_bytes(&[END])?;
    sink.flush()?;
    Ok(())
}

fn write_escaped<W: ByteSink + ?Sized>(sink: &mut W, bytes: &[u8]) -> Result<()> {
    let mut stage = [0u8; STAGE_SIZE];
    let mut used = 0usize;
    let mut pair = [0u8; 2];
    for &b in bytes {
        if used + 2 > STAGE_SIZE {
            sink.write_bytes(&stage[..used])?;
            used = 0;
        }
        let n = escape_byte_into(b, &mut pair);
        stage[used..used + n].copy_from_slice(&pair[..n]);
        used += n;
    }
    if used > 0 {
        sink.write_bytes(&stage[..used])?;
    }
    Ok(())
}

/// Borrowing builder over the three-phase request functions.
///
/// Dropping a builder without calling [`finish`](Self::finish) leaves a
/// partial frame on the wire; the companion discards it when the next START
/// arrives.
pub struct RequestBuilder<'a, W: ByteSink + ?Sized> {
    sink: &'a mut W,
    checksum: Checksum,
    command: u16,
    declared: u16,
    written: u16,
}

impl<'a, W: ByteSink + ?Sized> RequestBuilder<'a, W> {
    /// Open a request on `sink`.
    pub fn begin(sink: &'a mut W, command: u16, correlation: u32, argc: u16) -> Result<Self> {
        trace!(
            command,
            name = command_name(command),
            correlation,
            argc,
            "request begin"
        );
        let checksum = begin_request(&mut *sink, command, correlation, argc)?;
        Ok(Self {
            sink,
            checksum,
            command,
            declared: argc,
            written: 0,
        })
    }

    /// Append an argument from a slice.
    pub fn arg(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.checksum = append_argument(&mut *self.sink, self.checksum, bytes)?;
        self.written = self.written.saturating_add(1);
        Ok(self)
    }

    /// Append an argument produced byte by byte.
    pub fn arg_staged<I: IntoIterator<Item = u8>>(
        &mut self,
        len: u16,
        bytes: I,
    ) -> Result<&mut Self> {
        self.checksum = append_argument_staged(&mut *self.sink, self.checksum, len, bytes)?;
        self.written = self.written.saturating_add(1);
        Ok(self)
    }

    /// Running checksum so far.
    pub fn checksum(&self) -> Checksum {
        self.checksum
    }

    /// Arguments appended so far.
    pub fn written(&self) -> u16 {
        self.written
    }

    /// Close the request.
    pub fn finish(self) -> Result<()> {
        if self.written != self.declared {
            warn!(
                command = self.command,
                declared = self.declared,
                written = self.written,
                "argument count mismatch; companion will reject this request"
            );
        }
        finish_request(self.sink, self.checksum)
    }
}
