use crate::packet::{block_size, Packet, LENGTH_PREFIX_SIZE};

/// Sequential reader over the argument blocks of a validated [`Packet`].
///
/// Every pop consumes one whole block (length, payload and padding). Once
/// `argc` blocks have been consumed, every pop returns `None`. Pops never
/// panic on packet contents; validation already proved the blocks fit.
#[derive(Debug, Clone)]
pub struct Response<'a> {
    packet: &'a Packet,
    offset: usize,
    consumed: u16,
}

impl<'a> Response<'a> {
    /// Start reading at the first argument.
    pub fn new(packet: &'a Packet) -> Self {
        Self {
            packet,
            offset: 0,
            consumed: 0,
        }
    }

    /// The underlying packet.
    pub fn packet(&self) -> &'a Packet {
        self.packet
    }

    /// Declared number of arguments.
    pub fn argument_count(&self) -> u16 {
        self.packet.argc()
    }

    /// Opcode of the packet.
    pub fn command(&self) -> u16 {
        self.packet.command()
    }

    /// The header's correlation/value field.
    pub fn correlation_value(&self) -> u32 {
        self.packet.correlation()
    }

    /// Arguments popped so far.
    pub fn consumed(&self) -> u16 {
        self.consumed
    }

    /// Arguments not yet popped.
    pub fn remaining(&self) -> u16 {
        self.argument_count().saturating_sub(self.consumed)
    }

    /// Length of the next argument without consuming it.
    pub fn peek_next_length(&self) -> Option<u16> {
        if self.remaining() == 0 {
            return None;
        }
        let args = self.packet.arguments();
        let prefix = args.get(self.offset..self.offset + LENGTH_PREFIX_SIZE)?;
        Some(u16::from_le_bytes([prefix[0], prefix[1]]))
    }

    /// Pop the next argument as a slice borrowed from the packet.
    pub fn pop_slice(&mut self) -> Option<&'a [u8]> {
        let len = self.peek_next_length()? as usize;
        let packet: &'a Packet = self.packet;
        let start = self.offset + LENGTH_PREFIX_SIZE;
        let payload = packet.arguments().get(start..start + len)?;
        self.offset += block_size(len);
        self.consumed += 1;
        Some(payload)
    }

    /// Copy the next argument into `dst`, truncating to fit.
    ///
    /// Returns the argument's full length, which may exceed `dst.len()`.
    pub fn pop_into(&mut self, dst: &mut [u8]) -> Option<usize> {
        let payload = self.pop_slice()?;
        let n = payload.len().min(dst.len());
        dst[..n].copy_from_slice(&payload[..n]);
        Some(payload.len())
    }

    /// Copy the next argument into `dst` as a NUL-terminated string.
    ///
    /// At most `dst.len() - 1` bytes are copied so the terminator always
    /// fits. Returns the number of bytes copied, excluding the terminator.
    /// An empty `dst` still consumes the argument and returns `Some(0)`.
    pub fn pop_text_into(&mut self, dst: &mut [u8]) -> Option<usize> {
        let payload = self.pop_slice()?;
        let Some(room) = dst.len().checked_sub(1) else {
            return Some(0);
        };
        let n = payload.len().min(room);
        dst[..n].copy_from_slice(&payload[..n]);
        dst[n] = 0;
        Some(n)
    }

    /// Pop the next argument as an owned string, replacing invalid UTF-8.
    pub fn pop_string(&mut self) -> Option<String> {
        self.pop_slice()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
    }

    /// Pop a one-byte integer argument.
    ///
    /// Returns `None` without consuming anything if the next argument is not
    /// exactly one byte long.
    pub fn pop_u8(&mut self) -> Option<u8> {
        self.pop_fixed::<1>().map(|b| b[0])
    }

    /// Pop a little-endian `u16` argument.
    pub fn pop_u16(&mut self) -> Option<u16> {
        self.pop_fixed::<2>().map(u16::from_le_bytes)
    }

    /// Pop a little-endian `u32` argument.
    pub fn pop_u32(&mut self) -> Option<u32> {
        self.pop_fixed::<4>().map(u32::from_le_bytes)
    }

    fn pop_fixed<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.peek_next_length()? as usize != N {
            return None;
        }
        self.pop_slice()?.try_into().ok()
    }
}
