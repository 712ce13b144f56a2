//! Running checksum shared by both ends of the link.
//!
//! This is not a textbook CRC. Each byte is XOR-ed into a 16-bit state, the
//! halves are swapped, and bits of the high byte are folded back down with
//! three XOR/shift steps. The exact sequence is part of the wire contract.
//! Every step is an invertible linear map, so a single flipped bit anywhere
//! in the covered region always changes the result.

/// Running checksum state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u16);

impl Checksum {
    /// Fresh state (zero).
    pub const fn new() -> Self {
        Self(0)
    }

    /// Fold one byte into the state.
    #[must_use]
    pub const fn fold_byte(self, byte: u8) -> Self {
        let mut acc = self.0 ^ byte as u16;
        acc = acc.swap_bytes();
        acc ^= (acc & 0xff00) << 4;
        acc ^= (acc >> 8) >> 4;
        acc ^= (acc & 0xff00) >> 5;
        Self(acc)
    }

    /// Fold a run of bytes into the state.
    #[must_use]
    pub fn fold_bytes(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |acc, &b| acc.fold_byte(b))
    }

    /// Current checksum value.
    pub const fn value(self) -> u16 {
        self.0
    }
}

/// Checksum of a complete byte run, starting from a fresh state.
pub fn checksum(bytes: &[u8]) -> u16 {
    Checksum::new().fold_bytes(bytes).value()
}
