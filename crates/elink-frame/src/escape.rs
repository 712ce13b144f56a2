//! Control bytes and byte stuffing.
//!
//! ```text
//! START 0x7E | escaped header and arguments ... | escaped checksum | END 0x7F
//! ```
//!
//! Inside a frame, any START, END or ESCAPE byte is sent as ESCAPE followed by
//! the byte with bit 5 flipped.

/// Marks the beginning of a frame.
pub const START: u8 = 0x7E;

/// Marks the end of a frame.
pub const END: u8 = 0x7F;

/// Announces that the next byte has bit 5 flipped.
pub const ESCAPE: u8 = 0x7D;

/// Bit flipped on an escaped byte.
pub const ESCAPE_MASK: u8 = 0x20;

/// Returns true if the byte must be escaped inside a frame.
pub const fn is_control(byte: u8) -> bool {
    matches!(byte, START | END | ESCAPE)
}

/// Write the on-wire form of one payload byte into `dst`.
///
/// Returns how many bytes of `dst` were used (1 or 2).
pub fn escape_byte_into(byte: u8, dst: &mut [u8; 2]) -> usize {
    if is_control(byte) {
        dst[0] = ESCAPE;
        dst[1] = byte ^ ESCAPE_MASK;
        2
    } else {
        dst[0] = byte;
        1
    }
}

/// Escape a run of payload bytes.
pub fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 8);
    let mut pair = [0u8; 2];
    for &b in bytes {
        let n = escape_byte_into(b, &mut pair);
        out.extend_from_slice(&pair[..n]);
    }
    out
}

/// Reverse [`escape`]. A dangling ESCAPE at the very end is dropped.
pub fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut escaped = false;
    for &b in bytes {
        if escaped {
            out.push(b ^ ESCAPE_MASK);
            escaped = false;
        } else if b == ESCAPE {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    out
}
