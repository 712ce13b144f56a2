/// Errors that can occur while building or validating packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Writing to the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] elink_transport::TransportError),

    /// Plain I/O error (async codec).
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame is shorter than a header plus checksum.
    #[error("frame too short ({len} bytes, min {min})")]
    TooShort { len: usize, min: usize },

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (computed {computed:#06x}, received {received:#06x})")]
    ChecksumMismatch { computed: u16, received: u16 },

    /// The argument blocks do not line up with the declared count.
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = std::result::Result<T, FrameError>;
