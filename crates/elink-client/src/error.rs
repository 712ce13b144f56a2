/// Errors surfaced by the client.
///
/// Corrupt or unexpected traffic never shows up here; it is dropped and
/// counted in [`LinkStats`](crate::LinkStats). Timeouts are reported as
/// `Ok(None)` or `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reading from or writing to the port failed.
    #[error("transport error: {0}")]
    Transport(#[from] elink_transport::TransportError),

    /// Building a request failed.
    #[error("frame error: {0}")]
    Frame(#[from] elink_frame::FrameError),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
