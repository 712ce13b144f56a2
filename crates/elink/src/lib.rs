//! Serial protocol engine for a fixed-firmware network companion.
//!
//! # Crate Structure
//!
//! - [`transport`] — byte-oriented serial port abstraction
//! - [`frame`] — checksum, escaped framing, packet layout, request builder
//!   and response reader
//! - [`client`] — dispatch engine, callbacks and synchronization (behind the
//!   default `client` feature)
//! - [`logging`] — `tracing-subscriber` setup (behind the `logging` feature)

/// Re-export transport types.
pub mod transport {
    pub use elink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use elink_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use elink_client::*;
}

#[cfg(feature = "logging")]
pub mod logging;
