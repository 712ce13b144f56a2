//! Dispatch engine for the elink serial protocol.
//!
//! [`Client`] owns a [`SerialPort`](elink_transport::SerialPort) and turns
//! the byte stream from the companion into one of three outcomes:
//! - a value response completes the blocking wait, if one is armed
//! - a callback response runs the callback registered under its token
//! - anything else (corrupt frames, unknown commands, stray text) is logged,
//!   counted in [`LinkStats`] and dropped
//!
//! ```no_run
//! use std::time::Duration;
//! use elink_client::Client;
//! use elink_transport::MemoryPort;
//!
//! # fn main() -> elink_client::Result<()> {
//! let (port, _companion) = MemoryPort::pair();
//! let mut client = Client::new(port);
//! if client.synchronize(Duration::from_secs(2))? {
//!     let token = client.register_callback(|_, response| {
//!         let _status = response.pop_u32();
//!     });
//!     client.send(10, token.get(), &[b"topic"])?;
//! }
//! loop {
//!     client.drain_incoming()?;
//! }
//! # }
//! ```

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod pending;
pub mod stats;
pub mod sync;

pub use callback::{Callback, CallbackToken, NONCE_BIT};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_REPLY_TIMEOUT, DEFAULT_SYNC_TIMEOUT};
pub use error::{ClientError, Result};
pub use pending::Reply;
pub use stats::LinkStats;
pub use sync::{is_nonce, SyncState};
