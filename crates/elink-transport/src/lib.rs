//! Byte-oriented serial transport abstraction.
//!
//! The protocol engine only needs two things from the link to the companion
//! processor: a way to write bytes and a way to pick up whatever bytes have
//! already arrived without blocking. This crate provides those two traits
//! plus adapters:
//! - [`StreamPort`] wraps any `Read + Write` stream (serial device files,
//!   Unix socket pairs, TCP bridges)
//! - [`MemoryPort`] is an in-memory pair used by tests and simulators
//!
//! Choosing and configuring the physical channel is left to the caller.

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryPort;
pub use stream::StreamPort;
pub use traits::{ByteSink, SerialPort};
