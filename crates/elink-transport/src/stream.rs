use std::io::{ErrorKind, Read, Write};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ByteSink, SerialPort};

/// Adapts any `Read + Write` stream into a [`SerialPort`].
///
/// The stream should be non-blocking or carry a short read timeout: reads
/// that report `WouldBlock` or `TimedOut` are treated as "nothing pending".
/// End of stream on read is reported as [`TransportError::Closed`].
///
/// A tty opened as a plain `std::fs::File` in non-canonical mode with
/// `VMIN = 0` and `VTIME > 0` returns `Ok(0)` when its read timer expires,
/// which is indistinguishable from end of stream here. Configure such
/// devices with `O_NONBLOCK` (reads then fail with `WouldBlock`) or wrap
/// them in a [`SerialPort`] impl that maps `Ok(0)` to "nothing pending".
pub struct StreamPort<S> {
    inner: S,
}

impl<S: Read + Write> StreamPort<S> {
    /// Wrap a stream.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the port and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[cfg(unix)]
impl StreamPort<std::os::unix::net::UnixStream> {
    /// Create a connected pair of non-blocking Unix socket ports.
    pub fn unix_pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        left.set_nonblocking(true)?;
        right.set_nonblocking(true)?;
        debug!("created unix socket port pair");
        Ok((Self::new(left), Self::new(right)))
    }
}

impl<S: Write> ByteSink for StreamPort<S> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<S: Read + Write> SerialPort for StreamPort<S> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.inner.read(buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<S> std::fmt::Debug for StreamPort<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPort")
            .field("stream", &std::any::type_name::<S>())
            .finish()
    }
}
