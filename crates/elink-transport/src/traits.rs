use bytes::{BufMut, BytesMut};

use crate::error::Result;

/// Write half of a link.
///
/// Implementations must accept the whole slice before returning; the request
/// builder relies on each call landing on the wire in order.
pub trait ByteSink {
    /// Write every byte of `bytes`.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Push any buffered output towards the peer.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A full-duplex byte link to the companion processor.
pub trait SerialPort: ByteSink {
    /// Copy bytes that have already arrived into `buf` without blocking.
    ///
    /// Returns `Ok(0)` when nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl ByteSink for BytesMut {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_slice(bytes);
        Ok(())
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: SerialPort + ?Sized> SerialPort for &mut T {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for Box<T> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: SerialPort + ?Sized> SerialPort for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }
}
