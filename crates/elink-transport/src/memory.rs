use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, TransportError};
use crate::traits::{ByteSink, SerialPort};

type Queue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory serial link.
///
/// Bytes written on one end become readable on the other. Both ends may live
/// on different threads.
#[derive(Debug, Clone)]
pub struct MemoryPort {
    rx: Queue,
    tx: Queue,
}

impl MemoryPort {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let a_to_b: Queue = Arc::default();
        let b_to_a: Queue = Arc::default();
        let a = Self {
            rx: Arc::clone(&b_to_a),
            tx: Arc::clone(&a_to_b),
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
        };
        (a, b)
    }

    /// Number of bytes waiting to be read on this end.
    pub fn pending(&self) -> usize {
        lock(&self.rx).map(|q| q.len()).unwrap_or(0)
    }

    /// Drain and return every byte waiting on this end.
    pub fn take_all(&mut self) -> Result<Vec<u8>> {
        let mut queue = lock(&self.rx)?;
        Ok(queue.drain(..).collect())
    }
}

impl ByteSink for MemoryPort {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        lock(&self.tx)?.extend(bytes.iter().copied());
        Ok(())
    }
}

impl SerialPort for MemoryPort {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut queue = lock(&self.rx)?;
        let n = queue.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

fn lock(queue: &Queue) -> Result<MutexGuard<'_, VecDeque<u8>>> {
    // A poisoned queue means the other end panicked mid-write.
    queue.lock().map_err(|_| TransportError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_cross_between_ends() {
        let (mut a, mut b) = MemoryPort::pair();
        a.write_bytes(b"hello").unwrap();
        assert_eq!(b.pending(), 5);
        assert_eq!(a.pending(), 0);

        let mut buf = [0u8; 3];
        assert_eq!(b.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(b.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(b.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn both_directions_are_independent() {
        let (mut a, mut b) = MemoryPort::pair();
        a.write_bytes(b"to-b").unwrap();
        b.write_bytes(b"to-a").unwrap();

        assert_eq!(a.take_all().unwrap(), b"to-a");
        assert_eq!(b.take_all().unwrap(), b"to-b");
    }

    #[test]
    fn works_across_threads() {
        let (mut a, mut b) = MemoryPort::pair();
        let writer = std::thread::spawn(move || {
            for i in 0..32u8 {
                a.write_bytes(&[i]).unwrap();
            }
        });
        writer.join().unwrap();

        let got = b.take_all().unwrap();
        assert_eq!(got, (0..32u8).collect::<Vec<_>>());
    }
}
