//! Transmit ring buffer
//!
//! Holds bytes the host asked to send over the air until the periodic
//! transmit task drains them. The ingestion side is the only writer of the
//! write cursor and the transmit side the only writer of the read cursor.
//!
//! One slot is always left free so that `write == read` means empty.

use crate::config::RX_BUFFER_SIZE;

/// Ring buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RingError {
    /// Not enough free space for the whole write
    Full { requested: usize, free: usize },
}

/// Advance `index` by `delta` modulo `capacity`
#[inline]
pub const fn advance(index: usize, delta: usize, capacity: usize) -> usize {
    let sum = index + delta;
    if sum == capacity {
        0
    } else {
        sum % capacity
    }
}

/// Unread bytes between the write and read cursors
#[inline]
pub const fn distance(write: usize, read: usize, capacity: usize) -> usize {
    if write > read {
        write - read
    } else if write == read {
        0
    } else {
        (capacity - read) + write
    }
}

/// Fixed-capacity byte ring
///
/// Generic const parameter `N` sets buffer capacity.
pub struct RingBuffer<const N: usize = RX_BUFFER_SIZE> {
    data: [u8; N],
    write: usize,
    read: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            write: 0,
            read: 0,
        }
    }

    /// Total slots, including the one kept free
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of unread bytes
    #[inline]
    pub fn len(&self) -> usize {
        distance(self.write, self.read, N)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// Bytes that can still be written
    #[inline]
    pub fn free(&self) -> usize {
        N - 1 - self.len()
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.write
    }

    #[inline]
    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Append a single byte
    pub fn push(&mut self, byte: u8) -> Result<(), RingError> {
        self.push_slice(&[byte])
    }

    /// Append all of `bytes` or nothing
    pub fn push_slice(&mut self, bytes: &[u8]) -> Result<(), RingError> {
        let free = self.free();
        if bytes.len() > free {
            return Err(RingError::Full {
                requested: bytes.len(),
                free,
            });
        }

        for &b in bytes {
            self.data[self.write] = b;
            self.write = advance(self.write, 1, N);
        }
        Ok(())
    }

    /// Copy unread bytes starting `offset` past the read cursor into `out`
    /// without consuming them. Returns the number of bytes copied.
    pub fn peek_into(&self, offset: usize, out: &mut [u8]) -> usize {
        let available = self.len().saturating_sub(offset);
        let n = out.len().min(available);
        for (i, slot) in out[..n].iter_mut().enumerate() {
            *slot = self.data[advance(self.read, offset + i, N)];
        }
        n
    }

    /// Release `n` bytes after they were delivered
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len());
        self.read = advance(self.read, n, N);
    }

    /// Drop all unread bytes
    pub fn clear(&mut self) {
        self.read = self.write;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_values() {
        assert_eq!(distance(5, 5, 20), 0);
        assert_eq!(distance(10, 3, 20), 7);
        assert_eq!(distance(3, 10, 20), 13);
    }

    #[test]
    fn test_advance_wraps() {
        assert_eq!(advance(19, 1, 20), 0);
        assert_eq!(advance(18, 5, 20), 3);
        assert_eq!(advance(0, 20, 20), 0);
        assert_eq!(advance(7, 0, 20), 7);
    }

    #[test]
    fn test_wraparound() {
        let mut rb: RingBuffer<8> = RingBuffer::new();

        rb.push_slice(&[1, 2, 3, 4, 5]).unwrap();
        rb.consume(3);
        assert_eq!(rb.len(), 2);

        // Wraps past the end of the array
        rb.push_slice(&[6, 7, 8, 9]).unwrap();
        assert_eq!(rb.len(), 6);
        assert!(rb.write_index() < rb.read_index());

        let mut out = [0u8; 6];
        assert_eq!(rb.peek_into(0, &mut out), 6);
        assert_eq!(out, [4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_full_is_rejected_whole() {
        let mut rb: RingBuffer<8> = RingBuffer::new();
        rb.push_slice(&[0; 5]).unwrap();

        assert_eq!(
            rb.push_slice(&[1, 2, 3]),
            Err(RingError::Full { requested: 3, free: 2 })
        );
        assert_eq!(rb.len(), 5);

        rb.push_slice(&[1, 2]).unwrap();
        assert_eq!(rb.free(), 0);
        assert_eq!(rb.push(9), Err(RingError::Full { requested: 1, free: 0 }));
    }
}
