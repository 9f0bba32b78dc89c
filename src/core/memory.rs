//! Buffer Pool Management
//!
//! This module provides the static buffer pool for outbound serial packets,
//! the owned envelope that carries a decoded frame from the ingestion loop to
//! the dispatcher, and the receive chunk buffer used by the UART task.
//! Uses atomic-pool for zero-allocation buffer management.

use atomic_pool::{pool, Box};
use heapless::Vec;

use crate::core::protocol::{FrameView, MAX_FRAME_SIZE};

/// Buffer size: one maximum-length frame
pub const BUFFER_SIZE: usize = MAX_FRAME_SIZE;

/// Number of TX buffers
pub const TX_POOL_SIZE: usize = 8;

// TX buffer pool - 8 buffers of 255 bytes each (doc comment not supported on macros)
pool!(TxPool: [[u8; BUFFER_SIZE]; TX_POOL_SIZE]);

/// UART receive chunk size
pub const RX_CHUNK_SIZE: usize = 64;

/// Buffer pool errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// No buffers available in pool
    PoolExhausted,
    /// Buffer too small for data
    BufferTooSmall,
    /// Invalid buffer size
    InvalidSize,
}

/// TX packet structure
pub struct TxPacket {
    data: Box<TxPool>,
    len: usize,
}

impl TxPacket {
    /// Allocate a new TX packet from the pool
    pub fn new(data: &[u8]) -> Result<Self, BufferError> {
        if data.len() > BUFFER_SIZE {
            return Err(BufferError::BufferTooSmall);
        }

        let mut buffer = Box::<TxPool>::new([0; BUFFER_SIZE]).ok_or(BufferError::PoolExhausted)?;

        buffer[..data.len()].copy_from_slice(data);

        Ok(Self {
            data: buffer,
            len: data.len(),
        })
    }

    /// Get the packet data as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get the packet length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if packet is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A decoded frame copied out of the decoder for deferred dispatch
///
/// Holds the whole frame, header through checksum (`len + 5` bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    data: Vec<u8, MAX_FRAME_SIZE>,
}

impl Envelope {
    /// Copy a validated frame out of the decoder buffer
    pub fn from_frame(frame: FrameView<'_>) -> Self {
        let mut data = Vec::new();
        // A FrameView is never longer than MAX_FRAME_SIZE
        let _ = data.extend_from_slice(frame.as_bytes());
        Self { data }
    }

    /// View the carried frame
    pub fn frame(&self) -> FrameView<'_> {
        FrameView::from_validated(&self.data)
    }

    pub fn frame_type(&self) -> u8 {
        self.frame().frame_type()
    }

    pub fn payload(&self) -> &[u8] {
        self.frame().payload()
    }

    /// Raw frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// RX buffer for one UART read
pub struct RxBuffer {
    data: [u8; RX_CHUNK_SIZE],
    len: usize,
}

impl RxBuffer {
    /// Create a new RX buffer
    pub fn new() -> Self {
        Self {
            data: [0; RX_CHUNK_SIZE],
            len: 0,
        }
    }

    /// Get mutable slice for writing data
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Set the actual data length after receiving
    pub fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        if len > RX_CHUNK_SIZE {
            return Err(BufferError::InvalidSize);
        }
        self.len = len;
        Ok(())
    }

    /// Get the received data as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get the buffer length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::new()
    }
}
