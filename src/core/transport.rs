//! Serial Transport Boundary
//!
//! The bridge core never touches the UART driver directly:
//! - Input is any [`SerialRx`]: an `embedded_io::Read` that can report how
//!   many bytes are available right now.
//! - Output is any `embedded_io::Write`. On target that is a [`PacketWriter`],
//!   which moves each write into a pooled [`TxPacket`] on the UART TX channel.
//! - Decoded frames travel to the dispatcher through an [`EnvelopeQueue`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};
use embedded_io::{ErrorKind, ErrorType, Read, Write};
use heapless::Deque;

use crate::core::memory::{BufferError, Envelope, TxPacket, BUFFER_SIZE};

/// Byte source that knows how much input is pending
pub trait SerialRx: Read {
    /// Bytes that can be read without waiting
    fn rx_available(&mut self) -> usize;
}

impl SerialRx for &[u8] {
    fn rx_available(&mut self) -> usize {
        self.len()
    }
}

/// Destination for decoded frames
pub trait EnvelopeQueue {
    /// Post an envelope, handing it back if there is no room
    fn post(&mut self, envelope: Envelope) -> Result<(), Envelope>;
}

impl<M: RawMutex, const N: usize> EnvelopeQueue for Sender<'_, M, Envelope, N> {
    fn post(&mut self, envelope: Envelope) -> Result<(), Envelope> {
        self.try_send(envelope).map_err(|TrySendError::Full(e)| e)
    }
}

impl<const N: usize> EnvelopeQueue for Deque<Envelope, N> {
    fn post(&mut self, envelope: Envelope) -> Result<(), Envelope> {
        self.push_back(envelope)
    }
}

/// Outbound transport errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Buffer error
    BufferError(BufferError),
    /// TX channel has no free slot
    ChannelFull,
}

impl From<BufferError> for TransportError {
    fn from(err: BufferError) -> Self {
        TransportError::BufferError(err)
    }
}

impl embedded_io::Error for TransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransportError::BufferError(BufferError::PoolExhausted) => ErrorKind::OutOfMemory,
            TransportError::BufferError(_) => ErrorKind::InvalidInput,
            TransportError::ChannelFull => ErrorKind::Other,
        }
    }
}

/// `embedded_io::Write` adapter over the UART TX channel
///
/// Every `write` call becomes one pooled packet, so a frame written with
/// `write_all` reaches the UART task in one piece.
pub struct PacketWriter<'ch, M: RawMutex, const N: usize> {
    sender: Sender<'ch, M, TxPacket, N>,
}

impl<'ch, M: RawMutex, const N: usize> PacketWriter<'ch, M, N> {
    pub fn new(sender: Sender<'ch, M, TxPacket, N>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex, const N: usize> ErrorType for PacketWriter<'_, M, N> {
    type Error = TransportError;
}

impl<M: RawMutex, const N: usize> Write for PacketWriter<'_, M, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len().min(BUFFER_SIZE);
        let packet = TxPacket::new(&buf[..len])?;
        self.sender
            .try_send(packet)
            .map_err(|_| TransportError::ChannelFull)?;
        Ok(len)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
