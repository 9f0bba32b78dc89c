//! Serial Ingestion
//!
//! Drains whatever the UART has buffered, runs it through the frame decoder
//! and posts each validated frame to the dispatcher queue.

use crate::core::memory::{Envelope, RX_CHUNK_SIZE};
use crate::core::protocol::{Decoded, FrameDecoder, RejectReason};
use crate::core::transport::{EnvelopeQueue, SerialRx};

/// Ingestion errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestError<E> {
    /// The transport read failed
    Read(E),
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IngestStats {
    /// Frames posted to the queue
    pub frames: u32,
    /// Frames abandoned on an oversized length byte
    pub rejected_length: u32,
    /// Frames abandoned on a bad checksum
    pub rejected_checksum: u32,
    /// Valid frames lost because the queue was full
    pub dropped: u32,
}

/// Serial ingestion loop state
pub struct SerialIngest {
    decoder: FrameDecoder,
    stats: IngestStats,
}

impl SerialIngest {
    pub const fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
            stats: IngestStats {
                frames: 0,
                rejected_length: 0,
                rejected_checksum: 0,
                dropped: 0,
            },
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Process the bytes currently available on `rx`
    ///
    /// Never asks for more than `rx_available()` reports, so it does not
    /// block. Returns the number of bytes consumed.
    pub fn poll<R, Q>(&mut self, rx: &mut R, queue: &mut Q) -> Result<usize, IngestError<R::Error>>
    where
        R: SerialRx,
        Q: EnvelopeQueue,
    {
        let mut remaining = rx.rx_available();
        let mut consumed = 0;
        let mut chunk = [0u8; RX_CHUNK_SIZE];

        while remaining > 0 {
            let want = remaining.min(chunk.len());
            let n = rx.read(&mut chunk[..want]).map_err(IngestError::Read)?;
            if n == 0 {
                break;
            }

            self.feed(&chunk[..n], queue);
            remaining -= n;
            consumed += n;
        }

        Ok(consumed)
    }

    /// Feed already-received bytes
    pub fn feed<Q: EnvelopeQueue>(&mut self, bytes: &[u8], queue: &mut Q) {
        for &byte in bytes {
            match self.decoder.feed(byte) {
                Decoded::Incomplete => {}
                Decoded::Complete(frame) => {
                    let envelope = Envelope::from_frame(frame);
                    if queue.post(envelope).is_ok() {
                        self.stats.frames = self.stats.frames.wrapping_add(1);
                    } else {
                        warn!("serial: envelope queue full, frame dropped");
                        self.stats.dropped = self.stats.dropped.wrapping_add(1);
                    }
                }
                Decoded::Rejected(RejectReason::InvalidLength(len)) => {
                    debug!("serial: rejected frame with length {}", len);
                    self.stats.rejected_length = self.stats.rejected_length.wrapping_add(1);
                }
                Decoded::Rejected(RejectReason::ChecksumMismatch) => {
                    debug!("serial: rejected frame with bad checksum");
                    self.stats.rejected_checksum = self.stats.rejected_checksum.wrapping_add(1);
                }
            }
        }
    }
}

impl Default for SerialIngest {
    fn default() -> Self {
        Self::new()
    }
}
