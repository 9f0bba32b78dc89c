//! Periodic Transmit Scheduler
//!
//! Runs once per tick. Drains queued host bytes to the connected central as
//! notifications and returns credit to the host for every byte delivered.

use embedded_io::Write;

use crate::commands::{send_frame, CommandError, CMD_ACK_FLUSH_TX, CMD_ACK_SEND_DATA};
use crate::config::TxConfig;
use crate::core::ring_buffer::RingBuffer;
use crate::state::BridgeState;

/// Largest chunk the scheduler can stage
pub const MAX_CHUNK_SIZE: usize = 244;

/// Over-the-air notification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmitError {
    /// No connection or notifications not enabled
    NotConnected,
    /// Radio has no free notification buffers
    Busy,
    /// Any other stack error
    Radio,
}

/// Notification sink towards the central
pub trait RadioLink {
    fn notify(&mut self, chunk: &[u8]) -> Result<(), TransmitError>;
}

/// Link used while no central is connected
pub struct NoLink;

impl RadioLink for NoLink {
    fn notify(&mut self, _chunk: &[u8]) -> Result<(), TransmitError> {
        Err(TransmitError::NotConnected)
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Bytes delivered and consumed from the ring
    pub bytes_sent: usize,
    /// Notifications delivered
    pub chunks: usize,
    /// Flush-TX acknowledgement written
    pub flush_acked: bool,
    /// A notification failed and the rest waits for the next tick
    pub radio_error: Option<TransmitError>,
    /// An acknowledgement could not be written to the host
    pub serial_error: Option<CommandError>,
}

/// Periodic transmit scheduler
pub struct TxScheduler {
    config: TxConfig,
}

impl TxScheduler {
    pub fn new(config: TxConfig) -> Self {
        let chunk_size = config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        // One tick's credit must fit in a byte
        let max_chunks_per_tick = config.max_chunks_per_tick.min(u8::MAX as usize / chunk_size);
        Self {
            config: TxConfig {
                chunk_size,
                max_chunks_per_tick,
            },
        }
    }

    pub fn config(&self) -> &TxConfig {
        &self.config
    }

    /// Run one transmit tick
    ///
    /// Bytes are consumed from the ring only once the link accepted them, so
    /// the credit sent to the host never exceeds what actually left.
    pub fn on_tick<const N: usize, L, W>(
        &self,
        state: &mut BridgeState,
        ring: &mut RingBuffer<N>,
        link: &mut L,
        serial: &mut W,
    ) -> TickReport
    where
        L: RadioLink,
        W: Write,
    {
        let mut report = TickReport::default();

        if state.flush_tx_pending {
            state.flush_tx_pending = false;
            match send_frame(serial, CMD_ACK_FLUSH_TX, &[]) {
                Ok(()) => report.flush_acked = true,
                Err(e) => {
                    warn!("Transmit: flush ack not written: {:?}", e);
                    report.serial_error = Some(e);
                }
            }
        }

        if !state.connected || ring.is_empty() {
            return report;
        }

        let mut chunk = [0u8; MAX_CHUNK_SIZE];
        let chunk_size = self.config.chunk_size;

        for _ in 0..self.config.max_chunks_per_tick {
            let n = ring.peek_into(0, &mut chunk[..chunk_size]);
            if n == 0 {
                break;
            }

            if let Err(e) = link.notify(&chunk[..n]) {
                trace!("Transmit: notify failed after {} bytes: {:?}", report.bytes_sent, e);
                report.radio_error = Some(e);
                break;
            }

            ring.consume(n);
            report.bytes_sent += n;
            report.chunks += 1;
        }

        if report.bytes_sent > 0 {
            let credit = report.bytes_sent as u8;
            if let Err(e) = send_frame(serial, CMD_ACK_SEND_DATA, &[credit]) {
                warn!("Transmit: credit ack not written: {:?}", e);
                report.serial_error = Some(e);
            }
        }

        report
    }
}

impl Default for TxScheduler {
    fn default() -> Self {
        Self::new(TxConfig::default())
    }
}
