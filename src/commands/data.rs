//! Data Path Commands
//!
//! - REQ_SEND_DATA: queue host bytes for over-the-air delivery
//! - REQ_FLUSH_TX: request an acknowledgement on the next transmit tick
//! - REQ_FLUSH_RX: cancel a pending flush-TX and acknowledge immediately

use crate::commands::{CommandError, Reply, ResponseBuilder, CMD_ACK_FLUSH_RX};
use crate::core::ring_buffer::RingBuffer;
use crate::state::BridgeState;

/// Handle SEND_DATA (0x00)
///
/// The payload is appended whole or not at all. No reply on success; the
/// transmit tick acknowledges delivered bytes.
pub fn handle_send_data<const N: usize>(payload: &[u8], ring: &mut RingBuffer<N>) -> Result<Reply, CommandError> {
    ring.push_slice(payload).map_err(|e| {
        warn!("Data: ring full, {} bytes refused", payload.len());
        e
    })?;

    trace!("Data: queued {} bytes, {} pending", payload.len(), ring.len());
    Ok(None)
}

/// Handle FLUSH_TX (0x04)
pub fn handle_flush_tx(state: &mut BridgeState) -> Result<Reply, CommandError> {
    state.flush_tx_pending = true;
    Ok(None)
}

/// Handle FLUSH_RX (0x05)
pub fn handle_flush_rx(state: &mut BridgeState) -> Result<Reply, CommandError> {
    state.flush_tx_pending = false;
    ResponseBuilder::build_empty(CMD_ACK_FLUSH_RX).map(Some)
}
