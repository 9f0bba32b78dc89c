//! System Commands Implementation
//!
//! Handles device-level commands:
//! - REQ_DEVICE_RESET: System reset
//! - REQ_DEVICE_VERSION: Firmware version string
//! - REQ_CHANGE_NAME: Advertised name
//! - REQ_DEVICE_STATE: GAP role state
//! - REQ_DEVICE_POWER: Radio TX power

use crate::commands::{
    CommandError, Device, Reply, ResponseBuilder, CMD_ACK_CHANGE_NAME, CMD_ACK_DEVICE_POWER,
    CMD_ACK_DEVICE_STATE, CMD_ACK_DEVICE_VERSION,
};
use crate::config::DEVICE_VERSION;
use crate::core::protocol::serialization::read_u8;
use crate::state::BridgeState;

/// Handle DEVICE_RESET (0x01)
///
/// Nothing is sent back; the host sees the start-up announcement instead.
pub fn handle_reset<D: Device>(device: &mut D) -> Result<Reply, CommandError> {
    warn!("System: RESET requested");
    device.system_reset();
    Ok(None)
}

/// Handle DEVICE_VERSION (0x02)
pub fn handle_version() -> Result<Reply, CommandError> {
    let mut response = ResponseBuilder::new();
    response.add_cstr(DEVICE_VERSION)?;
    response.build(CMD_ACK_DEVICE_VERSION).map(Some)
}

/// Handle CHANGE_NAME (0x03)
///
/// Payload must be exactly the 13 name bytes. Replies with the full
/// advertised name including the address suffix.
pub fn handle_name<D: Device>(payload: &[u8], state: &mut BridgeState, device: &mut D) -> Result<Reply, CommandError> {
    state.set_name(payload)?;

    let full_name = state.full_name();
    device.name_changed(&full_name);
    info!("System: name changed");

    let mut response = ResponseBuilder::new();
    response.add_slice(&full_name)?;
    response.build(CMD_ACK_CHANGE_NAME).map(Some)
}

/// Handle DEVICE_STATE (0x06)
pub fn handle_state(state: &BridgeState) -> Result<Reply, CommandError> {
    ResponseBuilder::build_byte(CMD_ACK_DEVICE_STATE, state.system_state().as_u8()).map(Some)
}

/// Handle DEVICE_POWER (0x07)
///
/// Payload byte 0 indexes the TX power table. The reply carries the applied
/// level in dBm.
pub fn handle_power<D: Device>(payload: &[u8], state: &mut BridgeState, device: &mut D) -> Result<Reply, CommandError> {
    let index = read_u8(payload, 0).ok_or(CommandError::InvalidPayload)?;
    let dbm = state.select_tx_power(index)?;
    device.set_tx_power(dbm)?;

    info!("System: TX power {} dBm", dbm);
    ResponseBuilder::build_byte(CMD_ACK_DEVICE_POWER, dbm as u8).map(Some)
}
