//! BLE Event Forwarding
//!
//! Turns GAP role transitions and central writes into frames for the host.

use embedded_io::Write;

use crate::commands::{send_frame, CommandError, CMD_ACK_DEVICE_RESET, CMD_ACK_DEVICE_STATE, CMD_REQ_APP_DATA};
use crate::state::{BridgeState, GapState};

/// Tell the host the bridge has (re)started
pub fn announce_start<W: Write>(serial: &mut W) -> Result<(), CommandError> {
    info!("BLE: announcing start");
    send_frame(serial, CMD_ACK_DEVICE_RESET, &[])
}

/// Record a GAP role transition and report it to the host
///
/// `Started` restores the factory name, `Advertising` drops and
/// `Connected` raises the connection flag.
pub fn on_gap_state<W: Write>(state: &mut BridgeState, new_state: GapState, serial: &mut W) -> Result<(), CommandError> {
    debug!("BLE: GAP state {:?}", new_state);

    state.set_system_state(new_state);
    if new_state == GapState::Started {
        state.reset_name();
    }

    send_frame(serial, CMD_ACK_DEVICE_STATE, &[new_state.as_u8()])
}

/// Forward a central write of `[len, data..]` to the host as app data
pub fn forward_app_data<W: Write>(write: &[u8], serial: &mut W) -> Result<(), CommandError> {
    let (&len, data) = write.split_first().ok_or(CommandError::InvalidPayload)?;
    let data = data.get(..len as usize).ok_or(CommandError::InvalidPayload)?;

    debug!("BLE: {} bytes from central", data.len());
    send_frame(serial, CMD_REQ_APP_DATA, data)
}
