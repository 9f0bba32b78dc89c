//! Bridge State
//!
//! Everything the dispatcher, the transmit scheduler and the BLE glue share:
//! - GAP role state reported to the host
//! - Connection flag gating over-the-air transmission
//! - Pending flush-TX acknowledgement
//! - Advertised name, address suffix and TX power

use crate::config::{DEFAULT_NAME, NAME_LEN, TX_POWER_LEVELS_DBM};

/// Length of the `-XXXXXX` address suffix
pub const SUFFIX_LEN: usize = 7;

/// Name plus suffix, as advertised and as acknowledged to the host
pub const FULL_NAME_LEN: usize = NAME_LEN + SUFFIX_LEN;

/// GAP peripheral role states, numbered as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GapState {
    Init = 0,
    Started = 1,
    Advertising = 2,
    Waiting = 3,
    WaitingAfterTimeout = 4,
    Connected = 5,
    ConnectedAdvertising = 6,
    Error = 7,
}

impl GapState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Started),
            2 => Some(Self::Advertising),
            3 => Some(Self::Waiting),
            4 => Some(Self::WaitingAfterTimeout),
            5 => Some(Self::Connected),
            6 => Some(Self::ConnectedAdvertising),
            7 => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// State errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateError {
    /// Name is not exactly `NAME_LEN` bytes
    InvalidNameLength(usize),
    /// Power index outside the level table
    InvalidPowerIndex(u8),
}

/// Shared bridge state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeState {
    system_state: GapState,
    /// A central is connected and notifications may be sent
    pub connected: bool,
    /// Host asked for a flush-TX acknowledgement on the next tick
    pub flush_tx_pending: bool,
    name: [u8; NAME_LEN],
    suffix: [u8; SUFFIX_LEN],
    tx_power_dbm: i8,
}

impl BridgeState {
    pub const fn new() -> Self {
        Self {
            system_state: GapState::Init,
            connected: false,
            flush_tx_pending: false,
            name: DEFAULT_NAME,
            suffix: *b"-000000",
            tx_power_dbm: 0,
        }
    }

    pub fn system_state(&self) -> GapState {
        self.system_state
    }

    /// Record a GAP role transition and update the connection flag
    pub fn set_system_state(&mut self, state: GapState) {
        self.system_state = state;
        match state {
            GapState::Advertising => self.connected = false,
            GapState::Connected => self.connected = true,
            _ => {}
        }
    }

    pub fn name(&self) -> &[u8; NAME_LEN] {
        &self.name
    }

    /// Replace the advertised name
    pub fn set_name(&mut self, name: &[u8]) -> Result<(), StateError> {
        self.name = name
            .try_into()
            .map_err(|_| StateError::InvalidNameLength(name.len()))?;
        Ok(())
    }

    /// Restore the factory name
    pub fn reset_name(&mut self) {
        self.name = DEFAULT_NAME;
    }

    /// Derive the `-XXXXXX` suffix from a little-endian device address
    ///
    /// Uses the three most significant bytes, upper-case hex.
    pub fn set_address(&mut self, addr: &[u8; 6]) {
        self.suffix = address_suffix(addr);
    }

    pub fn suffix(&self) -> &[u8; SUFFIX_LEN] {
        &self.suffix
    }

    /// Name followed by the address suffix
    pub fn full_name(&self) -> [u8; FULL_NAME_LEN] {
        let mut out = [0u8; FULL_NAME_LEN];
        out[..NAME_LEN].copy_from_slice(&self.name);
        out[NAME_LEN..].copy_from_slice(&self.suffix);
        out
    }

    pub fn tx_power_dbm(&self) -> i8 {
        self.tx_power_dbm
    }

    /// Select a TX power level by index, returning its dBm value
    pub fn select_tx_power(&mut self, index: u8) -> Result<i8, StateError> {
        let dbm = *TX_POWER_LEVELS_DBM
            .get(index as usize)
            .ok_or(StateError::InvalidPowerIndex(index))?;
        self.tx_power_dbm = dbm;
        Ok(dbm)
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}

/// `-` followed by hex of `addr[5]`, `addr[4]`, `addr[3]`
pub fn address_suffix(addr: &[u8; 6]) -> [u8; SUFFIX_LEN] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = [b'-'; SUFFIX_LEN];
    for (i, byte) in addr[3..].iter().rev().enumerate() {
        out[1 + i * 2] = HEX[(byte >> 4) as usize];
        out[2 + i * 2] = HEX[(byte & 0x0F) as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_suffix() {
        let addr = [0x11, 0x22, 0x33, 0xC4, 0x5D, 0xE6];
        assert_eq!(&address_suffix(&addr), b"-E65DC4");
    }

    #[test]
    fn test_connection_flag_follows_gap_state() {
        let mut state = BridgeState::new();
        state.set_system_state(GapState::Connected);
        assert!(state.connected);

        state.set_system_state(GapState::Waiting);
        assert!(state.connected);

        state.set_system_state(GapState::Advertising);
        assert!(!state.connected);
    }
}
