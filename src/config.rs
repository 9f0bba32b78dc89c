//! Bridge configuration
//!
//! Compile-time tunables shared by the library and the firmware binary.

/// Transmit ring capacity in bytes
pub const RX_BUFFER_SIZE: usize = 512;

/// Period of the over-the-air drain task
pub const TICK_PERIOD_MS: u64 = 7;

/// Largest notification payload (default ATT MTU of 23 minus 3)
pub const CHUNK_SIZE: usize = 20;

/// Notifications queued per connection interval
pub const MAX_CHUNKS_PER_TICK: usize = 4;

/// Host UART baud rate
pub const UART_BAUDRATE: u32 = 115_200;

/// Depth of the decoded-frame queue between ingestion and dispatch
pub const ENVELOPE_QUEUE_DEPTH: usize = 4;

/// Version string reported to the host (sent with a trailing NUL)
pub const DEVICE_VERSION: &str = concat!("BLE-Bridge nRF52820 V", env!("CARGO_PKG_VERSION"));

/// Device name length carried by the rename command
pub const NAME_LEN: usize = 13;

/// Name advertised until the host renames the device
pub const DEFAULT_NAME: [u8; NAME_LEN] = *b"IOT--- SLBM05";

/// Selectable TX power levels in dBm, indexed by the power command
pub const TX_POWER_LEVELS_DBM: [i8; 4] = [-20, -8, 0, 4];

/// Transmit scheduler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxConfig {
    pub chunk_size: usize,
    pub max_chunks_per_tick: usize,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_chunks_per_tick: MAX_CHUNKS_PER_TICK,
        }
    }
}
