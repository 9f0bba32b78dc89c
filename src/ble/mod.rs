//! BLE Glue
//!
//! Connects the GAP role and the bridge GATT service to the host link:
//! - `events`: GAP state reports, downstream app data and the boot
//!   announcement, all host-testable
//! - `server`: the SoftDevice GATT service and its notification link
//!   (firmware only)

pub mod events;
#[cfg(feature = "firmware")]
pub mod server;

/// Bridge service
pub const SERVICE_UUID16: u16 = 0xFFF0;
/// Central writes `[len, data..]` here for the host
pub const RX_CHAR_UUID16: u16 = 0xFFF3;
/// Host data is notified to the central here
pub const TX_CHAR_UUID16: u16 = 0xFFF4;

/// Value size of both bridge characteristics
pub const CHAR_VALUE_LEN: usize = 20;
