//! Core System Infrastructure
//!
//! Provides fundamental system services that are not BLE-specific.
//! This includes the wire frame codec, the transmit ring buffer, memory
//! management and the serial transport boundary.

pub mod memory;
pub mod protocol;
pub mod ring_buffer;
pub mod transport;
