#![cfg_attr(not(test), no_std)]

//! nRF52820 S140 BLE Serial Bridge Library
//!
//! Bridges a host MCU on a UART to a BLE central. This library provides the
//! core functionality for the bridge firmware, organized into clear layers:
//!
//! - `core`: System infrastructure (frame codec, ring buffer, memory, transport)
//! - `serial`: Serial ingestion loop feeding the frame decoder
//! - `commands`: Host command dispatch
//! - `transmit`: Periodic over-the-air drain with credit acknowledgements
//! - `ble`: GAP state and downstream data glue
//!
//! Everything except the firmware binary builds on the host.

// Logging macros are textually scoped, so this must stay first
#[macro_use]
mod fmt;

pub mod ble;
pub mod commands;
pub mod config;
pub mod core;
pub mod serial;
pub mod state;
pub mod transmit;
