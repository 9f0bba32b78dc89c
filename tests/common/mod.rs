//! Common test utilities shared by the host integration tests
//!
//! - Frame builders and a frame splitter for captured serial output
//! - Recording radio link and device doubles

#![allow(dead_code)]

use ble_bridge::commands::{CommandError, Device};
use ble_bridge::core::memory::Envelope;
use ble_bridge::core::protocol::{encode, Decoded, FrameDecoder, MAX_FRAME_SIZE};
use ble_bridge::state::FULL_NAME_LEN;
use ble_bridge::transmit::{RadioLink, TransmitError};

/// Encode one frame into an owned byte vector
pub fn frame_bytes(frame_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buffer = [0u8; MAX_FRAME_SIZE];
    let n = encode(&mut buffer, frame_type, payload).unwrap();
    buffer[..n].to_vec()
}

/// Wrap a request as the dispatcher receives it
pub fn envelope(frame_type: u8, payload: &[u8]) -> Envelope {
    let bytes = frame_bytes(frame_type, payload);
    let mut decoder = FrameDecoder::new();
    for &b in &bytes {
        if let Decoded::Complete(frame) = decoder.feed(b) {
            return Envelope::from_frame(frame);
        }
    }
    panic!("frame did not decode");
}

/// Split captured serial output into `(type, payload)` pairs
pub fn decode_all(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for &b in bytes {
        if let Decoded::Complete(frame) = decoder.feed(b) {
            frames.push((frame.frame_type(), frame.payload().to_vec()));
        }
    }
    frames
}

/// Radio link that records notifications and can refuse after a budget
#[derive(Default)]
pub struct RecordingLink {
    pub sent: Vec<Vec<u8>>,
    /// Refuse every notification after this many succeeded
    pub accept_limit: Option<usize>,
}

impl RecordingLink {
    pub fn accepting(limit: usize) -> Self {
        Self {
            sent: Vec::new(),
            accept_limit: Some(limit),
        }
    }

    pub fn delivered(&self) -> Vec<u8> {
        self.sent.concat()
    }
}

impl RadioLink for RecordingLink {
    fn notify(&mut self, chunk: &[u8]) -> Result<(), TransmitError> {
        if self.accept_limit.is_some_and(|limit| self.sent.len() >= limit) {
            return Err(TransmitError::Busy);
        }
        self.sent.push(chunk.to_vec());
        Ok(())
    }
}

/// Device double recording requested actions
#[derive(Default)]
pub struct MockDevice {
    pub resets: usize,
    pub tx_power: Option<i8>,
    pub advertised_name: Option<[u8; FULL_NAME_LEN]>,
    pub fail_tx_power: bool,
}

impl Device for MockDevice {
    fn system_reset(&mut self) {
        self.resets += 1;
    }

    fn set_tx_power(&mut self, dbm: i8) -> Result<(), CommandError> {
        if self.fail_tx_power {
            return Err(CommandError::SoftDeviceError);
        }
        self.tx_power = Some(dbm);
        Ok(())
    }

    fn name_changed(&mut self, full_name: &[u8; FULL_NAME_LEN]) {
        self.advertised_name = Some(*full_name);
    }
}
