//! Command Processing Module
//!
//! This module handles all bridge commands received from the host.
//! Commands are routed to appropriate handlers and replies are framed and
//! written back to the serial link.
//!
//! Command code layout:
//!
//! ```text
//! :   7   :   6    :   5..4   :   3..0   :
//! : Type  :  Dir   :  Result  :  Command :
//! : 1=ack : 1=down : 01=fail  :          :
//! ```

use embedded_io::{Error as _, ErrorKind, Write};
use heapless::Vec;

use crate::core::memory::Envelope;
use crate::core::protocol::serialization::{write_slice, write_u8};
use crate::core::protocol::{encode, Frame, ProtocolError, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
use crate::core::ring_buffer::{RingBuffer, RingError};
use crate::state::{BridgeState, StateError, FULL_NAME_LEN};

pub mod data;
pub mod system;

/// Acknowledgement (1) or request (0)
pub const MASK_TYPE: u8 = 0x80;
/// Bridge to host (1) or host to bridge (0)
pub const MASK_DIR: u8 = 0x40;
/// Result bits
pub const MASK_RESULT: u8 = 0x30;
/// Command number
pub const MASK_CMD: u8 = 0x0F;

pub const VALUE_ACK: u8 = 0x80;
pub const VALUE_DOWN: u8 = 0x40;
pub const VALUE_FAILURE: u8 = 0x10;

/// Downstream data from the central to the host
pub const CMD_REQ_APP_DATA: u8 = VALUE_DOWN;

pub const CMD_ACK_SEND_DATA: u8 = ack_code(Command::SendData as u8);
pub const CMD_ACK_DEVICE_RESET: u8 = ack_code(Command::Reset as u8);
pub const CMD_ACK_DEVICE_VERSION: u8 = ack_code(Command::Version as u8);
pub const CMD_ACK_CHANGE_NAME: u8 = ack_code(Command::Name as u8);
pub const CMD_ACK_FLUSH_TX: u8 = ack_code(Command::FlushTx as u8);
pub const CMD_ACK_FLUSH_RX: u8 = ack_code(Command::FlushRx as u8);
pub const CMD_ACK_DEVICE_STATE: u8 = ack_code(Command::State as u8);
pub const CMD_ACK_DEVICE_POWER: u8 = ack_code(Command::Power as u8);

pub const CMD_ERR_SEND_DATA: u8 = error_code(Command::SendData as u8);
pub const CMD_ERR_CHANGE_NAME: u8 = error_code(Command::Name as u8);
pub const CMD_ERR_DEVICE_POWER: u8 = error_code(Command::Power as u8);

/// Success acknowledgement code for a command number
pub const fn ack_code(cmd: u8) -> u8 {
    VALUE_ACK | VALUE_DOWN | (cmd & MASK_CMD)
}

/// Failure acknowledgement code for a command number
pub const fn error_code(cmd: u8) -> u8 {
    VALUE_ACK | VALUE_DOWN | VALUE_FAILURE | (cmd & MASK_CMD)
}

/// Host requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    SendData = 0x00,
    Reset = 0x01,
    Version = 0x02,
    Name = 0x03,
    FlushTx = 0x04,
    FlushRx = 0x05,
    State = 0x06,
    Power = 0x07,
}

impl Command {
    /// Decode a request code (upstream, request, success bits all clear)
    pub fn from_code(code: u8) -> Option<Self> {
        if code & !MASK_CMD != 0 {
            return None;
        }
        match code {
            0x00 => Some(Self::SendData),
            0x01 => Some(Self::Reset),
            0x02 => Some(Self::Version),
            0x03 => Some(Self::Name),
            0x04 => Some(Self::FlushTx),
            0x05 => Some(Self::FlushRx),
            0x06 => Some(Self::State),
            0x07 => Some(Self::Power),
            _ => None,
        }
    }

    pub fn ack_code(self) -> u8 {
        ack_code(self as u8)
    }

    pub fn error_code(self) -> u8 {
        error_code(self as u8)
    }
}

/// Command processing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    UnknownCommand(u8),
    InvalidPayload,
    RingError(RingError),
    ProtocolError(ProtocolError),
    StateError(StateError),
    SoftDeviceError,
    /// Writing the reply to the host failed
    SerialError(ErrorKind),
}

impl From<RingError> for CommandError {
    fn from(err: RingError) -> Self {
        CommandError::RingError(err)
    }
}

impl From<ProtocolError> for CommandError {
    fn from(err: ProtocolError) -> Self {
        CommandError::ProtocolError(err)
    }
}

impl From<StateError> for CommandError {
    fn from(err: StateError) -> Self {
        CommandError::StateError(err)
    }
}

/// Hardware actions requested by the host
pub trait Device {
    /// Reset the chip; on target this does not return
    fn system_reset(&mut self);

    /// Apply a radio TX power level
    fn set_tx_power(&mut self, dbm: i8) -> Result<(), CommandError>;

    /// The advertised name changed and advertising data must be rebuilt
    fn name_changed(&mut self, _full_name: &[u8; FULL_NAME_LEN]) {}
}

/// Command response builder
pub struct ResponseBuilder {
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl ResponseBuilder {
    /// Create a new response builder
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn add_u8(&mut self, value: u8) -> Result<&mut Self, CommandError> {
        write_u8(&mut self.buffer, value)?;
        Ok(self)
    }

    pub fn add_slice(&mut self, data: &[u8]) -> Result<&mut Self, CommandError> {
        write_slice(&mut self.buffer, data)?;
        Ok(self)
    }

    /// Add a string followed by a NUL terminator
    pub fn add_cstr(&mut self, s: &str) -> Result<&mut Self, CommandError> {
        self.add_slice(s.as_bytes())?;
        self.add_u8(0)
    }

    /// Build the reply frame
    pub fn build(self, code: u8) -> Result<Frame, CommandError> {
        Ok(Frame::new(code, &self.buffer)?)
    }

    /// Reply with no payload
    pub fn build_empty(code: u8) -> Result<Frame, CommandError> {
        Self::new().build(code)
    }

    /// Reply carrying a single byte
    pub fn build_byte(code: u8, value: u8) -> Result<Frame, CommandError> {
        let mut builder = Self::new();
        builder.add_u8(value)?;
        builder.build(code)
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode and write one frame to the host
pub fn send_frame<W: Write>(serial: &mut W, code: u8, payload: &[u8]) -> Result<(), CommandError> {
    let mut buffer = [0u8; MAX_FRAME_SIZE];
    let len = encode(&mut buffer, code, payload)?;
    serial
        .write_all(&buffer[..len])
        .map_err(|e| CommandError::SerialError(e.kind()))
}

/// Handler outcome: a reply frame, or nothing to send
pub type Reply = Option<Frame>;

/// Process a command envelope and send its reply
///
/// Failed commands get their error acknowledgement written before the error
/// is returned.
pub fn process_command<const N: usize, D, W>(
    envelope: &Envelope,
    state: &mut BridgeState,
    ring: &mut RingBuffer<N>,
    device: &mut D,
    serial: &mut W,
) -> Result<(), CommandError>
where
    D: Device,
    W: Write,
{
    let code = envelope.frame_type();
    let payload = envelope.payload();

    let Some(command) = Command::from_code(code) else {
        warn!("Unknown command code: 0x{:02x}", code);
        send_frame(serial, error_code(code), &[])?;
        return Err(CommandError::UnknownCommand(code));
    };

    debug!("Processing command: {:?} ({} bytes)", command, payload.len());

    let reply = match command {
        Command::SendData => data::handle_send_data(payload, ring),
        Command::Reset => system::handle_reset(device),
        Command::Version => system::handle_version(),
        Command::Name => system::handle_name(payload, state, device),
        Command::FlushTx => data::handle_flush_tx(state),
        Command::FlushRx => data::handle_flush_rx(state),
        Command::State => system::handle_state(state),
        Command::Power => system::handle_power(payload, state, device),
    };

    match reply {
        Ok(Some(frame)) => send_frame(serial, frame.frame_type, &frame.payload),
        Ok(None) => Ok(()),
        Err(e) => {
            warn!("Command {:?} failed: {:?}", command, e);
            send_frame(serial, command.error_code(), &[])?;
            Err(e)
        }
    }
}
