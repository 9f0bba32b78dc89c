//! Serial Bridge Frame Codec
//!
//! This module defines the framing used between the host MCU and the bridge.
//! Frame format:
//!
//! ```text
//! :   2    :   1   :   1   :     N     :   1   :
//! : Header :  Type :  Len  :  Payload  :  Xor  :
//! : 0xAB   :
//! : 0x55   :
//! ```
//!
//! The trailing byte is the XOR of every preceding byte, so a well-formed
//! frame XORs to zero across its whole span. `N` is at most 250.

use heapless::Vec;

/// Two-byte sync pattern that starts every frame
pub const HEADER: [u8; 2] = [0xAB, 0x55];

/// Maximum payload length accepted on the wire
pub const MAX_PAYLOAD_SIZE: usize = 250;

/// Header (2) + type (1) + length (1) + checksum (1)
pub const FRAME_OVERHEAD: usize = 5;

/// Largest possible frame: 5 + 250
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

const TYPE_OFFSET: usize = 2;
const LEN_OFFSET: usize = 3;
const PAYLOAD_OFFSET: usize = 4;

/// Protocol error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Payload longer than `MAX_PAYLOAD_SIZE`
    PayloadTooLong,
    /// Destination buffer cannot hold the frame
    BufferTooSmall,
    /// Byte slice is not a single complete frame
    InvalidLength,
    /// Missing or wrong sync bytes
    InvalidHeader,
    /// Frame does not XOR to zero
    ChecksumMismatch,
}

/// XOR of all bytes
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a frame into `dest`, returning the number of bytes written.
///
/// `dest` must hold at least `5 + payload.len()` bytes. No shared state is
/// touched.
pub fn encode(dest: &mut [u8], frame_type: u8, payload: &[u8]) -> Result<usize, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLong);
    }

    let total = FRAME_OVERHEAD + payload.len();
    if dest.len() < total {
        return Err(ProtocolError::BufferTooSmall);
    }

    dest[0] = HEADER[0];
    dest[1] = HEADER[1];
    dest[TYPE_OFFSET] = frame_type;
    dest[LEN_OFFSET] = payload.len() as u8;
    dest[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    dest[total - 1] = checksum(&dest[..total - 1]);

    Ok(total)
}

/// Borrowed view of a complete, validated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap bytes already known to hold exactly one valid frame
    pub(crate) fn from_validated(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Type / command code byte
    #[inline]
    pub fn frame_type(&self) -> u8 {
        self.bytes[TYPE_OFFSET]
    }

    /// Declared payload length
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes[LEN_OFFSET] as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + self.len()]
    }

    #[inline]
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// The whole frame, header through checksum
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Why a frame was abandoned by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    /// Length byte above `MAX_PAYLOAD_SIZE`
    InvalidLength(u8),
    /// Frame bytes did not XOR to zero
    ChecksumMismatch,
}

/// Outcome of feeding one byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// No complete frame yet
    Incomplete,
    /// A complete frame that passed the checksum
    Complete(FrameView<'a>),
    /// The in-progress frame was dropped
    Rejected(RejectReason),
}

/// Decoder state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeState {
    WaitHeader,
    Type,
    Length,
    Payload,
    Checksum,
}

/// Incremental frame decoder
///
/// Consumes exactly one byte per [`FrameDecoder::feed`] call. Each instance
/// owns its working buffer, so independent streams need independent decoders.
pub struct FrameDecoder {
    state: DecodeState,
    buf: [u8; MAX_FRAME_SIZE],
    index: usize,
    remaining: u8,
    lookback: [u8; 2],
    lookback_len: usize,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: DecodeState::WaitHeader,
            buf: [0; MAX_FRAME_SIZE],
            index: 0,
            remaining: 0,
            lookback: [0; 2],
            lookback_len: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Drop any partial frame and header-scan progress
    pub fn reset(&mut self) {
        self.state = DecodeState::WaitHeader;
        self.index = 0;
        self.remaining = 0;
        self.lookback_len = 0;
    }

    /// Feed one byte from the stream
    pub fn feed(&mut self, byte: u8) -> Decoded<'_> {
        match self.state {
            DecodeState::WaitHeader => {
                if self.scan_header(byte) {
                    self.buf[0] = HEADER[0];
                    self.buf[1] = HEADER[1];
                    self.index = 2;
                    self.state = DecodeState::Type;
                }
                Decoded::Incomplete
            }
            DecodeState::Type => {
                self.store(byte);
                self.state = DecodeState::Length;
                Decoded::Incomplete
            }
            DecodeState::Length => {
                self.store(byte);
                if byte == 0 {
                    self.state = DecodeState::Checksum;
                } else if byte as usize > MAX_PAYLOAD_SIZE {
                    trace!("frame: invalid length {}", byte);
                    self.reset();
                    return Decoded::Rejected(RejectReason::InvalidLength(byte));
                } else {
                    self.remaining = byte;
                    self.state = DecodeState::Payload;
                }
                Decoded::Incomplete
            }
            DecodeState::Payload => {
                self.store(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = DecodeState::Checksum;
                }
                Decoded::Incomplete
            }
            DecodeState::Checksum => {
                self.store(byte);
                let len = self.index;
                self.reset();

                if checksum(&self.buf[..len]) == 0 {
                    Decoded::Complete(FrameView { bytes: &self.buf[..len] })
                } else {
                    trace!("frame: checksum mismatch over {} bytes", len);
                    Decoded::Rejected(RejectReason::ChecksumMismatch)
                }
            }
        }
    }

    #[inline]
    fn store(&mut self, byte: u8) {
        self.buf[self.index] = byte;
        self.index += 1;
    }

    /// Two-byte header window with carry-over of a trailing first sync byte
    fn scan_header(&mut self, byte: u8) -> bool {
        self.lookback[self.lookback_len] = byte;
        self.lookback_len += 1;

        if self.lookback_len < 2 {
            return false;
        }

        if self.lookback == HEADER {
            self.lookback_len = 0;
            return true;
        }

        if self.lookback[0] != HEADER[0] && self.lookback[1] == HEADER[0] {
            self.lookback[0] = self.lookback[1];
            self.lookback_len = 1;
        } else {
            self.lookback_len = 0;
        }

        false
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame
    pub fn new(frame_type: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        let payload = Vec::from_slice(payload).map_err(|_| ProtocolError::PayloadTooLong)?;
        Ok(Self { frame_type, payload })
    }

    /// Parse a byte slice that must contain exactly one frame
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < FRAME_OVERHEAD {
            return Err(ProtocolError::InvalidLength);
        }
        if data[..2] != HEADER {
            return Err(ProtocolError::InvalidHeader);
        }

        let len = data[LEN_OFFSET] as usize;
        if len > MAX_PAYLOAD_SIZE || data.len() != FRAME_OVERHEAD + len {
            return Err(ProtocolError::InvalidLength);
        }
        if checksum(data) != 0 {
            return Err(ProtocolError::ChecksumMismatch);
        }

        Self::new(data[TYPE_OFFSET], &data[PAYLOAD_OFFSET..PAYLOAD_OFFSET + len])
    }

    /// Serialize frame to bytes for transmission
    pub fn serialize(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, ProtocolError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let n = encode(&mut buffer, self.frame_type, &self.payload)?;
        Vec::from_slice(&buffer[..n]).map_err(|_| ProtocolError::BufferTooSmall)
    }
}

impl<'a> From<FrameView<'a>> for Frame {
    fn from(view: FrameView<'a>) -> Self {
        // A view never carries more than MAX_PAYLOAD_SIZE bytes
        let mut payload = Vec::new();
        let _ = payload.extend_from_slice(view.payload());
        Self {
            frame_type: view.frame_type(),
            payload,
        }
    }
}

/// Helpers for payload fields at explicit offsets
pub mod serialization {
    use super::ProtocolError;
    use heapless::Vec;

    pub fn write_u8<const N: usize>(buffer: &mut Vec<u8, N>, value: u8) -> Result<(), ProtocolError> {
        buffer.push(value).map_err(|_| ProtocolError::PayloadTooLong)
    }

    pub fn write_slice<const N: usize>(buffer: &mut Vec<u8, N>, data: &[u8]) -> Result<(), ProtocolError> {
        buffer.extend_from_slice(data).map_err(|_| ProtocolError::PayloadTooLong)
    }

    pub fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
        data.get(offset).copied()
    }
}
