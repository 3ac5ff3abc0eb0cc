//! Types for RFID operations

use thiserror::Error;

use crate::frame::FrameError;

/// Errors that can occur during RFID operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RfidError {
    /// Transport layer error (UART, serial, etc.)
    #[error("Transport error: {0}")]
    Transport(String),
    /// Invalid parameter passed to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// The reader stayed silent for the whole timeout
    #[error("No reply received from RFID reader, check wiring")]
    NoReply,
    /// The reply frame failed length or checksum validation
    #[error(transparent)]
    MalformedReply(#[from] FrameError),
    /// The reply does not echo the opcode and reserved byte of the query
    #[error("Reply does not match query (protocol error): expected {expected:02X?}, got {actual:02X?}")]
    Unsolicited { expected: Vec<u8>, actual: Vec<u8> },
    /// Well-framed reply too short to interpret for the command that was sent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The reader answered with a nonzero status byte
    #[error("{command} command rejected (status 0x{status:02X})")]
    CommandRejected { command: &'static str, status: u8 },
    /// No tag in front of the antenna, or the tag did not answer
    #[error("No EPC tag detected")]
    TagNotFound,
}

impl RfidError {
    /// True for faults on the bus itself (wiring, noise, a stray frame).
    ///
    /// `CommandRejected` and `TagNotFound` are normal outcomes a polling loop
    /// is expected to handle by rescanning.
    pub fn is_bus_fault(&self) -> bool {
        matches!(
            self,
            RfidError::Transport(_)
                | RfidError::NoReply
                | RfidError::MalformedReply(_)
                | RfidError::Unsolicited { .. }
        )
    }
}

/// Tag memory banks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    /// Kill and access passwords
    Reserved = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

impl MemoryBank {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MemoryBank {
    type Error = RfidError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MemoryBank::Reserved),
            0x01 => Ok(MemoryBank::Epc),
            0x02 => Ok(MemoryBank::Tid),
            0x03 => Ok(MemoryBank::User),
            _ => Err(RfidError::InvalidParameter(format!(
                "Unknown memory bank: 0x{:02X}",
                value
            ))),
        }
    }
}

/// Buzzer behaviour when a tag is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerMode {
    Silent,
    Beep,
    /// Any other mode byte understood by the firmware (values >= 1 beep)
    Raw(u8),
}

impl From<BuzzerMode> for u8 {
    fn from(mode: BuzzerMode) -> Self {
        match mode {
            BuzzerMode::Silent => 0x00,
            BuzzerMode::Beep => 0x01,
            BuzzerMode::Raw(value) => value,
        }
    }
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Parse a comma-separated list of decimal tag words, e.g. `"4660, 22136"`.
///
/// Surrounding whitespace is ignored. Empty entries and values that do not fit
/// in 16 bits are rejected.
pub fn parse_word_list(input: &str) -> Result<Vec<u16>, RfidError> {
    input
        .split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<u16>().map_err(|_| {
                RfidError::InvalidParameter(format!("Not a 16-bit decimal word: {:?}", item))
            })
        })
        .collect()
}
