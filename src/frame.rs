//! ID01 frame encoder/decoder.
//!
//! Every message on the bus, in both directions, uses the same layout:
//!
//! ```text
//! 0xA0 <len> <payload...> <checksum>
//! ```
//!
//! - `len` counts the payload bytes plus the checksum byte
//! - `checksum` is the two's complement of the 8-bit sum of all preceding
//!   bytes, so a valid frame sums to zero
//!
//! Tag memory is exchanged as 16-bit words in big-endian order; the word
//! codec at the bottom of this module is shared by every command that carries
//! tag data.

use thiserror::Error;

/// First byte of every frame.
pub const PREFIX: u8 = 0xA0;

/// Largest payload that still fits the one-byte length field.
pub const MAX_PAYLOAD: usize = 254;

/// Prefix, length and checksum bytes wrapped around each payload.
pub const FRAME_OVERHEAD: usize = 3;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The payload does not fit the one-byte length field.
    #[error("Payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The number of bytes received disagrees with the length field.
    #[error("Invalid RFID reply length (communication error): expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The bytes do not sum to zero.
    #[error("Invalid RFID reply checksum (communication error): sum 0x{sum:02X}")]
    ChecksumMismatch { sum: u8 },
}

/// Checksum byte for the given frame prefix, length and payload bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)).wrapping_neg()
}

/// Wrap a command payload into a complete frame.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.push(PREFIX);
    frame.push((payload.len() + 1) as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    Ok(frame)
}

/// Validate a received frame and return its payload.
///
/// The prefix byte is not checked on its own; it takes part in the checksum.
pub fn decode(frame: &[u8]) -> Result<&[u8], FrameError> {
    let expected = match frame.get(1) {
        Some(&len) => len as usize + 2,
        None => {
            return Err(FrameError::LengthMismatch {
                expected: 2,
                actual: frame.len(),
            });
        }
    };
    if frame.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: frame.len(),
        });
    }

    let sum = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    if sum != 0 {
        return Err(FrameError::ChecksumMismatch { sum });
    }

    Ok(&frame[2..frame.len() - 1])
}

/// Total size of the frame whose first bytes are in `buf`, once the length
/// byte has arrived.
pub(crate) fn expected_len(buf: &[u8]) -> Option<usize> {
    buf.get(1).map(|&len| len as usize + 2)
}

/// Assemble big-endian words from pairs of bytes. A trailing odd byte is ignored.
pub fn words_from_be_bytes(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Split words into big-endian byte pairs.
pub fn words_to_be_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
