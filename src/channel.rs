//! Request/response primitive shared by every reader command.
//!
//! The ID01 sits on a half-duplex bus and answers each query with exactly one
//! frame whose payload starts with the opcode and reserved byte of the query.
//! [`CommandChannel::send`] wraps one such exchange: encode, write, wait,
//! decode and check the echo.

use log::{debug, error, warn};
use std::time::{Duration, Instant};

use crate::frame;
use crate::transport::RfidTransport;
use crate::types::{RfidError, bytes_to_hex};

/// Bytes at the start of each reply that repeat the query.
const ECHO_LEN: usize = 2;

/// Owns the transport and performs one blocking exchange per call.
pub struct CommandChannel<T: RfidTransport> {
    transport: T,
    last_error: Option<RfidError>,
}

impl<T: RfidTransport> CommandChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            last_error: None,
        }
    }

    /// Send one command and return the reply payload without its echo bytes.
    ///
    /// Blocks for at most `timeout` waiting for the first reply byte. There is
    /// no retry: a silent reader yields [`RfidError::NoReply`] and the caller
    /// decides whether to resend. Every failure is also kept as the
    /// [last error](Self::last_error).
    pub fn send(&mut self, command: &[u8], timeout: Duration) -> Result<Vec<u8>, RfidError> {
        self.transact(command, timeout).map_err(|e| self.record(e))
    }

    /// Most recent failure seen on this channel, if any.
    ///
    /// A success does not clear it, so it may describe an earlier call. Check
    /// the `Result` of the call you made when that matters.
    pub fn last_error(&self) -> Option<&RfidError> {
        self.last_error.as_ref()
    }

    /// [`last_error`](Self::last_error) rendered for display, `"No error"` before any failure.
    pub fn last_error_message(&self) -> String {
        match &self.last_error {
            Some(e) => e.to_string(),
            None => "No error".to_string(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back, e.g. to close the port.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Remember `error` as the last error and hand it back.
    pub(crate) fn record(&mut self, error: RfidError) -> RfidError {
        self.last_error = Some(error.clone());
        error
    }

    fn transact(&mut self, command: &[u8], timeout: Duration) -> Result<Vec<u8>, RfidError> {
        if command.len() < ECHO_LEN {
            return Err(RfidError::InvalidParameter(format!(
                "Command needs an opcode and a reserved byte, got {} bytes",
                command.len()
            )));
        }
        let request = frame::encode(command).map_err(|e| RfidError::InvalidParameter(e.to_string()))?;

        let reply = self.exchange(&request, timeout)?;
        if reply.is_empty() {
            warn!("No reply to command 0x{:02X} within {:?}", command[0], timeout);
            return Err(RfidError::NoReply);
        }

        let payload = frame::decode(&reply).map_err(|e| {
            warn!("Malformed reply {}: {}", bytes_to_hex(&reply), e);
            RfidError::from(e)
        })?;

        if payload.len() < ECHO_LEN || payload[..ECHO_LEN] != command[..ECHO_LEN] {
            warn!(
                "Reply {} does not echo command {}",
                bytes_to_hex(payload),
                bytes_to_hex(&command[..ECHO_LEN])
            );
            return Err(RfidError::Unsolicited {
                expected: command[..ECHO_LEN].to_vec(),
                actual: payload[..payload.len().min(ECHO_LEN)].to_vec(),
            });
        }

        Ok(payload[ECHO_LEN..].to_vec())
    }

    /// Write one frame and collect the reply.
    ///
    /// Waits up to `timeout` for the first bytes, then keeps reading until the
    /// line goes quiet for the transport's frame gap or the length byte says
    /// the frame is complete. Returns an empty vector if nothing arrived.
    fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, RfidError> {
        self.transport.clear_input().map_err(transport_error)?;
        debug!("Sending frame: {}", bytes_to_hex(request));
        let written = self.transport.write(request).map_err(transport_error)?;
        debug!("Wrote {} bytes", written);

        let deadline = Instant::now() + timeout;
        let gap_ms = millis(self.transport.frame_gap());
        let mut reply = Vec::new();
        let mut buf = [0u8; 256];
        let mut polled = false;

        loop {
            let wait_ms = if reply.is_empty() {
                // A reply already buffered is picked up even with a zero timeout
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() && polled {
                    break;
                }
                polled = true;
                millis(remaining)
            } else {
                gap_ms
            };

            let bytes_read = self.transport.read(&mut buf, wait_ms).map_err(transport_error)?;
            if bytes_read == 0 {
                if reply.is_empty() {
                    continue;
                }
                break;
            }
            reply.extend_from_slice(&buf[..bytes_read]);

            if frame::expected_len(&reply).is_some_and(|len| reply.len() >= len) {
                break;
            }
        }

        debug!("Received {} bytes: {}", reply.len(), bytes_to_hex(&reply));
        Ok(reply)
    }
}

fn transport_error<E: std::fmt::Debug>(e: E) -> RfidError {
    error!("Transport error: {:?}", e);
    RfidError::Transport(format!("{:?}", e))
}

/// Whole milliseconds, at least 1 so a read never degenerates into a poll.
fn millis(duration: Duration) -> u32 {
    duration.as_millis().clamp(1, u32::MAX as u128) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameError;
    use crate::mock::MockTransport;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_send_strips_echo() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0x6A, 0x00, 0x01, 0x02]);
        let mut channel = CommandChannel::new(transport);

        assert_eq!(channel.send(&[0x6A, 0x00], TIMEOUT).unwrap(), [0x01, 0x02]);
        assert_eq!(channel.transport().sent(), [vec![0xA0, 0x02, 0x6A, 0x00, 0xF4]]);
        assert!(channel.last_error().is_none());
        assert_eq!(channel.last_error_message(), "No error");
    }

    #[test]
    fn test_send_reply_in_chunks() {
        let mut transport = MockTransport::new();
        transport.reply_chunked(&frame::encode(&[0x82, 0x00, 0x01, 0x12, 0x34]).unwrap(), 2);
        let mut channel = CommandChannel::new(transport);

        assert_eq!(channel.send(&[0x82, 0x00], TIMEOUT).unwrap(), [0x01, 0x12, 0x34]);
    }

    #[test]
    fn test_send_no_reply() {
        let mut channel = CommandChannel::new(MockTransport::new());

        assert_eq!(channel.send(&[0x6A, 0x00], TIMEOUT), Err(RfidError::NoReply));
        assert_eq!(channel.last_error(), Some(&RfidError::NoReply));
        assert_eq!(
            channel.last_error_message(),
            "No reply received from RFID reader, check wiring"
        );
    }

    #[test]
    fn test_send_zero_timeout_reads_buffered_reply() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0x6A, 0x00, 0x01, 0x02]);
        let mut channel = CommandChannel::new(transport);

        assert_eq!(channel.send(&[0x6A, 0x00], Duration::ZERO).unwrap(), [0x01, 0x02]);
    }

    #[test]
    fn test_send_zero_timeout_no_reply() {
        let mut channel = CommandChannel::new(MockTransport::new());

        assert_eq!(channel.send(&[0x6A, 0x00], Duration::ZERO), Err(RfidError::NoReply));
    }

    #[test]
    fn test_send_bad_checksum() {
        let mut transport = MockTransport::new();
        transport.reply_raw(&[0xA0, 0x02, 0x6A, 0x00, 0xF5]);
        let mut channel = CommandChannel::new(transport);

        let result = channel.send(&[0x6A, 0x00], TIMEOUT);
        assert_eq!(
            result,
            Err(RfidError::MalformedReply(FrameError::ChecksumMismatch { sum: 0x01 }))
        );
        assert!(result.unwrap_err().is_bus_fault());
    }

    #[test]
    fn test_send_bad_length() {
        let mut transport = MockTransport::new();
        transport.reply_raw(&[0xA0, 0x06, 0x6A, 0x00, 0xF0]);
        let mut channel = CommandChannel::new(transport);

        assert!(matches!(
            channel.send(&[0x6A, 0x00], TIMEOUT),
            Err(RfidError::MalformedReply(FrameError::LengthMismatch { expected: 8, actual: 5 }))
        ));
    }

    #[test]
    fn test_send_unsolicited_reserved_byte() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0x6A, 0x01, 0x01, 0x02]);
        let mut channel = CommandChannel::new(transport);

        assert_eq!(
            channel.send(&[0x6A, 0x00], TIMEOUT),
            Err(RfidError::Unsolicited {
                expected: vec![0x6A, 0x00],
                actual: vec![0x6A, 0x01],
            })
        );
        assert!(channel.last_error_message().starts_with("Reply does not match query"));
    }

    #[test]
    fn test_send_unsolicited_opcode() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0x82, 0x00, 0x01]);
        let mut channel = CommandChannel::new(transport);

        assert!(matches!(
            channel.send(&[0x6A, 0x00], TIMEOUT),
            Err(RfidError::Unsolicited { .. })
        ));
    }

    #[test]
    fn test_send_reply_shorter_than_echo() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0x6A]);
        let mut channel = CommandChannel::new(transport);

        assert_eq!(
            channel.send(&[0x6A, 0x00], TIMEOUT),
            Err(RfidError::Unsolicited {
                expected: vec![0x6A, 0x00],
                actual: vec![0x6A],
            })
        );
    }

    #[test]
    fn test_send_command_too_short() {
        let mut channel = CommandChannel::new(MockTransport::new());

        assert!(matches!(
            channel.send(&[0x6A], TIMEOUT),
            Err(RfidError::InvalidParameter(_))
        ));
        assert!(channel.transport().sent().is_empty());
    }

    #[test]
    fn test_send_command_too_long() {
        let mut channel = CommandChannel::new(MockTransport::new());

        let command = vec![0x81; frame::MAX_PAYLOAD + 1];
        assert!(matches!(
            channel.send(&command, TIMEOUT),
            Err(RfidError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_send_transport_failure() {
        let mut transport = MockTransport::new();
        transport.fail_next_write();
        let mut channel = CommandChannel::new(transport);

        assert!(matches!(
            channel.send(&[0x6A, 0x00], TIMEOUT),
            Err(RfidError::Transport(_))
        ));
    }

    #[test]
    fn test_last_error_survives_success() {
        let mut transport = MockTransport::new();
        transport.reply_none();
        transport.reply_payload(&[0x6A, 0x00, 0x01, 0x02]);
        let mut channel = CommandChannel::new(transport);

        assert!(channel.send(&[0x6A, 0x00], TIMEOUT).is_err());
        assert!(channel.send(&[0x6A, 0x00], TIMEOUT).is_ok());
        assert_eq!(channel.last_error(), Some(&RfidError::NoReply));
    }

    #[test]
    fn test_clears_input_before_each_command() {
        let mut transport = MockTransport::new();
        transport.reply_payload(&[0xA8, 0x00, 0x00]);
        let mut channel = CommandChannel::new(transport);

        channel.send(&[0xA8, 0x00], TIMEOUT).unwrap();
        assert_eq!(channel.transport().clear_count(), 1);
    }
}
