use log::{debug, warn};
use std::time::Duration;

use crate::channel::CommandChannel;
use crate::frame::{self, MAX_PAYLOAD};
use crate::transport::RfidTransport;
use crate::types::{BuzzerMode, MemoryBank, RfidError, bytes_to_hex};

/// How long each command waits for the reader to answer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

// Status values
const STATUS_OK: u8 = 0x00;
const TAG_PRESENT: u8 = 0x01;

pub struct Id01Reader<T: RfidTransport> {
    channel: CommandChannel<T>,
    timeout: Duration,
}

impl<T: RfidTransport> Id01Reader<T> {
    // Second byte of every command, echoed back by the reader
    const RESERVED: u8 = 0x00;

    // Write modes
    const WRITE_MODE_EMPTY: u8 = 0x00;
    const WRITE_MODE_DATA: u8 = 0x01;

    // Command codes
    const GET_VERSION: u8 = 0x6A;
    const STOP_CONTINUOUS_READING: u8 = 0xA8;
    const START_CONTINUOUS_READING: u8 = 0x65;
    const SET_BUZZER: u8 = 0xB0;
    const IDENTIFY_TAG: u8 = 0x82;
    const READ_TAG_DATA: u8 = 0x80;
    const WRITE_TAG_DATA: u8 = 0x81;
    // Multi-tag mode, undocumented
    const RESTART_TAG_IDENTIFICATION: u8 = 0xFC;
    const RESTART_ACCESS_DATA: u8 = 0xFF;
    const ACCESS_DATA: u8 = 0xA6;

    /// Opcode, reserved, mode, bank, address and word count precede the data
    const WRITE_HEADER_LEN: usize = 6;
    /// Most words a single write frame can carry
    pub const MAX_WRITE_WORDS: usize = (MAX_PAYLOAD - Self::WRITE_HEADER_LEN) / 2;

    /// Create a new RFID reader instance with the given transport
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    /// Create a reader whose commands wait `timeout` for each reply
    pub fn with_timeout(transport: T, timeout: Duration) -> Self {
        Self {
            channel: CommandChannel::new(transport),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// The underlying request/response channel
    pub fn channel(&self) -> &CommandChannel<T> {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut CommandChannel<T> {
        &mut self.channel
    }

    /// Most recent failure, including "no tag detected" outcomes.
    /// See [`CommandChannel::last_error`].
    pub fn last_error(&self) -> Option<&RfidError> {
        self.channel.last_error()
    }

    pub fn last_error_message(&self) -> String {
        self.channel.last_error_message()
    }

    pub fn into_inner(self) -> T {
        self.channel.into_inner()
    }

    /// Get the reader software release as `"MAJOR.MINOR"` in hex, e.g. `"01.0A"`
    pub fn get_version(&mut self) -> Result<String, RfidError> {
        let reply = self.exec(&[Self::GET_VERSION, Self::RESERVED])?;
        match reply.as_slice() {
            [major, minor, ..] => Ok(format!("{:02X}.{:02X}", major, minor)),
            _ => self.fail(RfidError::InvalidResponse(format!(
                "Version reply too short: {}",
                bytes_to_hex(&reply)
            ))),
        }
    }

    /// Disable continuous tag detection, read only when requested to do so
    pub fn stop_continuous_reading(&mut self) -> Result<(), RfidError> {
        let reply = self.exec(&[Self::STOP_CONTINUOUS_READING, Self::RESERVED])?;
        self.expect_ok("stopContinuousReading", &reply)
    }

    /// Enable continuous tag detection (diagnosis with the buzzer)
    pub fn start_continuous_reading(&mut self) -> Result<(), RfidError> {
        let reply = self.exec(&[Self::START_CONTINUOUS_READING, Self::RESERVED])?;
        self.expect_ok("startContinuousReading", &reply)
    }

    /// Configure whether the reader beeps when it detects a tag
    pub fn set_buzzer(&mut self, mode: BuzzerMode) -> Result<(), RfidError> {
        let reply = self.exec(&[Self::SET_BUZZER, Self::RESERVED, mode.into()])?;
        self.expect_ok("setBuzzer", &reply)
    }

    /// Read the EPC identification of the tag in front of the antenna.
    ///
    /// Returns `Ok(None)` when no tag answered; that outcome is also kept as
    /// the last error.
    pub fn request_tag_identification(&mut self) -> Result<Option<Vec<u16>>, RfidError> {
        let reply = self.exec(&[Self::IDENTIFY_TAG, Self::RESERVED])?;
        let Some((&antenna, epc)) = reply.split_first() else {
            return self.fail(RfidError::InvalidResponse("Empty tag identification reply".into()));
        };

        if antenna != TAG_PRESENT {
            return Ok(self.tag_not_found());
        }

        let words = frame::words_from_be_bytes(epc);
        debug!("Tag detected: {:04X?}", words);
        Ok(Some(words))
    }

    /// Read `count` words from `bank` starting at word address `addr`.
    ///
    /// Typical addresses: 0-4 for the reserved bank, 2-7 for EPC, from 0 for user
    /// memory. Returns `Ok(None)` when no tag answered.
    pub fn read_words_from_tag(
        &mut self,
        bank: MemoryBank,
        addr: u8,
        count: u8,
    ) -> Result<Option<Vec<u16>>, RfidError> {
        let reply = self.exec(&[Self::READ_TAG_DATA, Self::RESERVED, bank.code(), addr, count])?;

        if reply.first() != Some(&bank.code()) {
            return Ok(self.tag_not_found());
        }

        // Bank echo followed by address and count echoes, then the data
        let words = frame::words_from_be_bytes(reply.get(3..).unwrap_or_default());
        if words.len() != count as usize {
            warn!("Asked for {} words from {:?}, got {}", count, bank, words.len());
        }
        Ok(Some(words))
    }

    /// Write `data` to `bank` starting at word address `addr`.
    ///
    /// An empty `data` is sent with write mode 0. Fails with
    /// [`RfidError::TagNotFound`] when no tag acknowledged the write.
    pub fn write_words_to_tag(
        &mut self,
        bank: MemoryBank,
        addr: u8,
        data: &[u16],
    ) -> Result<(), RfidError> {
        if data.len() > Self::MAX_WRITE_WORDS {
            return self.fail(RfidError::InvalidParameter(format!(
                "Too many words to write: {} (maximum: {})",
                data.len(),
                Self::MAX_WRITE_WORDS
            )));
        }

        let write_mode = if data.is_empty() {
            Self::WRITE_MODE_EMPTY
        } else {
            Self::WRITE_MODE_DATA
        };

        let mut command = Vec::with_capacity(Self::WRITE_HEADER_LEN + data.len() * 2);
        command.extend_from_slice(&[
            Self::WRITE_TAG_DATA,
            Self::RESERVED,
            write_mode,
            bank.code(),
            addr,
            data.len() as u8,
        ]);
        command.extend_from_slice(&frame::words_to_be_bytes(data));

        let reply = self.exec(&command)?;
        match reply.first() {
            Some(&STATUS_OK) => Ok(()),
            Some(_) => self.fail(RfidError::TagNotFound),
            None => self.fail(RfidError::InvalidResponse("Empty write reply".into())),
        }
    }

    /// Multi-tag mode: restart tag identification. The reply is passed
    /// through uninterpreted.
    pub fn restart_tag_identification(&mut self) -> Result<Vec<u8>, RfidError> {
        self.exec(&[Self::RESTART_TAG_IDENTIFICATION, Self::RESERVED])
    }

    /// Multi-tag mode: restart data access. The reply is passed through
    /// uninterpreted.
    pub fn restart_access_data(&mut self) -> Result<Vec<u8>, RfidError> {
        self.exec(&[Self::RESTART_ACCESS_DATA, Self::RESERVED])
    }

    /// Multi-tag mode: access data. The reply is passed through uninterpreted.
    pub fn access_data(&mut self) -> Result<Vec<u8>, RfidError> {
        self.exec(&[Self::ACCESS_DATA, Self::RESERVED])
    }

    fn exec(&mut self, command: &[u8]) -> Result<Vec<u8>, RfidError> {
        self.channel.send(command, self.timeout)
    }

    fn expect_ok(&mut self, command: &'static str, reply: &[u8]) -> Result<(), RfidError> {
        match reply.first() {
            Some(&STATUS_OK) => Ok(()),
            Some(&status) => self.fail(RfidError::CommandRejected { command, status }),
            None => self.fail(RfidError::InvalidResponse(format!("Empty {} reply", command))),
        }
    }

    fn tag_not_found<V>(&mut self) -> Option<V> {
        debug!("No EPC tag detected");
        self.channel.record(RfidError::TagNotFound);
        None
    }

    fn fail<V>(&mut self, error: RfidError) -> Result<V, RfidError> {
        Err(self.channel.record(error))
    }
}
