//! Serial port transport for desktop using serialport crate

use log::info;
use serialport::{DataBits, Parity, StopBits};
use std::io::ErrorKind;
use std::time::Duration;

use crate::transport::{DEFAULT_FRAME_GAP, RfidTransport};

/// Line settings for the reader's bus.
///
/// Defaults match the ID01 factory setup, 9600 baud 8N1, with replies
/// delimited by 3 ms of silence.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub frame_gap: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            frame_gap: DEFAULT_FRAME_GAP,
        }
    }
}

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    frame_gap: Duration,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate`, 8N1
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        Self::with_config(
            port_name,
            &SerialConfig {
                baud_rate,
                ..SerialConfig::default()
            },
        )
    }

    pub fn with_config(port_name: &str, config: &SerialConfig) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .timeout(Duration::from_secs(1))
            .open()?;
        port.clear(serialport::ClearBuffer::Input)?;
        info!(
            "Opened {} at {} baud ({:?}, {:?}, {:?})",
            port_name, config.baud_rate, config.data_bits, config.parity, config.stop_bits
        );

        Ok(Self {
            port,
            frame_gap: config.frame_gap,
        })
    }
}

impl RfidTransport for SerialTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write_all(&mut self.port, data)?;
        std::io::Write::flush(&mut self.port)?;
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.port
            .set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(std::io::Error::other)?;
        match std::io::Read::read(&mut self.port, buf) {
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::other)
    }

    fn frame_gap(&self) -> Duration {
        self.frame_gap
    }
}
