//! Driver for the DFRobot ID01 UHF RFID reader on a serial bus.
//!
//! The crate is split in three layers:
//!
//! - [`frame`] - `0xA0 <len> <payload> <checksum>` encoding and validation
//! - [`CommandChannel`] - one blocking request/response exchange with echo
//!   correlation
//! - [`Id01Reader`] - the reader command set (version, buzzer, continuous
//!   reading, tag identification, tag memory read/write)
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use id01_rfid::{BuzzerMode, Id01Reader, MemoryBank, SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 9600)?;
//! let mut rfid = Id01Reader::new(transport);
//!
//! rfid.set_buzzer(BuzzerMode::Silent)?;
//! if let Some(epc) = rfid.request_tag_identification()? {
//!     println!("Found tag: {:04X?}", epc);
//!     let user = rfid.read_words_from_tag(MemoryBank::User, 0, 8)?;
//!     println!("User data: {:?}", user);
//! }
//! ```

mod channel;
pub mod frame;
mod reader;
mod transport;
mod types;

#[cfg(test)]
mod mock;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use channel::CommandChannel;
pub use frame::FrameError;
pub use reader::{DEFAULT_TIMEOUT, Id01Reader};
pub use transport::{DEFAULT_FRAME_GAP, RfidTransport};
pub use types::{BuzzerMode, MemoryBank, RfidError, parse_word_list};

#[cfg(feature = "uart-esp32")]
pub use uart::{UartConfig, UartTransport};

#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialTransport};
