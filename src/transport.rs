use std::time::Duration;

/// Idle time on the line that ends a reply frame, matching the reader's
/// 9600 baud framing.
pub const DEFAULT_FRAME_GAP: Duration = Duration::from_millis(3);

/// Trait for RFID reader communication backends.
/// Implement this trait for different transports (UART, serial port, etc.)
pub trait RfidTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read data from the transport with a timeout in milliseconds.
    /// Returns `Ok(0)` when nothing arrived before the timeout.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Silence that marks the end of an incoming frame
    fn frame_gap(&self) -> Duration {
        DEFAULT_FRAME_GAP
    }
}
