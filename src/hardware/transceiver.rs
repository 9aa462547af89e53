//! Byte source / command sink traits shared by the sensor ports

use crate::hardware::CommResult;

/// Non-blocking byte stream from a sensor.
///
/// The tracker never configures the transport (baud rate, pins); it only
/// drains whatever bytes are already available.
pub trait ByteSource {
    /// Move bytes waiting in the transport into the local buffer.
    /// Must return immediately when nothing is pending.
    fn refill(&mut self) -> CommResult<()> {
        Ok(())
    }

    /// Number of bytes that can be read without blocking
    fn bytes_available(&self) -> usize;

    /// Next buffered byte, `None` when the buffer is empty
    fn read_byte(&mut self) -> Option<u8>;
}

/// Outbound channel to a sensor (configuration / calibration commands)
pub trait CommandSink {
    fn write_all(&mut self, bytes: &[u8]) -> CommResult<()>;
}

/// A bidirectional sensor port owned by one reader thread
pub trait SensorPort: ByteSource + CommandSink + Send {}

impl<T: ByteSource + CommandSink + Send> SensorPort for T {}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn refill(&mut self) -> CommResult<()> {
        (**self).refill()
    }

    fn bytes_available(&self) -> usize {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> CommResult<()> {
        (**self).write_all(bytes)
    }
}

/// Port status information
#[derive(Debug, Clone, PartialEq)]
pub struct PortStatus {
    pub name: String,
    pub connected: bool,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub error_count: u32,
}

impl PortStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            bytes_received: 0,
            bytes_sent: 0,
            error_count: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.error_count < 10
    }
}
