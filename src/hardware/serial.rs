//! Serial/UART port adapter
//!
//! Wraps a transport opened elsewhere (a serial device configured with a
//! short read timeout, a TCP bridge, a replay file) and exposes it as a
//! non-blocking [`ByteSource`] / [`CommandSink`].

use crate::hardware::{ByteSource, CommError, CommResult, CommandSink, PortStatus};
use log::warn;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};

/// Bytes pulled from the transport per refill
const READ_CHUNK: usize = 256;

/// Upper bound on locally buffered, not yet decoded bytes
const MAX_BUFFERED: usize = 4096;

pub struct StreamPort<T> {
    inner: T,
    status: PortStatus,
    read_buffer: VecDeque<u8>,
    eof: bool,
}

impl<T: Read + Write> StreamPort<T> {
    pub fn new(name: impl Into<String>, inner: T) -> Self {
        let mut status = PortStatus::new(name);
        status.connected = true;
        Self {
            inner,
            status,
            read_buffer: VecDeque::with_capacity(MAX_BUFFERED),
            eof: false,
        }
    }

    pub fn status(&self) -> &PortStatus {
        &self.status
    }

    /// True once the transport reported end of stream (replay finished)
    pub fn is_exhausted(&self) -> bool {
        self.eof && self.read_buffer.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn io_error(&mut self, err: std::io::Error) -> CommError {
        self.status.error_count += 1;
        CommError::Io {
            port: self.status.name.clone(),
            details: err.to_string(),
        }
    }
}

impl<T: Read + Write> ByteSource for StreamPort<T> {
    fn refill(&mut self) -> CommResult<()> {
        if self.eof {
            return Ok(());
        }
        if !self.status.connected {
            return Err(CommError::NotConnected { port: self.status.name.clone() });
        }

        let mut chunk = [0u8; READ_CHUNK];
        match self.inner.read(&mut chunk) {
            Ok(0) => {
                self.eof = true;
                Ok(())
            }
            Ok(n) => {
                self.status.bytes_received += n as u64;
                self.read_buffer.extend(&chunk[..n]);
                let overflow = self.read_buffer.len().saturating_sub(MAX_BUFFERED);
                if overflow > 0 {
                    warn!("{}: dropping {} buffered bytes", self.status.name, overflow);
                    self.read_buffer.drain(..overflow);
                }
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn bytes_available(&self) -> usize {
        self.read_buffer.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.read_buffer.pop_front()
    }
}

impl<T: Read + Write> CommandSink for StreamPort<T> {
    fn write_all(&mut self, bytes: &[u8]) -> CommResult<()> {
        if !self.status.connected {
            return Err(CommError::NotConnected { port: self.status.name.clone() });
        }
        if let Err(e) = self.inner.write_all(bytes).and_then(|_| self.inner.flush()) {
            return Err(self.io_error(e));
        }
        self.status.bytes_sent += bytes.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_refill_and_read() {
        let data = b"$GPHDT,12.5,T*00\r\n".to_vec();
        let mut port = StreamPort::new("gnss", Cursor::new(data.clone()));
        assert_eq!(port.bytes_available(), 0);

        port.refill().unwrap();
        assert_eq!(port.bytes_available(), data.len());
        assert_eq!(port.read_byte(), Some(b'$'));
        assert_eq!(port.status().bytes_received, data.len() as u64);

        // End of stream is not an error
        port.refill().unwrap();
        while port.read_byte().is_some() {}
        port.refill().unwrap();
        assert!(port.is_exhausted());
    }

    #[test]
    fn test_write_records_bytes() {
        let mut port = StreamPort::new("seaker", Cursor::new(Vec::new()));
        port.write_all(b"$CONFIG*00\r\n").unwrap();
        assert_eq!(port.status().bytes_sent, 12);
        assert_eq!(port.into_inner().into_inner(), b"$CONFIG*00\r\n".to_vec());
    }

    struct WouldBlock;

    impl Read for WouldBlock {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::WouldBlock, "no data"))
        }
    }

    impl Write for WouldBlock {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_would_block_is_empty_read() {
        let mut port = StreamPort::new("seaker", WouldBlock);
        assert!(port.refill().is_ok());
        assert_eq!(port.bytes_available(), 0);

        let err = port.write_all(b"x").unwrap_err();
        assert!(matches!(err, CommError::Io { .. }));
        assert_eq!(port.status().error_count, 1);
    }
}
