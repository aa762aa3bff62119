//! stream — the duplex byte channel the transports drive.
//!
//! - `ByteStream`   — open, readable+writable, closable channel (serial port, RFCOMM tty, test double).
//! - `PortSettings` — line configuration requested by a driver.
//! - `Connection`   — owns one stream for a session; closes it on Drop, on every exit path.
//! - `Connector`    — opens a `Connection` for a port name (`SerialConnector` for real ports).
//!
//! `read` returning Ok(0) means "nothing arrived within the receive timeout";
//! it is not end-of-stream.

pub mod serial;

use std::io;
use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::lock::PortLock;

pub use serial::SerialConnector;

pub trait ByteStream: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
    fn set_dtr(&mut self, _on: bool) -> io::Result<()> {
        Ok(())
    }
    fn set_rts(&mut self, _on: bool) -> io::Result<()> {
        Ok(())
    }
    /// Drop whatever is buffered on the receive side.
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }
    fn set_dtr(&mut self, on: bool) -> io::Result<()> {
        (**self).set_dtr(on)
    }
    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        (**self).set_rts(on)
    }
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub baud: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub timeout: Duration,
    pub dtr: bool,
    pub rts: bool,
}

impl PortSettings {
    /// 8N1 with both modem lines raised.
    pub fn new(baud: u32) -> Self {
        Self {
            baud,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            timeout: Duration::from_millis(1000),
            dtr: true,
            rts: true,
        }
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_lines(mut self, dtr: bool, rts: bool) -> Self {
        self.dtr = dtr;
        self.rts = rts;
        self
    }
}

/// Opens connections by port name.
pub trait Connector: Send {
    fn connect(&mut self, port: &str, settings: &PortSettings) -> Result<Connection>;
}

/// Exclusive owner of one open stream for the duration of a session.
pub struct Connection {
    name: String,
    inner: Option<Box<dyn ByteStream>>,
    _lock: Option<PortLock>,
}

impl Connection {
    pub fn new<S: Into<String>>(name: S, stream: Box<dyn ByteStream>) -> Self {
        Self {
            name: name.into(),
            inner: Some(stream),
            _lock: None,
        }
    }

    pub(crate) fn with_lock(mut self, lock: PortLock) -> Self {
        self._lock = Some(lock);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn stream(&mut self) -> io::Result<&mut Box<dyn ByteStream>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
    }
}

impl ByteStream for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream()?.write_all(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream()?.set_timeout(timeout)
    }
    fn set_dtr(&mut self, on: bool) -> io::Result<()> {
        self.stream()?.set_dtr(on)
    }
    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        self.stream()?.set_rts(on)
    }
    fn clear_input(&mut self) -> io::Result<()> {
        self.stream()?.clear_input()
    }

    /// Idempotent; the port lock is released together with the stream.
    fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(mut s) => {
                debug!("closing connection {}", self.name);
                let r = s.close();
                self._lock = None;
                r
            }
            None => Ok(()),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // close errors on drop are ignored
        let _ = self.close();
    }
}
