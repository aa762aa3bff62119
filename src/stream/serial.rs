//! stream/serial — `ByteStream` over a `serialport` port.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort, StopBits};

use super::{ByteStream, Connection, Connector, Parity, PortSettings};
use crate::error::{DeviceError, Result};
use crate::lock::try_lock_port;

/// Opens real serial ports (USB-serial interface cables, bound RFCOMM ttys).
#[derive(Debug, Clone)]
pub struct SerialConnector {
    lock_dir: PathBuf,
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self {
            lock_dir: std::env::temp_dir(),
        }
    }
}

impl SerialConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.lock_dir = dir.into();
        self
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self, port: &str, settings: &PortSettings) -> Result<Connection> {
        let lock = try_lock_port(&self.lock_dir, port)?;
        debug!("port lock {}", lock.path().display());

        let data_bits = match settings.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            n => {
                return Err(DeviceError::UnsupportedPortConfiguration(format!(
                    "{} data bits",
                    n
                )))
            }
        };
        let stop_bits = match settings.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            n => {
                return Err(DeviceError::UnsupportedPortConfiguration(format!(
                    "{} stop bits",
                    n
                )))
            }
        };
        let parity = match settings.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };

        let mut sp = serialport::new(port, settings.baud)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(settings.timeout)
            .open()
            .map_err(|e| map_open_error(port, e))?;

        sp.write_data_terminal_ready(settings.dtr)
            .map_err(|e| map_open_error(port, e))?;
        sp.write_request_to_send(settings.rts)
            .map_err(|e| map_open_error(port, e))?;

        info!(
            "opened {} at {} baud ({}{:?}{})",
            port, settings.baud, settings.data_bits, settings.parity, settings.stop_bits
        );
        Ok(Connection::new(port, Box::new(SerialStream { port: Some(sp) })).with_lock(lock))
    }
}

fn map_open_error(port: &str, e: serialport::Error) -> DeviceError {
    let what = format!("{}: {}", port, e.description);
    match e.kind {
        serialport::ErrorKind::NoDevice => DeviceError::PortNotFound(what),
        serialport::ErrorKind::InvalidInput => DeviceError::UnsupportedPortConfiguration(what),
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => DeviceError::PortNotFound(what),
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied)
        | serialport::ErrorKind::Io(io::ErrorKind::AddrInUse)
        | serialport::ErrorKind::Io(io::ErrorKind::WouldBlock) => DeviceError::PortInUse(what),
        serialport::ErrorKind::Io(kind) => DeviceError::Io(io::Error::new(kind, what)),
        serialport::ErrorKind::Unknown => DeviceError::Io(io::Error::new(io::ErrorKind::Other, what)),
    }
}

fn to_io(e: serialport::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.description)
}

struct SerialStream {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialStream {
    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl ByteStream for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        // serialport rejects a zero timeout on some platforms
        let t = timeout.max(Duration::from_millis(1));
        self.port()?.set_timeout(t).map_err(to_io)
    }

    fn set_dtr(&mut self, on: bool) -> io::Result<()> {
        self.port()?.write_data_terminal_ready(on).map_err(to_io)
    }

    fn set_rts(&mut self, on: bool) -> io::Result<()> {
        self.port()?.write_request_to_send(on).map_err(to_io)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port()?.clear(ClearBuffer::Input).map_err(to_io)
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut p) = self.port.take() {
            let _ = p.flush();
            debug!("serial port released");
        }
        Ok(())
    }
}
