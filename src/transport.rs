use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::info;
use serialport::SerialPort;

use crate::config::RadioConfig;
use crate::error::Result;

/// Bidirectional byte link between the pointer and the mount.
///
/// `receive` returns whatever has arrived, possibly nothing and possibly part of a frame.
pub trait Transport {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    fn receive(&mut self) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send(bytes)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        (**self).receive()
    }
}

/// Serial radio modem (XBee style) on a USB/UART port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    buf: [u8; 256],
}

impl SerialTransport {
    pub fn open(config: &RadioConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()?;
        info!(
            "radio link open on {} at {} baud",
            config.port, config.baud_rate
        );
        Ok(Self {
            port,
            buf: [0; 256],
        })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        match self.port.read(&mut self.buf) {
            Ok(n) => Ok(self.buf[..n].to_vec()),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
