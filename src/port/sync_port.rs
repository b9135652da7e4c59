//! Real serial port implementation over the `serialport` crate.
//!
//! The duplex split uses `try_clone`: both halves share one descriptor, so a
//! read in flight on one half never blocks a write issued on the other.

use super::error::PortError;
use super::traits::{DuplexPort, PortConfig, PortIo, PortOpener};
use std::io::{Read, Write};
use tracing::debug;

/// One half of a system serial port.
pub struct SystemPort {
    port: Box<dyn serialport::SerialPort>,
}

impl PortIo for SystemPort {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        self.port.write_all(data).map_err(PortError::Io)
    }
}

impl std::fmt::Debug for SystemPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPort")
            .field("name", &self.port.name())
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// Opens real devices through the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(&self, path: &str, config: &PortConfig) -> Result<DuplexPort, PortError> {
        let write_half = serialport::new(path, config.baud_rate)
            .data_bits(config.data_bits.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .flow_control(config.flow_control.into())
            .timeout(config.timeout())
            .open()
            .map_err(|e| map_open_error(path, e))?;

        let read_half = write_half
            .try_clone()
            .map_err(|e| map_open_error(path, e))?;

        debug!(path, baud = config.baud_rate, "serial port opened");

        Ok(DuplexPort {
            read_half: Box::new(SystemPort { port: read_half }),
            write_half: Box::new(SystemPort { port: write_half }),
        })
    }
}

fn map_open_error(path: &str, e: serialport::Error) -> PortError {
    match e.kind() {
        serialport::ErrorKind::InvalidInput => PortError::invalid_configuration(e.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            PortError::permission_denied(path)
        }
        _ => PortError::open_failed(e.to_string()),
    }
}
