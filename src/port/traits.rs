//! Core traits and configuration for the port abstraction.
//!
//! Defines the `PortIo` endpoint trait and the `PortOpener` factory trait that
//! allow real serial ports and mock implementations to be used
//! interchangeably, plus the typed `PortConfig` passed in by the host.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration parameters for a serial port.
///
/// The host's device-configuration collaborator supplies these; the port
/// layer does not validate them beyond passing them to the open call and
/// surfacing [`PortError::InvalidConfiguration`] on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits per character.
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Read/write timeout in milliseconds. This also bounds how quickly a
    /// blocked reader notices cancellation, so keep it short.
    pub timeout_ms: u64,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout_ms: 100,
        }
    }
}

impl PortConfig {
    /// The configured timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// One endpoint of an open port's duplex byte stream.
///
/// A blocked `read_chunk` must return within the port's configured timeout
/// (with a timeout-kind `Io` error) so that callers get a chance to poll
/// cancellation between reads.
pub trait PortIo: Send {
    /// Blocking read into `buffer`. `Ok(0)` signals end of stream.
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Blocking write of the whole buffer.
    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError>;
}

/// The pair of endpoints produced by opening a device.
///
/// Both halves refer to the same underlying device; handing them out
/// separately lets the reader and writer threads run without contending on a
/// single lock.
pub struct DuplexPort {
    pub read_half: Box<dyn PortIo>,
    pub write_half: Box<dyn PortIo>,
}

/// Factory that opens devices.
///
/// Lets a session run against real hardware ([`super::SystemOpener`]) or a
/// scripted mock ([`super::MockOpener`]) without caring which.
pub trait PortOpener: Send {
    /// Acquire the device at `path`, yielding its duplex endpoints.
    fn open(&self, path: &str, config: &PortConfig) -> Result<DuplexPort, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_serde_defaults() {
        let config: PortConfig = serde_json::from_str(r#"{"baud_rate": 9600}"#).unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.timeout_ms, 100);
    }

    #[test]
    fn test_conversions_into_serialport_types() {
        let bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(bits, serialport::DataBits::Seven);

        let parity: serialport::Parity = Parity::Even.into();
        assert_eq!(parity, serialport::Parity::Even);

        let stop: serialport::StopBits = StopBits::Two.into();
        assert_eq!(stop, serialport::StopBits::Two);

        let flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(flow, serialport::FlowControl::Hardware);
    }
}
