//! Scriptable in-memory port for tests.
//!
//! `MockPort` plays back a script of read events (data, end-of-stream,
//! faults) and records every write. Clones share state, so a test keeps one
//! clone to script and inspect while the session drives the duplex halves
//! handed out by `MockOpener`.

use super::error::PortError;
use super::traits::{DuplexPort, PortConfig, PortIo, PortOpener};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// A single step of the mock's read script.
#[derive(Debug)]
pub enum ReadStep {
    /// Deliver these bytes. If the caller's buffer is smaller, the remainder
    /// stays at the front of the script for the next read.
    Data(Vec<u8>),
    /// Signal end of stream (`Ok(0)`).
    Eof,
    /// Fail the read with an I/O fault of this kind.
    Fault(io::ErrorKind),
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<ReadStep>,
    write_log: Vec<Vec<u8>>,
    write_faults: VecDeque<io::ErrorKind>,
    write_attempts: usize,
    released_halves: usize,
}

/// Scriptable mock serial port.
///
/// With an empty read script a read behaves like a real port with a short
/// timeout: it sleeps briefly and returns a `TimedOut` I/O error, which the
/// reader treats as "no data yet".
#[derive(Clone, Debug, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script bytes to be delivered by upcoming reads.
    pub fn push_read(&self, data: &[u8]) {
        self.state.lock().script.push_back(ReadStep::Data(data.to_vec()));
    }

    /// Script an end-of-stream.
    pub fn push_eof(&self) {
        self.state.lock().script.push_back(ReadStep::Eof);
    }

    /// Script a read fault.
    pub fn push_read_fault(&self, kind: io::ErrorKind) {
        self.state.lock().script.push_back(ReadStep::Fault(kind));
    }

    /// Make the next write attempt fail with an I/O fault of this kind.
    pub fn push_write_fault(&self, kind: io::ErrorKind) {
        self.state.lock().write_faults.push_back(kind);
    }

    /// Every successfully written message, in write order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Total write attempts, including scripted failures.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    /// How many duplex halves handed out by [`MockOpener`] have been dropped.
    /// A fully released port counts 2 (read half + write half).
    pub fn released_halves(&self) -> usize {
        self.state.lock().released_halves
    }
}

impl PortIo for MockPort {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let step = self.state.lock().script.pop_front();
        match step {
            Some(ReadStep::Data(mut bytes)) => {
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    let rest = bytes.split_off(n);
                    self.state.lock().script.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
            Some(ReadStep::Eof) => Ok(0),
            Some(ReadStep::Fault(kind)) => {
                Err(PortError::Io(io::Error::new(kind, "scripted read fault")))
            }
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Err(PortError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no data available",
                )))
            }
        }
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.write_attempts += 1;
        if let Some(kind) = state.write_faults.pop_front() {
            return Err(PortError::Io(io::Error::new(kind, "scripted write fault")));
        }
        state.write_log.push(data.to_vec());
        Ok(())
    }
}

/// A duplex half handed out by [`MockOpener`]; notifies the shared state on
/// drop so tests can assert that the device resource was released.
struct MockHalf(MockPort);

impl PortIo for MockHalf {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.0.read_chunk(buffer)
    }

    fn write_all_bytes(&mut self, data: &[u8]) -> Result<(), PortError> {
        self.0.write_all_bytes(data)
    }
}

impl Drop for MockHalf {
    fn drop(&mut self) {
        self.0.state.lock().released_halves += 1;
    }
}

#[derive(Debug, Default)]
struct MockOpenerState {
    open_count: usize,
    fail_next: Option<PortError>,
}

/// `PortOpener` over a shared [`MockPort`], counting opens and optionally
/// failing on demand.
#[derive(Clone, Debug, Default)]
pub struct MockOpener {
    port: MockPort,
    state: Arc<Mutex<MockOpenerState>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the underlying port, for scripting reads and inspecting
    /// writes.
    pub fn port(&self) -> MockPort {
        self.port.clone()
    }

    /// How many times the device has been opened.
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Inject a failure; it is consumed by the next `open` call.
    pub fn fail_next_open(&self, err: PortError) {
        self.state.lock().fail_next = Some(err);
    }
}

impl PortOpener for MockOpener {
    fn open(&self, _path: &str, _config: &PortConfig) -> Result<DuplexPort, PortError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        state.open_count += 1;
        Ok(DuplexPort {
            read_half: Box::new(MockHalf(self.port.clone())),
            write_half: Box::new(MockHalf(self.port.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_read() {
        let mut port = MockPort::new();
        port.push_read(b"hello");

        let mut buffer = [0u8; 64];
        let n = port.read_chunk(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"hello");
    }

    #[test]
    fn test_read_larger_than_buffer_is_split() {
        let mut port = MockPort::new();
        port.push_read(b"abcdef");

        let mut buffer = [0u8; 4];
        let n = port.read_chunk(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"abcd");

        let n = port.read_chunk(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"ef");
    }

    #[test]
    fn test_empty_script_reads_time_out() {
        let mut port = MockPort::new();
        let mut buffer = [0u8; 8];
        let result = port.read_chunk(&mut buffer);
        assert!(matches!(&result, Err(e) if e.is_timeout()), "{result:?}");
    }

    #[test]
    fn test_eof_and_fault_steps() {
        let mut port = MockPort::new();
        port.push_eof();
        port.push_read_fault(io::ErrorKind::BrokenPipe);

        let mut buffer = [0u8; 8];
        assert_eq!(port.read_chunk(&mut buffer).unwrap(), 0);
        let result = port.read_chunk(&mut buffer);
        assert!(matches!(&result, Err(e) if !e.is_timeout()));
    }

    #[test]
    fn test_write_log_and_faults() {
        let mut port = MockPort::new();
        port.push_write_fault(io::ErrorKind::BrokenPipe);

        assert!(port.write_all_bytes(b"first").is_err());
        port.write_all_bytes(b"second").unwrap();

        assert_eq!(port.write_attempts(), 2);
        assert_eq!(port.write_log(), vec![b"second".to_vec()]);
    }

    #[test]
    fn test_opener_counts_and_fails() {
        let opener = MockOpener::new();
        opener.fail_next_open(PortError::permission_denied("/dev/ttyS0"));

        let result = opener.open("/dev/ttyS0", &PortConfig::default());
        assert!(matches!(result, Err(PortError::PermissionDenied(_))));
        assert_eq!(opener.open_count(), 0);

        let duplex = opener.open("/dev/ttyS0", &PortConfig::default()).unwrap();
        assert_eq!(opener.open_count(), 1);

        drop(duplex);
        assert_eq!(opener.port().released_halves(), 2);
    }
}
