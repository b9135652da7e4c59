//! The owned handle to an open device.

use super::error::PortError;
use super::traits::{PortConfig, PortIo, PortOpener};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// An open device and its duplex byte-stream endpoints.
///
/// The read and write halves sit behind separate locks, so a read blocked in
/// the reader thread never delays the writer. `close` releases both endpoints
/// exactly once and is idempotent; any read or write after close fails with
/// [`PortError::Closed`]. Closing while a read is blocked also guarantees
/// that the reader observes `Closed` on its next call and winds down.
pub struct PortHandle {
    path: String,
    read_half: Mutex<Option<Box<dyn PortIo>>>,
    write_half: Mutex<Option<Box<dyn PortIo>>>,
    closed: AtomicBool,
}

impl PortHandle {
    /// Acquire the device at `path` through `opener`.
    pub fn open(
        opener: &dyn PortOpener,
        path: &str,
        config: &PortConfig,
    ) -> Result<Self, PortError> {
        let duplex = opener.open(path, config)?;
        Ok(Self {
            path: path.to_string(),
            read_half: Mutex::new(Some(duplex.read_half)),
            write_half: Mutex::new(Some(duplex.write_half)),
            closed: AtomicBool::new(false),
        })
    }

    /// The device path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Blocking read into `buffer`. `Ok(0)` signals end of stream.
    pub fn read_chunk(&self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if self.is_closed() {
            return Err(PortError::Closed);
        }
        let mut half = self.read_half.lock();
        let io = half.as_mut().ok_or(PortError::Closed)?;
        io.read_chunk(buffer)
    }

    /// Blocking write of the whole buffer.
    pub fn write_all(&self, data: &[u8]) -> Result<(), PortError> {
        if self.is_closed() {
            return Err(PortError::Closed);
        }
        let mut half = self.write_half.lock();
        let io = half.as_mut().ok_or(PortError::Closed)?;
        io.write_all_bytes(data)
    }

    /// Release the device. Safe to call any number of times; only the first
    /// call drops the endpoints.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.read_half.lock().take();
        self.write_half.lock().take();
        debug!(path = %self.path, "serial port closed");
    }
}

impl Drop for PortHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortHandle")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
