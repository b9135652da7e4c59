//! Background reader: blocks on the port and feeds incoming chunks to a sink.

use crate::port::{PortError, PortHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Incoming data is read at most this many bytes at a time.
pub const READ_CHUNK_LEN: usize = 64;

/// Receives incoming data on the reader thread.
///
/// The chunk is only valid for the duration of the call; copy it to keep it.
/// The sink runs on the reader thread, so a slow sink stalls further reads.
pub trait DataSink: Send + 'static {
    fn on_data(&mut self, chunk: &[u8]);
}

impl<F> DataSink for F
where
    F: FnMut(&[u8]) + Send + 'static,
{
    fn on_data(&mut self, chunk: &[u8]) {
        self(chunk)
    }
}

/// Lifecycle of the reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Not spawned yet.
    Idle,
    Running,
    /// Exited cleanly: end of stream, handle closed, or cancelled.
    Stopped,
    /// Exited on a read fault.
    Faulted,
}

/// Handle to the dedicated reader thread of a session.
///
/// There is exactly one per running session. `spawn` is the only constructor
/// and the session stores at most one, so a second concurrent reader cannot
/// exist by construction.
pub struct Reader {
    thread: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<ReaderState>>,
}

impl Reader {
    /// Start the read loop against `handle`, delivering chunks to `sink`.
    pub fn spawn(handle: Arc<PortHandle>, mut sink: Box<dyn DataSink>) -> Result<Self, PortError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(ReaderState::Running));
        let name = format!("serial-read {}", handle.path());
        let thread = thread::Builder::new().name(name).spawn({
            let cancel = Arc::clone(&cancel);
            let state = Arc::clone(&state);
            move || {
                let outcome = read_loop(&handle, sink.as_mut(), &cancel);
                *state.lock() = outcome;
            }
        })?;
        Ok(Self {
            thread,
            cancel,
            state,
        })
    }

    /// Current state of the read loop.
    pub fn state(&self) -> ReaderState {
        *self.state.lock()
    }

    /// Request cancellation. Best-effort: the loop observes the flag on its
    /// next read return, which is bounded by the port's read timeout.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Wait for the thread to exit and return its final state.
    pub fn join(self) -> ReaderState {
        let _ = self.thread.join();
        let state = self.state.lock();
        *state
    }
}

fn read_loop(handle: &PortHandle, sink: &mut dyn DataSink, cancel: &AtomicBool) -> ReaderState {
    let mut buffer = [0u8; READ_CHUNK_LEN];
    loop {
        if cancel.load(Ordering::Acquire) {
            debug!(path = %handle.path(), "reader cancelled");
            return ReaderState::Stopped;
        }
        match handle.read_chunk(&mut buffer) {
            // A zero-length read means the peer closed; the sink is not told
            // about empty chunks.
            Ok(0) => {
                debug!(path = %handle.path(), "end of stream");
                return ReaderState::Stopped;
            }
            Ok(n) => {
                trace!(bytes = n, "chunk received");
                sink.on_data(&buffer[..n]);
            }
            Err(PortError::Closed) => {
                debug!(path = %handle.path(), "port closed, reader exiting");
                return ReaderState::Stopped;
            }
            Err(e) if e.is_timeout() => continue,
            Err(e) => {
                // No retry here: surfacing the failure is the caller's job.
                warn!(path = %handle.path(), error = %e, "read fault, reader exiting");
                return ReaderState::Faulted;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockOpener, PortConfig};
    use std::io;
    use std::time::{Duration, Instant};

    fn spawn_reader(opener: &MockOpener) -> (Reader, Arc<Mutex<Vec<Vec<u8>>>>) {
        let handle = Arc::new(
            PortHandle::open(opener, "MOCK0", &PortConfig::default()).unwrap(),
        );
        let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let received = Arc::clone(&received);
            move |chunk: &[u8]| received.lock().push(chunk.to_vec())
        };
        let reader = Reader::spawn(handle, Box::new(sink)).unwrap();
        (reader, received)
    }

    fn wait_until(deadline: Duration, mut pred: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if pred() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        pred()
    }

    #[test]
    fn test_chunk_delivered_with_exact_length() {
        let opener = MockOpener::new();
        opener.port().push_read(&[0x41, 0x42, 0x43]);
        let (reader, received) = spawn_reader(&opener);

        assert!(wait_until(Duration::from_secs(2), || !received.lock().is_empty()));
        assert_eq!(received.lock()[0], vec![0x41, 0x42, 0x43]);

        reader.cancel();
        assert_eq!(reader.join(), ReaderState::Stopped);
    }

    #[test]
    fn test_eof_stops_without_sink_call() {
        let opener = MockOpener::new();
        opener.port().push_eof();
        let (reader, received) = spawn_reader(&opener);

        assert_eq!(reader.join(), ReaderState::Stopped);
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_read_fault_transitions_to_faulted() {
        let opener = MockOpener::new();
        opener.port().push_read_fault(io::ErrorKind::BrokenPipe);
        let (reader, received) = spawn_reader(&opener);

        assert_eq!(reader.join(), ReaderState::Faulted);
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_cancel_stops_a_blocked_reader() {
        let opener = MockOpener::new();
        let (reader, _received) = spawn_reader(&opener);

        assert_eq!(reader.state(), ReaderState::Running);
        reader.cancel();
        assert_eq!(reader.join(), ReaderState::Stopped);
    }

    #[test]
    fn test_timeouts_keep_the_loop_alive() {
        let opener = MockOpener::new();
        let (reader, received) = spawn_reader(&opener);

        // Let a few empty-script timeouts pass, then deliver data.
        thread::sleep(Duration::from_millis(20));
        opener.port().push_read(b"late");

        assert!(wait_until(Duration::from_secs(2), || !received.lock().is_empty()));
        assert_eq!(received.lock()[0], b"late".to_vec());

        reader.cancel();
        reader.join();
    }
}
