//! Background writer: drains a FIFO queue into blocking port writes.

use crate::port::{PortError, PortHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Handle to the dedicated writer thread of a session.
///
/// Producers hand byte buffers to [`enqueue`](Writer::enqueue); the thread
/// writes them to the device strictly in queue order, which is what the wire
/// protocols above this layer rely on. The queue is unbounded, so `enqueue`
/// never blocks and there is no queue-full error.
pub struct Writer {
    tx: Sender<Vec<u8>>,
    stopping: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Cloneable producer handle onto a writer's queue.
///
/// Hand one to every producer thread; each clone enqueues into the same FIFO.
/// Once the writer has stopped, enqueued messages are dropped.
#[derive(Clone)]
pub struct QueueSender {
    tx: Sender<Vec<u8>>,
}

impl QueueSender {
    /// Queue `message` for transmission and return immediately.
    pub fn enqueue(&self, message: Vec<u8>) {
        if self.tx.send(message).is_err() {
            debug!("writer already stopped, message dropped");
        }
    }
}

impl Writer {
    /// Start the write loop against `handle`.
    pub fn spawn(handle: Arc<PortHandle>) -> Result<Self, PortError> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let stopping = Arc::new(AtomicBool::new(false));
        let name = format!("serial-write {}", handle.path());
        let thread = thread::Builder::new().name(name).spawn({
            let stopping = Arc::clone(&stopping);
            move || {
                while let Ok(message) = rx.recv() {
                    if stopping.load(Ordering::Acquire) {
                        // Stop began; this message and everything behind it
                        // is discarded without being written.
                        break;
                    }
                    match handle.write_all(&message) {
                        Ok(()) => trace!(bytes = message.len(), "message written"),
                        Err(PortError::Closed) => {
                            debug!(path = %handle.path(), "port closed, writer exiting");
                            break;
                        }
                        Err(e) => {
                            // One failed message must not take the sending
                            // channel down with it; skip to the next one.
                            warn!(path = %handle.path(), error = %e, "write failed, message dropped");
                        }
                    }
                }
            }
        })?;
        Ok(Self {
            tx,
            stopping,
            thread,
        })
    }

    /// Queue `message` for transmission and return immediately.
    ///
    /// Delivery failures are reported asynchronously through logging; the
    /// producer has already disowned the buffer. If the writer thread has
    /// already exited, the message is dropped.
    pub fn enqueue(&self, message: Vec<u8>) {
        if self.tx.send(message).is_err() {
            debug!("writer already stopped, message dropped");
        }
    }

    /// A cloneable handle for producer threads.
    pub fn sender(&self) -> QueueSender {
        QueueSender {
            tx: self.tx.clone(),
        }
    }

    /// Stop the writer and wait for the thread to exit. Messages still queued
    /// when stop begins are discarded without being written.
    pub fn stop(self) {
        let Self {
            tx,
            stopping,
            thread,
        } = self;
        stopping.store(true, Ordering::Release);
        // Dropping the sender wakes a writer blocked on an empty queue.
        drop(tx);
        let _ = thread.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockOpener, PortConfig};
    use std::io;
    use std::time::{Duration, Instant};

    fn spawn_writer(opener: &MockOpener) -> Writer {
        let handle = Arc::new(
            PortHandle::open(opener, "MOCK0", &PortConfig::default()).unwrap(),
        );
        Writer::spawn(handle).unwrap()
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
    fn test_messages_written_in_enqueue_order() {
        let opener = MockOpener::new();
        let writer = spawn_writer(&opener);

        writer.enqueue(b"one".to_vec());
        writer.enqueue(b"two".to_vec());
        writer.enqueue(b"three".to_vec());

        let port = opener.port();
        assert!(wait_until(Duration::from_secs(2), || port.write_log().len() == 3));
        assert_eq!(
            port.write_log(),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );

        writer.stop();
    }

    #[test]
    fn test_write_fault_does_not_stop_the_queue() {
        let opener = MockOpener::new();
        let port = opener.port();
        port.push_write_fault(io::ErrorKind::BrokenPipe);
        let writer = spawn_writer(&opener);

        writer.enqueue(b"doomed".to_vec());
        writer.enqueue(b"survivor".to_vec());

        assert!(wait_until(Duration::from_secs(2), || port.write_attempts() == 2));
        assert_eq!(port.write_log(), vec![b"survivor".to_vec()]);

        writer.stop();
    }

    #[test]
    fn test_closed_handle_stops_the_writer() {
        let opener = MockOpener::new();
        let handle = Arc::new(
            PortHandle::open(&opener, "MOCK0", &PortConfig::default()).unwrap(),
        );
        let writer = Writer::spawn(Arc::clone(&handle)).unwrap();

        handle.close();
        writer.enqueue(b"never written".to_vec());

        // stop() joins the thread; it must have exited on Closed, not written.
        writer.stop();
        assert!(opener.port().write_log().is_empty());
    }

    #[test]
    fn test_stop_returns_promptly_on_idle_writer() {
        let opener = MockOpener::new();
        let writer = spawn_writer(&opener);

        let start = Instant::now();
        writer.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
