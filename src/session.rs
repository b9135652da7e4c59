//! Session orchestration: one owned port handle, one reader, one writer.

use crate::port::{PortConfig, PortError, PortHandle, PortOpener};
use crate::reader::{DataSink, Reader, ReaderState};
use crate::writer::{QueueSender, Writer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to establish a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device node path, e.g. `/dev/ttyAMA2` or `COM3`.
    pub path: String,

    /// Port parameters.
    #[serde(default)]
    pub port: PortConfig,
}

impl SessionConfig {
    /// A configuration with default port parameters for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: PortConfig::default(),
        }
    }

    /// Parse a session configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, PortError> {
        toml::from_str(text).map_err(|e| PortError::invalid_configuration(e.to_string()))
    }
}

/// A single full-duplex serial connection: one owned [`PortHandle`], one
/// reader thread delivering incoming chunks to the sink, one writer thread
/// draining the outgoing queue.
///
/// The host's lifecycle hooks are expected to call [`start`](Session::start)
/// once on initialization and [`stop`](Session::stop) once on shutdown, in
/// that order; both are idempotent, and `Drop` runs `stop` as a safety net.
pub struct Session {
    opener: Box<dyn PortOpener>,
    config: SessionConfig,
    sink: Option<Box<dyn DataSink>>,
    handle: Option<Arc<PortHandle>>,
    reader: Option<Reader>,
    writer: Option<Writer>,
}

impl Session {
    /// Create an idle session. Nothing is opened until [`start`](Session::start).
    pub fn new(
        opener: impl PortOpener + 'static,
        config: SessionConfig,
        sink: impl DataSink,
    ) -> Self {
        Self {
            opener: Box::new(opener),
            config,
            sink: Some(Box::new(sink)),
            handle: None,
            reader: None,
            writer: None,
        }
    }

    /// Open the device and start the writer and reader.
    ///
    /// The open is lazy and happens at most once: calling `start` while the
    /// session is already running is a no-op returning `Ok`. Open failures
    /// propagate to the caller with no threads spawned, and the session stays
    /// startable so the caller may retry. A session that was stopped does not
    /// restart and fails with [`PortError::Closed`].
    pub fn start(&mut self) -> Result<(), PortError> {
        if self.handle.is_some() {
            debug!(path = %self.config.path, "session already started");
            return Ok(());
        }
        let sink = self.sink.take().ok_or(PortError::Closed)?;

        let handle =
            match PortHandle::open(self.opener.as_ref(), &self.config.path, &self.config.port) {
                Ok(handle) => Arc::new(handle),
                Err(e) => {
                    self.sink = Some(sink);
                    return Err(e);
                }
            };

        let writer = match Writer::spawn(Arc::clone(&handle)) {
            Ok(writer) => writer,
            Err(e) => {
                handle.close();
                self.sink = Some(sink);
                return Err(e);
            }
        };

        let reader = match Reader::spawn(Arc::clone(&handle), sink) {
            Ok(reader) => reader,
            Err(e) => {
                writer.stop();
                handle.close();
                return Err(e);
            }
        };

        info!(
            path = %self.config.path,
            baud = self.config.port.baud_rate,
            "session started"
        );
        self.handle = Some(handle);
        self.writer = Some(writer);
        self.reader = Some(reader);
        Ok(())
    }

    /// True while the reader and writer are running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// State of the reader thread; `Idle` before start and after stop.
    pub fn reader_state(&self) -> ReaderState {
        self.reader
            .as_ref()
            .map(Reader::state)
            .unwrap_or(ReaderState::Idle)
    }

    /// Queue bytes for transmission and return immediately.
    ///
    /// If the session never started, failed to open, or already stopped, the
    /// bytes are silently dropped; the producer has no way to act on that
    /// race, so the drop is only visible at debug level.
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        match &self.writer {
            Some(writer) => writer.enqueue(bytes.into()),
            None => {
                debug!(path = %self.config.path, "send without an open port, bytes dropped")
            }
        }
    }

    /// A cloneable handle for producer threads to queue outgoing bytes
    /// without holding the session itself. `None` before start and after
    /// stop; a handle that outlives the session drops its messages.
    pub fn sender(&self) -> Option<QueueSender> {
        self.writer.as_ref().map(Writer::sender)
    }

    /// Tear the session down: cancel the reader, stop the writer, close the
    /// port, then wait for the reader to exit.
    ///
    /// Idempotent. Never blocks indefinitely: cancellation is observed within
    /// the port's read timeout, and closing the handle forces any still
    /// blocked read or write to return `Closed`.
    pub fn stop(&mut self) {
        let reader = self.reader.take();
        let writer = self.writer.take();
        let handle = self.handle.take();

        if let Some(reader) = &reader {
            reader.cancel();
        }
        if let Some(writer) = writer {
            writer.stop();
        }
        if let Some(handle) = &handle {
            handle.close();
        }
        if let Some(reader) = reader {
            reader.join();
        }
        if handle.is_some() {
            info!(path = %self.config.path, "session stopped");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.config.path)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Open the device and start a session in one step.
pub fn connect(
    opener: impl PortOpener + 'static,
    config: SessionConfig,
    sink: impl DataSink,
) -> Result<Session, PortError> {
    let mut session = Session::new(opener, config, sink);
    session.start()?;
    Ok(session)
}
