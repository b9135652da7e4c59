//! Port-specific error types.
//!
//! Open-time failures (`PermissionDenied`, `OpenFailed`, `InvalidConfiguration`)
//! propagate synchronously to whoever asked for the port. Steady-state I/O
//! faults (`Io`) and use-after-close (`Closed`) are handled locally by the
//! reader and writer threads and never cross thread boundaries as panics.

use thiserror::Error;

/// Errors that can occur while opening or driving a serial port.
#[derive(Debug, Error)]
pub enum PortError {
    /// The caller lacks read/write access to the device node.
    #[error("permission denied opening {0}")]
    PermissionDenied(String),

    /// The device could not be opened (busy, missing node, ioctl failure).
    #[error("failed to open serial port: {0}")]
    OpenFailed(String),

    /// Baud rate or port parameters were rejected.
    #[error("invalid port configuration: {0}")]
    InvalidConfiguration(String),

    /// An I/O fault occurred during a read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The handle was released; no further reads or writes are possible.
    #[error("port is closed")]
    Closed,
}

impl PortError {
    /// Create a PermissionDenied error from a device path.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create an OpenFailed error from a message.
    pub fn open_failed(message: impl Into<String>) -> Self {
        Self::OpenFailed(message.into())
    }

    /// Create an InvalidConfiguration error from a message.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// True when the error only means no data arrived within the port's read
    /// timeout. The reader treats these as a chance to poll cancellation, not
    /// as a fault.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            )
        )
    }
}
