//! serial-link
//!
//! Manages a single full-duplex serial connection on behalf of a host
//! application: the device is opened once, a background reader delivers
//! incoming bytes to a sink, and outgoing writes are serialized through a
//! dedicated writer thread so producer threads never block on or race over
//! the device.
//!
//! # Modules
//!
//! - `port`: port abstraction layer (real + mock implementations) and the
//!   owned `PortHandle`
//! - `reader`: the background read loop and the `DataSink` trait
//! - `writer`: the FIFO outgoing queue and its consumer thread
//! - `session`: the orchestrator tying one handle to one reader and writer
//!
//! Device discovery, framing of the byte stream, and reconnect policy are
//! deliberately out of scope; this crate only provides the I/O lifecycle
//! underneath them.
//!
//! # Example
//!
//! ```no_run
//! use serial_link::{connect, SessionConfig, SystemOpener};
//!
//! let config = SessionConfig::new("/dev/ttyAMA2");
//! let mut session = connect(SystemOpener, config, |chunk: &[u8]| {
//!     println!("received {} bytes", chunk.len());
//! })?;
//!
//! session.send(vec![0x01, 0x02]);
//! session.stop();
//! # Ok::<(), serial_link::PortError>(())
//! ```

pub mod port;
pub mod reader;
pub mod session;
pub mod writer;

// Re-export commonly used types for convenience
pub use port::{
    DataBits, DuplexPort, FlowControl, MockOpener, MockPort, Parity, PortConfig, PortError,
    PortHandle, PortIo, PortOpener, StopBits, SystemOpener, SystemPort,
};
pub use reader::{DataSink, Reader, ReaderState, READ_CHUNK_LEN};
pub use session::{connect, Session, SessionConfig};
pub use writer::{QueueSender, Writer};
