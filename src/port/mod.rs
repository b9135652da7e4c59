//! Port abstraction layer for serial communication.
//!
//! Provides the `PortIo`/`PortOpener` traits with a real implementation over
//! the `serialport` crate and a scriptable mock, plus the owned `PortHandle`
//! that ties an open device's duplex endpoints to a single owner.

pub mod error;
pub mod handle;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use handle::PortHandle;
pub use mock::{MockOpener, MockPort, ReadStep};
pub use sync_port::{SystemOpener, SystemPort};
pub use traits::*;
