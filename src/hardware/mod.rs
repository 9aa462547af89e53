//! Hardware abstraction for the sensor serial ports
//!
//! The GNSS receiver, the SEAKER acoustic unit and the depth sounder are all
//! reached through [`ByteSource`] (incoming sentences) and [`CommandSink`]
//! (outgoing commands). Transport setup stays outside this crate.

pub mod transceiver;
pub mod serial;
pub mod mock;
pub mod error;

pub use transceiver::{ByteSource, CommandSink, PortStatus, SensorPort};
pub use serial::StreamPort;
pub use mock::{MockFix, MockPort, MockRangingConfig, MockRangingGenerator, RangingSample};
pub use error::{CommError, CommResult, RecoveryStrategy};
