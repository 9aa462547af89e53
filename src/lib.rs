//! SEAKER target tracker
//!
//! Locates a remote acoustic target by fusing the platform's GNSS fix with
//! bearing/range from the SEAKER acoustic positioning sensor, then smooths
//! the track with a constant-velocity Kalman filter.

pub mod core;
pub mod processing;
pub mod algorithms;
pub mod sensors;
pub mod hardware;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{AcousticReading, FilteredTargetFix, GeoPoint, GnssFix, RawTargetFix, SPEED_OF_SOUND_WATER};
pub use processing::{Sentence, SentenceKind, TargetKalmanFilter};
pub use algorithms::{compute_raw_target, FusionParams, RangingMode, UtmCoordinate};
pub use sensors::{AcousticReader, DepthReader, GnssReader};
pub use hardware::{ByteSource, CommError, CommResult, CommandSink, MockPort, SensorPort, StreamPort};
pub use api::{Emission, Shared, TargetTracker, Telemetry, TrackerContext};
pub use utils::{ConfigurationManager, RuntimeConfig};
