//! Runtime surface of the tracker
//!
//! Sensor channels feed shared snapshot records; the tracker fuses the
//! latest records into target fixes and emits them as sentences or JSON.

pub mod shared;
pub mod formatting;
pub mod channels;
pub mod tracker;
pub mod runtime;

pub use shared::{Shared, Telemetry};
pub use formatting::{target_as_gga, Emission};
pub use channels::{AcousticChannel, DepthChannel, GnssChannel, GnssFeed, RangingFeed};
pub use tracker::{ContextParts, TargetTracker, TrackFrame, TrackerContext};
pub use runtime::{Clock, SensorTask};
