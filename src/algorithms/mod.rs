//! Geodetic projection and target fusion

pub mod projection;
pub mod fusion;

pub use projection::{ProjectionError, UtmCoordinate};
pub use fusion::{compute_raw_target, normalize_deg, FusionParams, FusionSkip, RangingMode, RawTarget};
