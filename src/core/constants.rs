//! Physical constants and system parameters

/// Speed of sound in water under standard conditions (m/s)
pub const SPEED_OF_SOUND_WATER: f64 = 1500.0;

/// Nominal SEAKER ping period; valid turnaround times sit near multiples of it (ms)
pub const TAT_PERIOD_MS: u32 = 2000;

/// Accepted distance of a turnaround time from a period boundary (ms)
pub const TAT_TOLERANCE_MS: u32 = 100;

/// Length of the accepted/rejected ping reporting window (ms)
pub const TAT_WINDOW_MS: u64 = 2000;

/// Ratio between a 2D position standard deviation and its 95% radius
/// (Rayleigh approximation)
pub const R95_FACTOR: f64 = 2.45;
