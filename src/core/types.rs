//! Core data types for the target tracker

use serde::{Deserialize, Serialize};

/// A sensor value together with the time it was last written
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reported<T> {
    pub value: T,
    /// Receive time of the sentence that carried the value (ms)
    pub at_ms: u64,
}

impl<T> Reported<T> {
    pub fn new(value: T, at_ms: u64) -> Self {
        Self { value, at_ms }
    }
}

/// Read access to the latest value of an optional sensor field
pub trait Latest<T> {
    fn latest(&self) -> Option<T>;
}

impl<T: Copy> Latest<T> for Option<Reported<T>> {
    fn latest(&self) -> Option<T> {
        self.as_ref().map(|r| r.value)
    }
}

/// Geodetic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// GNSS fix quality indicator (GGA field 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    Invalid,
    Gps,
    Dgps,
    Pps,
    RtkFixed,
    RtkFloat,
    Estimated,
    Other(u8),
}

impl FixQuality {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => FixQuality::Invalid,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::Estimated,
            other => FixQuality::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FixQuality::Invalid => 0,
            FixQuality::Gps => 1,
            FixQuality::Dgps => 2,
            FixQuality::Pps => 3,
            FixQuality::RtkFixed => 4,
            FixQuality::RtkFloat => 5,
            FixQuality::Estimated => 6,
            FixQuality::Other(code) => *code,
        }
    }
}

/// UTC calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// UTC time of day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtcTime {
    pub hour: u8,
    pub minute: u8,
    pub second: f64,
}

/// Platform position/attitude snapshot.
///
/// Every field is updated independently by whichever sentence carries it;
/// a field that no sentence has reported yet stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GnssFix {
    pub valid: bool,
    pub latitude: Option<Reported<f64>>,
    pub longitude: Option<Reported<f64>>,
    /// Course over ground (degrees)
    pub heading_deg: Option<Reported<f64>>,
    /// Heading from a heading sensor or attitude extension (degrees)
    pub true_heading_deg: Option<Reported<f64>>,
    pub speed_knots: Option<Reported<f64>>,
    pub satellites: Option<Reported<u16>>,
    pub hdop: Option<Reported<f64>>,
    pub pdop: Option<Reported<f64>>,
    pub vdop: Option<Reported<f64>>,
    pub altitude_m: Option<Reported<f64>>,
    pub geoid_m: Option<Reported<f64>>,
    pub fix_quality: Option<Reported<FixQuality>>,
    /// RMC positioning mode indicator (A/D/E/N...)
    pub nav_mode: Option<Reported<char>>,
    pub date: Option<Reported<UtcDate>>,
    pub time: Option<Reported<UtcTime>>,
}

impl GnssFix {
    /// Latest latitude/longitude pair, if both are known
    pub fn position(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude.latest()?, self.longitude.latest()?))
    }

    /// Platform azimuth: true heading when known, course over ground otherwise
    pub fn azimuth_deg(&self) -> Option<f64> {
        self.true_heading_deg
            .latest()
            .filter(|h| h.is_finite())
            .or_else(|| self.heading_deg.latest().filter(|h| h.is_finite()))
    }

    pub fn quality(&self) -> FixQuality {
        self.fix_quality.latest().unwrap_or(FixQuality::Invalid)
    }
}

/// Accepted/rejected ping counts over one reporting window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TatWindow {
    pub accepted: u64,
    pub rejected: u64,
}

/// Latest ranging result from the acoustic sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcousticReading {
    /// Bearing relative to the platform heading (degrees)
    pub bearing_deg: Option<Reported<f64>>,
    /// Slant range (meters)
    pub range_m: Option<Reported<f64>>,
    pub status: Option<String>,
    /// Incremented on every accepted ping; fusion triggers on its changes
    pub ping_counter: u64,
    pub accepted_pings: u64,
    pub rejected_pings: u64,
    /// Counts from the last completed reporting window
    pub window: TatWindow,
    pub last_tat_ms: Option<u32>,
    pub rx_frequency: Option<f64>,
    pub snr: Option<f64>,
    pub energy_tx: Option<f64>,
    pub energy_rx: Option<f64>,
}

impl AcousticReading {
    /// Numeric link state: leading digit of the status text, 2 for mock data
    pub fn status_code(&self) -> Option<u8> {
        let status = self.status.as_deref()?;
        if status == "MOCK" {
            return Some(2);
        }
        status
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
    }
}

/// Depth sounder / water temperature state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthReading {
    pub depth_m: Option<f64>,
    /// Transducer offset reported by DPT
    pub offset_m: Option<f64>,
    pub temperature_c: Option<f64>,
    pub last_update_ms: Option<u64>,
}

/// Unfiltered target position computed from one fusion step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTargetFix {
    pub position: GeoPoint,
    /// Absolute bearing from the platform to the target (degrees)
    pub azimuth_deg: f64,
    /// Corrected range used for the fix (meters)
    pub distance_m: f64,
    pub r95_m: f64,
    pub at_ms: u64,
}

/// Kalman-smoothed target position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredTargetFix {
    pub position: GeoPoint,
    pub r95_m: f64,
    /// Normalized innovation of the measurement that produced this fix
    pub innovation: f64,
    pub at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azimuth_prefers_true_heading() {
        let mut fix = GnssFix::default();
        assert_eq!(fix.azimuth_deg(), None);

        fix.heading_deg = Some(Reported::new(45.0, 1));
        assert_eq!(fix.azimuth_deg(), Some(45.0));

        fix.true_heading_deg = Some(Reported::new(90.0, 2));
        assert_eq!(fix.azimuth_deg(), Some(90.0));

        fix.true_heading_deg = Some(Reported::new(f64::NAN, 3));
        assert_eq!(fix.azimuth_deg(), Some(45.0));
    }

    #[test]
    fn test_fix_quality_codes() {
        for code in 0..10u8 {
            assert_eq!(FixQuality::from_code(code).code(), code);
        }
        assert_eq!(FixQuality::from_code(4), FixQuality::RtkFixed);
    }

    #[test]
    fn test_status_code() {
        let mut reading = AcousticReading::default();
        assert_eq!(reading.status_code(), None);
        reading.status = Some("MOCK".to_string());
        assert_eq!(reading.status_code(), Some(2));
        reading.status = Some("3-lost".to_string());
        assert_eq!(reading.status_code(), Some(3));
        reading.status = Some("idle".to_string());
        assert_eq!(reading.status_code(), None);
    }
}
