//! Raw target computation: platform fix + acoustic bearing/range -> target fix
//!
//! The bearing/range vector is added to the platform position on the UTM
//! grid and the result projected back to geodetic coordinates. Uncertainty
//! combines the GNSS error (from fix quality / HDOP) with the acoustic error
//! (angular sigma across track, relative range error along track).

use crate::algorithms::projection::{ProjectionError, UtmCoordinate};
use crate::core::{
    AcousticReading, FixQuality, GnssFix, Latest, RawTargetFix, R95_FACTOR, SPEED_OF_SOUND_WATER,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Range correction applied to the raw acoustic range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RangingMode {
    /// Range used as measured
    Normal,
    /// Fixed distance subtracted
    Offset { offset_m: f64 },
    /// Transponder reply: the distance sound travels during the reply
    /// delay is removed, then the round trip halved
    Transponder { delay_ms: f64 },
}

impl Default for RangingMode {
    fn default() -> Self {
        RangingMode::Normal
    }
}

impl RangingMode {
    pub fn correct(&self, raw_m: f64) -> f64 {
        match *self {
            RangingMode::Normal => raw_m,
            RangingMode::Offset { offset_m } => raw_m - offset_m,
            RangingMode::Transponder { delay_ms } => {
                let delay_distance = delay_ms / 1000.0 * SPEED_OF_SOUND_WATER;
                (raw_m - delay_distance) / 2.0
            }
        }
    }
}

/// Calibration and error model used by one fusion computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    /// Mirror the acoustic bearing (sensor mounted upside down)
    pub invert_angle: bool,
    pub angle_offset_deg: f64,
    /// Bearing standard deviation (degrees)
    pub angle_sigma_deg: f64,
    /// Range standard deviation as a fraction of range
    pub range_rel_error: f64,
    pub ranging_mode: RangingMode,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            invert_angle: false,
            angle_offset_deg: 0.0,
            angle_sigma_deg: 3.0,
            range_rel_error: 0.005,
            ranging_mode: RangingMode::Normal,
        }
    }
}

/// Why a fusion computation produced nothing this cycle
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FusionSkip {
    #[error("no valid platform fix")]
    NoValidFix,
    #[error("no finite platform azimuth")]
    NoAzimuth,
    #[error("no finite acoustic bearing and range")]
    NoRanging,
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
}

/// Result of one raw target computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTarget {
    pub fix: RawTargetFix,
    /// Target position on the platform's UTM grid
    pub planar: UtmCoordinate,
    /// Combined 1-sigma measurement error (meters)
    pub measurement_std_m: f64,
}

/// Wrap an angle into [0, 360)
pub fn normalize_deg(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Acoustic bearing after inversion and offset calibration
pub fn relative_bearing(raw_deg: f64, params: &FusionParams) -> f64 {
    let bearing = if params.invert_angle { -raw_deg } else { raw_deg };
    normalize_deg(bearing + params.angle_offset_deg)
}

/// Rough 1-sigma horizontal error of the platform fix (meters)
pub fn platform_position_std(fix: &GnssFix) -> f64 {
    match fix.quality() {
        FixQuality::RtkFixed => 0.03,
        FixQuality::RtkFloat => 0.1,
        _ => match fix.hdop.latest().filter(|h| h.is_finite()) {
            Some(hdop) => (hdop * 1.5).max(1.0),
            None => 3.0,
        },
    }
}

/// 1-sigma horizontal error of an acoustic fix at `range_m`
pub fn acoustic_position_std(range_m: f64, angle_sigma_deg: f64, range_rel_error: f64) -> f64 {
    let lateral = range_m.abs() * angle_sigma_deg.to_radians();
    let along = (range_rel_error * range_m.abs()).max(0.1);
    lateral.hypot(along)
}

/// Locate the target from the latest platform fix and acoustic reading
pub fn compute_raw_target(
    fix: &GnssFix,
    reading: &AcousticReading,
    params: &FusionParams,
    now_ms: u64,
) -> Result<RawTarget, FusionSkip> {
    let platform = fix.position().filter(|_| fix.valid).ok_or(FusionSkip::NoValidFix)?;
    let platform_az = fix.azimuth_deg().ok_or(FusionSkip::NoAzimuth)?;

    let (raw_bearing, raw_range) = match (reading.bearing_deg.latest(), reading.range_m.latest()) {
        (Some(b), Some(r)) if b.is_finite() && r.is_finite() => (b, r),
        _ => return Err(FusionSkip::NoRanging),
    };

    let azimuth_deg = normalize_deg(platform_az + relative_bearing(raw_bearing, params));
    let distance_m = params.ranging_mode.correct(raw_range);

    let origin = UtmCoordinate::from_geodetic(platform.lat, platform.lon)?;
    let (sin_az, cos_az) = azimuth_deg.to_radians().sin_cos();
    let planar = origin.offset(distance_m * sin_az, distance_m * cos_az);
    let position = planar.to_geodetic()?;

    let gps_std = platform_position_std(fix);
    let acoustic_std = acoustic_position_std(distance_m, params.angle_sigma_deg, params.range_rel_error);
    let measurement_std_m = gps_std.hypot(acoustic_std);

    Ok(RawTarget {
        fix: RawTargetFix {
            position,
            azimuth_deg,
            distance_m,
            r95_m: measurement_std_m * R95_FACTOR,
            at_ms: now_ms,
        },
        planar,
        measurement_std_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Reported;

    fn platform(lat: f64, lon: f64, true_heading: f64) -> GnssFix {
        GnssFix {
            valid: true,
            latitude: Some(Reported::new(lat, 0)),
            longitude: Some(Reported::new(lon, 0)),
            true_heading_deg: Some(Reported::new(true_heading, 0)),
            fix_quality: Some(Reported::new(FixQuality::Gps, 0)),
            hdop: Some(Reported::new(0.8, 0)),
            ..Default::default()
        }
    }

    fn ranging(bearing: f64, range: f64) -> AcousticReading {
        AcousticReading {
            bearing_deg: Some(Reported::new(bearing, 0)),
            range_m: Some(Reported::new(range, 0)),
            ping_counter: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_deg(0.0), 0.0);
        assert_eq!(normalize_deg(360.0), 0.0);
        assert_eq!(normalize_deg(-90.0), 270.0);
        assert_eq!(normalize_deg(725.0), 5.0);
        assert!(normalize_deg(-1e-15) < 360.0);
    }

    #[test]
    fn test_relative_bearing_calibration() {
        let params = FusionParams {
            invert_angle: true,
            angle_offset_deg: 10.0,
            ..Default::default()
        };
        assert!((relative_bearing(30.0, &params) - 340.0).abs() < 1e-12);
        assert!((relative_bearing(10.0, &params) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_range_modes() {
        assert_eq!(RangingMode::Normal.correct(42.0), 42.0);
        assert_eq!(RangingMode::Offset { offset_m: 2.5 }.correct(42.0), 39.5);
        assert_eq!(RangingMode::Transponder { delay_ms: 1000.0 }.correct(3100.0), 800.0);
    }

    #[test]
    fn test_platform_std() {
        let mut fix = platform(47.5, -3.2, 0.0);
        assert!((platform_position_std(&fix) - 1.2).abs() < 1e-12);

        fix.hdop = Some(Reported::new(0.4, 0));
        assert_eq!(platform_position_std(&fix), 1.0);

        fix.hdop = None;
        assert_eq!(platform_position_std(&fix), 3.0);

        fix.fix_quality = Some(Reported::new(FixQuality::RtkFixed, 0));
        assert_eq!(platform_position_std(&fix), 0.03);
        fix.fix_quality = Some(Reported::new(FixQuality::RtkFloat, 0));
        assert_eq!(platform_position_std(&fix), 0.1);
    }

    #[test]
    fn test_acoustic_std() {
        let std = acoustic_position_std(100.0, 3.0, 0.005);
        let lateral = 100.0 * 3.0_f64.to_radians();
        assert!((std - (lateral * lateral + 0.25).sqrt()).abs() < 1e-9);

        // Floor on the along-track term
        assert!((acoustic_position_std(1.0, 0.0, 0.005) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_stationary_target_due_east() {
        let fix = platform(47.5, -3.2, 0.0);
        let target = compute_raw_target(&fix, &ranging(90.0, 100.0), &FusionParams::default(), 1234).unwrap();

        assert!((target.fix.azimuth_deg - 90.0).abs() < 1e-9);
        assert!((target.fix.distance_m - 100.0).abs() < 1e-9);
        assert_eq!(target.fix.at_ms, 1234);

        let expected_dlon = 100.0 / (111_320.0 * 47.5_f64.to_radians().cos());
        let dlon = target.fix.position.lon - (-3.2);
        assert!((dlon - expected_dlon).abs() < 2e-5);
        assert!((target.fix.position.lat - 47.5).abs() < 1e-5);

        let expected_std = 1.2_f64.hypot(acoustic_position_std(100.0, 3.0, 0.005));
        assert!((target.measurement_std_m - expected_std).abs() < 1e-9);
        assert!((target.fix.r95_m - expected_std * 2.45).abs() < 1e-9);
    }

    #[test]
    fn test_transponder_scenario() {
        let fix = platform(47.5, -3.2, 0.0);
        let params = FusionParams {
            ranging_mode: RangingMode::Transponder { delay_ms: 1000.0 },
            ..Default::default()
        };
        let target = compute_raw_target(&fix, &ranging(0.0, 3100.0), &params, 0).unwrap();
        assert!((target.fix.distance_m - 800.0).abs() < 1e-9);
        assert!(target.fix.position.lat > 47.5);
    }

    #[test]
    fn test_heading_falls_back_to_course() {
        let mut fix = platform(47.5, -3.2, 0.0);
        fix.true_heading_deg = None;
        fix.heading_deg = Some(Reported::new(180.0, 0));
        let target = compute_raw_target(&fix, &ranging(90.0, 10.0), &FusionParams::default(), 0).unwrap();
        assert!((target.fix.azimuth_deg - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_skip_reasons() {
        let params = FusionParams::default();
        let mut fix = platform(47.5, -3.2, 0.0);

        assert_eq!(
            compute_raw_target(&fix, &AcousticReading::default(), &params, 0).unwrap_err(),
            FusionSkip::NoRanging
        );
        assert_eq!(
            compute_raw_target(&fix, &ranging(f64::NAN, 10.0), &params, 0).unwrap_err(),
            FusionSkip::NoRanging
        );

        fix.true_heading_deg = None;
        assert_eq!(
            compute_raw_target(&fix, &ranging(0.0, 10.0), &params, 0).unwrap_err(),
            FusionSkip::NoAzimuth
        );

        fix.valid = false;
        assert_eq!(
            compute_raw_target(&fix, &ranging(0.0, 10.0), &params, 0).unwrap_err(),
            FusionSkip::NoValidFix
        );

        let polar = platform(85.0, 0.0, 0.0);
        assert!(matches!(
            compute_raw_target(&polar, &ranging(0.0, 10.0), &params, 0),
            Err(FusionSkip::Projection(ProjectionError::OutOfRange { .. }))
        ));
    }
}
