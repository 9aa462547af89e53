//! WGS84 <-> UTM projection
//!
//! Forward and inverse transverse Mercator series (Snyder, "Map
//! Projections: A Working Manual"). The round trip is consistent to well
//! under a meter over the whole UTM domain, which is all the fusion step
//! needs to do bearing/range arithmetic in meters.

use crate::core::GeoPoint;
use serde::Serialize;
use std::f64::consts::PI;
use thiserror::Error;

/// Semi-major axis (WGS84)
pub const EARTH_RADIUS_WGS84: f64 = 6378137.0;

/// Earth flattening factor (WGS84)
pub const EARTH_FLATTENING_WGS84: f64 = 1.0 / 298.257223563;

/// Eccentricity squared (WGS84)
pub const ECCENTRICITY_SQUARED_WGS84: f64 =
    EARTH_FLATTENING_WGS84 * (2.0 - EARTH_FLATTENING_WGS84);

/// Central meridian scale factor
pub const UTM_SCALE_FACTOR: f64 = 0.9996;

pub const FALSE_EASTING: f64 = 500_000.0;
pub const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

pub const MIN_LATITUDE: f64 = -80.0;
pub const MAX_LATITUDE: f64 = 84.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ProjectionError {
    #[error("non-finite coordinate")]
    NonFinite,
    #[error("latitude {lat} / longitude {lon} outside the UTM domain")]
    OutOfRange { lat: f64, lon: f64 },
    #[error("invalid UTM zone {0} (expected 1-60)")]
    InvalidZone(u8),
}

/// A point on the UTM grid. Zone and hemisphere always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtmCoordinate {
    pub zone: u8,
    pub north: bool,
    pub easting: f64,
    pub northing: f64,
}

/// Zone (1-60) containing a longitude
pub fn zone_for_longitude(lon: f64) -> u8 {
    (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8
}

fn central_meridian_rad(zone: u8) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Meridian arc length from the equator to `lat` (radians)
fn meridian_arc(lat: f64) -> f64 {
    let e2 = ECCENTRICITY_SQUARED_WGS84;
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    EARTH_RADIUS_WGS84
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

impl UtmCoordinate {
    /// Project a geodetic point (degrees) into its natural zone
    pub fn from_geodetic(lat_deg: f64, lon_deg: f64) -> Result<Self, ProjectionError> {
        if !lon_deg.is_finite() {
            return Err(ProjectionError::NonFinite);
        }
        Self::from_geodetic_in_zone(lat_deg, lon_deg, zone_for_longitude(lon_deg), lat_deg >= 0.0)
    }

    /// Project into a given zone and hemisphere, e.g. a frame fixed earlier
    /// for a track that has since drifted across a zone boundary
    pub fn from_geodetic_in_zone(lat_deg: f64, lon_deg: f64, zone: u8, north: bool) -> Result<Self, ProjectionError> {
        if !lat_deg.is_finite() || !lon_deg.is_finite() {
            return Err(ProjectionError::NonFinite);
        }
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat_deg) || !(-180.0..=180.0).contains(&lon_deg) {
            return Err(ProjectionError::OutOfRange { lat: lat_deg, lon: lon_deg });
        }
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidZone(zone));
        }

        let e2 = ECCENTRICITY_SQUARED_WGS84;
        let ep2 = e2 / (1.0 - e2);
        let k0 = UTM_SCALE_FACTOR;

        let lat = lat_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let tan_lat = lat.tan();

        let n = EARTH_RADIUS_WGS84 / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let t = tan_lat * tan_lat;
        let c = ep2 * cos_lat * cos_lat;
        let a = (lon_deg.to_radians() - central_meridian_rad(zone)) * cos_lat;
        let m = meridian_arc(lat);

        let easting = k0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + FALSE_EASTING;

        let mut northing = k0
            * (m + n
                * tan_lat
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
        if !north {
            northing += FALSE_NORTHING_SOUTH;
        }

        Ok(Self { zone, north, easting, northing })
    }

    /// Inverse projection through the footpoint latitude
    pub fn to_geodetic(&self) -> Result<GeoPoint, ProjectionError> {
        if !(1..=60).contains(&self.zone) {
            return Err(ProjectionError::InvalidZone(self.zone));
        }
        if !self.easting.is_finite() || !self.northing.is_finite() {
            return Err(ProjectionError::NonFinite);
        }

        let e2 = ECCENTRICITY_SQUARED_WGS84;
        let ep2 = e2 / (1.0 - e2);
        let k0 = UTM_SCALE_FACTOR;

        let x = self.easting - FALSE_EASTING;
        let y = if self.north { self.northing } else { self.northing - FALSE_NORTHING_SOUTH };

        let m = y / k0;
        let mu = m / (EARTH_RADIUS_WGS84 * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
        let j1 = 3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0;
        let j2 = 21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0;
        let j3 = 151.0 * e1.powi(3) / 96.0;
        let j4 = 1097.0 * e1.powi(4) / 512.0;
        let fp = mu + j1 * (2.0 * mu).sin() + j2 * (4.0 * mu).sin() + j3 * (6.0 * mu).sin() + j4 * (8.0 * mu).sin();

        let (sin_fp, cos_fp) = fp.sin_cos();
        let tan_fp = fp.tan();
        let c1 = ep2 * cos_fp * cos_fp;
        let t1 = tan_fp * tan_fp;
        let n1 = EARTH_RADIUS_WGS84 / (1.0 - e2 * sin_fp * sin_fp).sqrt();
        let r1 = n1 * (1.0 - e2) / (1.0 - e2 * sin_fp * sin_fp);
        let d = x / (n1 * k0);

        let lat = fp
            - (n1 * tan_fp / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d.powi(6)
                        / 720.0);
        let lon = central_meridian_rad(self.zone)
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
                / cos_fp;

        Ok(GeoPoint::new(lat * 180.0 / PI, lon * 180.0 / PI))
    }

    /// Translate within the same zone and hemisphere
    pub fn offset(&self, d_east: f64, d_north: f64) -> Self {
        Self {
            easting: self.easting + d_east,
            northing: self.northing + d_north,
            ..*self
        }
    }
}
