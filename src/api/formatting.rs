//! Output sentences and JSON telemetry for tracker results

use crate::core::{FilteredTargetFix, RawTargetFix, TatWindow, UtcTime};
use crate::processing::sentence;
use crate::sensors::gnss::format_coordinate;
use serde_json::json;
use std::fmt;

/// One output event of the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Emission {
    /// Unfiltered fix from one fusion computation
    Target(RawTargetFix),
    /// Kalman-smoothed fix, only when the gate accepted the measurement
    TargetFiltered(FilteredTargetFix),
    /// Ping acceptance counts over the last reporting window
    TatWindow(TatWindow),
}

impl Emission {
    /// Sentence payload without framing
    pub fn payload(&self) -> String {
        match self {
            Emission::Target(t) => format!(
                "TARGET,{:.7},{:.7},az={:.1},dist_m={:.1},r95_m={:.2}",
                t.position.lat, t.position.lon, t.azimuth_deg, t.distance_m, t.r95_m
            ),
            Emission::TargetFiltered(t) => format!(
                "TARGETF,{:.7},{:.7},r95_m={:.2}",
                t.position.lat, t.position.lon, t.r95_m
            ),
            Emission::TatWindow(w) => format!("SEAK,TATSTAT,acc2s={},rej2s={}", w.accepted, w.rejected),
        }
    }

    /// Framed sentence: `$payload*HH\r\n`
    pub fn to_sentence(&self) -> String {
        sentence::encode(&self.payload())
    }

    pub fn to_json(&self) -> String {
        let value = match self {
            // both fixes share the `targetf` record; only the smoothed one
            // carries the flag
            Emission::Target(t) => json!({
                "targetf": {
                    "lat": t.position.lat,
                    "lon": t.position.lon,
                    "r95_m": t.r95_m,
                    "az": t.azimuth_deg,
                    "dist_m": t.distance_m,
                }
            }),
            Emission::TargetFiltered(t) => json!({
                "targetf": {
                    "lat": t.position.lat,
                    "lon": t.position.lon,
                    "r95_m": t.r95_m,
                    "filtered": true,
                }
            }),
            Emission::TatWindow(w) => json!({
                "tatstat": {
                    "acc2s": w.accepted,
                    "rej2s": w.rejected,
                }
            }),
        };
        value.to_string()
    }
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sentence().trim_end())
    }
}

/// Filtered target as a GGA sentence, so chart plotters can show it as a
/// second vessel
pub fn target_as_gga(target: &FilteredTargetFix, utc: Option<UtcTime>) -> String {
    let (hour, minute, second) = utc
        .map(|t| (t.hour, t.minute, t.second.max(0.0).trunc() as u8))
        .unwrap_or((0, 0, 0));
    let (lat, ns) = format_coordinate(target.position.lat, true, 5);
    let (lon, ew) = format_coordinate(target.position.lon, false, 5);
    let payload = format!(
        "GPGGA,{:02}{:02}{:02}.00,{},{},{},{},1,08,1.0,0.0,M,0.0,M,,",
        hour, minute, second, lat, ns, lon, ew
    );
    sentence::encode(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeoPoint;
    use crate::processing::sentence::{decode_line, SentenceKind};
    use crate::sensors::gnss::parse_coordinate;

    fn raw() -> RawTargetFix {
        RawTargetFix {
            position: GeoPoint::new(47.5, -3.2),
            azimuth_deg: 90.04,
            distance_m: 100.0,
            r95_m: 5.126,
            at_ms: 1000,
        }
    }

    fn filtered() -> FilteredTargetFix {
        FilteredTargetFix {
            position: GeoPoint::new(-33.8688, 151.2093),
            r95_m: 3.5,
            innovation: 0.4,
            at_ms: 1000,
        }
    }

    #[test]
    fn test_target_sentence() {
        let s = Emission::Target(raw()).to_sentence();
        assert!(s.starts_with("$TARGET,47.5000000,-3.2000000,az=90.0,dist_m=100.0,r95_m=5.13*"));
        assert!(s.ends_with("\r\n"));
        let decoded = decode_line(s.as_bytes()).unwrap();
        assert_eq!(decoded.kind(), SentenceKind::Unknown);
        assert_eq!(decoded.field(5), Some("r95_m=5.13"));
    }

    #[test]
    fn test_filtered_and_tat_sentences() {
        let s = Emission::TargetFiltered(filtered()).to_string();
        assert!(s.starts_with("$TARGETF,-33.8688000,151.2093000,r95_m=3.50*"));
        assert!(decode_line(s.as_bytes()).is_some());

        let w = Emission::TatWindow(TatWindow { accepted: 5, rejected: 2 });
        assert_eq!(w.payload(), "SEAK,TATSTAT,acc2s=5,rej2s=2");
        assert!(decode_line(w.to_sentence().as_bytes()).is_some());
    }

    #[test]
    fn test_json() {
        let v: serde_json::Value = serde_json::from_str(&Emission::Target(raw()).to_json()).unwrap();
        assert_eq!(v["targetf"]["dist_m"], 100.0);
        assert_eq!(v["targetf"]["lat"], 47.5);
        assert!(v["targetf"].get("filtered").is_none());
        assert!(v.get("target").is_none());

        let v: serde_json::Value = serde_json::from_str(&Emission::TargetFiltered(filtered()).to_json()).unwrap();
        assert_eq!(v["targetf"]["filtered"], true);
        assert_eq!(v["targetf"]["r95_m"], 3.5);
        assert!(v.get("filtered").is_none());
    }

    #[test]
    fn test_target_as_gga() {
        let utc = UtcTime { hour: 9, minute: 5, second: 7.6 };
        let s = target_as_gga(&filtered(), Some(utc));
        assert!(s.starts_with("$GPGGA,090507.00,3352.12800,S,15112.55800,E,1,08,"));

        let gga = decode_line(s.as_bytes()).unwrap();
        assert_eq!(gga.kind(), SentenceKind::Gga);
        assert!(gga.has_required_fields());
        let lat = parse_coordinate(gga.field(2).unwrap(), gga.field(3), 2).unwrap();
        let lon = parse_coordinate(gga.field(4).unwrap(), gga.field(5), 3).unwrap();
        assert!((lat - -33.8688).abs() < 1e-6);
        assert!((lon - 151.2093).abs() < 1e-6);
    }
}
