//! GNSS fix builder
//!
//! Folds GGA/RMC/VTG/GSA and the true-heading sentences (HDT, THS, PASHR,
//! PSTI,036) into one [`GnssFix`]. Each sentence type updates only the
//! fields it carries; everything else keeps its previous value.

use crate::core::{FixQuality, GnssFix, Reported, UtcDate, UtcTime};
use crate::hardware::{CommResult, CommandSink, MockFix};
use crate::processing::sentence::{self, Sentence, SentenceHandler, SentenceKind};
use crate::sensors::SentenceReader;
use log::debug;
use std::collections::VecDeque;

/// Lines kept for diagnostics
pub const DEFAULT_RAW_LOG_LINES: usize = 64;

/// GNSS reader: line decoding + fix building
pub type GnssReader = SentenceReader<GnssFixBuilder>;

impl GnssReader {
    pub fn gnss() -> Self {
        SentenceReader::new("gnss", GnssFixBuilder::new())
    }

    pub fn fix(&self) -> &GnssFix {
        self.handler().fix()
    }

    /// Forward correction data (e.g. RTCM) to the receiver
    pub fn feed_corrections(&self, sink: &mut dyn CommandSink, data: &[u8]) -> CommResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        sink.write_all(data)
    }
}

/// Parse an NMEA `ddmm.mmmm` / `dddmm.mmmm` coordinate.
///
/// `max_degree_digits` is 2 for latitude and 3 for longitude. Returns `None`
/// for tokens shorter than 4 characters, without a decimal point, or that
/// do not parse.
pub fn parse_coordinate(token: &str, hemisphere: Option<&str>, max_degree_digits: usize) -> Option<f64> {
    let token = token.trim();
    if token.len() < 4 || !token.is_ascii() {
        return None;
    }
    let dot = token.find('.')?;
    let degree_len = dot.saturating_sub(2).clamp(2, max_degree_digits.max(2));

    let degrees: f64 = token.get(..degree_len)?.parse().ok()?;
    let minutes: f64 = token.get(degree_len..)?.parse().ok()?;
    let value = degrees + minutes / 60.0;
    if !value.is_finite() {
        return None;
    }

    match hemisphere.map(str::trim) {
        Some("S") | Some("W") => Some(-value),
        _ => Some(value),
    }
}

/// Render decimal degrees as an NMEA coordinate and hemisphere letter
pub fn format_coordinate(value: f64, is_latitude: bool, minute_decimals: usize) -> (String, char) {
    let hemisphere = match (is_latitude, value >= 0.0) {
        (true, true) => 'N',
        (true, false) => 'S',
        (false, true) => 'E',
        (false, false) => 'W',
    };
    let abs = value.abs();
    let scale = 10f64.powi(minute_decimals as i32);
    let mut degrees = abs.trunc();
    let mut minutes = ((abs - degrees) * 60.0 * scale).round() / scale;
    // 59.99999.. rounds up to a whole minute: carry into the degrees
    if minutes >= 60.0 {
        degrees += 1.0;
        minutes = 0.0;
    }
    let degree_width = if is_latitude { 2 } else { 3 };
    let text = format!(
        "{:0dw$}{:0mw$.md$}",
        degrees as u32,
        minutes,
        dw = degree_width,
        mw = minute_decimals + 3,
        md = minute_decimals
    );
    (text, hemisphere)
}

fn parse_time(token: &str) -> Option<UtcTime> {
    if token.len() < 6 || !token.is_ascii() {
        return None;
    }
    let hour: u8 = token[0..2].parse().ok()?;
    let minute: u8 = token[2..4].parse().ok()?;
    let second: f64 = token[4..].parse().ok()?;
    (hour < 24 && minute < 60 && second < 61.0).then_some(UtcTime { hour, minute, second })
}

fn parse_date(token: &str) -> Option<UtcDate> {
    if token.len() < 6 || !token.is_ascii() {
        return None;
    }
    let day: u8 = token[0..2].parse().ok()?;
    let month: u8 = token[2..4].parse().ok()?;
    let year: u16 = token[4..6].parse().ok()?;
    Some(UtcDate { year: 2000 + year, month, day })
}

/// Accumulates decoded GNSS sentences into a [`GnssFix`]
#[derive(Debug, Clone)]
pub struct GnssFixBuilder {
    fix: GnssFix,
    raw_log: VecDeque<String>,
    raw_log_lines: usize,
}

impl Default for GnssFixBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GnssFixBuilder {
    pub fn new() -> Self {
        Self::with_raw_log(DEFAULT_RAW_LOG_LINES)
    }

    pub fn with_raw_log(lines: usize) -> Self {
        Self {
            fix: GnssFix::default(),
            raw_log: VecDeque::with_capacity(lines),
            raw_log_lines: lines,
        }
    }

    pub fn fix(&self) -> &GnssFix {
        &self.fix
    }

    /// Up to `max_lines` most recent received lines, oldest first
    pub fn recent(&self, max_lines: usize) -> Vec<&str> {
        let skip = self.raw_log.len().saturating_sub(max_lines);
        self.raw_log.iter().skip(skip).map(String::as_str).collect()
    }

    /// Replace the fix with a synthetic one and log the matching RMC line
    pub fn apply_mock(&mut self, mock: &MockFix, now_ms: u64) {
        let at = |v| Some(Reported::new(v, now_ms));
        let true_heading = mock
            .true_heading_deg
            .filter(|h| h.is_finite())
            .unwrap_or(mock.heading_deg);

        self.fix = GnssFix {
            valid: true,
            latitude: at(mock.latitude),
            longitude: at(mock.longitude),
            heading_deg: at(mock.heading_deg),
            true_heading_deg: at(true_heading),
            speed_knots: at(mock.speed_knots),
            satellites: Some(Reported::new(mock.satellites, now_ms)),
            hdop: at(mock.hdop),
            fix_quality: Some(Reported::new(FixQuality::from_code(mock.fix_quality), now_ms)),
            ..Default::default()
        };

        let (lat, ns) = format_coordinate(mock.latitude, true, 4);
        let (lon, ew) = format_coordinate(mock.longitude, false, 4);
        let rmc = format!(
            "GPRMC,000000,A,{},{},{},{},{:.1},{:.1},010100,,",
            lat, ns, lon, ew, mock.speed_knots, mock.heading_deg
        );
        let line = sentence::encode(&rmc);
        self.log_line(line.trim_end());
    }

    fn log_line(&mut self, line: &str) {
        if self.raw_log_lines == 0 {
            return;
        }
        while self.raw_log.len() >= self.raw_log_lines {
            self.raw_log.pop_front();
        }
        self.raw_log.push_back(line.to_string());
    }

    fn set_position(&mut self, s: &Sentence<'_>, lat_idx: usize, lon_idx: usize, now_ms: u64) {
        if let Some(lat) = s.field(lat_idx).and_then(|t| parse_coordinate(t, s.field(lat_idx + 1), 2)) {
            self.fix.latitude = Some(Reported::new(lat, now_ms));
        }
        if let Some(lon) = s.field(lon_idx).and_then(|t| parse_coordinate(t, s.field(lon_idx + 1), 3)) {
            self.fix.longitude = Some(Reported::new(lon, now_ms));
        }
    }

    fn set_f64(slot: &mut Option<Reported<f64>>, value: Option<f64>, now_ms: u64) {
        if let Some(v) = value {
            *slot = Some(Reported::new(v, now_ms));
        }
    }

    fn handle_gga(&mut self, s: &Sentence<'_>, now_ms: u64) {
        self.set_position(s, 2, 4, now_ms);
        if let Some(code) = s.integer::<u8>(6) {
            let quality = FixQuality::from_code(code);
            self.fix.fix_quality = Some(Reported::new(quality, now_ms));
            self.fix.valid = quality != FixQuality::Invalid;
        }
        if let Some(sats) = s.integer::<u16>(7) {
            self.fix.satellites = Some(Reported::new(sats, now_ms));
        }
        Self::set_f64(&mut self.fix.hdop, s.float(8), now_ms);
        Self::set_f64(&mut self.fix.altitude_m, s.float(9), now_ms);
        Self::set_f64(&mut self.fix.geoid_m, s.float(11), now_ms);
        if let Some(time) = s.field(1).and_then(parse_time) {
            self.fix.time = Some(Reported::new(time, now_ms));
        }
    }

    fn handle_rmc(&mut self, s: &Sentence<'_>, now_ms: u64) {
        self.fix.valid = s.field(2) == Some("A");
        if s.field(4).is_some() {
            if let Some(lat) = s.field(3).and_then(|t| parse_coordinate(t, s.field(4), 2)) {
                self.fix.latitude = Some(Reported::new(lat, now_ms));
            }
        }
        if s.field(6).is_some() {
            if let Some(lon) = s.field(5).and_then(|t| parse_coordinate(t, s.field(6), 3)) {
                self.fix.longitude = Some(Reported::new(lon, now_ms));
            }
        }
        Self::set_f64(&mut self.fix.speed_knots, s.float(7), now_ms);
        Self::set_f64(&mut self.fix.heading_deg, s.float(8), now_ms);
        if let Some(date) = s.field(9).and_then(parse_date) {
            self.fix.date = Some(Reported::new(date, now_ms));
        }
        if let Some(time) = s.field(1).and_then(parse_time) {
            self.fix.time = Some(Reported::new(time, now_ms));
        }
        if let Some(mode) = s.field(12).and_then(|m| m.chars().next()) {
            self.fix.nav_mode = Some(Reported::new(mode, now_ms));
        }
    }

    fn handle_vtg(&mut self, s: &Sentence<'_>, now_ms: u64) {
        Self::set_f64(&mut self.fix.heading_deg, s.float(1), now_ms);
        Self::set_f64(&mut self.fix.speed_knots, s.float(5), now_ms);
    }

    fn handle_gsa(&mut self, s: &Sentence<'_>, now_ms: u64) {
        Self::set_f64(&mut self.fix.pdop, s.float(15), now_ms);
        Self::set_f64(&mut self.fix.hdop, s.float(16), now_ms);
        Self::set_f64(&mut self.fix.vdop, s.float(17), now_ms);
    }

    fn handle_true_heading(&mut self, s: &Sentence<'_>, index: usize, now_ms: u64) {
        if let Some(heading) = s.float(index) {
            debug!("{} true heading {:.1}", s.tag(), heading);
            self.fix.true_heading_deg = Some(Reported::new(heading, now_ms));
        }
    }
}

impl SentenceHandler for GnssFixBuilder {
    fn handle(&mut self, s: &Sentence<'_>, now_ms: u64) {
        if !s.has_required_fields() {
            return;
        }
        match s.kind() {
            SentenceKind::Gga => self.handle_gga(s, now_ms),
            SentenceKind::Rmc => self.handle_rmc(s, now_ms),
            SentenceKind::Vtg => self.handle_vtg(s, now_ms),
            SentenceKind::Gsa => self.handle_gsa(s, now_ms),
            SentenceKind::Hdt => self.handle_true_heading(s, 1, now_ms),
            SentenceKind::Pashr => self.handle_true_heading(s, 2, now_ms),
            SentenceKind::Psti036 => self.handle_true_heading(s, 4, now_ms),
            _ => {}
        }
    }

    fn on_line(&mut self, line: &[u8], _now_ms: u64) {
        let text = String::from_utf8_lossy(line);
        self.log_line(&text);
    }
}
