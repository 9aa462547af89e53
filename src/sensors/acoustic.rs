//! SEAKER acoustic ranging reader
//!
//! Two sentences come from the unit:
//! - `DTPING`: a ranging ping, either `DTPING,<tof>,<tat_ms>,<bearing>,<range_dm>`
//!   or the legacy `DTPING,<bearing>,<range_m>`
//! - `STATUS`: link state and quality, `STATUS,<status>,<freq>,<snr>,<etx>,<erx>`
//!
//! Pings whose turnaround time is not close to a multiple of the ping period
//! are rejected when the TAT filter is on. A rejected ping is counted but
//! never changes bearing, range or the ping counter.

use crate::core::{AcousticReading, Reported, TatWindow, TAT_PERIOD_MS, TAT_TOLERANCE_MS, TAT_WINDOW_MS};
use crate::hardware::{CommError, CommResult, CommandSink, RangingSample};
use crate::processing::sentence::{self, Sentence, SentenceHandler, SentenceKind, MAX_LINE_LEN};
use crate::sensors::SentenceReader;
use log::{debug, info};

/// Bytes decoded per poll; keeps one poll short on a busy link
pub const ACOUSTIC_POLL_BUDGET: usize = 256;

/// Window reports kept until collected
const MAX_PENDING_REPORTS: usize = 16;

/// Status text reported for synthetic data
pub const MOCK_STATUS: &str = "MOCK";

/// SEAKER reader: line decoding + ping/status parsing
pub type AcousticReader = SentenceReader<AcousticParser>;

impl AcousticReader {
    pub fn seaker() -> Self {
        SentenceReader::new("seaker", AcousticParser::new()).with_budget(ACOUSTIC_POLL_BUDGET)
    }

    pub fn reading(&self) -> &AcousticReading {
        self.handler().reading()
    }
}

/// Whether a turnaround time sits within tolerance of a period multiple
/// (bounds inclusive)
pub fn tat_accepted(tat_ms: u32) -> bool {
    let r = tat_ms % TAT_PERIOD_MS;
    r <= TAT_TOLERANCE_MS || r >= TAT_PERIOD_MS - TAT_TOLERANCE_MS
}

/// Frame a payload and send it to the unit
pub fn send_command(sink: &mut dyn CommandSink, payload: &str) -> CommResult<()> {
    if payload.is_empty() || payload.contains(&['$', '*', '\r', '\n'][..]) {
        return Err(CommError::InvalidPayload {
            details: format!("{:?}", payload),
        });
    }
    let frame = sentence::encode(payload);
    if frame.len() > MAX_LINE_LEN {
        return Err(CommError::FrameTooLong { len: frame.len(), max: MAX_LINE_LEN });
    }
    debug!("seaker <- {}", frame.trim_end());
    sink.write_all(frame.as_bytes())
}

/// Send one of the stored configuration presets
pub fn send_preset(sink: &mut dyn CommandSink, presets: &[String], index: usize) -> CommResult<()> {
    let payload = presets
        .get(index)
        .filter(|p| !p.trim().is_empty())
        .ok_or(CommError::UnknownPreset { index })?;
    send_command(sink, payload.trim())
}

/// Folds DTPING/STATUS sentences into an [`AcousticReading`]
#[derive(Debug, Clone)]
pub struct AcousticParser {
    reading: AcousticReading,
    tat_filter: bool,
    window_started_ms: u64,
    /// Lifetime counters at the start of the current window
    window_base: TatWindow,
    reports: Vec<TatWindow>,
}

impl Default for AcousticParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AcousticParser {
    pub fn new() -> Self {
        Self {
            reading: AcousticReading::default(),
            tat_filter: true,
            window_started_ms: 0,
            window_base: TatWindow::default(),
            reports: Vec::new(),
        }
    }

    pub fn reading(&self) -> &AcousticReading {
        &self.reading
    }

    pub fn set_tat_filter(&mut self, enabled: bool) {
        self.tat_filter = enabled;
    }

    pub fn tat_filter(&self) -> bool {
        self.tat_filter
    }

    /// Window reports produced since the last call
    pub fn take_window_reports(&mut self) -> Vec<TatWindow> {
        std::mem::take(&mut self.reports)
    }

    /// Synthetic ranging sample in place of a DTPING; counts as an accepted ping
    pub fn apply_synthetic(&mut self, sample: RangingSample, now_ms: u64) {
        self.reading.bearing_deg = Some(Reported::new(sample.bearing_deg, now_ms));
        self.reading.range_m = Some(Reported::new(sample.range_m, now_ms));
        self.reading.status = Some(MOCK_STATUS.to_string());
        self.reading.ping_counter += 1;
        self.reading.accepted_pings += 1;
        self.update_window(now_ms);
    }

    fn handle_ping(&mut self, s: &Sentence<'_>, now_ms: u64) {
        let (tat_ms, bearing, range) = if s.len() >= 5 && s.field(3).is_some() && s.field(4).is_some() {
            let tat = s.float(2).filter(|t| *t >= 0.0).map(|t| t as u32);
            (tat, s.float(3), s.float(4).map(|dm| dm / 10.0))
        } else if s.field(1).is_some() && s.field(2).is_some() {
            (None, s.float(1), s.float(2))
        } else {
            (None, None, None)
        };

        if bearing.is_some() || range.is_some() {
            if tat_ms.is_some() {
                self.reading.last_tat_ms = tat_ms;
            }
            let accepted = match tat_ms {
                Some(tat) if self.tat_filter => tat_accepted(tat),
                _ => true,
            };

            if accepted {
                if let Some(b) = bearing {
                    self.reading.bearing_deg = Some(Reported::new(b, now_ms));
                }
                if let Some(r) = range {
                    self.reading.range_m = Some(Reported::new(r, now_ms));
                }
                self.reading.ping_counter += 1;
                self.reading.accepted_pings += 1;
            } else {
                self.reading.rejected_pings += 1;
                debug!("ping rejected: TAT {:?} ms", tat_ms);
            }
        }

        self.update_window(now_ms);
    }

    fn handle_status(&mut self, s: &Sentence<'_>) {
        self.reading.status = s.field(1).map(str::to_string);
        let fields = [
            (&mut self.reading.rx_frequency, 2),
            (&mut self.reading.snr, 3),
            (&mut self.reading.energy_tx, 4),
            (&mut self.reading.energy_rx, 5),
        ];
        for (slot, index) in fields {
            if let Some(v) = s.float(index) {
                *slot = Some(v);
            }
        }
    }

    fn update_window(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.window_started_ms) < TAT_WINDOW_MS {
            return;
        }
        let window = TatWindow {
            accepted: self.reading.accepted_pings - self.window_base.accepted,
            rejected: self.reading.rejected_pings - self.window_base.rejected,
        };
        self.reading.window = window;
        self.window_base = TatWindow {
            accepted: self.reading.accepted_pings,
            rejected: self.reading.rejected_pings,
        };
        self.window_started_ms = now_ms;
        info!("TAT window: accepted {} rejected {}", window.accepted, window.rejected);

        if self.reports.len() >= MAX_PENDING_REPORTS {
            self.reports.remove(0);
        }
        self.reports.push(window);
    }
}

impl SentenceHandler for AcousticParser {
    fn handle(&mut self, s: &Sentence<'_>, now_ms: u64) {
        if !s.has_required_fields() {
            return;
        }
        match s.kind() {
            SentenceKind::Ping => self.handle_ping(s, now_ms),
            SentenceKind::Status => self.handle_status(s),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Latest;
    use crate::hardware::MockPort;
    use crate::processing::sentence::decode_line;

    fn feed(parser: &mut AcousticParser, payload: &str, now_ms: u64) {
        let line = sentence::encode(payload);
        let sentence = decode_line(line.trim_end().as_bytes()).unwrap();
        parser.handle(&sentence, now_ms);
    }

    #[test]
    fn test_tat_boundaries() {
        for tat in [0, 100, 1900, 2000, 2100, 3900, 4000, 4100] {
            assert!(tat_accepted(tat), "{} should pass", tat);
        }
        for tat in [101, 1000, 1899, 2101, 2500, 3899, 4101] {
            assert!(!tat_accepted(tat), "{} should fail", tat);
        }
    }

    #[test]
    fn test_new_format_converts_decimeters() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "DTPING,1234,2000,45.0,1234", 10);
        let reading = parser.reading();
        assert_eq!(reading.bearing_deg, Some(Reported::new(45.0, 10)));
        assert!((reading.range_m.latest().unwrap() - 123.4).abs() < 1e-9);
        assert_eq!(reading.ping_counter, 1);
        assert_eq!(reading.last_tat_ms, Some(2000));
    }

    #[test]
    fn test_legacy_format() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "DTPING,30.5,12.0", 10);
        assert_eq!(parser.reading().bearing_deg.latest(), Some(30.5));
        assert_eq!(parser.reading().range_m.latest(), Some(12.0));
        assert_eq!(parser.reading().last_tat_ms, None);
    }

    #[test]
    fn test_rejected_ping_leaves_state() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "DTPING,1,2000,10.0,500", 10);
        feed(&mut parser, "DTPING,1,2101,90.0,900", 20);
        let reading = parser.reading();
        assert_eq!(reading.bearing_deg.latest(), Some(10.0));
        assert_eq!(reading.range_m.latest(), Some(50.0));
        assert_eq!(reading.ping_counter, 1);
        assert_eq!(reading.rejected_pings, 1);

        parser.set_tat_filter(false);
        feed(&mut parser, "DTPING,1,2101,90.0,900", 30);
        assert_eq!(parser.reading().ping_counter, 2);
        assert_eq!(parser.reading().bearing_deg.latest(), Some(90.0));
    }

    #[test]
    fn test_alternating_tat_counts() {
        let mut parser = AcousticParser::new();
        for i in 0..10u64 {
            let tat = if i % 2 == 0 { 2000 } else { 2500 };
            feed(&mut parser, &format!("DTPING,1,{},45.0,100", tat), i * 100);
        }
        let reading = parser.reading();
        assert_eq!(reading.accepted_pings, 5);
        assert_eq!(reading.rejected_pings, 5);
        assert_eq!(reading.ping_counter, 5);
    }

    #[test]
    fn test_fields_update_independently() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "DTPING,1,2000,45.0,1000", 10);
        feed(&mut parser, "DTPING,1,2000,60.0,bad", 20);
        assert_eq!(parser.reading().bearing_deg.latest(), Some(60.0));
        assert_eq!(parser.reading().range_m, Some(Reported::new(100.0, 10)));

        // Nothing usable: not counted either way
        feed(&mut parser, "DTPING,1,2000,x,y", 30);
        assert_eq!(parser.reading().ping_counter, 2);
        assert_eq!(parser.reading().rejected_pings, 0);
    }

    #[test]
    fn test_status_never_touches_ranging() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "STATUS,2,24000,18.5,1.2,0.8", 10);
        let reading = parser.reading();
        assert_eq!(reading.status.as_deref(), Some("2"));
        assert_eq!(reading.status_code(), Some(2));
        assert_eq!(reading.rx_frequency, Some(24000.0));
        assert_eq!(reading.snr, Some(18.5));
        assert_eq!(reading.energy_tx, Some(1.2));
        assert_eq!(reading.energy_rx, Some(0.8));
        assert_eq!(reading.ping_counter, 0);
        assert_eq!(reading.bearing_deg, None);
    }

    #[test]
    fn test_window_reports() {
        let mut parser = AcousticParser::new();
        feed(&mut parser, "DTPING,1,2000,45.0,100", 100);
        feed(&mut parser, "DTPING,1,2500,45.0,100", 500);
        assert!(parser.take_window_reports().is_empty());

        feed(&mut parser, "DTPING,1,4000,45.0,100", 2100);
        let reports = parser.take_window_reports();
        assert_eq!(reports, vec![TatWindow { accepted: 2, rejected: 1 }]);
        assert_eq!(parser.reading().window, reports[0]);

        feed(&mut parser, "DTPING,1,1000,45.0,100", 4200);
        assert_eq!(parser.take_window_reports(), vec![TatWindow { accepted: 0, rejected: 1 }]);
    }

    #[test]
    fn test_synthetic_sample_counts_as_ping() {
        let mut parser = AcousticParser::new();
        parser.apply_synthetic(RangingSample { bearing_deg: 12.0, range_m: 34.0 }, 5);
        let reading = parser.reading();
        assert_eq!(reading.ping_counter, 1);
        assert_eq!(reading.status_code(), Some(2));
        assert_eq!(reading.range_m.latest(), Some(34.0));
    }

    #[test]
    fn test_commands() {
        let mut port = MockPort::new("seaker");
        send_command(&mut port, "CONFIG,1,1,1500").unwrap();
        assert_eq!(port.sent()[0], sentence::encode("CONFIG,1,1,1500").into_bytes());

        assert!(matches!(send_command(&mut port, "A*B"), Err(CommError::InvalidPayload { .. })));
        assert!(matches!(send_command(&mut port, ""), Err(CommError::InvalidPayload { .. })));
        let long = "X".repeat(MAX_LINE_LEN);
        assert!(matches!(send_command(&mut port, &long), Err(CommError::FrameTooLong { .. })));

        let presets = vec!["CONFIG,2,1,1500".to_string(), String::new()];
        send_preset(&mut port, &presets, 0).unwrap();
        assert_eq!(port.sent().len(), 2);
        assert_eq!(send_preset(&mut port, &presets, 1), Err(CommError::UnknownPreset { index: 1 }));
        assert_eq!(send_preset(&mut port, &presets, 9), Err(CommError::UnknownPreset { index: 9 }));
    }

    #[test]
    fn test_reader_polls_port() {
        let mut port = MockPort::new("seaker");
        let mut reader = AcousticReader::seaker();
        port.push_sentence("STATUS,1");
        port.push_sentence("DTPING,1,2000,45.0,100");
        reader.poll(&mut port, 10);
        assert_eq!(reader.reading().ping_counter, 1);
        assert_eq!(reader.reading().status_code(), Some(1));
    }
}
