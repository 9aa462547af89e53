//! Sensor channels: one reader, its port and its data feed
//!
//! A channel is the unit a sensor task owns. Polling decodes what the port
//! has ready (or generates a synthetic sample in mock mode) and publishes
//! the updated record to the shared telemetry.

use crate::api::formatting::Emission;
use crate::api::shared::Shared;
use crate::core::{AcousticReading, DepthReading, GnssFix, TAT_PERIOD_MS};
use crate::hardware::{CommError, CommResult, MockFix, MockRangingGenerator, SensorPort};
use crate::processing::sentence::DecoderStats;
use crate::sensors::acoustic;
use crate::sensors::{AcousticReader, DepthReader, GnssReader};
use crate::utils::config::RuntimeConfig;
use log::info;

/// Spacing of synthetic pings, matching the unit's ping period
pub const MOCK_PING_INTERVAL_MS: u64 = TAT_PERIOD_MS as u64;

/// Where the platform fix comes from
pub enum GnssFeed {
    Live,
    Mock(MockFix),
}

/// Where bearing/range comes from
pub enum RangingFeed {
    Live,
    Mock {
        generator: MockRangingGenerator,
        last_sample_ms: Option<u64>,
    },
}

fn not_connected(port: &str) -> CommError {
    CommError::NotConnected { port: port.to_string() }
}

pub struct GnssChannel {
    reader: GnssReader,
    port: Option<Box<dyn SensorPort>>,
    feed: GnssFeed,
    out: Shared<GnssFix>,
}

impl GnssChannel {
    pub fn new(port: Option<Box<dyn SensorPort>>, out: Shared<GnssFix>) -> Self {
        Self {
            reader: GnssReader::gnss(),
            port,
            feed: GnssFeed::Live,
            out,
        }
    }

    /// Decode pending receiver output, or refresh the synthetic fix
    pub fn poll(&mut self, now_ms: u64) -> DecoderStats {
        let stats = match &self.feed {
            GnssFeed::Mock(mock) => {
                self.reader.handler_mut().apply_mock(mock, now_ms);
                DecoderStats::default()
            }
            GnssFeed::Live => match self.port.as_mut() {
                Some(port) => self.reader.poll(port, now_ms),
                None => DecoderStats::default(),
            },
        };
        self.out.publish(self.reader.fix().clone());
        stats
    }

    /// `Some` switches to the synthetic fix, `None` back to the receiver
    pub fn set_mock(&mut self, mock: Option<MockFix>) {
        self.reader.discard_partial();
        self.feed = match mock {
            Some(mock) => {
                info!("gnss: mock fix at {:.6}, {:.6}", mock.latitude, mock.longitude);
                GnssFeed::Mock(mock)
            }
            None => {
                info!("gnss: live feed");
                GnssFeed::Live
            }
        };
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.feed, GnssFeed::Mock(_))
    }

    /// Forward correction data to the receiver
    pub fn feed_corrections(&mut self, data: &[u8]) -> CommResult<()> {
        let port = self.port.as_mut().ok_or_else(|| not_connected(self.reader.name()))?;
        self.reader.feed_corrections(port, data)
    }

    pub fn reader(&self) -> &GnssReader {
        &self.reader
    }
}

pub struct AcousticChannel {
    reader: AcousticReader,
    port: Option<Box<dyn SensorPort>>,
    feed: RangingFeed,
    config: Shared<RuntimeConfig>,
    out: Shared<AcousticReading>,
}

impl AcousticChannel {
    pub fn new(
        port: Option<Box<dyn SensorPort>>,
        config: Shared<RuntimeConfig>,
        out: Shared<AcousticReading>,
    ) -> Self {
        Self {
            reader: AcousticReader::seaker(),
            port,
            feed: RangingFeed::Live,
            config,
            out,
        }
    }

    /// Decode pending pings (or generate a synthetic one when due);
    /// returns the TAT window reports completed during this poll
    pub fn poll(&mut self, now_ms: u64) -> Vec<Emission> {
        let tat_filter = self.config.read(|c| c.tat_filter_enabled);
        self.reader.handler_mut().set_tat_filter(tat_filter);

        match &mut self.feed {
            RangingFeed::Mock { generator, last_sample_ms } => {
                let due = last_sample_ms.map_or(true, |t| now_ms.saturating_sub(t) >= MOCK_PING_INTERVAL_MS);
                if due {
                    *last_sample_ms = Some(now_ms);
                    let sample = generator.sample(now_ms);
                    self.reader.handler_mut().apply_synthetic(sample, now_ms);
                }
            }
            RangingFeed::Live => {
                if let Some(port) = self.port.as_mut() {
                    self.reader.poll(port, now_ms);
                }
            }
        }

        self.out.publish(self.reader.reading().clone());
        self.reader
            .handler_mut()
            .take_window_reports()
            .into_iter()
            .map(Emission::TatWindow)
            .collect()
    }

    /// `Some` switches to synthetic ranging, `None` back to the unit
    pub fn set_mock(&mut self, generator: Option<MockRangingGenerator>) {
        self.reader.discard_partial();
        self.feed = match generator {
            Some(generator) => {
                info!(
                    "seaker: mock ranging at {:.1} deg / {:.1} m",
                    generator.config().base_angle_deg,
                    generator.config().base_distance_m
                );
                RangingFeed::Mock { generator, last_sample_ms: None }
            }
            None => {
                info!("seaker: live feed");
                RangingFeed::Live
            }
        };
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.feed, RangingFeed::Mock { .. })
    }

    /// Send a raw payload (framed here) to the unit
    pub fn send_command(&mut self, payload: &str) -> CommResult<()> {
        let port = self.port.as_mut().ok_or_else(|| not_connected(self.reader.name()))?;
        acoustic::send_command(port, payload)
    }

    /// Send one of the configured `CONFIG` presets
    pub fn send_preset(&mut self, index: usize) -> CommResult<()> {
        let presets = self.config.read(|c| c.acoustic_presets.clone());
        let port = self.port.as_mut().ok_or_else(|| not_connected(self.reader.name()))?;
        acoustic::send_preset(port, &presets, index)
    }

    pub fn reader(&self) -> &AcousticReader {
        &self.reader
    }
}

pub struct DepthChannel {
    reader: DepthReader,
    port: Option<Box<dyn SensorPort>>,
    out: Shared<DepthReading>,
}

impl DepthChannel {
    pub fn new(port: Option<Box<dyn SensorPort>>, out: Shared<DepthReading>) -> Self {
        Self {
            reader: DepthReader::sounder(),
            port,
            out,
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> DecoderStats {
        let Some(port) = self.port.as_mut() else {
            return DecoderStats::default();
        };
        let stats = self.reader.poll(port, now_ms);
        if stats.sentences > 0 {
            self.out.publish(self.reader.reading().clone());
        }
        stats
    }

    pub fn reader(&self) -> &DepthReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MockPort, MockRangingConfig};

    #[test]
    fn test_gnss_channel_publishes() {
        let out = Shared::new(GnssFix::default());
        let mut port = MockPort::new("gnss");
        port.push_sentence("GPHDT,271.5,T");
        let mut channel = GnssChannel::new(Some(Box::new(port)), out.clone());

        let stats = channel.poll(100);
        assert_eq!(stats.sentences, 1);
        assert_eq!(out.snapshot().azimuth_deg(), Some(271.5));

        channel.set_mock(Some(MockFix::default()));
        assert!(channel.is_mock());
        channel.poll(200);
        let fix = out.snapshot();
        assert!(fix.valid);
        assert_eq!(fix.position().map(|p| p.lat), Some(47.5));
        assert_eq!(channel.reader().handler().recent(1).len(), 1);
    }

    #[test]
    fn test_channels_without_port() {
        let config = Shared::new(RuntimeConfig::default());
        let mut acoustic = AcousticChannel::new(None, config, Shared::new(AcousticReading::default()));
        assert!(acoustic.poll(0).is_empty());
        assert!(matches!(acoustic.send_command("GOSEAK"), Err(CommError::NotConnected { .. })));
        assert!(matches!(acoustic.send_preset(0), Err(CommError::NotConnected { .. })));

        let mut gnss = GnssChannel::new(None, Shared::new(GnssFix::default()));
        assert!(gnss.feed_corrections(b"\xd3\x00").is_err());

        let mut depth = DepthChannel::new(None, Shared::new(DepthReading::default()));
        assert_eq!(depth.poll(0), DecoderStats::default());
    }

    #[test]
    fn test_mock_ranging_rate() {
        let config = Shared::new(RuntimeConfig::default());
        let out = Shared::new(AcousticReading::default());
        let mut channel = AcousticChannel::new(None, config, out.clone());
        channel.set_mock(Some(MockRangingGenerator::with_seed(MockRangingConfig::default(), 7)));

        let mut t = 0;
        while t <= 6000 {
            channel.poll(t);
            t += 100;
        }
        // samples at 0, 2000, 4000, 6000
        let reading = out.snapshot();
        assert_eq!(reading.ping_counter, 4);
        assert_eq!(reading.status.as_deref(), Some("MOCK"));
        assert_eq!(reading.status_code(), Some(2));
    }

    #[test]
    fn test_tat_filter_follows_config() {
        let config = Shared::new(RuntimeConfig::default());
        let out = Shared::new(AcousticReading::default());
        let mut port = MockPort::new("seaker");
        port.push_sentence("DTPING,1,1500,123.0,1000");
        let mut channel = AcousticChannel::new(Some(Box::new(port)), config.clone(), out.clone());

        channel.poll(10);
        assert_eq!(out.snapshot().rejected_pings, 1);

        config.update(|c| c.tat_filter_enabled = false);
        channel.poll(20);
        assert!(!channel.reader().handler().tat_filter());
    }
}
