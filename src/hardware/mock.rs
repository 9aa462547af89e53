//! Mock ports and synthetic sensor data for testing and demos

use crate::hardware::{ByteSource, CommError, CommResult, CommandSink, PortStatus};
use crate::processing::sentence;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// In-memory port: bytes queued by the test, writes recorded
pub struct MockPort {
    status: PortStatus,
    rx_queue: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
}

impl MockPort {
    pub fn new(name: impl Into<String>) -> Self {
        let mut status = PortStatus::new(name);
        status.connected = true;
        Self {
            status,
            rx_queue: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queue raw bytes exactly as given
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.rx_queue.extend(bytes);
    }

    /// Queue a payload framed as `$payload*HH\r\n`
    pub fn push_sentence(&mut self, payload: &str) {
        self.push_bytes(sentence::encode(payload).as_bytes());
    }

    /// All writes received through [`CommandSink`]
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    pub fn disconnect(&mut self) {
        self.status.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.status.connected = true;
    }

    pub fn status(&self) -> &PortStatus {
        &self.status
    }
}

impl ByteSource for MockPort {
    fn refill(&mut self) -> CommResult<()> {
        if !self.status.connected {
            self.status.error_count += 1;
            return Err(CommError::NotConnected { port: self.status.name.clone() });
        }
        Ok(())
    }

    fn bytes_available(&self) -> usize {
        if self.status.connected {
            self.rx_queue.len()
        } else {
            0
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.status.connected {
            return None;
        }
        let byte = self.rx_queue.pop_front()?;
        self.status.bytes_received += 1;
        Some(byte)
    }
}

impl CommandSink for MockPort {
    fn write_all(&mut self, bytes: &[u8]) -> CommResult<()> {
        if !self.status.connected {
            return Err(CommError::NotConnected { port: self.status.name.clone() });
        }
        self.status.bytes_sent += bytes.len() as u64;
        self.sent.push(bytes.to_vec());
        Ok(())
    }
}

/// Parameters of the synthetic ranging source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRangingConfig {
    pub base_angle_deg: f64,
    pub base_distance_m: f64,
    /// Half-width of the uniform bearing noise (degrees)
    pub noise_angle_deg: f64,
    /// Half-width of the uniform range noise (meters)
    pub noise_distance_m: f64,
    pub sweep: bool,
    pub sweep_deg_per_sec: f64,
}

impl Default for MockRangingConfig {
    fn default() -> Self {
        Self {
            base_angle_deg: 0.0,
            base_distance_m: 10.0,
            noise_angle_deg: 3.0,
            noise_distance_m: 1.5,
            sweep: false,
            sweep_deg_per_sec: 0.0,
        }
    }
}

/// One synthetic bearing/range pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangingSample {
    pub bearing_deg: f64,
    pub range_m: f64,
}

/// Synthetic ranging data: base value, bounded uniform noise and an
/// optional sweep accumulated over time
pub struct MockRangingGenerator {
    config: MockRangingConfig,
    rng: StdRng,
    last_sample_ms: Option<u64>,
    sweep_offset_deg: f64,
}

impl MockRangingGenerator {
    pub fn new(config: MockRangingConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Deterministic generator for tests and replays
    pub fn with_seed(config: MockRangingConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: MockRangingConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            last_sample_ms: None,
            sweep_offset_deg: 0.0,
        }
    }

    pub fn config(&self) -> &MockRangingConfig {
        &self.config
    }

    pub fn sample(&mut self, now_ms: u64) -> RangingSample {
        let dt = self
            .last_sample_ms
            .map(|last| now_ms.saturating_sub(last) as f64 / 1000.0)
            .unwrap_or(0.0);
        self.last_sample_ms = Some(now_ms);

        if self.config.sweep {
            self.sweep_offset_deg =
                (self.sweep_offset_deg + self.config.sweep_deg_per_sec * dt).rem_euclid(360.0);
        }

        let angle_noise = self.rng.gen_range(-1.0..=1.0) * self.config.noise_angle_deg;
        let range_noise = self.rng.gen_range(-1.0..=1.0) * self.config.noise_distance_m;

        RangingSample {
            bearing_deg: (self.config.base_angle_deg + self.sweep_offset_deg + angle_noise).rem_euclid(360.0),
            range_m: (self.config.base_distance_m + range_noise).max(0.0),
        }
    }
}

/// Synthetic platform fix injected in place of the GNSS receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockFix {
    pub latitude: f64,
    pub longitude: f64,
    pub heading_deg: f64,
    /// Falls back to `heading_deg` when absent
    pub true_heading_deg: Option<f64>,
    pub speed_knots: f64,
    pub satellites: u16,
    pub hdop: f64,
    pub fix_quality: u8,
}

impl Default for MockFix {
    fn default() -> Self {
        Self {
            latitude: 47.5,
            longitude: -3.2,
            heading_deg: 0.0,
            true_heading_deg: None,
            speed_knots: 0.0,
            satellites: 12,
            hdop: 0.8,
            fix_quality: 1,
        }
    }
}
