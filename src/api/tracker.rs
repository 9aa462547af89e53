//! Target tracker: fusion scheduling, Kalman smoothing, and the context
//! that wires the sensor channels to it

use crate::algorithms::fusion::{compute_raw_target, RawTarget};
use crate::algorithms::projection::{ProjectionError, UtmCoordinate};
use crate::api::channels::{AcousticChannel, DepthChannel, GnssChannel};
use crate::api::formatting::Emission;
use crate::api::shared::{Shared, Telemetry};
use crate::core::{AcousticReading, FilteredTargetFix, GnssFix, RawTargetFix, R95_FACTOR};
use crate::hardware::{CommResult, MockFix, MockRangingGenerator, SensorPort};
use crate::processing::kalman::TargetKalmanFilter;
use crate::utils::config::{FusionCadenceConfig, KalmanConfig, RuntimeConfig};
use log::{debug, info, trace, warn};

/// UTM zone and hemisphere the filter state is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFrame {
    pub zone: u8,
    pub north: bool,
}

impl TrackFrame {
    fn of(point: &UtmCoordinate) -> Self {
        Self {
            zone: point.zone,
            north: point.north,
        }
    }

    fn contains(&self, point: &UtmCoordinate) -> bool {
        self.zone == point.zone && self.north == point.north
    }
}

/// Decides when to fuse and keeps the target track.
///
/// A computation runs when the ping counter changed and the previous
/// ping-triggered computation is at least `min_emit_interval_ms` old, or when
/// the periodic interval elapsed. Pings arriving inside the rate limit are
/// consumed without a computation. At most one computation runs per tick.
#[derive(Debug, Clone, Default)]
pub struct TargetTracker {
    filter: TargetKalmanFilter,
    /// Fixed when the filter initializes; kept until reset
    frame: Option<TrackFrame>,
    last_ping_seen: u64,
    last_triggered_ms: Option<u64>,
    last_periodic_ms: u64,
    /// Time of the previous filter step, for the prediction interval
    last_step_ms: Option<u64>,
    computations: u64,
    gated_out: u64,
    last_raw: Option<RawTargetFix>,
    last_filtered: Option<FilteredTargetFix>,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the scheduler once; returns what was produced this tick
    pub fn tick(
        &mut self,
        now_ms: u64,
        fix: &GnssFix,
        reading: &AcousticReading,
        config: &RuntimeConfig,
    ) -> Vec<Emission> {
        if !self.is_due(now_ms, reading.ping_counter, &config.fusion) {
            return Vec::new();
        }
        self.compute(now_ms, fix, reading, config)
    }

    /// [`tick`](Self::tick) on the latest shared records; publishes the
    /// resulting fixes back to the telemetry
    pub fn run(&mut self, now_ms: u64, telemetry: &Telemetry, config: &Shared<RuntimeConfig>) -> Vec<Emission> {
        let reading = telemetry.acoustic.snapshot();
        let fix = telemetry.gnss.snapshot();
        let config = config.snapshot();

        let out = self.tick(now_ms, &fix, &reading, &config);
        for emission in &out {
            match emission {
                Emission::Target(raw) => telemetry.raw_target.publish(Some(*raw)),
                Emission::TargetFiltered(filtered) => telemetry.filtered_target.publish(Some(*filtered)),
                Emission::TatWindow(_) => {}
            }
        }
        out
    }

    fn is_due(&mut self, now_ms: u64, ping_counter: u64, cadence: &FusionCadenceConfig) -> bool {
        let mut triggered = false;
        if ping_counter != self.last_ping_seen {
            self.last_ping_seen = ping_counter;
            let spaced = self
                .last_triggered_ms
                .map_or(true, |t| now_ms.saturating_sub(t) >= cadence.min_emit_interval_ms);
            if spaced {
                self.last_triggered_ms = Some(now_ms);
                triggered = true;
            } else {
                trace!("ping {} inside rate limit", ping_counter);
            }
        }

        let periodic = cadence.periodic_interval_ms > 0
            && now_ms.saturating_sub(self.last_periodic_ms) >= cadence.periodic_interval_ms;
        if periodic {
            self.last_periodic_ms = now_ms;
        }

        triggered || periodic
    }

    fn compute(
        &mut self,
        now_ms: u64,
        fix: &GnssFix,
        reading: &AcousticReading,
        config: &RuntimeConfig,
    ) -> Vec<Emission> {
        let raw = match compute_raw_target(fix, reading, &config.fusion_params(), now_ms) {
            Ok(raw) => raw,
            Err(skip) => {
                debug!("fusion skipped: {}", skip);
                return Vec::new();
            }
        };

        self.computations += 1;
        self.last_raw = Some(raw.fix);
        info!(
            "target {:.7}, {:.7} az {:.1} dist {:.1} m r95 {:.2} m",
            raw.fix.position.lat, raw.fix.position.lon, raw.fix.azimuth_deg, raw.fix.distance_m, raw.fix.r95_m
        );

        let mut out = vec![Emission::Target(raw.fix)];
        match self.filter_step(now_ms, &raw, &config.kalman) {
            Ok(Some(filtered)) => {
                self.last_filtered = Some(filtered);
                out.push(Emission::TargetFiltered(filtered));
            }
            Ok(None) => {}
            Err(e) => warn!("filtered target dropped: {}", e),
        }
        out
    }

    fn filter_step(
        &mut self,
        now_ms: u64,
        raw: &RawTarget,
        kalman: &KalmanConfig,
    ) -> Result<Option<FilteredTargetFix>, ProjectionError> {
        let dt = self
            .last_step_ms
            .map_or(0.0, |t| now_ms.saturating_sub(t) as f64 / 1000.0);

        let frame = match self.frame {
            Some(frame) if self.filter.is_initialized() => frame,
            _ => {
                let frame = TrackFrame::of(&raw.planar);
                info!("track frame: zone {}{}", frame.zone, if frame.north { 'N' } else { 'S' });
                self.frame = Some(frame);
                frame
            }
        };

        let measured = if frame.contains(&raw.planar) {
            raw.planar
        } else {
            let p = raw.fix.position;
            UtmCoordinate::from_geodetic_in_zone(p.lat, p.lon, frame.zone, frame.north)?
        };

        self.last_step_ms = Some(now_ms);
        self.filter.predict(dt, kalman.accel_std);
        let decision = self
            .filter
            .update_gated(measured.easting, measured.northing, raw.measurement_std_m, kalman.gate);
        if !decision.is_accepted() {
            self.gated_out += 1;
            debug!("measurement gated out: innovation {:.2} >= {:.2}", decision.innovation(), kalman.gate);
            return Ok(None);
        }

        let state = self.filter.position();
        let position = UtmCoordinate {
            zone: frame.zone,
            north: frame.north,
            easting: state.x,
            northing: state.y,
        }
        .to_geodetic()?;

        Ok(Some(FilteredTargetFix {
            position,
            r95_m: R95_FACTOR * self.filter.mean_position_variance().sqrt(),
            innovation: decision.innovation(),
            at_ms: now_ms,
        }))
    }

    /// Forget the track; the next computation starts a new one
    pub fn reset(&mut self) {
        self.filter.reset();
        self.frame = None;
        self.last_step_ms = None;
        self.last_filtered = None;
    }

    pub fn frame(&self) -> Option<TrackFrame> {
        self.frame
    }

    pub fn filter(&self) -> &TargetKalmanFilter {
        &self.filter
    }

    pub fn last_raw(&self) -> Option<&RawTargetFix> {
        self.last_raw.as_ref()
    }

    pub fn last_filtered(&self) -> Option<&FilteredTargetFix> {
        self.last_filtered.as_ref()
    }

    /// Raw computations that produced a fix
    pub fn computations(&self) -> u64 {
        self.computations
    }

    /// Measurements withheld by the innovation gate
    pub fn gated_out(&self) -> u64 {
        self.gated_out
    }
}

/// Components of a [`TrackerContext`], for running each on its own task
pub struct ContextParts {
    pub config: Shared<RuntimeConfig>,
    pub telemetry: Telemetry,
    pub gnss: GnssChannel,
    pub acoustic: AcousticChannel,
    pub depth: DepthChannel,
    pub tracker: TargetTracker,
}

/// Everything the tracker needs, owned in one place
pub struct TrackerContext {
    config: Shared<RuntimeConfig>,
    telemetry: Telemetry,
    gnss: GnssChannel,
    acoustic: AcousticChannel,
    depth: DepthChannel,
    tracker: TargetTracker,
}

impl TrackerContext {
    /// Context with no ports attached; add them with the `with_*` builders
    /// or switch feeds to mock data
    pub fn new(config: Shared<RuntimeConfig>) -> Self {
        let telemetry = Telemetry::default();
        Self {
            gnss: GnssChannel::new(None, telemetry.gnss.clone()),
            acoustic: AcousticChannel::new(None, config.clone(), telemetry.acoustic.clone()),
            depth: DepthChannel::new(None, telemetry.depth.clone()),
            tracker: TargetTracker::new(),
            config,
            telemetry,
        }
    }

    pub fn with_gnss_port(mut self, port: Box<dyn SensorPort>) -> Self {
        self.gnss = GnssChannel::new(Some(port), self.telemetry.gnss.clone());
        self
    }

    pub fn with_acoustic_port(mut self, port: Box<dyn SensorPort>) -> Self {
        self.acoustic = AcousticChannel::new(Some(port), self.config.clone(), self.telemetry.acoustic.clone());
        self
    }

    pub fn with_depth_port(mut self, port: Box<dyn SensorPort>) -> Self {
        self.depth = DepthChannel::new(Some(port), self.telemetry.depth.clone());
        self
    }

    pub fn poll_gnss(&mut self, now_ms: u64) {
        self.gnss.poll(now_ms);
    }

    /// Returns TAT window reports completed during the poll
    pub fn poll_acoustic(&mut self, now_ms: u64) -> Vec<Emission> {
        self.acoustic.poll(now_ms)
    }

    pub fn poll_depth(&mut self, now_ms: u64) {
        self.depth.poll(now_ms);
    }

    pub fn run_fusion(&mut self, now_ms: u64) -> Vec<Emission> {
        self.tracker.run(now_ms, &self.telemetry, &self.config)
    }

    /// Poll every sensor, then fuse
    pub fn step(&mut self, now_ms: u64) -> Vec<Emission> {
        self.poll_gnss(now_ms);
        let mut out = self.poll_acoustic(now_ms);
        self.poll_depth(now_ms);
        out.extend(self.run_fusion(now_ms));
        out
    }

    pub fn set_gnss_mock(&mut self, mock: Option<MockFix>) {
        self.gnss.set_mock(mock);
    }

    pub fn set_ranging_mock(&mut self, generator: Option<MockRangingGenerator>) {
        self.acoustic.set_mock(generator);
    }

    pub fn send_acoustic_command(&mut self, payload: &str) -> CommResult<()> {
        self.acoustic.send_command(payload)
    }

    pub fn send_acoustic_preset(&mut self, index: usize) -> CommResult<()> {
        self.acoustic.send_preset(index)
    }

    pub fn feed_gnss_corrections(&mut self, data: &[u8]) -> CommResult<()> {
        self.gnss.feed_corrections(data)
    }

    pub fn reset_tracker(&mut self) {
        self.tracker.reset();
    }

    pub fn config(&self) -> &Shared<RuntimeConfig> {
        &self.config
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn gnss(&self) -> &GnssChannel {
        &self.gnss
    }

    pub fn acoustic(&self) -> &AcousticChannel {
        &self.acoustic
    }

    pub fn depth(&self) -> &DepthChannel {
        &self.depth
    }

    pub fn tracker(&self) -> &TargetTracker {
        &self.tracker
    }

    pub fn into_parts(self) -> ContextParts {
        ContextParts {
            config: self.config,
            telemetry: self.telemetry,
            gnss: self.gnss,
            acoustic: self.acoustic,
            depth: self.depth,
            tracker: self.tracker,
        }
    }
}
