use nalgebra::{Vector2, Vector4};

/// Initial velocity variance ((m/s)^2) after (re)initialization
const INITIAL_VELOCITY_VARIANCE: f64 = 100.0;

/// Outcome of a gated measurement update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Measurement applied to the state
    Accepted { innovation: f64 },
    /// Measurement withheld; the state keeps its predicted value
    Rejected { innovation: f64 },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }

    pub fn innovation(&self) -> f64 {
        match *self {
            GateDecision::Accepted { innovation } | GateDecision::Rejected { innovation } => innovation,
        }
    }
}

/// Constant-velocity Kalman filter for the target track in a planar frame
/// State vector: [x, y, vx, vy] (meters, meters/second)
///
/// Only the diagonal of the covariance is carried and each axis is corrected
/// with its own scalar gain. Cross-axis terms are not modeled.
#[derive(Debug, Clone)]
pub struct TargetKalmanFilter {
    /// Current state estimate [position, velocity]
    pub state: Vector4<f64>,
    /// Variances of [x, y, vx, vy]
    pub variance: Vector4<f64>,
    initialized: bool,
}

impl Default for TargetKalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetKalmanFilter {
    pub fn new() -> Self {
        Self {
            state: Vector4::zeros(),
            variance: Vector4::zeros(),
            initialized: false,
        }
    }

    /// Initialize at a measured position, at rest
    pub fn initialize(&mut self, x: f64, y: f64, position_std: f64) {
        let r2 = position_std * position_std;
        self.state = Vector4::new(x, y, 0.0, 0.0);
        self.variance = Vector4::new(r2, r2, INITIAL_VELOCITY_VARIANCE, INITIAL_VELOCITY_VARIANCE);
        self.initialized = true;
    }

    /// Propagate by `dt` seconds with white acceleration noise of `accel_std` (m/s^2)
    pub fn predict(&mut self, dt: f64, accel_std: f64) {
        if !self.initialized || dt <= 0.0 {
            return;
        }
        let q = accel_std * accel_std;
        let half_dt2 = dt * dt * 0.5;

        self.state[0] += self.state[2] * dt;
        self.state[1] += self.state[3] * dt;

        self.variance[0] += self.variance[2] * dt * dt + q * half_dt2 * half_dt2;
        self.variance[1] += self.variance[3] * dt * dt + q * half_dt2 * half_dt2;
        self.variance[2] += q * dt;
        self.variance[3] += q * dt;
    }

    /// Normalized innovation of a measurement against the current state,
    /// without touching the filter
    pub fn innovation(&self, x: f64, y: f64, position_std: f64) -> f64 {
        let r2 = position_std * position_std;
        let residual = Vector2::new(x - self.state[0], y - self.state[1]);
        let s = Vector2::new(self.variance[0] + r2, self.variance[1] + r2);
        Vector2::new(residual.x / s.x.sqrt(), residual.y / s.y.sqrt()).norm()
    }

    /// Position measurement update; returns the normalized innovation.
    /// An uninitialized filter initializes from the measurement and returns 0.
    pub fn update(&mut self, x: f64, y: f64, position_std: f64) -> f64 {
        if !self.initialized {
            self.initialize(x, y, position_std);
            return 0.0;
        }

        let innovation = self.innovation(x, y, position_std);
        let r2 = position_std * position_std;

        for axis in 0..2 {
            let measured = if axis == 0 { x } else { y };
            let residual = measured - self.state[axis];
            let s = self.variance[axis] + r2;
            let gain = self.variance[axis] / s;
            self.state[axis] += gain * residual;
            self.variance[axis] *= 1.0 - gain;
        }

        innovation
    }

    /// Update only when the innovation is strictly below `gate`
    pub fn update_gated(&mut self, x: f64, y: f64, position_std: f64, gate: f64) -> GateDecision {
        if !self.initialized {
            self.initialize(x, y, position_std);
            return GateDecision::Accepted { innovation: 0.0 };
        }

        let innovation = self.innovation(x, y, position_std);
        if innovation < gate {
            self.update(x, y, position_std);
            GateDecision::Accepted { innovation }
        } else {
            GateDecision::Rejected { innovation }
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.state[0], self.state[1])
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.state[2], self.state[3])
    }

    /// Standard deviations of x and y
    pub fn position_std(&self) -> Vector2<f64> {
        Vector2::new(self.variance[0].max(0.0).sqrt(), self.variance[1].max(0.0).sqrt())
    }

    /// Mean positional variance over both axes
    pub fn mean_position_variance(&self) -> f64 {
        ((self.variance[0] + self.variance[1]) * 0.5).max(0.0)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_initializes() {
        let mut filter = TargetKalmanFilter::new();
        assert!(!filter.is_initialized());

        let innovation = filter.update(10.0, 20.0, 3.0);
        assert_eq!(innovation, 0.0);
        assert!(filter.is_initialized());
        assert!((filter.position() - Vector2::new(10.0, 20.0)).norm() < 1e-12);
        assert!((filter.variance[0] - 9.0).abs() < 1e-12);
        assert!((filter.variance[2] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_moves_with_velocity() {
        let mut filter = TargetKalmanFilter::new();
        filter.initialize(0.0, 0.0, 1.0);
        filter.state[2] = 2.0;
        filter.state[3] = -1.0;

        filter.predict(2.0, 0.5);
        assert!((filter.position() - Vector2::new(4.0, -2.0)).norm() < 1e-12);

        // Pxx = 1 + 100 * 4 + 0.25 * 16 / 4
        assert!((filter.variance[0] - 402.0).abs() < 1e-9);
        // Pvx = 100 + 0.25 * 2
        assert!((filter.variance[2] - 100.5).abs() < 1e-9);
    }

    #[test]
    fn test_predict_ignored_before_init() {
        let mut filter = TargetKalmanFilter::new();
        filter.predict(5.0, 1.0);
        assert_eq!(filter.variance, Vector4::zeros());
    }

    #[test]
    fn test_update_shrinks_variance() {
        let mut filter = TargetKalmanFilter::new();
        filter.initialize(0.0, 0.0, 2.0);
        let before = filter.position_std();

        filter.update(1.0, 1.0, 2.0);
        let pos = filter.position();
        assert!((pos.x - 0.5).abs() < 1e-12);
        assert!((pos.y - 0.5).abs() < 1e-12);
        assert!(filter.position_std().x < before.x);
    }

    #[test]
    fn test_gate_boundary_is_exclusive() {
        // S = 9 + 16 = 25, residual 20 => innovation exactly 4
        let mut filter = TargetKalmanFilter::new();
        filter.initialize(0.0, 0.0, 3.0);
        assert_eq!(filter.innovation(20.0, 0.0, 4.0), 4.0);

        let decision = filter.update_gated(20.0, 0.0, 4.0, 4.0);
        assert_eq!(decision, GateDecision::Rejected { innovation: 4.0 });
        assert_eq!(filter.position(), Vector2::new(0.0, 0.0));
        assert!((filter.variance[0] - 9.0).abs() < 1e-12);

        let decision = filter.update_gated(19.0, 0.0, 4.0, 4.0);
        assert!(decision.is_accepted());
        assert!(filter.position().x > 0.0);
    }

    #[test]
    fn test_outlier_does_not_corrupt_track() {
        let mut filter = TargetKalmanFilter::new();
        filter.initialize(100.0, 200.0, 2.0);
        for _ in 0..5 {
            filter.predict(1.0, 0.5);
            assert!(filter.update_gated(100.0, 200.0, 2.0, 4.0).is_accepted());
        }

        filter.predict(1.0, 0.5);
        let decision = filter.update_gated(1e12, -1e12, 2.0, 4.0);
        assert!(!decision.is_accepted());
        assert!(decision.innovation() > 1e6);

        filter.predict(1.0, 0.5);
        assert!(filter.update_gated(101.0, 200.5, 2.0, 4.0).is_accepted());
        let pos = filter.position();
        assert!((pos.x - 100.5).abs() < 1.0);
        assert!((pos.y - 200.25).abs() < 1.0);
    }

    #[test]
    fn test_uninitialized_gated_update_accepts() {
        let mut filter = TargetKalmanFilter::new();
        let decision = filter.update_gated(5.0, 5.0, 1.0, 0.0);
        assert_eq!(decision, GateDecision::Accepted { innovation: 0.0 });
        assert!(filter.is_initialized());

        filter.reset();
        assert!(!filter.is_initialized());
    }
}
