//! Damped azimuthal rotation of the globe.
//!
//! Two phases: idle spin (no target, constant increment per frame) and
//! seeking (close a fixed fraction of the shortest angular gap per frame,
//! then snap). All transitions go through pure functions on
//! [`RotationState`] so they can be driven without a renderer.

use std::f64::consts::{PI, TAU};

use foundation::math::{GeoPoint, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Rotation added per frame while idle (radians).
pub const DEFAULT_IDLE_STEP_RAD: f64 = 0.001;

/// Fraction of the remaining gap closed per frame while seeking.
pub const DEFAULT_DAMPING: f64 = 0.05;

/// Gap below which seeking snaps onto the target (radians).
pub const DEFAULT_SNAP_THRESHOLD_RAD: f64 = 0.01;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub idle_step_rad: f64,
    pub damping: f64,
    pub snap_threshold_rad: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            idle_step_rad: DEFAULT_IDLE_STEP_RAD,
            damping: DEFAULT_DAMPING,
            snap_threshold_rad: DEFAULT_SNAP_THRESHOLD_RAD,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RotationPhase {
    IdleSpin,
    Seeking { target: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RotationState {
    /// Current rotation about +Y (radians, unbounded).
    pub current_angle: f64,
    pub target_angle: Option<f64>,
    pub is_animating: bool,
}

impl RotationState {
    pub fn new(current_angle: f64) -> Self {
        Self {
            current_angle,
            target_angle: None,
            is_animating: false,
        }
    }

    pub fn phase(&self) -> RotationPhase {
        match self.target_angle {
            Some(target) if self.is_animating => RotationPhase::Seeking { target },
            _ => RotationPhase::IdleSpin,
        }
    }

    /// Starts seeking `target`, replacing any target already in flight.
    pub fn seek(self, target: f64) -> Self {
        debug!(from = self.current_angle, target, "seeking rotation target");
        Self {
            current_angle: self.current_angle,
            target_angle: Some(target),
            is_animating: true,
        }
    }

    /// Advances one frame.
    pub fn step(self, config: &RotationConfig) -> Self {
        match self.phase() {
            RotationPhase::IdleSpin => Self {
                current_angle: self.current_angle + config.idle_step_rad,
                target_angle: None,
                is_animating: false,
            },
            RotationPhase::Seeking { target } => {
                let diff = shortest_angle_diff(self.current_angle, target);
                if diff.abs() < config.snap_threshold_rad {
                    debug!(target, "rotation snapped; resuming idle spin");
                    Self::new(target)
                } else {
                    trace!(diff, "rotation seeking");
                    Self {
                        current_angle: self.current_angle + diff * config.damping,
                        ..self
                    }
                }
            }
        }
    }
}

/// Signed difference `to - from` wrapped into `[-π, π)`.
pub fn shortest_angle_diff(from: f64, to: f64) -> f64 {
    (to - from + PI).rem_euclid(TAU) - PI
}

/// Rotation about +Y that turns `position` toward a camera on +Z.
pub fn target_angle_for(position: Vec3) -> f64 {
    -position.x.atan2(position.z)
}

/// [`target_angle_for`] applied to the unit-sphere position of `point`.
pub fn facing_angle(point: GeoPoint) -> f64 {
    target_angle_for(point.to_cartesian(1.0))
}

#[cfg(test)]
mod tests {
    use super::{
        RotationConfig, RotationPhase, RotationState, facing_angle, shortest_angle_diff,
        target_angle_for,
    };
    use foundation::math::{GeoPoint, to_cartesian};
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn idle_spin_adds_constant_increment() {
        let cfg = RotationConfig::default();
        let mut s = RotationState::default();
        for _ in 0..10 {
            s = s.step(&cfg);
        }
        assert_close(s.current_angle, 0.01, 1e-12);
        assert_eq!(s.phase(), RotationPhase::IdleSpin);
        assert!(!s.is_animating);
    }

    #[test]
    fn seeking_converges_monotonically_and_snaps() {
        let cfg = RotationConfig::default();
        let target = FRAC_PI_2;
        let mut s = RotationState::default().seek(target);
        let mut last_gap = shortest_angle_diff(s.current_angle, target).abs();
        let mut steps = 0;
        while s.is_animating {
            s = s.step(&cfg);
            steps += 1;
            let gap = shortest_angle_diff(s.current_angle, target).abs();
            assert!(gap < last_gap || gap == 0.0, "gap grew at step {steps}");
            last_gap = gap;
            assert!(steps < 200, "did not converge");
        }
        assert_eq!(s.current_angle, target);
        assert_eq!(s.target_angle, None);
        assert_eq!(s.phase(), RotationPhase::IdleSpin);
    }

    #[test]
    fn every_target_in_range_converges_quickly() {
        let cfg = RotationConfig::default();
        for i in 0..=40 {
            let target = -PI + (i as f64) * (2.0 * PI / 40.0);
            for start in [0.0, 3.0, -2.5, 12.0] {
                let mut s = RotationState::new(start).seek(target);
                let mut steps = 0;
                while s.is_animating {
                    s = s.step(&cfg);
                    steps += 1;
                    assert!(steps < 200, "target {target} from {start} did not converge");
                }
                assert_eq!(s.current_angle, target);
            }
        }
    }

    #[test]
    fn new_target_overwrites_in_flight_seek() {
        let cfg = RotationConfig::default();
        let mut s = RotationState::default().seek(1.0);
        for _ in 0..5 {
            s = s.step(&cfg);
        }
        s = s.seek(-1.0);
        assert_eq!(s.phase(), RotationPhase::Seeking { target: -1.0 });
        let before = shortest_angle_diff(s.current_angle, -1.0).abs();
        s = s.step(&cfg);
        assert!(shortest_angle_diff(s.current_angle, -1.0).abs() < before);
    }

    #[test]
    fn seek_takes_the_short_way_round() {
        let cfg = RotationConfig::default();
        // From just below +π to just above -π the short path crosses π.
        let s = RotationState::new(PI - 0.1).seek(-PI + 0.1).step(&cfg);
        assert!(s.current_angle > PI - 0.1);
    }

    #[test]
    fn shortest_diff_wraps_into_half_open_range() {
        assert_close(shortest_angle_diff(0.0, 3.0 * PI / 2.0), -FRAC_PI_2, 1e-12);
        assert_close(shortest_angle_diff(10.0 * PI, 10.0 * PI + 0.5), 0.5, 1e-9);
        let d = shortest_angle_diff(0.0, PI);
        assert!((-PI..PI).contains(&d));
    }

    #[test]
    fn target_angle_brings_point_to_face_camera() {
        for (lat, lon) in [(10.0, 20.0), (-33.9, 151.2), (51.5, -0.1), (0.0, 180.0)] {
            let p = to_cartesian(lat, lon, 1.0);
            let rotated = p.rotate_y(target_angle_for(p));
            assert_close(rotated.x, 0.0, 1e-9);
            assert!(rotated.z >= 0.0);
            assert_close(facing_angle(GeoPoint::new(lat, lon)), target_angle_for(p), 1e-12);
        }
    }
}
