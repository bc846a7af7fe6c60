use foundation::time::Time;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Angular frequency (rad/s).
    pub frequency: f64,
    /// Peak deviation from scale 1.
    pub amplitude: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            frequency: 2.0,
            amplitude: 0.3,
        }
    }
}

/// Shared breathing scale for every marker.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PulseState {
    pub time: Time,
    pub scale: f64,
}

impl Default for PulseState {
    fn default() -> Self {
        Self {
            time: Time(0.0),
            scale: 1.0,
        }
    }
}

impl PulseState {
    pub fn step(self, time: Time, config: &PulseConfig) -> Self {
        Self {
            time,
            scale: pulse_scale(time.seconds(), config),
        }
    }
}

pub fn pulse_scale(time_s: f64, config: &PulseConfig) -> f64 {
    1.0 + (time_s * config.frequency).sin() * config.amplitude
}

#[cfg(test)]
mod tests {
    use super::{PulseConfig, PulseState, pulse_scale};
    use foundation::time::Time;
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn scale_oscillates_within_amplitude() {
        let cfg = PulseConfig::default();
        assert_close(pulse_scale(0.0, &cfg), 1.0, 1e-12);
        // sin(2 * π/4) = 1
        assert_close(pulse_scale(PI / 4.0, &cfg), 1.3, 1e-12);
        assert_close(pulse_scale(3.0 * PI / 4.0, &cfg), 0.7, 1e-12);
        for i in 0..500 {
            let s = pulse_scale(i as f64 * 0.037, &cfg);
            assert!((0.7 - 1e-12..=1.3 + 1e-12).contains(&s));
        }
    }

    #[test]
    fn step_records_time() {
        let cfg = PulseConfig {
            frequency: 1.0,
            amplitude: 0.5,
        };
        let s = PulseState::default().step(Time(PI / 2.0), &cfg);
        assert_eq!(s.time, Time(PI / 2.0));
        assert_close(s.scale, 1.5, 1e-12);
    }
}
