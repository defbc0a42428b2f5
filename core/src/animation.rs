//! Alpha-over-time curves
//!
//! Opacity is a pure function of elapsed time, curve and period, so no phase
//! needs to be stored beyond the manager's start instant.

use albrt_types::AnimationType;

/// Opacity in [0, 1] at `elapsed` seconds for a curve repeating every
/// `period` seconds. A non-positive or non-finite period yields 1.0.
pub fn opacity(kind: AnimationType, elapsed: f32, period: f32) -> f32 {
    if !(period.is_finite() && period > 0.0) || !elapsed.is_finite() {
        return 1.0;
    }

    let value = match kind {
        AnimationType::None => 1.0,
        AnimationType::A01 => elapsed.rem_euclid(period) / period,
        AnimationType::A10 => 1.0 - elapsed.rem_euclid(period) / period,
        AnimationType::PingPong => ((elapsed / (period / 6.0)).sin() + 1.0) / 2.0,
    };
    value.clamp(0.0, 1.0)
}

/// Current alpha-over-time settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    pub kind: AnimationType,
    pub period: f32,
}

impl AnimationState {
    pub fn opacity_at(&self, elapsed: f32) -> f32 {
        opacity(self.kind, elapsed, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a01_ramps_up() {
        assert_eq!(opacity(AnimationType::A01, 0.0, 3.0), 0.0);
        assert!((opacity(AnimationType::A01, 1.5, 3.0) - 0.5).abs() < 1e-6);
        assert!(opacity(AnimationType::A01, 2.999, 3.0) > 0.99);
        // wraps
        assert!(opacity(AnimationType::A01, 3.0, 3.0) < 1e-6);
    }

    #[test]
    fn a10_is_inverse_of_a01() {
        for t in [0.0f32, 0.4, 1.1, 2.7, 8.3] {
            let up = opacity(AnimationType::A01, t, 3.0);
            let down = opacity(AnimationType::A10, t, 3.0);
            assert!((up + down - 1.0).abs() < 1e-5, "t={t}");
        }
        assert_eq!(opacity(AnimationType::A10, 0.0, 3.0), 1.0);
    }

    #[test]
    fn pingpong_is_bounded_and_periodic() {
        let period = 3.0f32;
        let cycle = 2.0 * std::f32::consts::PI * period / 6.0;
        for i in 0..200 {
            let t = i as f32 * 0.137;
            let v = opacity(AnimationType::PingPong, t, period);
            assert!((0.0..=1.0).contains(&v));
            let again = opacity(AnimationType::PingPong, t + cycle, period);
            assert!((v - again).abs() < 1e-3, "t={t}");
        }
        assert!((opacity(AnimationType::PingPong, 0.0, period) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn none_and_bad_periods_are_opaque() {
        assert_eq!(opacity(AnimationType::None, 1.3, 3.0), 1.0);
        assert_eq!(opacity(AnimationType::A01, 1.3, 0.0), 1.0);
        assert_eq!(opacity(AnimationType::A01, 1.3, -2.0), 1.0);
        assert_eq!(opacity(AnimationType::PingPong, 1.3, f32::NAN), 1.0);
    }

    #[test]
    fn state_delegates_to_curve() {
        let state = AnimationState {
            kind: AnimationType::A10,
            period: 2.0,
        };
        assert!((state.opacity_at(0.5) - 0.75).abs() < 1e-6);
    }
}
