//! Fade curves for volume ramps
//!
//! A ramp moves the output volume from a start level to a target level over
//! a fixed duration. The curve shapes how the normalized progress (0.0 at the
//! start of the ramp, 1.0 at the end) maps onto that interval.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Ramp shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    #[default]
    Linear,

    /// v(t) = t², slow start, fast finish
    Exponential,

    /// v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// v(t) = sin(t × π/2), constant perceived loudness
    EqualPower,
}

impl FadeCurve {
    /// Shape factor at `progress` (clamped to 0.0..=1.0)
    ///
    /// Returns 0.0 at the start of the ramp and 1.0 at its end for every curve.
    pub fn shape(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Volume between `from` and `to` at `progress`
    ///
    /// Exactly `to` once progress reaches 1.0, so a completed ramp lands on the
    /// target without float drift.
    pub fn interpolate(&self, from: f32, to: f32, progress: f32) -> f32 {
        if progress >= 1.0 {
            return to;
        }
        from + (to - from) * self.shape(progress)
    }

    /// Canonical configuration string
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
