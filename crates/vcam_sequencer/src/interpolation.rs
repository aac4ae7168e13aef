// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing curves and pose interpolation.

use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Easing curve applied to one path segment.
///
/// Every curve maps raw progress `t` in `[0, 1]` to adjusted progress in
/// `[0, 1]`, is non-decreasing, and satisfies `f(0) = 0`, `f(1) = 1`.
/// [`TransitionCurve::None`] is the exception: it snaps to `1` for any `t > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCurve {
    /// Instant cut to the target
    None,
    /// Constant speed
    Linear,
    /// Quadratic acceleration
    EaseIn,
    /// Quadratic deceleration
    EaseOut,
    /// Quadratic acceleration then deceleration
    EaseInOut,
    /// Four hops of shrinking height, landing on the target
    Bounce,
    /// Damped sine surges that settle on the target
    Elastic,
    /// Same shape as [`TransitionCurve::EaseInOut`]
    #[default]
    Smooth,
}

impl TransitionCurve {
    /// All curves, in declaration order
    pub const ALL: [TransitionCurve; 8] = [
        Self::None,
        Self::Linear,
        Self::EaseIn,
        Self::EaseOut,
        Self::EaseInOut,
        Self::Bounce,
        Self::Elastic,
        Self::Smooth,
    ];

    /// Name used in commands and preset files
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::EaseIn => "ease_in",
            Self::EaseOut => "ease_out",
            Self::EaseInOut => "ease_in_out",
            Self::Bounce => "bounce",
            Self::Elastic => "elastic",
            Self::Smooth => "smooth",
        }
    }

    /// Adjusted progress for raw progress `t`
    pub fn apply(self, t: f64) -> f64 {
        evaluate(self, t)
    }
}

impl fmt::Display for TransitionCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a curve name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown transition curve: {0}")]
pub struct UnknownCurve(pub String);

impl FromStr for TransitionCurve {
    type Err = UnknownCurve;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|curve| curve.name() == normalized)
            .ok_or_else(|| UnknownCurve(s.to_string()))
    }
}

const BOUNCE_BREAKS: [f64; 3] = [1.0 / 2.75, 2.0 / 2.75, 2.5 / 2.75];
const BOUNCE_LEVELS: [f64; 5] = [0.0, 0.75, 0.9375, 0.984375, 1.0];

const ELASTIC_DAMPING: f64 = 4.0;
const ELASTIC_FREQUENCY: f64 = 6.0 * PI;

/// Evaluate an easing curve at raw progress `t`.
///
/// `t` is clamped into `[0, 1]` first.
pub fn evaluate(curve: TransitionCurve, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    match curve {
        TransitionCurve::None => 1.0,
        TransitionCurve::Linear => t,
        TransitionCurve::EaseIn => t * t,
        TransitionCurve::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        TransitionCurve::EaseInOut | TransitionCurve::Smooth => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        TransitionCurve::Bounce => bounce(t),
        TransitionCurve::Elastic => elastic_integral(t) / elastic_integral(1.0),
    }
}

/// Each hop is an ease-out quadratic between two rising levels, so the curve
/// never moves backwards.
fn bounce(t: f64) -> f64 {
    let piece = BOUNCE_BREAKS.iter().take_while(|&&b| t >= b).count();
    let start = if piece == 0 { 0.0 } else { BOUNCE_BREAKS[piece - 1] };
    let end = BOUNCE_BREAKS.get(piece).copied().unwrap_or(1.0);
    let u = (t - start) / (end - start);
    let (lo, hi) = (BOUNCE_LEVELS[piece], BOUNCE_LEVELS[piece + 1]);
    lo + (hi - lo) * (1.0 - (1.0 - u) * (1.0 - u))
}

/// Integral of `e^(-d s) * (1 - cos(w s))` from 0 to `t`. The integrand is
/// non-negative, so the normalised curve is monotonic.
fn elastic_integral(t: f64) -> f64 {
    let d = ELASTIC_DAMPING;
    let w = ELASTIC_FREQUENCY;
    let decay = (-d * t).exp();
    (1.0 - decay) / d - (decay * (w * (w * t).sin() - d * (w * t).cos()) + d) / (d * d + w * w)
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// Interpolate between two angles in degrees along the shorter arc.
    ///
    /// The result is wrapped into `[-180, 180)`, so `350 -> 10` at `t = 0.5`
    /// yields `0`.
    pub fn lerp_angle(start: f32, end: f32, t: f64) -> f32 {
        let start = f64::from(start);
        let diff = (f64::from(end) - start).rem_euclid(360.0);
        let shortest = if diff > 180.0 { diff - 360.0 } else { diff };
        wrap_degrees(start + shortest * t) as f32
    }

    /// Blend two poses.
    ///
    /// `t <= 0` returns `a` and `t >= 1` returns `b` unchanged, so the
    /// endpoints carry no floating error.
    pub fn lerp_pose(a: &Pose, b: &Pose, t: f64) -> Pose {
        if t <= 0.0 {
            return *a;
        }
        if t >= 1.0 {
            return *b;
        }

        Pose {
            x: Self::lerp(a.x, b.x, t),
            y: Self::lerp(a.y, b.y, t),
            z: Self::lerp(a.z, b.z, t),
            yaw: Self::lerp_angle(a.yaw, b.yaw, t),
            pitch: Self::lerp_angle(a.pitch, b.pitch, t),
        }
    }

    /// Blend two poses after reshaping progress through `curve`
    pub fn interpolate(a: &Pose, b: &Pose, t: f64, curve: TransitionCurve) -> Pose {
        Self::lerp_pose(a, b, curve.apply(t))
    }
}

fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
