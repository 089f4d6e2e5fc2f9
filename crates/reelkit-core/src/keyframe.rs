//! Keyframe curves: time-indexed scalar parameters for effects.
//!
//! Every animated effect parameter is a [`Keyframe`] — a sorted set of
//! control points over integer frame numbers. Evaluation is exact and
//! total: `value(n)` returns a finite f64 for any frame, holding the
//! edge values outside the keyframed range. Bézier easing is evaluated
//! with Newton-Raphson to map x (time) to the curve parameter.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

// ── Easing curves ───────────────────────────────────────────────

/// Cubic Bézier control points for easing (x1, y1, x2, y2).
/// The curve goes from (0,0) to (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn sample_x(&self, t: f64) -> f64 {
        let t2 = t * t;
        let mt = 1.0 - t;
        3.0 * mt * mt * t * self.x1 + 3.0 * mt * t2 * self.x2 + t2 * t
    }

    fn sample_y(&self, t: f64) -> f64 {
        let t2 = t * t;
        let mt = 1.0 - t;
        3.0 * mt * mt * t * self.y1 + 3.0 * mt * t2 * self.y2 + t2 * t
    }

    fn sample_dx(&self, t: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * self.x1 + 6.0 * mt * t * (self.x2 - self.x1) + 3.0 * t * t * (1.0 - self.x2)
    }

    /// Solve for the parameter t given an x value using Newton-Raphson,
    /// returning the y value at that x.
    pub fn evaluate(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }

        let mut t = x; // initial guess
        for _ in 0..8 {
            let x_est = self.sample_x(t) - x;
            let dx = self.sample_dx(t);
            if dx.abs() < 1e-12 {
                break;
            }
            t -= x_est / dx;
            t = t.clamp(0.0, 1.0);
            if x_est.abs() < 1e-10 {
                break;
            }
        }

        self.sample_y(t)
    }

    pub const EASE: Self = Self::new(0.25, 0.1, 0.25, 1.0);
    pub const EASE_IN_OUT: Self = Self::new(0.42, 0.0, 0.58, 1.0);
}

/// How a control point interpolates toward the next one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hold the value until the next point.
    Hold,
    #[default]
    Linear,
    /// Cubic Bézier easing.
    Bezier(CubicBezier),
}

// ── Keyframe ────────────────────────────────────────────────────

/// A single control point at an integer frame number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub frame: i64,
    pub value: f64,
    pub interpolation: Interpolation,
}

/// A keyframed scalar parameter.
///
/// Control points are kept sorted by frame number. Between adjacent
/// points the value follows the interpolation of the earlier point;
/// outside the keyframed range the edge values hold (constant
/// extrapolation). An empty keyframe evaluates to its construction
/// default everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    default: f64,
    points: SmallVec<[Point; 4]>,
}

impl Keyframe {
    /// Create an empty keyframe evaluating to `default` everywhere.
    pub fn new(default: f64) -> Self {
        Self {
            default,
            points: SmallVec::new(),
        }
    }

    /// Create a keyframe holding a single constant value.
    pub fn constant(value: f64) -> Self {
        let mut kf = Self::new(value);
        kf.set(1, value, Interpolation::Hold);
        kf
    }

    /// Insert or update a control point. Maintains sorted order.
    pub fn set(&mut self, frame: i64, value: f64, interpolation: Interpolation) {
        if let Some(p) = self.points.iter_mut().find(|p| p.frame == frame) {
            p.value = value;
            p.interpolation = interpolation;
            return;
        }
        let pos = self
            .points
            .binary_search_by(|p| p.frame.cmp(&frame))
            .unwrap_or_else(|e| e);
        self.points.insert(
            pos,
            Point {
                frame,
                value,
                interpolation,
            },
        );
    }

    /// Remove the control point at the given frame.
    pub fn remove(&mut self, frame: i64) -> bool {
        if let Some(pos) = self.points.iter().position(|p| p.frame == frame) {
            self.points.remove(pos);
            true
        } else {
            false
        }
    }

    /// Evaluate the curve at a frame number.
    pub fn value(&self, frame: i64) -> f64 {
        match self.points.len() {
            0 => self.default,
            1 => self.points[0].value,
            _ => {
                if frame <= self.points[0].frame {
                    return self.points[0].value;
                }
                let last = self.points.last().unwrap();
                if frame >= last.frame {
                    return last.value;
                }
                let idx = self
                    .points
                    .partition_point(|p| p.frame <= frame)
                    .saturating_sub(1);
                Self::interpolate(&self.points[idx], &self.points[idx + 1], frame)
            }
        }
    }

    /// Evaluate and round half-away-from-zero to an integer.
    pub fn value_int(&self, frame: i64) -> i64 {
        round_half_away(self.value(frame))
    }

    fn interpolate(a: &Point, b: &Point, frame: i64) -> f64 {
        let span = (b.frame - a.frame) as f64;
        if span <= 0.0 {
            return a.value;
        }
        let t = ((frame - a.frame) as f64 / span).clamp(0.0, 1.0);
        match a.interpolation {
            Interpolation::Hold => a.value,
            Interpolation::Linear => a.value + (b.value - a.value) * t,
            Interpolation::Bezier(bezier) => a.value + (b.value - a.value) * bezier.evaluate(t),
        }
    }

    /// All control points (read-only).
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the parameter actually varies over time.
    pub fn is_animated(&self) -> bool {
        self.points.len() > 1
    }
}

impl From<f64> for Keyframe {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl fmt::Display for Keyframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyframe({} points)", self.points.len())
    }
}

/// Round half-away-from-zero: 0.5 → 1, -0.5 → -1.
fn round_half_away(v: f64) -> i64 {
    if v >= 0.0 {
        (v + 0.5).floor() as i64
    } else {
        (v - 0.5).ceil() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_returns_default() {
        let kf = Keyframe::new(2.5);
        assert_eq!(kf.value(1), 2.5);
        assert_eq!(kf.value(1_000_000), 2.5);
    }

    #[test]
    fn test_linear_interpolation() {
        let mut kf = Keyframe::new(0.0);
        kf.set(1, 0.0, Interpolation::Linear);
        kf.set(11, 10.0, Interpolation::Linear);
        assert!((kf.value(6) - 5.0).abs() < 1e-9);
        assert!((kf.value(11) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_hold_interpolation() {
        let mut kf = Keyframe::new(0.0);
        kf.set(1, 3.0, Interpolation::Hold);
        kf.set(10, 7.0, Interpolation::Hold);
        assert_eq!(kf.value(9), 3.0);
        assert_eq!(kf.value(10), 7.0);
    }

    #[test]
    fn test_constant_extrapolation() {
        let mut kf = Keyframe::new(0.0);
        kf.set(10, 4.0, Interpolation::Linear);
        kf.set(20, 8.0, Interpolation::Linear);
        assert_eq!(kf.value(1), 4.0);
        assert_eq!(kf.value(500), 8.0);
    }

    #[test]
    fn test_bezier_midpoint_symmetry() {
        let mut kf = Keyframe::new(0.0);
        kf.set(1, 0.0, Interpolation::Bezier(CubicBezier::EASE_IN_OUT));
        kf.set(101, 100.0, Interpolation::Linear);
        let mid = kf.value(51);
        assert!((mid - 50.0).abs() < 5.0);
        // Ease-in: slower than linear early on
        assert!(kf.value(11) < 10.0);
    }

    #[test]
    fn test_value_int_rounds_half_away() {
        let mut kf = Keyframe::new(0.0);
        kf.set(1, 0.5, Interpolation::Linear);
        assert_eq!(kf.value_int(1), 1);
        kf.set(1, -0.5, Interpolation::Linear);
        assert_eq!(kf.value_int(1), -1);
        kf.set(1, 2.4, Interpolation::Linear);
        assert_eq!(kf.value_int(1), 2);
    }

    #[test]
    fn test_set_overwrites_existing_point() {
        let mut kf = Keyframe::new(0.0);
        kf.set(5, 1.0, Interpolation::Linear);
        kf.set(5, 9.0, Interpolation::Hold);
        assert_eq!(kf.len(), 1);
        assert_eq!(kf.value(5), 9.0);
    }

    #[test]
    fn test_remove_point() {
        let mut kf = Keyframe::new(0.0);
        kf.set(1, 1.0, Interpolation::Linear);
        kf.set(2, 2.0, Interpolation::Linear);
        assert!(kf.remove(2));
        assert!(!kf.remove(2));
        assert_eq!(kf.len(), 1);
    }

    #[test]
    fn test_json_round_trip() {
        let mut kf = Keyframe::new(1.0);
        kf.set(1, 0.0, Interpolation::Bezier(CubicBezier::EASE));
        kf.set(24, 5.0, Interpolation::Hold);
        kf.set(48, -3.0, Interpolation::Linear);
        let json = serde_json::to_string(&kf).unwrap();
        let back: Keyframe = serde_json::from_str(&json).unwrap();
        assert_eq!(kf, back);
        for n in [1, 10, 24, 30, 48, 100] {
            assert_eq!(kf.value(n), back.value(n));
        }
    }
}
