use super::Vec3;

/// A parametric curve over `t ∈ [0, 1]`.
pub trait Curve3 {
    fn point_at(&self, t: f64) -> Vec3;

    /// First derivative at `t` (not normalized).
    fn derivative_at(&self, t: f64) -> Vec3;

    /// `segments + 1` evenly spaced points, endpoints included.
    fn sample(&self, segments: usize) -> Vec<Vec3> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f64 / segments as f64))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QuadraticBezier {
    pub start: Vec3,
    pub control: Vec3,
    pub end: Vec3,
}

impl QuadraticBezier {
    pub fn new(start: Vec3, control: Vec3, end: Vec3) -> Self {
        Self {
            start,
            control,
            end,
        }
    }
}

impl Curve3 for QuadraticBezier {
    fn point_at(&self, t: f64) -> Vec3 {
        let u = 1.0 - t;
        self.start * (u * u) + self.control * (2.0 * u * t) + self.end * (t * t)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let u = 1.0 - t;
        (self.control - self.start) * (2.0 * u) + (self.end - self.control) * (2.0 * t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CubicBezier {
    pub start: Vec3,
    pub control1: Vec3,
    pub control2: Vec3,
    pub end: Vec3,
}

impl CubicBezier {
    pub fn new(start: Vec3, control1: Vec3, control2: Vec3, end: Vec3) -> Self {
        Self {
            start,
            control1,
            control2,
            end,
        }
    }
}

impl Curve3 for CubicBezier {
    fn point_at(&self, t: f64) -> Vec3 {
        let u = 1.0 - t;
        self.start * (u * u * u)
            + self.control1 * (3.0 * u * u * t)
            + self.control2 * (3.0 * u * t * t)
            + self.end * (t * t * t)
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        let u = 1.0 - t;
        (self.control1 - self.start) * (3.0 * u * u)
            + (self.control2 - self.control1) * (6.0 * u * t)
            + (self.end - self.control2) * (3.0 * t * t)
    }
}
