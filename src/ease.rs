use euclid::default::Point2D;

use crate::path::{CurvePath, PathPoint};

/// Default number of samples taken along the curve.
pub const DEFAULT_DENSITY: usize = 200;

/// Easing function described by a curve in the unit square.
///
/// The curve is sampled once into a table sorted by `x`; evaluation is a
/// binary search plus a linear interpolation between neighbours.
#[derive(Clone, Debug)]
pub struct CustomEase {
    density: usize,
    samples: Vec<Point2D<f32>>,
    path: CurvePath,
}

impl Default for CustomEase {
    fn default() -> Self {
        Self::new(DEFAULT_DENSITY)
    }
}

impl CustomEase {
    pub fn new(density: usize) -> Self {
        let density = density.max(1);
        Self {
            density,
            samples: Vec::with_capacity(density + 1),
            path: CurvePath::new(),
        }
    }

    pub fn create(&mut self, points: &[PathPoint]) {
        self.samples.clear();
        self.path.create(points);

        let step = 1.0 / self.density as f32;
        self.samples
            .extend((0..=self.density).map(|i| self.path.point_at(i as f32 * step)));

        if let Some(first) = self.samples.first_mut() {
            *first = Point2D::new(0.0, 0.0);
        }
        if let Some(last) = self.samples.last_mut() {
            *last = Point2D::new(1.0, 1.0);
        }
        self.samples.sort_by(|a, b| a.x.total_cmp(&b.x));
    }

    pub fn evaluate(&self, time: f32) -> f32 {
        if time <= 0.0 {
            return 0.0;
        }
        if time >= 1.0 {
            return 1.0;
        }

        let upper = self.samples.partition_point(|p| p.x < time);
        let (Some(lo), Some(hi)) = (
            upper.checked_sub(1).and_then(|i| self.samples.get(i)),
            self.samples.get(upper),
        ) else {
            return time;
        };

        let span = hi.x - lo.x;
        if span <= 0.0 {
            return hi.y;
        }
        lo.y + (hi.y - lo.y) * (time - lo.x) / span
    }
}
