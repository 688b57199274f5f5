//! Piecewise curves built from persisted path points.

use euclid::default::{Point2D, Vector2D};

/// How the segment that starts at a point is interpolated.
///
/// The discriminants match the byte stored in the binary config stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurveType {
    #[default]
    CRSpline,
    Bezier,
    CubicBezier,
    Straight,
}

impl CurveType {
    pub(crate) fn from_byte(b: u8) -> Self {
        match b {
            1 => Self::Bezier,
            2 => Self::CubicBezier,
            3 => Self::Straight,
            _ => Self::CRSpline,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathPoint {
    pub pos: Point2D<f32>,
    pub control1: Point2D<f32>,
    pub control2: Point2D<f32>,
    pub curve_type: CurveType,
}

impl PathPoint {
    pub fn new(pos: Point2D<f32>, curve_type: CurveType) -> Self {
        Self {
            pos,
            curve_type,
            ..Default::default()
        }
    }

    pub fn bezier(pos: Point2D<f32>, control: Point2D<f32>) -> Self {
        Self {
            pos,
            control1: control,
            control2: Point2D::zero(),
            curve_type: CurveType::Bezier,
        }
    }

    pub fn cubic_bezier(pos: Point2D<f32>, control1: Point2D<f32>, control2: Point2D<f32>) -> Self {
        Self {
            pos,
            control1,
            control2,
            curve_type: CurveType::CubicBezier,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    kind: CurveType,
    length: f32,
    pt_start: usize,
    pt_count: usize,
}

/// A path made of straight, Bezier, and Catmull-Rom segments.
///
/// Segment lengths are approximated by chord lengths, which is also what
/// [`CurvePath::point_at`] uses to distribute `t` across segments.
#[derive(Clone, Debug, Default)]
pub struct CurvePath {
    segments: Vec<Segment>,
    points: Vec<Point2D<f32>>,
    full_length: f32,
}

impl CurvePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: &[PathPoint]) -> Self {
        let mut path = Self::new();
        path.create(points);
        path
    }

    /// Rebuilds the path from `points`.
    ///
    /// The curve type of a point applies to the segment leading to the next
    /// point. Consecutive spline points form one Catmull-Rom run.
    pub fn create(&mut self, points: &[PathPoint]) {
        self.segments.clear();
        self.points.clear();
        self.full_length = 0.0;

        let Some((first, rest)) = points.split_first() else {
            return;
        };

        let mut spline = Vec::new();
        let mut prev = first;
        if prev.curve_type == CurveType::CRSpline {
            spline.push(prev.pos);
        }

        for current in rest {
            if prev.curve_type != CurveType::CRSpline {
                let pt_start = self.points.len();
                self.points.push(prev.pos);
                self.points.push(current.pos);
                match prev.curve_type {
                    CurveType::Bezier => self.points.push(prev.control1),
                    CurveType::CubicBezier => {
                        self.points.push(prev.control1);
                        self.points.push(prev.control2);
                    }
                    _ => {}
                }

                let length = prev.pos.distance_to(current.pos);
                self.full_length += length;
                self.segments.push(Segment {
                    kind: prev.curve_type,
                    length,
                    pt_start,
                    pt_count: self.points.len() - pt_start,
                });
            }

            if current.curve_type != CurveType::CRSpline {
                if !spline.is_empty() {
                    spline.push(current.pos);
                    self.push_spline(&mut spline);
                }
            } else {
                spline.push(current.pos);
            }
            prev = current;
        }

        if spline.len() > 1 {
            self.push_spline(&mut spline);
        }
    }

    /// Pads the run with its end points so every point has neighbours.
    fn push_spline(&mut self, spline: &mut Vec<Point2D<f32>>) {
        let (Some(&head), Some(&tail)) = (spline.first(), spline.last()) else {
            return;
        };
        spline.insert(0, head);
        spline.push(tail);
        spline.push(tail);

        let length = spline.windows(2).map(|w| w[0].distance_to(w[1])).sum();
        self.full_length += length;
        self.segments.push(Segment {
            kind: CurveType::CRSpline,
            length,
            pt_start: self.points.len(),
            pt_count: spline.len(),
        });
        self.points.append(spline);
    }

    pub fn length(&self) -> f32 {
        self.full_length
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_length(&self, index: usize) -> f32 {
        self.segments.get(index).map_or(0.0, |s| s.length)
    }

    /// Point at `t` (clamped to `0..=1`) of the whole path length.
    pub fn point_at(&self, t: f32) -> Point2D<f32> {
        let t = t.clamp(0.0, 1.0);
        let Some(last) = self.segments.last() else {
            return Point2D::zero();
        };
        if t == 1.0 {
            return self.segment_point(last, 1.0);
        }

        let mut remaining = t * self.full_length;
        for segment in &self.segments {
            remaining -= segment.length;
            if remaining < 0.0 {
                let local = if segment.length > 0.0 {
                    1.0 + remaining / segment.length
                } else {
                    0.0
                };
                return self.segment_point(segment, local);
            }
        }
        self.segment_point(last, 1.0)
    }

    fn segment_point(&self, segment: &Segment, t: f32) -> Point2D<f32> {
        match segment.kind {
            CurveType::Straight => {
                let start = self.points[segment.pt_start];
                start.lerp(self.points[segment.pt_start + 1], t)
            }
            CurveType::Bezier | CurveType::CubicBezier => {
                self.bezier_point(segment.pt_start, segment.pt_count, t)
            }
            CurveType::CRSpline => self.spline_point(segment.pt_start, segment.pt_count, t),
        }
    }

    fn bezier_point(&self, start: usize, count: usize, t: f32) -> Point2D<f32> {
        let u = 1.0 - t;
        let p0 = self.points[start].to_vector();
        let p1 = self.points[start + 1].to_vector();
        let c0 = self.points[start + 2].to_vector();

        let v: Vector2D<f32> = if count == 4 {
            let c1 = self.points[start + 3].to_vector();
            p0 * (u * u * u) + c0 * (3.0 * u * u * t) + c1 * (3.0 * u * t * t) + p1 * (t * t * t)
        } else {
            p0 * (u * u) + c0 * (2.0 * u * t) + p1 * (t * t)
        };
        v.to_point()
    }

    fn spline_point(&self, start: usize, count: usize, t: f32) -> Point2D<f32> {
        let spans = count.saturating_sub(4);
        let scaled = t * spans as f32;
        let index = (scaled.floor() as usize).min(spans) + start;
        let local = if t == 1.0 { 1.0 } else { scaled.fract() };

        let p0 = self.points[index].to_vector();
        let p1 = self.points[index + 1].to_vector();
        let p2 = self.points[index + 2].to_vector();
        let p3 = self.points[index + 3].to_vector();

        let t0 = ((-local + 2.0) * local - 1.0) * local * 0.5;
        let t1 = ((3.0 * local - 5.0) * local * local + 2.0) * 0.5;
        let t2 = ((-3.0 * local + 4.0) * local + 1.0) * local * 0.5;
        let t3 = (local - 1.0) * local * local * 0.5;

        (p0 * t0 + p1 * t1 + p2 * t2 + p3 * t3).to_point()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f32, y: f32) -> Point2D<f32> {
        Point2D::new(x, y)
    }

    fn close(a: Point2D<f32>, b: Point2D<f32>) -> bool {
        a.distance_to(b) < 1e-3
    }

    #[test]
    fn empty_path_is_origin() {
        let path = CurvePath::new();
        assert_eq!(path.point_at(0.5), Point2D::zero());
        assert_eq!(path.length(), 0.0);
    }

    #[test]
    fn straight_segments_split_by_length() {
        let path = CurvePath::from_points(&[
            PathPoint::new(pt(0.0, 0.0), CurveType::Straight),
            PathPoint::new(pt(10.0, 0.0), CurveType::Straight),
            PathPoint::new(pt(10.0, 30.0), CurveType::Straight),
        ]);
        assert_eq!(path.segment_count(), 2);
        assert_eq!(path.length(), 40.0);
        assert!(close(path.point_at(0.25), pt(10.0, 0.0)));
        assert!(close(path.point_at(0.5), pt(10.0, 10.0)));
        assert!(close(path.point_at(1.0), pt(10.0, 30.0)));
    }

    #[test]
    fn bezier_keeps_end_points() {
        let path = CurvePath::from_points(&[
            PathPoint::cubic_bezier(pt(0.0, 0.0), pt(0.0, 1.0), pt(1.0, 1.0)),
            PathPoint::new(pt(1.0, 0.0), CurveType::Straight),
        ]);
        assert!(close(path.point_at(0.0), pt(0.0, 0.0)));
        assert!(close(path.point_at(1.0), pt(1.0, 0.0)));
        assert!(path.point_at(0.5).y > 0.5);
    }

    #[test]
    fn spline_passes_through_its_points() {
        let path = CurvePath::from_points(&[
            PathPoint::new(pt(0.0, 0.0), CurveType::CRSpline),
            PathPoint::new(pt(5.0, 5.0), CurveType::CRSpline),
            PathPoint::new(pt(10.0, 0.0), CurveType::CRSpline),
        ]);
        assert_eq!(path.segment_count(), 1);
        assert!(close(path.point_at(0.0), pt(0.0, 0.0)));
        assert!(close(path.point_at(1.0), pt(10.0, 0.0)));
    }
}
