//! Geometry kernel: pure functions over canvas polylines.
//!
//! Everything here is deterministic and side-effect free. Functions that need
//! the world↔canvas mapping take a `&dyn Viewport` and only read from it.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

use crate::consts::{COINCIDENT_EPSILON, PARALLEL_EPSILON};
use crate::error::GeometryError;
use crate::viewport::{Point2, Point3, Viewport};

/// Minimum world-space step per screen axis, with the axes it is measured along.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpacingContext {
    /// Minimum step along `x_dir` and `y_dir`, in millimetres.
    pub spacing: [f64; 2],
    /// World direction of canvas "right".
    pub x_dir: Point3,
    /// World direction of canvas "up".
    pub y_dir: Point3,
}

impl SpacingContext {
    /// Absolute distances of a world-space delta along the two screen axes.
    #[must_use]
    pub fn axis_distances(&self, delta: Point3) -> (f64, f64) {
        (delta.dot(self.x_dir).abs(), delta.dot(self.y_dir).abs())
    }
}

/// Chord-midpoint-to-peak vector of a U-shaped open contour, in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakVector {
    /// Midpoint of the chord joining the contour's endpoints.
    pub base: Point3,
    /// Contour point farthest from the chord.
    pub peak: Point3,
}

impl PeakVector {
    #[must_use]
    pub fn direction(&self) -> Point3 {
        self.peak - self.base
    }

    #[must_use]
    pub fn depth(&self) -> f64 {
        self.direction().length()
    }
}

// =============================================================
// Intersection and proximity
// =============================================================

fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
    (b - a).cross(c - a)
}

/// Whether `(a1, a2)` crosses segment `(p, q)`; see [`segments_intersect`].
pub(crate) fn crosses(p: Point2, q: Point2, a1: Point2, a2: Point2) -> bool {
    let d1 = orientation(a1, a2, p);
    let d2 = orientation(a1, a2, q);
    if d1 == 0.0 && d2 == 0.0 {
        return false;
    }
    let d3 = orientation(p, q, a1);
    let d4 = orientation(p, q, a2);
    d1 * d2 <= 0.0 && d3 * d4 < 0.0
}

/// Index of the first segment `(points[i], points[i + 1])` crossed by `(a1, a2)`.
///
/// A crossing through a polyline vertex counts. The query touching the
/// polyline with one of its own endpoints does not, so a query that starts
/// at the polyline's tail never reports the segment it joins.
#[must_use]
pub fn segments_intersect(points: &[Point2], a1: Point2, a2: Point2) -> Option<usize> {
    points
        .windows(2)
        .position(|seg| crosses(seg[0], seg[1], a1, a2))
}

/// Squared distance from `point` to the closest point of segment `(p1, p2)`.
#[must_use]
pub fn distance_to_segment_squared(point: Point2, p1: Point2, p2: Point2) -> f64 {
    let seg = p2 - p1;
    let len_sq = seg.dot(seg);
    if len_sq < COINCIDENT_EPSILON {
        let d = point - p1;
        return d.dot(d);
    }
    let t = ((point - p1).dot(seg) / len_sq).clamp(0.0, 1.0);
    let closest = p1 + seg * t;
    let d = point - closest;
    d.dot(d)
}

/// Whether `point` lies within `tolerance` of segment `(p1, p2)`.
#[must_use]
pub fn point_near_segment(point: Point2, p1: Point2, p2: Point2, tolerance: f64) -> bool {
    distance_to_segment_squared(point, p1, p2) <= tolerance * tolerance
}

/// Whether two points are within `tolerance` of each other.
#[must_use]
pub fn within_close_proximity(p1: Point2, p2: Point2, tolerance: f64) -> bool {
    p1.distance(p2) <= tolerance
}

// =============================================================
// Sampling
// =============================================================

fn aligned_spacing(axis: Point3, direction: &[Point3; 3], spacing: Point3) -> Option<f64> {
    let per_axis = [spacing.x, spacing.y, spacing.z];
    direction
        .iter()
        .zip(per_axis)
        .find(|(dir, _)| (axis.dot(**dir).abs() - 1.0).abs() < PARALLEL_EPSILON)
        .map(|(_, s)| s)
}

/// Derive the minimum world-space step per screen axis for a viewport.
///
/// # Errors
///
/// Returns [`GeometryError::NoImageData`] when the viewport has no image,
/// [`GeometryError::ObliquePlane`] when no image axis is aligned with the
/// view, and [`GeometryError::InvalidResolution`] for a zero resolution.
pub fn compute_spacing_and_axes(viewport: &dyn Viewport, sub_pixel_resolution: u32) -> Result<SpacingContext, GeometryError> {
    if sub_pixel_resolution == 0 {
        return Err(GeometryError::InvalidResolution(sub_pixel_resolution));
    }
    let image = viewport.image_geometry().ok_or(GeometryError::NoImageData)?;
    let camera = viewport.camera();
    let x_dir = camera.view_right().normalize();
    let y_dir = camera.view_up.normalize();

    let x_spacing = aligned_spacing(x_dir, &image.direction, image.spacing).ok_or(GeometryError::ObliquePlane)?;
    let y_spacing = aligned_spacing(y_dir, &image.direction, image.spacing).ok_or(GeometryError::ObliquePlane)?;
    let resolution = f64::from(sub_pixel_resolution);

    Ok(SpacingContext { spacing: [x_spacing / resolution, y_spacing / resolution], x_dir, y_dir })
}

/// Whether moving from `last_world` to `new_world` is far enough to record.
///
/// The sample is too close only when it is within the step on both axes.
#[must_use]
pub fn exceeds_min_step(last_world: Point3, new_world: Point3, ctx: &SpacingContext) -> bool {
    let (x_dist, y_dist) = ctx.axis_distances(new_world - last_world);
    x_dist > ctx.spacing[0] || y_dist > ctx.spacing[1]
}

/// Append `new_point`, inserting intermediate points so no step exceeds the spacing.
///
/// Returns the number of points pushed (at least one).
pub fn insert_sampled_points(points: &mut Vec<Point2>, new_point: Point2, ctx: &SpacingContext, viewport: &dyn Viewport) -> usize {
    let Some(&last) = points.last() else {
        points.push(new_point);
        return 1;
    };

    let delta = viewport.canvas_to_world(new_point) - viewport.canvas_to_world(last);
    let (x_dist, y_dist) = ctx.axis_distances(delta);
    let steps = steps_along(x_dist, ctx.spacing[0]).max(steps_along(y_dist, ctx.spacing[1]));

    if steps <= 1 {
        points.push(new_point);
        return 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let step = (new_point - last) * (1.0 / steps as f64);
    for i in 1..=steps {
        #[allow(clippy::cast_precision_loss)]
        points.push(last + step * i as f64);
    }
    steps
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn steps_along(distance: f64, spacing: f64) -> usize {
    if spacing <= 0.0 || !distance.is_finite() {
        return 1;
    }
    (distance / spacing).floor() as usize
}

// =============================================================
// Shape measures
// =============================================================

/// Chord-midpoint-to-farthest-point vector of an open U-shaped contour.
///
/// Returns `None` for fewer than three points or coincident endpoints.
#[must_use]
pub fn find_peak_vector(points: &[Point2], viewport: &dyn Viewport) -> Option<PeakVector> {
    if points.len() < 3 {
        return None;
    }
    let first = *points.first()?;
    let last = *points.last()?;
    let chord = last - first;
    let chord_len = chord.length();
    if chord_len < COINCIDENT_EPSILON {
        return None;
    }
    let normal = Point2::new(-chord.y / chord_len, chord.x / chord_len);
    let center = first.midpoint(last);

    let mut farthest = None;
    let mut best = 0.0;
    for &p in points {
        let dist = (p - center).dot(normal).abs();
        if dist > best {
            best = dist;
            farthest = Some(p);
        }
    }

    farthest.map(|peak| PeakVector { base: viewport.canvas_to_world(center), peak: viewport.canvas_to_world(peak) })
}

/// Signed shoelace area of the implicitly closed polygon.
#[must_use]
pub fn polygon_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, &p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.cross(q);
    }
    twice * 0.5
}

/// Total length of the polyline, including the closing segment when `closed`.
#[must_use]
pub fn polyline_length(points: &[Point3], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(&first), Some(&last)) if points.len() > 2 => open + last.distance(first),
        _ => open,
    }
}

/// Search window for [`closest_point_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub center: usize,
    pub radius: usize,
    /// Whether indices wrap around the ends (closed contours).
    pub cyclic: bool,
}

/// Index of the point closest to `target`, optionally limited to a window.
#[must_use]
pub fn closest_point_index(points: &[Point2], target: Point2, window: Option<SearchWindow>) -> Option<usize> {
    let len = points.len();
    if len == 0 {
        return None;
    }
    let candidates: Vec<usize> = match window {
        Some(w) if 2 * w.radius + 1 < len => {
            if w.cyclic {
                let center = w.center % len;
                (0..=2 * w.radius).map(|k| (center + len - w.radius + k) % len).collect()
            } else {
                let center = w.center.min(len - 1);
                let lo = center.saturating_sub(w.radius);
                let hi = (center + w.radius).min(len - 1);
                (lo..=hi).collect()
            }
        }
        _ => (0..len).collect(),
    };

    let mut best: Option<(usize, f64)> = None;
    for i in candidates {
        let d = points[i].distance(target);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// Drop consecutive coincident points, and the closing duplicate when `closed`.
#[must_use]
pub fn dedupe_consecutive(points: &[Point2], closed: bool) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_some_and(|&last| last.distance(p) < COINCIDENT_EPSILON) {
            continue;
        }
        out.push(p);
    }
    if closed {
        while out.len() > 1 && out.first().zip(out.last()).is_some_and(|(f, l)| f.distance(*l) < COINCIDENT_EPSILON) {
            out.pop();
        }
    }
    out
}
