//! Cached contour measurements.
//!
//! Statistics are keyed by viewport target id and recomputed lazily: the
//! store marks annotations stale (`invalidated = Some(true)`) and the engine
//! refreshes them right before the next render pass.

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::geometry::polyline_length;
use crate::viewport::Point3;

/// Measurements of one annotation for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourStats {
    /// Enclosed area; `None` for open contours.
    pub area: Option<f64>,
    pub area_unit: String,
    /// Perimeter for closed contours, path length for open ones.
    pub length: f64,
    pub length_unit: String,
}

/// Area of a planar polygon in 3-D, measured in the plane with the given normal.
#[must_use]
pub fn planar_area(points: &[Point3], normal: Point3) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = Point3::default();
    for (i, &p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        sum = sum + p.cross(q);
    }
    (sum.dot(normal.normalize()) * 0.5).abs()
}

/// Compute statistics for an annotation's current polyline.
#[must_use]
pub fn compute_stats(annotation: &Annotation) -> ContourStats {
    let points = &annotation.data.polyline;
    let closed = annotation.is_closed();
    let area = closed.then(|| planar_area(points, annotation.metadata.view_plane_normal));
    ContourStats {
        area,
        area_unit: "mm\u{b2}".to_owned(),
        length: polyline_length(points, closed),
        length_unit: "mm".to_owned(),
    }
}

/// Store fresh statistics for `target_id` and clear the invalidated flag.
///
/// Returns `false` if the annotation was already up to date.
pub fn refresh(annotation: &mut Annotation, target_id: &str) -> bool {
    let stale = annotation.data.invalidated == Some(true) || !annotation.data.cached_stats.contains_key(target_id);
    if !stale {
        return false;
    }
    let stats = compute_stats(annotation);
    annotation.data.cached_stats.insert(target_id.to_owned(), stats);
    annotation.data.invalidated = Some(false);
    true
}

/// Label lines shown next to a contour.
#[must_use]
pub fn label_lines(annotation: &Annotation, target_id: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if !annotation.data.label.is_empty() {
        lines.push(annotation.data.label.clone());
    }
    if let Some(stats) = annotation.data.cached_stats.get(target_id) {
        if let Some(area) = stats.area {
            lines.push(format!("Area: {area:.2} {}", stats.area_unit));
        }
        let name = if annotation.is_closed() { "Perimeter" } else { "Length" };
        lines.push(format!("{name}: {:.2} {}", stats.length, stats.length_unit));
    }
    lines
}
