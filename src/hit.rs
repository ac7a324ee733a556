#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::annotation::AnnotationUid;
use crate::config::ContourToolConfig;
use crate::geometry::{point_near_segment, within_close_proximity};
use crate::store::AnnotationStore;
use crate::viewport::{Point2, Viewport};

/// Which end of an open contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEnd {
    Start,
    End,
}

/// Which part of a contour was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    /// An open-contour endpoint handle.
    Handle(HandleEnd),
    /// The contour line; `segment` is the index of the segment's first point.
    Boundary { segment: usize },
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub annotation_uid: AnnotationUid,
    pub part: HitPart,
    /// Whether the hit annotation is an open contour.
    pub is_open: bool,
}

/// Find the top-most editable contour under `canvas_pt`.
///
/// Only visible, unlocked annotations of the configured tool lying in the
/// viewport's current plane are considered. Later annotations in a bucket
/// sit on top. Endpoint handles win over boundary hits.
#[must_use]
pub fn hit_test(store: &AnnotationStore, viewport: &dyn Viewport, canvas_pt: Point2, config: &ContourToolConfig) -> Option<Hit> {
    let bucket = store.get_by_frame_and_tool(viewport.frame_of_reference_uid(), &config.tool_name)?;

    for annotation in bucket.iter().rev() {
        if annotation.is_locked || !annotation.is_visible || !annotation.is_in_view(viewport) {
            continue;
        }
        let points = annotation.canvas_points(viewport);
        let is_open = annotation.data.is_open_contour;

        if is_open {
            let ends = [(HandleEnd::Start, points.first()), (HandleEnd::End, points.last())];
            for (end, point) in ends {
                if point.is_some_and(|&p| within_close_proximity(p, canvas_pt, config.handle_radius_px)) {
                    return Some(Hit { annotation_uid: annotation.annotation_uid, part: HitPart::Handle(end), is_open });
                }
            }
        }

        if let Some(segment) = nearest_segment(&points, !is_open, canvas_pt, config.edit_proximity_px) {
            return Some(Hit { annotation_uid: annotation.annotation_uid, part: HitPart::Boundary { segment }, is_open });
        }
    }
    None
}

fn nearest_segment(points: &[Point2], closed: bool, pt: Point2, tolerance: f64) -> Option<usize> {
    let len = points.len();
    if len < 2 {
        return None;
    }
    let count = if closed { len } else { len - 1 };
    (0..count).find(|&i| point_near_segment(pt, points[i], points[(i + 1) % len], tolerance))
}
