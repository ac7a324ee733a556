//! Rendering: turns annotations into backend-agnostic vector primitives.
//!
//! This module receives read-only views of the store and of the transient
//! buffer snapshot and returns a display list. It never mutates either; the
//! engine refreshes statistics before calling in. Painting the primitives is
//! the host's business.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use serde::Serialize;
use tracing::warn;

use crate::annotation::{Annotation, AnnotationUid};
use crate::config::ContourToolConfig;
use crate::consts::{
    ACTIVE_DASH_PX, CONTOUR_COLOR, CONTOUR_LINE_WIDTH_PX, HANDLE_DRAW_RADIUS_PX, HIGHLIGHT_COLOR, LABEL_OFFSET_PX,
    LOCKED_COLOR,
};
use crate::interaction::BufferSnapshot;
use crate::stats::label_lines;
use crate::store::AnnotationStore;
use crate::viewport::{Point2, Viewport};

/// Stroke style of a line primitive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    /// Dash length in canvas pixels; `None` for a solid line.
    pub dash: Option<f64>,
}

impl LineStyle {
    fn solid(color: &str) -> Self {
        Self { color: color.to_owned(), width: CONTOUR_LINE_WIDTH_PX, dash: None }
    }

    fn dashed(color: &str) -> Self {
        Self { color: color.to_owned(), width: CONTOUR_LINE_WIDTH_PX, dash: Some(ACTIVE_DASH_PX) }
    }
}

/// One element of the display list, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Polyline { annotation_uid: AnnotationUid, points: Vec<Point2>, closed: bool, style: LineStyle },
    Handle { annotation_uid: AnnotationUid, center: Point2, radius: f64, color: String },
    Label { annotation_uid: AnnotationUid, anchor: Point2, lines: Vec<String> },
    PeakVector { annotation_uid: AnnotationUid, from: Point2, to: Point2, style: LineStyle },
}

fn color_for(annotation: &Annotation) -> &'static str {
    if annotation.data.highlighted {
        HIGHLIGHT_COLOR
    } else if annotation.is_locked {
        LOCKED_COLOR
    } else {
        CONTOUR_COLOR
    }
}

/// Primitives for one committed annotation.
///
/// Hidden annotations and annotations outside the viewport's plane yield nothing.
#[must_use]
pub fn render_annotation(annotation: &Annotation, viewport: &dyn Viewport, config: &ContourToolConfig) -> Vec<Primitive> {
    if !annotation.is_visible || !annotation.is_in_view(viewport) {
        return Vec::new();
    }
    let uid = annotation.annotation_uid;
    let color = color_for(annotation);
    let points = annotation.canvas_points(viewport);
    let mut out = Vec::new();

    if points.len() >= 2 {
        out.push(Primitive::Polyline {
            annotation_uid: uid,
            points: points.clone(),
            closed: annotation.is_closed(),
            style: LineStyle::solid(color),
        });
    }

    if annotation.data.is_open_contour {
        if annotation.data.highlighted || config.always_render_open_contour_handles {
            for &handle in &annotation.data.handles {
                out.push(Primitive::Handle {
                    annotation_uid: uid,
                    center: viewport.world_to_canvas(handle),
                    radius: HANDLE_DRAW_RADIUS_PX,
                    color: color.to_owned(),
                });
            }
        }
        if let Some(peak) = annotation.data.peak_vector {
            out.push(Primitive::PeakVector {
                annotation_uid: uid,
                from: viewport.world_to_canvas(peak.base),
                to: viewport.world_to_canvas(peak.peak),
                style: LineStyle::dashed(color),
            });
        }
    }

    let lines = label_lines(annotation, &viewport.target_id());
    let rightmost = points.iter().copied().reduce(|a, b| if b.x > a.x { b } else { a });
    if let Some(anchor) = rightmost.filter(|_| !lines.is_empty()) {
        out.push(Primitive::Label {
            annotation_uid: uid,
            anchor: Point2::new(anchor.x + LABEL_OFFSET_PX, anchor.y),
            lines,
        });
    }
    out
}

/// Primitives for the contour under interaction.
#[must_use]
pub fn render_transient(snapshot: &BufferSnapshot) -> Vec<Primitive> {
    let uid = snapshot.annotation_uid;
    let mut out = Vec::new();
    if snapshot.points.len() >= 2 {
        out.push(Primitive::Polyline {
            annotation_uid: uid,
            points: snapshot.points.clone(),
            closed: snapshot.closed,
            style: LineStyle::solid(HIGHLIGHT_COLOR),
        });
    }
    if let Some(edit) = snapshot.edit_line.as_ref().filter(|line| line.len() >= 2) {
        out.push(Primitive::Polyline {
            annotation_uid: uid,
            points: edit.clone(),
            closed: false,
            style: LineStyle::dashed(HIGHLIGHT_COLOR),
        });
    }
    out
}

/// The display list for one viewport.
///
/// Committed annotations of the configured tool in the viewport's frame are
/// drawn in z-order. The annotation under interaction is drawn from
/// `transient` instead of from the store, on top of the rest.
#[must_use]
pub fn render_frame(
    store: &AnnotationStore,
    viewport: &dyn Viewport,
    config: &ContourToolConfig,
    transient: Option<&BufferSnapshot>,
) -> Vec<Primitive> {
    if !viewport.is_active() {
        warn!(viewport = viewport.id(), "rendering target is gone; skipping frame");
        return Vec::new();
    }
    let skip = transient.map(|t| t.annotation_uid);
    let mut out = Vec::new();
    if let Some(bucket) = store.get_by_frame_and_tool(viewport.frame_of_reference_uid(), &config.tool_name) {
        for annotation in bucket.iter().filter(|a| Some(a.annotation_uid) != skip) {
            out.extend(render_annotation(annotation, viewport, config));
        }
    }
    if let Some(snapshot) = transient {
        out.extend(render_transient(snapshot));
    }
    out
}
