//! Annotation records: metadata, contour payload, and display flags.
//!
//! An [`Annotation`] is what the store owns and what external listeners
//! receive in completion events. Polylines are stored in world space; the
//! interaction layer works on canvas projections and converts on commit.

#[cfg(test)]
#[path = "annotation_test.rs"]
mod annotation_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::PARALLEL_EPSILON;
use crate::geometry::PeakVector;
use crate::stats::ContourStats;
use crate::viewport::{Point2, Point3, Viewport};

/// Unique identifier for an annotation.
pub type AnnotationUid = Uuid;

/// Where an annotation was drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMetadata {
    /// Tool kind that owns the annotation; the store's inner bucket key.
    pub tool_name: String,
    /// Spatial frame of reference; the store's outer bucket key.
    pub frame_of_reference_uid: String,
    /// Camera view-plane normal at draw time.
    pub view_plane_normal: Point3,
    /// Camera view-up at draw time.
    pub view_up: Point3,
    /// Displayed image for stack viewports.
    pub referenced_image_id: Option<String>,
}

/// Contour payload of an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// World-space points. Closed contours do not repeat the first point.
    pub polyline: Vec<Point3>,
    pub is_open_contour: bool,
    /// First and last polyline points of an open contour; empty when closed.
    pub handles: Vec<Point3>,
    /// Chord-to-peak vector for U-shaped open contours.
    pub peak_vector: Option<PeakVector>,
    /// Measurements keyed by viewport target id.
    pub cached_stats: BTreeMap<String, ContourStats>,
    pub label: String,
    /// `None` until statistics tracking starts; `Some(true)` means stale.
    pub invalidated: Option<bool>,
    pub highlighted: bool,
}

/// A persisted freehand contour annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_uid: AnnotationUid,
    pub metadata: AnnotationMetadata,
    pub data: AnnotationData,
    pub is_locked: bool,
    pub is_visible: bool,
}

/// Invariant violated by an annotation's contour payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContourDefect {
    /// Two consecutive polyline points coincide.
    DuplicatePoint { index: usize },
    /// A closed contour repeats its first point at the end.
    ClosingDuplicate,
    /// Open-contour handles are not exactly the first and last points.
    HandleMismatch,
    /// A closed contour carries handles.
    UnexpectedHandles,
}

impl Annotation {
    /// An empty contour shell positioned on the viewport's current plane.
    #[must_use]
    pub fn shell(tool_name: &str, viewport: &dyn Viewport) -> Self {
        let camera = viewport.camera();
        Self {
            annotation_uid: Uuid::new_v4(),
            metadata: AnnotationMetadata {
                tool_name: tool_name.to_owned(),
                frame_of_reference_uid: viewport.frame_of_reference_uid().to_owned(),
                view_plane_normal: camera.view_plane_normal,
                view_up: camera.view_up,
                referenced_image_id: viewport.reference_image_id().map(str::to_owned),
            },
            data: AnnotationData { invalidated: Some(true), ..AnnotationData::default() },
            is_locked: false,
            is_visible: true,
        }
    }

    #[must_use]
    pub fn frame_of_reference_uid(&self) -> &str {
        &self.metadata.frame_of_reference_uid
    }

    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.metadata.tool_name
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.data.is_open_contour
    }

    /// Replace the polyline with a closed contour.
    pub fn set_closed_contour(&mut self, polyline: Vec<Point3>) {
        self.data.polyline = polyline;
        self.data.is_open_contour = false;
        self.data.handles.clear();
        self.data.peak_vector = None;
        self.mark_stale();
    }

    /// Replace the polyline with an open contour; handles follow the endpoints.
    pub fn set_open_contour(&mut self, polyline: Vec<Point3>, peak_vector: Option<PeakVector>) {
        self.data.handles = match (polyline.first(), polyline.last()) {
            (Some(&first), Some(&last)) => vec![first, last],
            _ => Vec::new(),
        };
        self.data.polyline = polyline;
        self.data.is_open_contour = true;
        self.data.peak_vector = peak_vector;
        self.mark_stale();
    }

    /// Mark cached statistics stale so the next render pass recomputes them.
    pub fn mark_stale(&mut self) {
        self.data.invalidated = Some(true);
    }

    /// Canvas projection of the polyline for `viewport`.
    #[must_use]
    pub fn canvas_points(&self, viewport: &dyn Viewport) -> Vec<Point2> {
        self.data.polyline.iter().map(|&p| viewport.world_to_canvas(p)).collect()
    }

    /// Whether the annotation lies in the plane the viewport currently shows.
    #[must_use]
    pub fn is_in_view(&self, viewport: &dyn Viewport) -> bool {
        if self.frame_of_reference_uid() != viewport.frame_of_reference_uid() {
            return false;
        }
        if let (Some(drawn_on), Some(shown)) = (&self.metadata.referenced_image_id, viewport.reference_image_id()) {
            return drawn_on == shown;
        }
        let camera = viewport.camera();
        let normal = camera.view_plane_normal.normalize();
        if (self.metadata.view_plane_normal.normalize().dot(normal).abs() - 1.0).abs() > PARALLEL_EPSILON {
            return false;
        }
        let Some(&first) = self.data.polyline.first() else {
            return false;
        };
        let tolerance = viewport
            .image_geometry()
            .map_or(PARALLEL_EPSILON, |g| g.spacing.x.min(g.spacing.y).min(g.spacing.z) * 0.5);
        (first - camera.focal_point).dot(normal).abs() <= tolerance
    }

    /// Check the contour invariants that committed annotations must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first [`ContourDefect`] found.
    pub fn check_contour(&self) -> Result<(), ContourDefect> {
        let points = &self.data.polyline;
        if let Some(index) = points.windows(2).position(|w| w[0] == w[1]) {
            return Err(ContourDefect::DuplicatePoint { index });
        }
        if self.data.is_open_contour {
            let expected = match (points.first(), points.last()) {
                (Some(&first), Some(&last)) => vec![first, last],
                _ => Vec::new(),
            };
            if self.data.handles != expected {
                return Err(ContourDefect::HandleMismatch);
            }
        } else {
            if points.len() > 1 && points.first() == points.last() {
                return Err(ContourDefect::ClosingDuplicate);
            }
            if !self.data.handles.is_empty() {
                return Err(ContourDefect::UnexpectedHandles);
            }
        }
        Ok(())
    }
}
