//! Finalization: validate a buffer, turn it into a contour and commit it.

use tracing::{debug, info, warn};

use crate::annotation::Annotation;
use crate::engine::Action;
use crate::error::InteractionError;
use crate::geometry::{dedupe_consecutive, find_peak_vector, segments_intersect, within_close_proximity};
use crate::store::LookupFilter;
use crate::viewport::{Point2, Point3};

use super::InteractionContext;

/// Finish a drawing gesture, choosing open or closed from the endpoint gap.
///
/// Returns the committed annotation, or `None` if the gesture was too short.
pub(crate) fn finish_drawn(
    ctx: &mut InteractionContext<'_>,
    target: Annotation,
    points: &[Point2],
    existing: bool,
) -> Result<Option<Annotation>, InteractionError> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        discard(ctx, &target, existing, 0);
        return Ok(None);
    };
    if points.len() < ctx.config.min_point_count() {
        discard(ctx, &target, existing, points.len());
        return Ok(None);
    }
    let open = ctx.config.allow_open_contours && !within_close_proximity(first, last, ctx.config.close_contour_proximity_px);
    if open { finish_open(ctx, target, points, existing) } else { finish_closed(ctx, target, points, existing) }
}

/// Finish as a closed contour.
///
/// If the closing chord (last → first) crosses the contour, the points up to
/// and including the crossed segment's start are dropped.
pub(crate) fn finish_closed(
    ctx: &mut InteractionContext<'_>,
    mut target: Annotation,
    points: &[Point2],
    existing: bool,
) -> Result<Option<Annotation>, InteractionError> {
    let min = ctx.config.min_point_count();
    if points.len() < min {
        discard(ctx, &target, existing, points.len());
        return Ok(None);
    }
    let mut points = dedupe_consecutive(points, true);
    if points.len() >= 3 {
        let (first, last) = (points[0], points[points.len() - 1]);
        if let Some(k) = segments_intersect(&points[..points.len() - 1], last, first) {
            debug!(uid = %target.annotation_uid, crossing = k, "closing chord crosses contour; trimming");
            points.drain(..=k);
        }
    }
    if points.len() < min {
        discard(ctx, &target, existing, points.len());
        return Ok(None);
    }
    target.set_closed_contour(to_world(ctx, &points));
    commit(ctx, target, existing).map(Some)
}

/// Finish as an open contour with handles on both ends.
pub(crate) fn finish_open(
    ctx: &mut InteractionContext<'_>,
    mut target: Annotation,
    points: &[Point2],
    existing: bool,
) -> Result<Option<Annotation>, InteractionError> {
    let points = dedupe_consecutive(points, false);
    if points.len() < ctx.config.min_point_count() {
        discard(ctx, &target, existing, points.len());
        return Ok(None);
    }
    let peak = if ctx.config.open_u_shape_contour { find_peak_vector(&points, ctx.viewport) } else { None };
    target.set_open_contour(to_world(ctx, &points), peak);
    commit(ctx, target, existing).map(Some)
}

fn to_world(ctx: &InteractionContext<'_>, points: &[Point2]) -> Vec<Point3> {
    points.iter().map(|&p| ctx.viewport.canvas_to_world(p)).collect()
}

fn commit(ctx: &mut InteractionContext<'_>, annotation: Annotation, existing: bool) -> Result<Annotation, InteractionError> {
    let uid = annotation.annotation_uid;
    let annotation = if existing {
        let annotation = write_contour(ctx, annotation).ok_or(InteractionError::AnnotationNotFound(uid))?;
        ctx.actions.push(Action::AnnotationModified {
            annotation: annotation.clone(),
            viewport_id: ctx.viewport.id().to_owned(),
            rendering_engine_id: ctx.viewport.rendering_engine_id().to_owned(),
        });
        annotation
    } else {
        ctx.store.add(annotation.clone());
        annotation
    };
    info!(
        %uid,
        frame = %annotation.frame_of_reference_uid(),
        points = annotation.data.polyline.len(),
        open = annotation.data.is_open_contour,
        existing,
        "contour committed"
    );
    ctx.actions.push(Action::AnnotationCompleted(annotation.clone()));
    ctx.actions.push(Action::RenderNeeded);
    Ok(annotation)
}

/// Write the edited contour into the stored record, leaving its flags alone.
///
/// Lock and visibility may change while an edit runs; only the contour
/// payload belongs to the session. Returns the updated record.
fn write_contour(ctx: &mut InteractionContext<'_>, edited: Annotation) -> Option<Annotation> {
    let uid = edited.annotation_uid;
    let filter = LookupFilter::bucket(edited.frame_of_reference_uid(), edited.tool_name());
    let mut updated = None;
    ctx.store.modify(uid, filter, |stored| {
        let data = &edited.data;
        if data.is_open_contour {
            stored.set_open_contour(data.polyline.clone(), data.peak_vector);
        } else {
            stored.set_closed_contour(data.polyline.clone());
        }
        updated = Some(stored.clone());
    });
    updated
}

/// Drop a gesture that failed validation.
///
/// A new annotation never reaches the store; an existing one keeps its
/// committed version.
fn discard(ctx: &mut InteractionContext<'_>, target: &Annotation, existing: bool, points: usize) {
    let uid = target.annotation_uid;
    let min = ctx.config.min_point_count();
    if existing {
        warn!(%uid, points, min, "edit too short; keeping committed contour");
    } else {
        let filter = LookupFilter::bucket(target.frame_of_reference_uid(), target.tool_name());
        if ctx.store.remove(uid, filter).is_some() {
            ctx.actions.push(Action::AnnotationRemoved { annotation_uid: uid });
        }
        debug!(%uid, points, min, "gesture too short; discarded");
    }
    ctx.actions.push(Action::RenderNeeded);
}
