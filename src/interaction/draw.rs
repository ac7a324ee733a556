//! Freehand drawing, also used to extend an open contour from one of its ends.

use tracing::debug;

use crate::annotation::Annotation;
use crate::consts::RECROSS_JOIN_RADIUS_FACTOR;
use crate::engine::Action;
use crate::error::InteractionError;
use crate::geometry::{SpacingContext, exceeds_min_step, insert_sampled_points, segments_intersect};
use crate::input::PointerEvent;
use crate::viewport::Point2;

use super::complete::{finish_closed, finish_drawn};
use super::edit::EditStrategy;
use super::{BufferSnapshot, InteractionContext, Step, Strategy};

pub(crate) struct DrawStrategy {
    target: Annotation,
    points: Vec<Point2>,
    spacing: SpacingContext,
    /// Whether `target` is already in the store.
    existing: bool,
}

impl DrawStrategy {
    /// Seed a new gesture with the pointer-down position.
    pub fn start(target: Annotation, origin: Point2, spacing: SpacingContext, existing: bool) -> Self {
        Self { target, points: vec![origin], spacing, existing }
    }

    /// Continue drawing from one end of an existing open contour.
    ///
    /// The buffer is ordered so that the grabbed end is the tail.
    pub fn resume(target: Annotation, mut points: Vec<Point2>, from_start: bool, spacing: SpacingContext) -> Self {
        if from_start {
            points.reverse();
        }
        Self { target, points, spacing, existing: true }
    }

    pub fn on_move(&mut self, ctx: &mut InteractionContext<'_>, evt: &PointerEvent) -> Result<Step, InteractionError> {
        let Some(&last) = self.points.last() else {
            self.points.push(evt.current.canvas);
            return Ok(Step::Continue);
        };
        let last_world = ctx.viewport.canvas_to_world(last);
        if !exceeds_min_step(last_world, evt.current.world, &self.spacing) {
            return Ok(Step::Continue);
        }

        let new_point = evt.current.canvas;
        let len = self.points.len();
        // The segment ending at `last` shares a vertex with the new one.
        if len >= 3 {
            if let Some(k) = segments_intersect(&self.points[..len - 1], last, new_point) {
                return self.close_loop(ctx, k, new_point);
            }
        }

        insert_sampled_points(&mut self.points, new_point, &self.spacing, ctx.viewport);
        ctx.actions.push(Action::RenderNeeded);
        Ok(Step::Continue)
    }

    /// The pointer crossed segment `k`: keep the loop, commit it closed and
    /// continue as a closed edit from the pointer.
    fn close_loop(&mut self, ctx: &mut InteractionContext<'_>, k: usize, pointer: Point2) -> Result<Step, InteractionError> {
        let mut loop_points = self.points.split_off(k);
        if let Some(&loop_start) = loop_points.first() {
            insert_sampled_points(&mut loop_points, loop_start, &self.spacing, ctx.viewport);
        }
        debug!(uid = %self.target.annotation_uid, crossing = k, points = loop_points.len(), "self-intersection; closing contour");

        let Some(committed) = finish_closed(ctx, self.target.clone(), &loop_points, self.existing)? else {
            return Ok(Step::Finished);
        };
        let base = committed.canvas_points(ctx.viewport);
        let join_radius = ctx.config.edit_proximity_px * RECROSS_JOIN_RADIUS_FACTOR;
        let edit = EditStrategy::start(committed, base, pointer, self.spacing, true, join_radius, ctx.config.edit_snap_window);
        Ok(Step::Transition(Strategy::ClosedEdit(edit)))
    }

    pub fn on_end(self, ctx: &mut InteractionContext<'_>) -> Result<(), InteractionError> {
        finish_drawn(ctx, self.target, &self.points, self.existing).map(|_| ())
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            annotation_uid: self.target.annotation_uid,
            points: self.points.clone(),
            closed: false,
            edit_line: None,
        }
    }
}
