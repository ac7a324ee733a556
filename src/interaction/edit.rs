//! Editing an existing contour by drawing a new path across part of it.
//!
//! The edit line starts at the grab point, which joins the base contour at
//! its nearest point. As the pointer moves, the snap point (where the edit
//! line would rejoin the contour) follows it inside a window around the
//! previous snap. The fused contour splices the edit line in place of the
//! arc between join and snap.

use tracing::debug;

use crate::annotation::Annotation;
use crate::consts::MIN_EDIT_POINTS_FOR_RECROSS;
use crate::engine::Action;
use crate::error::InteractionError;
use crate::geometry::{
    SearchWindow, SpacingContext, closest_point_index, crosses, dedupe_consecutive, exceeds_min_step,
    insert_sampled_points, polygon_area, segments_intersect,
};
use crate::input::PointerEvent;
use crate::viewport::Point2;

use super::complete::{finish_closed, finish_open};
use super::{BufferSnapshot, InteractionContext, Step};

pub(crate) struct EditStrategy {
    target: Annotation,
    closed: bool,
    base: Vec<Point2>,
    edit: Vec<Point2>,
    join: usize,
    snap: Option<usize>,
    fused: Option<Vec<Point2>>,
    spacing: SpacingContext,
    /// Crossings of the base contour this close to the grab point belong to the join.
    join_radius: f64,
    window: usize,
}

impl EditStrategy {
    pub fn start(
        target: Annotation,
        base: Vec<Point2>,
        grab: Point2,
        spacing: SpacingContext,
        closed: bool,
        join_radius: f64,
        window: usize,
    ) -> Self {
        let join = closest_point_index(&base, grab, None).unwrap_or(0);
        Self { target, closed, base, edit: vec![grab], join, snap: None, fused: None, spacing, join_radius, window }
    }

    pub fn on_move(&mut self, ctx: &mut InteractionContext<'_>, evt: &PointerEvent) -> Step {
        let pointer = evt.current.canvas;
        let Some(&last) = self.edit.last() else {
            self.edit.push(pointer);
            return Step::Continue;
        };
        if !exceeds_min_step(ctx.viewport.canvas_to_world(last), evt.current.world, &self.spacing) {
            return Step::Continue;
        }

        let len = self.edit.len();
        if len >= 3 {
            if let Some(k) = segments_intersect(&self.edit[..len - 1], last, pointer) {
                debug!(uid = %self.target.annotation_uid, crossing = k, "edit line crosses itself; truncating");
                self.edit.truncate(k + 1);
            }
        }
        let from = self.edit.last().copied().unwrap_or(last);
        insert_sampled_points(&mut self.edit, pointer, &self.spacing, ctx.viewport);
        self.update_snap(pointer);

        if let Some(crossed) = self.recrossing(from, pointer) {
            self.rebase(crossed, pointer);
        }
        ctx.actions.push(Action::RenderNeeded);
        Step::Continue
    }

    pub fn on_end(self, ctx: &mut InteractionContext<'_>) -> Result<(), InteractionError> {
        let points = self.fused.unwrap_or(self.base);
        let committed = if self.closed {
            finish_closed(ctx, self.target, &points, true)?
        } else {
            finish_open(ctx, self.target, &points, true)?
        };
        if committed.is_none() {
            debug!("edit reverted");
        }
        Ok(())
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            annotation_uid: self.target.annotation_uid,
            points: self.fused.clone().unwrap_or_else(|| self.base.clone()),
            closed: self.closed,
            edit_line: Some(self.edit.clone()),
        }
    }

    fn fuse(&self, snap: usize) -> Vec<Point2> {
        if self.closed {
            fuse_closed(&self.base, self.join, snap, &self.edit)
        } else {
            fuse_open(&self.base, self.join, snap, &self.edit)
        }
    }

    fn update_snap(&mut self, pointer: Point2) {
        let window = SearchWindow { center: self.snap.unwrap_or(self.join), radius: self.window, cyclic: self.closed };
        if let Some(snap) = closest_point_index(&self.base, pointer, Some(window)) {
            self.snap = Some(snap);
            self.fused = Some(self.fuse(snap));
        }
    }

    /// Index of the base segment crossed by `(from, to)` away from the join.
    ///
    /// Only segments inside the snap window are checked.
    fn recrossing(&self, from: Point2, to: Point2) -> Option<usize> {
        let origin = *self.edit.first()?;
        if self.edit.len() < MIN_EDIT_POINTS_FOR_RECROSS
            || from.distance(origin) <= self.join_radius
            || to.distance(origin) <= self.join_radius
        {
            return None;
        }
        let len = self.base.len();
        if len < 2 {
            return None;
        }
        let segments = if self.closed { len } else { len - 1 };
        let center = self.snap.unwrap_or(self.join) % len;
        let radius = self.window;
        let candidates: Vec<usize> = if 2 * radius + 1 >= segments {
            (0..segments).collect()
        } else if self.closed {
            (0..=2 * radius).map(|k| (center + len - radius + k) % len).collect()
        } else {
            (center.saturating_sub(radius)..(center + radius + 1).min(segments)).collect()
        };
        candidates
            .into_iter()
            .find(|&i| crosses(self.base[i], self.base[(i + 1) % len], from, to))
    }

    /// The edit line reached the contour again: fuse it in and start a fresh
    /// edit line at the pointer.
    fn rebase(&mut self, crossed: usize, pointer: Point2) {
        let len = self.base.len();
        let next = (crossed + 1) % len;
        let snap = if self.base[crossed].distance(pointer) <= self.base[next].distance(pointer) { crossed } else { next };
        let fused = self.fuse(snap);
        self.base = dedupe_consecutive(&fused, self.closed);
        self.join = closest_point_index(&self.base, pointer, None).unwrap_or(0);
        self.edit = vec![pointer];
        self.snap = None;
        self.fused = None;
        debug!(uid = %self.target.annotation_uid, crossed, points = self.base.len(), "edit line re-crossed contour; rebased");
    }
}

/// Splice `edit` into a closed contour between `join` and `snap`.
///
/// `edit` runs from the join side to the snap side. Of the two contours the
/// splice can produce, the one enclosing the larger area wins.
#[must_use]
pub fn fuse_closed(base: &[Point2], join: usize, snap: usize, edit: &[Point2]) -> Vec<Point2> {
    let len = base.len();
    if len == 0 {
        return edit.to_vec();
    }
    let (join, snap) = (join % len, snap % len);

    // Keep the arc snap → join, then walk the edit line forward.
    let mut outer = if join == snap { cyclic_arc(base, join, len) } else { arc_between(base, snap, join) };
    outer.extend_from_slice(edit);

    // Keep the arc join → snap, then walk the edit line backward.
    let mut inner = arc_between(base, join, snap);
    inner.extend(edit.iter().rev());

    if polygon_area(&outer).abs() >= polygon_area(&inner).abs() { outer } else { inner }
}

/// Splice `edit` into an open contour between `join` and `snap`.
///
/// A snap on either endpoint replaces everything beyond the join on that
/// side, extending or shortening the contour.
#[must_use]
pub fn fuse_open(base: &[Point2], join: usize, snap: usize, edit: &[Point2]) -> Vec<Point2> {
    let Some(last) = base.len().checked_sub(1) else {
        return edit.to_vec();
    };
    let (join, snap) = (join.min(last), snap.min(last));

    let mut fused = Vec::with_capacity(base.len() + edit.len());
    if snap >= join && snap == last {
        fused.extend_from_slice(&base[..=join]);
        fused.extend_from_slice(edit);
    } else if snap <= join && snap == 0 {
        fused.extend(edit.iter().rev());
        fused.extend_from_slice(&base[join..]);
    } else if snap >= join {
        fused.extend_from_slice(&base[..=join]);
        fused.extend_from_slice(edit);
        fused.extend_from_slice(&base[snap..]);
    } else {
        fused.extend_from_slice(&base[..=snap]);
        fused.extend(edit.iter().rev());
        fused.extend_from_slice(&base[join..]);
    }
    fused
}

/// Points from `from` forward to `to`, both inclusive, wrapping around.
fn arc_between(points: &[Point2], from: usize, to: usize) -> Vec<Point2> {
    let len = points.len();
    cyclic_arc(points, from, (to + len - from) % len + 1)
}

fn cyclic_arc(points: &[Point2], from: usize, count: usize) -> Vec<Point2> {
    let len = points.len();
    (0..count).map(|i| points[(from + i) % len]).collect()
}
