use tracing::{debug, info, warn};

use crate::annotation::{Annotation, AnnotationUid};
use crate::config::ContourToolConfig;
use crate::error::InteractionError;
use crate::hit::{HitPart, hit_test};
use crate::input::{Key, PointerEvent, SessionToken, Tool};
use crate::interaction::ContourTool;
use crate::render::{Primitive, render_frame};
use crate::stats;
use crate::store::{AnnotationStore, LookupFilter};
use crate::viewport::Viewport;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A contour was committed to the store.
    AnnotationCompleted(Annotation),
    /// A stored contour was changed by an edit.
    AnnotationModified { annotation: Annotation, viewport_id: String, rendering_engine_id: String },
    /// A contour left the store.
    AnnotationRemoved { annotation_uid: AnnotationUid },
    SetCursor(String),
    RenderNeeded,
}

/// Core engine state: the store, the active tool and the contour session.
///
/// Holds no viewport; every handler takes the one the event came from.
#[derive(Default)]
pub struct EngineCore {
    pub store: AnnotationStore,
    pub tool: Tool,
    pub contour: ContourTool,
    active: Option<SessionToken>,
    hovered: Option<AnnotationUid>,
}

impl EngineCore {
    #[must_use]
    pub fn new(config: ContourToolConfig) -> Self {
        Self { contour: ContourTool::new(config), ..Self::default() }
    }

    #[must_use]
    pub fn config(&self) -> &ContourToolConfig {
        &self.contour.config
    }

    // --- Tool ---

    /// Set the active tool. Has no effect on a session in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Token of the session in progress, if any.
    #[must_use]
    pub fn session(&self) -> Option<SessionToken> {
        self.active
    }

    // --- Input events ---

    /// Pointer-down: grab a contour under the pointer, or start drawing.
    ///
    /// # Errors
    ///
    /// Returns the [`InteractionError`] raised when starting the session.
    pub fn on_pointer_down(&mut self, viewport: &dyn Viewport, evt: &PointerEvent) -> Result<Vec<Action>, InteractionError> {
        let kind = viewport.kind();
        if !kind.supports_planar_contours() {
            return Err(InteractionError::UnsupportedViewport(kind));
        }
        let hit = hit_test(&self.store, viewport, evt.current.canvas, &self.contour.config);
        let (token, actions) = match hit {
            Some(hit) => {
                debug!(uid = %hit.annotation_uid, part = ?hit.part, "contour grabbed");
                self.contour.start_edit(viewport, &self.store, hit.annotation_uid, hit.part, evt)?
            }
            None if self.tool.draws() => self.contour.start_draw(viewport, evt)?,
            None => return Ok(Vec::new()),
        };
        self.active = Some(token);
        Ok(actions)
    }

    /// Pointer-move: drag the active session, or update hover highlighting.
    ///
    /// # Errors
    ///
    /// Returns the [`InteractionError`] raised by the session.
    pub fn on_pointer_move(&mut self, viewport: &dyn Viewport, evt: &PointerEvent) -> Result<Vec<Action>, InteractionError> {
        let Some(token) = self.active else {
            return Ok(self.hover(viewport, evt));
        };
        let result = self.contour.drag(token, viewport, &mut self.store, evt);
        self.sync_session();
        result
    }

    /// Pointer-up: finalize the active session.
    ///
    /// # Errors
    ///
    /// Returns the [`InteractionError`] raised by the session.
    pub fn on_pointer_up(&mut self, viewport: &dyn Viewport, evt: &PointerEvent) -> Result<Vec<Action>, InteractionError> {
        let Some(token) = self.active else {
            return Ok(Vec::new());
        };
        let result = self.contour.release(token, viewport, &mut self.store, evt);
        self.sync_session();
        result
    }

    /// Key-down: Escape cancels the active session.
    ///
    /// # Errors
    ///
    /// Returns the [`InteractionError`] raised by the session.
    pub fn on_key_down(&mut self, viewport: &dyn Viewport, key: &Key) -> Result<Vec<Action>, InteractionError> {
        if key.is_escape() && self.active.is_some() {
            return self.cancel(viewport);
        }
        Ok(Vec::new())
    }

    /// Cancel the active session, finalizing its buffer as on release.
    ///
    /// # Errors
    ///
    /// [`InteractionError::NoActiveSession`] when nothing is in progress.
    pub fn cancel(&mut self, viewport: &dyn Viewport) -> Result<Vec<Action>, InteractionError> {
        let token = self.active.ok_or(InteractionError::NoActiveSession)?;
        let result = self.contour.cancel(token, viewport, &mut self.store);
        self.sync_session();
        result
    }

    // --- External mutations ---

    /// Remove an annotation from the store.
    ///
    /// A session editing the annotation is aborted first.
    pub fn remove_annotation(&mut self, uid: AnnotationUid) -> Vec<Action> {
        if self.contour.active_annotation() == Some(uid) {
            self.contour.abort();
            self.sync_session();
        }
        if self.hovered == Some(uid) {
            self.hovered = None;
        }
        match self.store.remove(uid, LookupFilter::default()) {
            Some(_) => {
                info!(%uid, "annotation removed");
                vec![Action::AnnotationRemoved { annotation_uid: uid }, Action::RenderNeeded]
            }
            None => Vec::new(),
        }
    }

    /// The volume behind a frame of reference changed; statistics are stale.
    pub fn on_volume_modified(&mut self, frame_of_reference_uid: &str) -> Vec<Action> {
        if self.store.on_volume_modified(frame_of_reference_uid) > 0 { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    // --- Render ---

    /// Refresh stale statistics for the viewport's frame, then build its primitives.
    ///
    /// A viewport whose rendering backend is gone renders nothing.
    pub fn render(&mut self, viewport: &dyn Viewport) -> Vec<Primitive> {
        if !viewport.is_active() {
            warn!(viewport = viewport.id(), "rendering target is gone; skipping frame");
            return Vec::new();
        }
        if self.contour.config.calculate_stats {
            self.refresh_stats(viewport);
        }
        let transient = self.contour.snapshot();
        render_frame(&self.store, viewport, &self.contour.config, transient.as_ref())
    }

    fn refresh_stats(&mut self, viewport: &dyn Viewport) {
        let frame = viewport.frame_of_reference_uid();
        let target = viewport.target_id();
        let stale: Vec<AnnotationUid> = self
            .store
            .annotations_in_frame(frame)
            .filter(|a| a.data.invalidated == Some(true) || !a.data.cached_stats.contains_key(&target))
            .map(|a| a.annotation_uid)
            .collect();
        for uid in stale {
            self.store.modify(uid, LookupFilter::frame(frame), |a| {
                stats::refresh(a, &target);
            });
        }
    }

    fn hover(&mut self, viewport: &dyn Viewport, evt: &PointerEvent) -> Vec<Action> {
        let hit = hit_test(&self.store, viewport, evt.current.canvas, &self.contour.config);
        let hovered = hit.map(|h| h.annotation_uid);
        if hovered == self.hovered {
            return Vec::new();
        }
        if let Some(previous) = self.hovered {
            self.store.set_highlighted(previous, false);
        }
        if let Some(current) = hovered {
            self.store.set_highlighted(current, true);
        }
        self.hovered = hovered;
        let cursor = match hit.map(|h| h.part) {
            Some(HitPart::Handle(_)) => "grab",
            Some(HitPart::Boundary { .. }) => "pointer",
            None => "default",
        };
        vec![Action::SetCursor(cursor.into()), Action::RenderNeeded]
    }

    fn sync_session(&mut self) {
        self.active = self.contour.active_token();
    }
}
