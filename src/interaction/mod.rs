//! Contour draw/edit state machine.
//!
//! A [`ContourTool`] runs at most one interaction session at a time. Starting
//! a session hands the caller a [`SessionToken`]; drag, release and cancel
//! must present it. A call with a foreign token is rejected and leaves the
//! session alone. Any other contract violation aborts the session without
//! committing.
//!
//! Each session runs one [`Strategy`]:
//!
//! | Strategy | Entered by |
//! |----------|------------|
//! | `Draw` | pointer-down on empty canvas |
//! | `ClosedEdit` | grabbing a closed contour's boundary, or a mid-draw auto-close |
//! | `OpenEdit` | grabbing an open contour's body |
//! | `EndpointEdit` | grabbing an open contour's endpoint handle |
//!
//! Strategies work on canvas points and a working copy of their target
//! annotation. The store sees the result only when a strategy commits.



mod complete;
mod draw;
mod edit;

pub use edit::{fuse_closed, fuse_open};

use tracing::{debug, warn};

use crate::annotation::{Annotation, AnnotationUid};
use crate::config::ContourToolConfig;
use crate::consts::RECROSS_JOIN_RADIUS_FACTOR;
use crate::engine::Action;
use crate::error::InteractionError;
use crate::geometry::compute_spacing_and_axes;
use crate::hit::{HandleEnd, HitPart};
use crate::input::{PointerEvent, SessionToken};
use crate::store::{AnnotationStore, LookupFilter};
use crate::viewport::{Point2, Viewport};

use self::draw::DrawStrategy;
use self::edit::EditStrategy;

/// Cursor shown while a session is active.
const ACTIVE_CURSOR: &str = "crosshair";

/// Cursor restored when a session ends.
const IDLE_CURSOR: &str = "default";

/// Everything a strategy may touch while handling one event.
pub(crate) struct InteractionContext<'a> {
    pub viewport: &'a dyn Viewport,
    pub store: &'a mut AnnotationStore,
    pub config: &'a ContourToolConfig,
    pub actions: Vec<Action>,
}

/// What the session does after a strategy handled a drag.
pub(crate) enum Step {
    Continue,
    Transition(Strategy),
    Finished,
}

/// The strategy driving the active session.
pub(crate) enum Strategy {
    Draw(DrawStrategy),
    ClosedEdit(EditStrategy),
    OpenEdit(EditStrategy),
    EndpointEdit(DrawStrategy),
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Draw(_) => "draw",
            Self::ClosedEdit(_) => "closed_edit",
            Self::OpenEdit(_) => "open_edit",
            Self::EndpointEdit(_) => "endpoint_edit",
        }
    }

    fn on_move(&mut self, ctx: &mut InteractionContext<'_>, evt: &PointerEvent) -> Result<Step, InteractionError> {
        match self {
            Self::Draw(s) | Self::EndpointEdit(s) => s.on_move(ctx, evt),
            Self::ClosedEdit(s) | Self::OpenEdit(s) => Ok(s.on_move(ctx, evt)),
        }
    }

    fn on_end(self, ctx: &mut InteractionContext<'_>) -> Result<(), InteractionError> {
        match self {
            Self::Draw(s) | Self::EndpointEdit(s) => s.on_end(ctx),
            Self::ClosedEdit(s) | Self::OpenEdit(s) => s.on_end(ctx),
        }
    }

    /// Cancelling finalizes through the same path as a release.
    fn on_cancel(self, ctx: &mut InteractionContext<'_>) -> Result<(), InteractionError> {
        self.on_end(ctx)
    }

    fn snapshot(&self) -> BufferSnapshot {
        match self {
            Self::Draw(s) | Self::EndpointEdit(s) => s.snapshot(),
            Self::ClosedEdit(s) | Self::OpenEdit(s) => s.snapshot(),
        }
    }
}

/// Owned copy of the transient buffer, handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSnapshot {
    /// Annotation being drawn or edited.
    pub annotation_uid: AnnotationUid,
    /// Contour as it would be committed now, in canvas space.
    pub points: Vec<Point2>,
    pub closed: bool,
    /// The in-progress edit line, for edit sessions.
    pub edit_line: Option<Vec<Point2>>,
}

struct ActiveSession {
    token: SessionToken,
    viewport_id: String,
    strategy: Strategy,
}

/// The freehand contour tool: configuration plus the active session.
pub struct ContourTool {
    pub config: ContourToolConfig,
    session: Option<ActiveSession>,
    next_token: u64,
}

impl ContourTool {
    #[must_use]
    pub fn new(config: ContourToolConfig) -> Self {
        Self { config, session: None, next_token: 1 }
    }

    #[must_use]
    pub fn is_interacting(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn active_token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token)
    }

    /// Identifier of the annotation under interaction.
    #[must_use]
    pub fn active_annotation(&self) -> Option<AnnotationUid> {
        self.snapshot().map(|s| s.annotation_uid)
    }

    /// Snapshot of the transient buffer for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Option<BufferSnapshot> {
        self.session.as_ref().map(|s| s.strategy.snapshot())
    }

    /// Begin drawing a new contour at the event position.
    ///
    /// # Errors
    ///
    /// [`InteractionError::AlreadyInteracting`], [`InteractionError::UnsupportedViewport`],
    /// or a geometry error if the viewport cannot be sampled.
    pub fn start_draw(
        &mut self,
        viewport: &dyn Viewport,
        evt: &PointerEvent,
    ) -> Result<(SessionToken, Vec<Action>), InteractionError> {
        self.check_can_start(viewport)?;
        let spacing = compute_spacing_and_axes(viewport, self.config.sub_pixel_resolution)?;
        let target = Annotation::shell(&self.config.tool_name, viewport);
        let strategy = Strategy::Draw(DrawStrategy::start(target, evt.current.canvas, spacing, false));
        Ok(self.begin(viewport, strategy))
    }

    /// Begin editing a stored annotation grabbed at the event position.
    ///
    /// # Errors
    ///
    /// [`InteractionError::AnnotationNotFound`] and [`InteractionError::AnnotationLocked`]
    /// in addition to the errors of [`Self::start_draw`].
    pub fn start_edit(
        &mut self,
        viewport: &dyn Viewport,
        store: &AnnotationStore,
        uid: AnnotationUid,
        part: HitPart,
        evt: &PointerEvent,
    ) -> Result<(SessionToken, Vec<Action>), InteractionError> {
        self.check_can_start(viewport)?;
        let filter = LookupFilter::bucket(viewport.frame_of_reference_uid(), &self.config.tool_name);
        let handle = store.get(uid, filter).ok_or(InteractionError::AnnotationNotFound(uid))?;
        if handle.is_locked {
            return Err(InteractionError::AnnotationLocked(uid));
        }
        let spacing = compute_spacing_and_axes(viewport, self.config.sub_pixel_resolution)?;
        let target = Annotation::clone(handle);
        let points = target.canvas_points(viewport);
        let grab = evt.current.canvas;
        let join_radius = self.config.edit_proximity_px * RECROSS_JOIN_RADIUS_FACTOR;
        let window = self.config.edit_snap_window;

        let strategy = match (part, target.data.is_open_contour) {
            (HitPart::Handle(end), true) => {
                Strategy::EndpointEdit(DrawStrategy::resume(target, points, end == HandleEnd::Start, spacing))
            }
            (_, true) => Strategy::OpenEdit(EditStrategy::start(target, points, grab, spacing, false, join_radius, window)),
            (_, false) => Strategy::ClosedEdit(EditStrategy::start(target, points, grab, spacing, true, join_radius, window)),
        };
        Ok(self.begin(viewport, strategy))
    }

    /// Feed a drag sample to the active session.
    ///
    /// # Errors
    ///
    /// [`InteractionError::NoActiveSession`] or [`InteractionError::StaleSession`]
    /// leave state untouched; a viewport mismatch aborts the session.
    pub fn drag(
        &mut self,
        token: SessionToken,
        viewport: &dyn Viewport,
        store: &mut AnnotationStore,
        evt: &PointerEvent,
    ) -> Result<Vec<Action>, InteractionError> {
        let mut session = self.take_session(token, &evt.viewport_id)?;
        let mut ctx = InteractionContext { viewport, store, config: &self.config, actions: Vec::new() };
        match session.strategy.on_move(&mut ctx, evt) {
            Ok(Step::Continue) => self.session = Some(session),
            Ok(Step::Transition(next)) => {
                debug!(token = token.value(), from = session.strategy.name(), to = next.name(), "strategy transition");
                session.strategy = next;
                self.session = Some(session);
            }
            Ok(Step::Finished) => {
                debug!(token = token.value(), "session finished during drag");
                ctx.actions.push(Action::SetCursor(IDLE_CURSOR.into()));
            }
            Err(e) => {
                warn!(token = token.value(), error = %e, "interaction aborted");
                return Err(e);
            }
        }
        Ok(ctx.actions)
    }

    /// Release: finalize the active session.
    ///
    /// # Errors
    ///
    /// Same as [`Self::drag`].
    pub fn release(
        &mut self,
        token: SessionToken,
        viewport: &dyn Viewport,
        store: &mut AnnotationStore,
        evt: &PointerEvent,
    ) -> Result<Vec<Action>, InteractionError> {
        let session = self.take_session(token, &evt.viewport_id)?;
        self.finish(session, viewport, store, false)
    }

    /// Cancel the active session. The buffer is finalized as on release.
    ///
    /// # Errors
    ///
    /// Same as [`Self::drag`].
    pub fn cancel(
        &mut self,
        token: SessionToken,
        viewport: &dyn Viewport,
        store: &mut AnnotationStore,
    ) -> Result<Vec<Action>, InteractionError> {
        let session = self.take_session(token, viewport.id())?;
        self.finish(session, viewport, store, true)
    }

    /// Drop the active session without committing anything.
    ///
    /// Returns the token of the session that was dropped.
    pub fn abort(&mut self) -> Option<SessionToken> {
        let session = self.session.take()?;
        debug!(token = session.token.value(), strategy = session.strategy.name(), "session aborted");
        Some(session.token)
    }

    fn check_can_start(&self, viewport: &dyn Viewport) -> Result<(), InteractionError> {
        if self.session.is_some() {
            return Err(InteractionError::AlreadyInteracting);
        }
        let kind = viewport.kind();
        if !kind.supports_planar_contours() {
            return Err(InteractionError::UnsupportedViewport(kind));
        }
        Ok(())
    }

    fn begin(&mut self, viewport: &dyn Viewport, strategy: Strategy) -> (SessionToken, Vec<Action>) {
        let token = SessionToken(self.next_token);
        self.next_token += 1;
        debug!(token = token.value(), viewport = viewport.id(), strategy = strategy.name(), "session started");
        self.session = Some(ActiveSession { token, viewport_id: viewport.id().to_owned(), strategy });
        (token, vec![Action::SetCursor(ACTIVE_CURSOR.into()), Action::RenderNeeded])
    }

    fn take_session(&mut self, token: SessionToken, viewport_id: &str) -> Result<ActiveSession, InteractionError> {
        let active = self.session.as_ref().ok_or(InteractionError::NoActiveSession)?;
        if active.token != token {
            return Err(InteractionError::StaleSession { active: active.token, got: token });
        }
        let session = self.session.take().ok_or(InteractionError::NoActiveSession)?;
        if session.viewport_id != viewport_id {
            warn!(token = token.value(), expected = %session.viewport_id, got = viewport_id, "interaction aborted");
            return Err(InteractionError::ViewportMismatch { expected: session.viewport_id, got: viewport_id.to_owned() });
        }
        Ok(session)
    }

    fn finish(
        &self,
        session: ActiveSession,
        viewport: &dyn Viewport,
        store: &mut AnnotationStore,
        cancelled: bool,
    ) -> Result<Vec<Action>, InteractionError> {
        let token = session.token;
        let name = session.strategy.name();
        let mut ctx = InteractionContext { viewport, store, config: &self.config, actions: Vec::new() };
        let result = if cancelled { session.strategy.on_cancel(&mut ctx) } else { session.strategy.on_end(&mut ctx) };
        if let Err(e) = result {
            warn!(token = token.value(), strategy = name, error = %e, "interaction aborted");
            return Err(e);
        }
        debug!(token = token.value(), strategy = name, cancelled, "session ended");
        ctx.actions.push(Action::SetCursor(IDLE_CURSOR.into()));
        Ok(ctx.actions)
    }
}

impl Default for ContourTool {
    fn default() -> Self {
        Self::new(ContourToolConfig::default())
    }
}
