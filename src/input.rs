//! Input model: tools, pointer events, keys, and session tokens.
//!
//! Pointer events arrive already normalized by the host (mouse and touch
//! collapse to one shape). Each carries the current and previous positions in
//! both world and canvas space plus the viewport it came from.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

use crate::viewport::{Point2, Point3, Viewport};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Existing contours can be highlighted and edited; nothing new is drawn.
    #[default]
    Select,
    /// Pointer-down on empty canvas starts a new freehand contour.
    Freehand,
}

impl Tool {
    /// Whether pointer-down on empty canvas starts drawing.
    #[must_use]
    pub fn draws(self) -> bool {
        matches!(self, Self::Freehand)
    }
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the host (e.g. `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is_escape(&self) -> bool {
        self.0 == "Escape" || self.0 == "Esc"
    }
}

/// One pointer position in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventPoints {
    pub world: Point3,
    pub canvas: Point2,
}

impl EventPoints {
    /// Project a canvas position through the viewport.
    #[must_use]
    pub fn from_canvas(viewport: &dyn Viewport, canvas: Point2) -> Self {
        Self { world: viewport.canvas_to_world(canvas), canvas }
    }
}

/// Canonical pointer event for down, drag, and up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub current: EventPoints,
    pub last: EventPoints,
    /// Viewport the event was dispatched on.
    pub viewport_id: String,
}

impl PointerEvent {
    /// A pointer event at `canvas` with no prior motion.
    #[must_use]
    pub fn at(viewport: &dyn Viewport, canvas: Point2) -> Self {
        let points = EventPoints::from_canvas(viewport, canvas);
        Self { current: points, last: points, viewport_id: viewport.id().to_owned() }
    }

    /// The next event in a drag, moving from this event's position to `canvas`.
    #[must_use]
    pub fn moved_to(&self, viewport: &dyn Viewport, canvas: Point2) -> Self {
        Self {
            current: EventPoints::from_canvas(viewport, canvas),
            last: self.current,
            viewport_id: self.viewport_id.clone(),
        }
    }
}

/// Proof of holding the active interaction session.
///
/// Issued when a session starts; every later transition must present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub(crate) u64);

impl SessionToken {
    /// Raw token value, for logging.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}
