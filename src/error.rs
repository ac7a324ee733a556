//! Error types for each layer of the engine.
//!
//! Store lookup misses are deliberately absent: they surface as `None`.

use uuid::Uuid;

use crate::input::SessionToken;
use crate::viewport::ViewportKind;

/// Error returned by the geometry kernel when a viewport cannot be sampled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// The viewport has no image data to derive voxel spacing from.
    #[error("viewport has no image data")]
    NoImageData,
    /// No image axis is aligned with the view right or view up direction.
    #[error("oblique viewing planes are not supported for planar contours")]
    ObliquePlane,
    /// Sub-pixel resolution must be at least 1.
    #[error("sub-pixel resolution must be at least 1, got {0}")]
    InvalidResolution(u32),
}

/// Input contract violation during a draw/edit interaction.
///
/// Any of these aborts the interaction it was raised from; nothing is committed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InteractionError {
    /// A session is already active; tool dispatch must prevent overlap.
    #[error("an interaction is already active")]
    AlreadyInteracting,
    /// Drag, release, or cancel arrived without an active session.
    #[error("no active interaction")]
    NoActiveSession,
    /// The caller's token does not belong to the active session.
    #[error("session token {got:?} is not the active session {active:?}")]
    StaleSession { active: SessionToken, got: SessionToken },
    /// Events for one session arrived from a different viewport.
    #[error("event from viewport `{got}` during a session on `{expected}`")]
    ViewportMismatch { expected: String, got: String },
    /// The tool does not operate on this kind of viewport.
    #[error("contour tool does not support {0:?} viewports")]
    UnsupportedViewport(ViewportKind),
    /// The annotation requested for editing is not in the store.
    #[error("annotation {0} not found")]
    AnnotationNotFound(Uuid),
    /// The annotation requested for editing is locked.
    #[error("annotation {0} is locked")]
    AnnotationLocked(Uuid),
    /// Spacing derivation failed for the viewport.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Error returned by [`crate::store::AnnotationStore::import_state`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The snapshot shape does not match the requested import scope.
    #[error("snapshot shape `{shape}` cannot be imported into scope `{scope}`")]
    ScopeMismatch { shape: &'static str, scope: &'static str },
    /// An annotation's metadata disagrees with the bucket it was placed in.
    #[error("annotation {uid} belongs to {frame}/{tool}, not {bucket_frame}/{bucket_tool}")]
    BucketMismatch { uid: Uuid, frame: String, tool: String, bucket_frame: String, bucket_tool: String },
}

/// Error returned while loading [`crate::config::ContourToolConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    /// A parsed value is out of its allowed range.
    #[error("{0}")]
    OutOfRange(String),
    /// The JSON document is malformed.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
