//! Shared numeric constants for the contour engine.

// ── Tool defaults ───────────────────────────────────────────────

/// Tool kind recorded in annotation metadata when no override is configured.
pub const DEFAULT_TOOL_NAME: &str = "PlanarFreehandROI";

/// Sub-pixel resolution: recorded points per voxel along each screen axis.
pub const DEFAULT_SUB_PIXEL_RESOLUTION: u32 = 4;

/// Canvas distance (pixels) under which first and last points close the contour.
pub const DEFAULT_CLOSE_CONTOUR_PROXIMITY_PX: f64 = 10.0;

/// Canvas distance (pixels) within which a pointer-down grabs a contour boundary.
pub const DEFAULT_EDIT_PROXIMITY_PX: f64 = 6.0;

/// Screen-space hit slop in pixels for open-contour endpoint handles.
pub const DEFAULT_HANDLE_RADIUS_PX: f64 = 6.0;

/// Number of contour points searched on either side of the previous snap index.
pub const DEFAULT_EDIT_SNAP_WINDOW: usize = 24;

/// Floor on the minimum number of points in a committed contour.
pub const MIN_CONTOUR_POINTS: usize = 3;

// ── Geometry ────────────────────────────────────────────────────

/// Tolerance for treating two unit vectors as parallel (|dot| ≥ 1 − ε).
pub const PARALLEL_EPSILON: f64 = 1e-3;

/// Points closer than this (canvas pixels) are considered coincident.
pub const COINCIDENT_EPSILON: f64 = 1e-9;

/// Edit-line points required before a re-crossing of the base contour counts.
pub const MIN_EDIT_POINTS_FOR_RECROSS: usize = 3;

/// Multiple of the edit proximity around the grab point inside which a crossing
/// of the base contour is treated as part of the join, not a re-crossing.
pub const RECROSS_JOIN_RADIUS_FACTOR: f64 = 2.0;

// ── Rendering ───────────────────────────────────────────────────

/// Stroke width of committed contours in canvas pixels.
pub const CONTOUR_LINE_WIDTH_PX: f64 = 1.0;

/// Dash length for the in-progress contour in canvas pixels.
pub const ACTIVE_DASH_PX: f64 = 4.0;

/// Offset of the statistics label from the contour's right-most point.
pub const LABEL_OFFSET_PX: f64 = 8.0;

/// Radius of open-contour endpoint handles in canvas pixels.
pub const HANDLE_DRAW_RADIUS_PX: f64 = 3.0;

pub const CONTOUR_COLOR: &str = "rgb(255, 255, 0)";
pub const HIGHLIGHT_COLOR: &str = "rgb(0, 255, 0)";
pub const LOCKED_COLOR: &str = "rgb(209, 193, 90)";
