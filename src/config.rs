//! Contour tool configuration.
//!
//! Values come from a JSON document ([`ContourToolConfig::from_json`]) or
//! from `CONTOUR_*` environment variables ([`ContourToolConfig::from_env`]).
//! Missing keys fall back to the defaults in [`crate::consts`].

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CLOSE_CONTOUR_PROXIMITY_PX, DEFAULT_EDIT_PROXIMITY_PX, DEFAULT_EDIT_SNAP_WINDOW,
    DEFAULT_HANDLE_RADIUS_PX, DEFAULT_SUB_PIXEL_RESOLUTION, DEFAULT_TOOL_NAME, MIN_CONTOUR_POINTS,
};
use crate::error::ConfigError;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

/// Behaviour switches and tolerances for the freehand contour tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourToolConfig {
    /// Tool kind written into annotation metadata and used as the store bucket key.
    pub tool_name: String,
    /// Whether a release far from the start point yields an open contour.
    pub allow_open_contours: bool,
    /// Compute a peak vector for open contours (U-shaped measurements).
    pub open_u_shape_contour: bool,
    /// Recorded points per voxel along each screen axis.
    pub sub_pixel_resolution: u32,
    /// First/last distance in canvas pixels under which a release closes the contour.
    pub close_contour_proximity_px: f64,
    /// Distance in canvas pixels within which a pointer-down grabs a boundary.
    pub edit_proximity_px: f64,
    /// Hit radius in canvas pixels for open-contour endpoint handles.
    pub handle_radius_px: f64,
    /// Points searched on either side of the previous snap index while editing.
    pub edit_snap_window: usize,
    /// Draw endpoint handles for open contours even when not highlighted.
    pub always_render_open_contour_handles: bool,
    /// Compute area/perimeter statistics for invalidated annotations.
    pub calculate_stats: bool,
}

impl Default for ContourToolConfig {
    fn default() -> Self {
        Self {
            tool_name: DEFAULT_TOOL_NAME.to_owned(),
            allow_open_contours: true,
            open_u_shape_contour: false,
            sub_pixel_resolution: DEFAULT_SUB_PIXEL_RESOLUTION,
            close_contour_proximity_px: DEFAULT_CLOSE_CONTOUR_PROXIMITY_PX,
            edit_proximity_px: DEFAULT_EDIT_PROXIMITY_PX,
            handle_radius_px: DEFAULT_HANDLE_RADIUS_PX,
            edit_snap_window: DEFAULT_EDIT_SNAP_WINDOW,
            always_render_open_contour_handles: false,
            calculate_stats: true,
        }
    }
}

impl ContourToolConfig {
    /// Parse a JSON document and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::OutOfRange`] when a value fails validation.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `CONTOUR_TOOL_NAME`
    /// - `CONTOUR_ALLOW_OPEN`: `true` / `false`
    /// - `CONTOUR_U_SHAPE`: `true` / `false`
    /// - `CONTOUR_SUB_PIXEL_RESOLUTION`: integer ≥ 1
    /// - `CONTOUR_CLOSE_PROXIMITY_PX`: float ≥ 0
    /// - `CONTOUR_EDIT_PROXIMITY_PX`: float ≥ 0
    /// - `CONTOUR_EDIT_SNAP_WINDOW`: integer ≥ 1
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here.
    ///
    /// # Errors
    ///
    /// Same as [`ContourToolConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(name) = lookup("CONTOUR_TOOL_NAME") {
            cfg.tool_name = name;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_ALLOW_OPEN", parse_bool)? {
            cfg.allow_open_contours = v;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_U_SHAPE", parse_bool)? {
            cfg.open_u_shape_contour = v;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_SUB_PIXEL_RESOLUTION", str::parse::<u32>)? {
            cfg.sub_pixel_resolution = v;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_CLOSE_PROXIMITY_PX", str::parse::<f64>)? {
            cfg.close_contour_proximity_px = v;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_EDIT_PROXIMITY_PX", str::parse::<f64>)? {
            cfg.edit_proximity_px = v;
        }
        if let Some(v) = parse_key(&lookup, "CONTOUR_EDIT_SNAP_WINDOW", str::parse::<usize>)? {
            cfg.edit_snap_window = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check ranges that the state machine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] describing the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_name.is_empty() {
            return Err(ConfigError::OutOfRange("tool_name must not be empty".into()));
        }
        if self.sub_pixel_resolution == 0 {
            return Err(ConfigError::OutOfRange("sub_pixel_resolution must be at least 1".into()));
        }
        for (name, value) in [
            ("close_contour_proximity_px", self.close_contour_proximity_px),
            ("edit_proximity_px", self.edit_proximity_px),
            ("handle_radius_px", self.handle_radius_px),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange(format!("{name} must be a finite non-negative number, got {value}")));
            }
        }
        if self.edit_snap_window == 0 {
            return Err(ConfigError::OutOfRange("edit_snap_window must be at least 1".into()));
        }
        Ok(())
    }

    /// Minimum number of recorded points for a gesture to become an annotation.
    #[must_use]
    pub fn min_point_count(&self) -> usize {
        let scaled = usize::try_from(self.sub_pixel_resolution).unwrap_or(usize::MAX).saturating_mul(3);
        scaled.max(MIN_CONTOUR_POINTS)
    }
}

fn parse_key<F, T, E, P>(lookup: &F, key: &'static str, parse: P) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, E>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = parse(raw.trim()).map_err(|_| ConfigError::InvalidValue { key, value: raw.clone() })?;
    Ok(Some(value))
}

fn parse_bool(raw: &str) -> Result<bool, std::str::ParseBoolError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "yes" | "on" => Ok(true),
        "0" | "no" | "off" => Ok(false),
        other => other.parse(),
    }
}
