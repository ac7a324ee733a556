//! Viewport boundary: points, camera state, and the projection contract.
//!
//! The camera/viewport subsystem is an external collaborator. This module
//! describes what the engine consumes from it ([`Viewport`]) and provides
//! [`PlanarViewport`], an orthographic implementation used by tests and by
//! the replay binary.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point in canvas space (CSS pixels, y pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3-D cross product of two planar vectors.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

impl Add for Point2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// A point or direction in world (patient) space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction; the zero vector is returned unchanged.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 { self } else { self * (1.0 / len) }
    }
}

impl Add for Point3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Camera state as reported by the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Direction the camera looks along, pointing into the screen.
    pub view_plane_normal: Point3,
    /// World direction that maps to canvas "up".
    pub view_up: Point3,
    /// Half the world-space height of the visible area.
    pub parallel_scale: f64,
    pub focal_point: Point3,
    pub position: Point3,
}

impl Camera {
    /// World direction that maps to canvas "right".
    #[must_use]
    pub fn view_right(&self) -> Point3 {
        self.view_up.cross(self.view_plane_normal)
    }
}

/// Voxel grid of the image displayed in the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    /// Voxel spacing along the i, j and k image axes.
    pub spacing: Point3,
    /// World directions of the i, j and k image axes.
    pub direction: [Point3; 3],
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self {
            spacing: Point3::new(1.0, 1.0, 1.0),
            direction: [Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 0.0, 1.0)],
        }
    }
}

/// Kind of viewport an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportKind {
    /// A stack of 2-D images.
    Stack,
    /// An orthographic slice through a volume.
    Orthographic,
    /// A 3-D volume rendering with no single viewing plane.
    Volume3d,
    /// A video frame.
    Video,
}

impl ViewportKind {
    /// Whether planar contours can be drawn on this kind of viewport.
    #[must_use]
    pub fn supports_planar_contours(self) -> bool {
        matches!(self, Self::Stack | Self::Orthographic)
    }
}

/// The camera/viewport collaborator consumed by the engine.
pub trait Viewport {
    /// Unique viewport identifier.
    fn id(&self) -> &str;

    /// Identifier of the rendering engine that owns the viewport.
    fn rendering_engine_id(&self) -> &str;

    fn kind(&self) -> ViewportKind;

    fn world_to_canvas(&self, world: Point3) -> Point2;

    fn canvas_to_world(&self, canvas: Point2) -> Point3;

    fn camera(&self) -> Camera;

    fn frame_of_reference_uid(&self) -> &str;

    /// Voxel geometry of the displayed image, if image data is loaded.
    fn image_geometry(&self) -> Option<ImageGeometry>;

    /// Identifier of the displayed image for stack viewports.
    fn reference_image_id(&self) -> Option<&str> {
        None
    }

    /// Whether the rendering backend behind this viewport is still alive.
    fn is_active(&self) -> bool {
        true
    }

    /// Key under which per-target statistics are cached.
    fn target_id(&self) -> String {
        match self.reference_image_id() {
            Some(image_id) => format!("imageId:{image_id}"),
            None => format!("volumeId:{}", self.frame_of_reference_uid()),
        }
    }
}

/// Orthographic viewport looking along `view_plane_normal`.
///
/// The focal point projects to the canvas centre and one canvas pixel spans
/// `2 * parallel_scale / height` millimetres.
#[derive(Debug, Clone)]
pub struct PlanarViewport {
    pub id: String,
    pub rendering_engine_id: String,
    pub kind: ViewportKind,
    pub frame_of_reference_uid: String,
    pub reference_image_id: Option<String>,
    pub camera: Camera,
    pub width: f64,
    pub height: f64,
    pub image: Option<ImageGeometry>,
    pub active: bool,
}

impl PlanarViewport {
    /// An axial stack viewport where world `(x, y, 0)` maps to canvas `(x, y)`.
    #[must_use]
    pub fn axial(id: &str, frame_of_reference_uid: &str, width: f64, height: f64) -> Self {
        let focal_point = Point3::new(width * 0.5, height * 0.5, 0.0);
        Self {
            id: id.to_owned(),
            rendering_engine_id: "default".to_owned(),
            kind: ViewportKind::Stack,
            frame_of_reference_uid: frame_of_reference_uid.to_owned(),
            reference_image_id: None,
            camera: Camera {
                view_plane_normal: Point3::new(0.0, 0.0, -1.0),
                view_up: Point3::new(0.0, -1.0, 0.0),
                parallel_scale: height * 0.5,
                focal_point,
                position: focal_point + Point3::new(0.0, 0.0, 1.0),
            },
            width,
            height,
            image: Some(ImageGeometry::default()),
            active: true,
        }
    }

    /// Millimetres per canvas pixel.
    #[must_use]
    pub fn mm_per_pixel(&self) -> f64 {
        if self.height <= 0.0 { 1.0 } else { 2.0 * self.camera.parallel_scale / self.height }
    }

    /// Scale the view so one canvas pixel spans `mm` millimetres.
    pub fn set_mm_per_pixel(&mut self, mm: f64) {
        self.camera.parallel_scale = mm * self.height * 0.5;
    }
}

impl Viewport for PlanarViewport {
    fn id(&self) -> &str {
        &self.id
    }

    fn rendering_engine_id(&self) -> &str {
        &self.rendering_engine_id
    }

    fn kind(&self) -> ViewportKind {
        self.kind
    }

    fn world_to_canvas(&self, world: Point3) -> Point2 {
        let d = world - self.camera.focal_point;
        let scale = self.mm_per_pixel();
        Point2::new(
            self.width * 0.5 + d.dot(self.camera.view_right()) / scale,
            self.height * 0.5 - d.dot(self.camera.view_up) / scale,
        )
    }

    fn canvas_to_world(&self, canvas: Point2) -> Point3 {
        let scale = self.mm_per_pixel();
        let right = self.camera.view_right() * ((canvas.x - self.width * 0.5) * scale);
        let up = self.camera.view_up * (-(canvas.y - self.height * 0.5) * scale);
        self.camera.focal_point + right + up
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn frame_of_reference_uid(&self) -> &str {
        &self.frame_of_reference_uid
    }

    fn image_geometry(&self) -> Option<ImageGeometry> {
        self.image
    }

    fn reference_image_id(&self) -> Option<&str> {
        self.reference_image_id.as_deref()
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
