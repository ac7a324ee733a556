//! Freehand contour annotation engine for medical image viewports.
//!
//! Turns a stream of pointer-drag samples into closed or open polygon
//! annotations, lets the user re-enter an existing contour to reshape it,
//! and keeps committed annotations keyed by the frame of reference they were
//! drawn in. The camera, the rendering backend and input normalization are
//! external: the engine consumes a [`viewport::Viewport`] and returns
//! [`engine::Action`]s and [`render::Primitive`]s for the host to act on.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Event dispatch, hover, removal and the render pass ([`engine::EngineCore`]) |
//! | [`interaction`] | Draw/edit state machine and session tokens |
//! | [`store`] | Frame-of-reference → tool → annotation store with snapshots |
//! | [`annotation`] | Annotation record types and contour invariants |
//! | [`geometry`] | Intersection, proximity, sampling and shape measures |
//! | [`stats`] | Cached area / perimeter statistics |
//! | [`hit`] | Hit-testing against committed contours |
//! | [`render`] | Display-list generation |
//! | [`viewport`] | Points, camera, the viewport contract and a planar implementation |
//! | [`input`] | Tools, pointer events and keys |
//! | [`config`] | Tool configuration from JSON or the environment |
//! | [`error`] | Error types |
//! | [`consts`] | Shared numeric constants |

pub mod annotation;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod input;
pub mod interaction;
pub mod render;
pub mod stats;
pub mod store;
pub mod viewport;
