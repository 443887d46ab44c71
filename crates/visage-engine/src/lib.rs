//! Visage engine crate.
//!
//! Face-tracking AR rendering: a camera background, a textured overlay on the
//! tracked face mesh, and OBJ models anchored to face regions, drawn each
//! frame by the [`FrameOrchestrator`] through an explicit
//! [`GraphicsContext`](gfx::GraphicsContext).
//!
//! The platform half (`device`, `window`, `core`) owns the winit window and
//! the wgpu device and drives a [`SurfaceApp`](core::SurfaceApp).

pub mod assets;
pub mod content;
pub mod core;
pub mod device;
pub mod error;
pub mod gfx;
pub mod logging;
pub mod math;
pub mod render;
pub mod session;
pub mod shader;
pub mod time;
pub mod window;

mod frame;

#[cfg(test)]
mod test_support;

pub use error::{RenderError, RenderResult};
pub use frame::{FACE_MATERIAL, FrameOrchestrator, ObjectConfig, OrchestratorState, SceneConfig};
