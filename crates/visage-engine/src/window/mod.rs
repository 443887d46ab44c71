//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, wires them to the GPU layer, and
//! maps window lifecycle onto the [`SurfaceApp`](crate::core::SurfaceApp)
//! callbacks.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
