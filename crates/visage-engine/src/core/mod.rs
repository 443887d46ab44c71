//! Contracts between the runtime loop and the application.
//!
//! The runtime owns the window and the GPU; an application only sees the
//! surface callbacks of [`SurfaceApp`] and the contexts passed to them.

mod app;
mod ctx;

pub use app::{AppControl, SurfaceApp};
pub use ctx::{FrameCtx, SurfaceCtx, WindowCtx};
