//! GPU device and surface management.
//!
//! Creates the wgpu instance, adapter, device and queue, configures the
//! window surface, and hands out one encoder plus color view per frame. The
//! renderers never see any of this directly: the host wraps the device in a
//! `gfx::WgpuContext`.

mod context;
mod error;
mod frame;
mod init;
mod surface;

pub use context::Gpu;
pub use error::SurfaceErrorAction;
pub use frame::GpuFrame;
pub use init::GpuInit;
