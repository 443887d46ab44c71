//! Shader loading.
//!
//! Sources are read through an [`AssetLoader`](crate::assets::AssetLoader),
//! expanded (`#include`, `#define`), then compiled and linked on the
//! [`GraphicsContext`](crate::gfx::GraphicsContext) handed in by the caller.

mod loader;
mod preprocess;

pub use loader::{check_gl_error, compile, link, load_program, load_shader, ProgramSources};
pub use preprocess::{insert_defines, load_source, resolve_includes, Defines, MAX_INCLUDE_DEPTH};
