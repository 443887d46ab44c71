//! Explicit graphics context.
//!
//! Renderers never touch global GPU state. Every call goes through a
//! [`GraphicsContext`] handed down by the caller, which owns bound program,
//! textures, blend and depth state.
//!
//! Two implementations are provided:
//! - [`WgpuContext`]: resolves the GL-style state into wgpu pipelines and
//!   records draws into a render pass at flush time.
//! - [`RecordingContext`]: headless, captures the draw-call sequence and state
//!   transitions. Used by tests and tooling.

mod recording;
mod state;
mod wgpu_backend;

pub use recording::{DrawRecord, GfxEvent, RecordingContext};
pub use state::{BlendFactor, BlendFunc, GlError, GpuState, StateTracker, error_codes};
pub use wgpu_backend::{RenderTarget, WgpuContext};

/// Maximum number of texture units a program may sample from.
pub const MAX_TEXTURE_UNITS: usize = 4;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// Compiled shader stage.
    ShaderHandle
);
handle_type!(
    /// Linked GPU program.
    ProgramHandle
);
handle_type!(TextureHandle);
handle_type!(BufferHandle);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Vertex/uniform/texture interface a program is linked against.
///
/// `attributes[i]` is the component count (1..=4 floats) of the attribute at
/// location `i`. Each attribute is fed from its own stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLayout {
    pub label: String,
    pub attributes: Vec<u32>,
    /// Size in bytes of the uniform block, 0 when the program has none.
    pub uniform_size: u64,
    pub texture_units: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    Rgba8,
    /// Two-channel 8-bit, used for packed 16-bit depth images.
    Rg8,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8 => 4,
            Self::Rg8 => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFilter {
    Linear,
    Nearest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: TextureFilter,
}

/// CPU-side image ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            data,
        }
    }

    /// True when `data` holds exactly `width * height` pixels.
    pub fn is_consistent(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize;
        self.data.len() == expected
    }

    /// Scales color channels by alpha in place (RGBA8 only).
    pub fn premultiply(&mut self) {
        if self.format != TextureFormat::Rgba8 {
            return;
        }
        for px in self.data.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
}

/// Source of one vertex attribute.
#[derive(Debug, Copy, Clone)]
pub enum VertexStream<'a> {
    /// Tightly packed floats inside a GPU-resident buffer, starting at `offset` bytes.
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        components: u32,
    },
    /// Client-side array streamed to the GPU for this draw only.
    Client { data: &'a [f32], components: u32 },
}

impl VertexStream<'_> {
    #[inline]
    pub fn components(&self) -> u32 {
        match self {
            Self::Buffer { components, .. } | Self::Client { components, .. } => *components,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub enum IndexSource<'a> {
    Buffer { buffer: BufferHandle, count: u32 },
    Client(&'a [u16]),
}

impl IndexSource<'_> {
    #[inline]
    pub fn count(&self) -> u32 {
        match self {
            Self::Buffer { count, .. } => *count,
            Self::Client(indices) => indices.len() as u32,
        }
    }
}

/// A single draw with the currently bound program, uniforms and textures.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub label: &'a str,
    pub primitive: Primitive,
    pub vertices: &'a [VertexStream<'a>],
    pub indices: Option<IndexSource<'a>>,
    /// Vertex count for non-indexed draws.
    pub vertex_count: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
}

impl ClearFlags {
    pub const COLOR_AND_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// Viewport rectangle in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// GL-style graphics context passed to every renderer call.
///
/// Errors from state-mutating calls are queued, never returned; callers drain
/// them with [`take_errors`](Self::take_errors) (see `shader::check_gl_error`).
pub trait GraphicsContext {
    fn create_shader(&mut self, stage: ShaderStage, label: &str, source: &str) -> ShaderHandle;
    /// Compile status of `shader`; `Err` carries the compiler diagnostic.
    fn shader_compile_status(&self, shader: ShaderHandle) -> Result<(), String>;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
        layout: &ProgramLayout,
    ) -> ProgramHandle;
    fn program_link_status(&self, program: ProgramHandle) -> Result<(), String>;
    fn delete_program(&mut self, program: ProgramHandle);

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle;
    fn upload_texture(&mut self, texture: TextureHandle, pixels: &PixelBuffer);
    fn delete_texture(&mut self, texture: TextureHandle);

    fn create_buffer(&mut self, usage: BufferUsage, label: &str, contents: &[u8]) -> BufferHandle;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self, flags: ClearFlags);
    fn set_viewport(&mut self, rect: ViewportRect);

    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_blend(&mut self, blend: Option<BlendFunc>);

    fn use_program(&mut self, program: Option<ProgramHandle>);
    /// Replaces the uniform block of the bound program.
    fn set_uniforms(&mut self, data: &[u8]);
    /// Units left empty sample opaque white.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    fn draw(&mut self, call: &DrawCall<'_>);

    /// Snapshot of the fixed-function state.
    fn state(&self) -> GpuState;

    /// Drains all queued errors, oldest first.
    fn take_errors(&mut self) -> Vec<GlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut px = PixelBuffer::rgba(2, 1, vec![255, 128, 0, 128, 10, 20, 30, 255]);
        px.premultiply();
        assert_eq!(&px.data[..4], &[128, 64, 0, 128]);
        assert_eq!(&px.data[4..], &[10, 20, 30, 255]);
    }

    #[test]
    fn pixel_buffer_consistency_checks_length() {
        assert!(PixelBuffer::rgba(2, 2, vec![0; 16]).is_consistent());
        assert!(!PixelBuffer::rgba(2, 2, vec![0; 15]).is_consistent());
    }
}
