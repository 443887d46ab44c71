use std::collections::HashMap;

use super::{DrawCall, ProgramHandle, ProgramLayout, TextureHandle, VertexStream, ViewportRect};
use super::MAX_TEXTURE_UNITS;

/// GL-compatible error codes, so logs read the same as on a GLES driver.
pub mod error_codes {
    pub const INVALID_ENUM: u32 = 0x0500;
    pub const INVALID_VALUE: u32 = 0x0501;
    pub const INVALID_OPERATION: u32 = 0x0502;
    pub const OUT_OF_MEMORY: u32 = 0x0505;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlError {
    pub code: u32,
    pub message: String,
}

impl std::fmt::Display for GlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X} ({})", self.code, self.message)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Blend function applied to color and alpha alike.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Premultiplied-alpha "over".
    pub const PREMULTIPLIED_ALPHA: Self = Self {
        src: BlendFactor::One,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    /// Darkens the destination by source alpha; source color is ignored.
    pub const MULTIPLICATIVE: Self = Self {
        src: BlendFactor::Zero,
        dst: BlendFactor::OneMinusSrcAlpha,
    };

    /// Keeps the destination color; only depth is written.
    pub const DEPTH_ONLY: Self = Self {
        src: BlendFactor::Zero,
        dst: BlendFactor::One,
    };
}

/// Fixed-function state snapshot.
///
/// The default configuration is: depth test on, depth write on, no blending.
/// Every renderer returns the context to this configuration after drawing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GpuState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: Option<BlendFunc>,
    pub program: Option<ProgramHandle>,
}

impl Default for GpuState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            blend: None,
            program: None,
        }
    }
}

impl GpuState {
    /// True when depth/blend state matches the default configuration.
    #[inline]
    pub fn is_default_fixed_function(&self) -> bool {
        self.depth_test && self.depth_write && self.blend.is_none()
    }
}

/// Backend-independent bookkeeping shared by the context implementations:
/// fixed-function state, per-program uniform blocks, texture units, and the
/// error queue.
#[derive(Debug, Default)]
pub struct StateTracker {
    state: GpuState,
    uniforms: HashMap<ProgramHandle, Vec<u8>>,
    textures: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    clear_color: [f32; 4],
    viewport: ViewportRect,
    errors: Vec<GlError>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> GpuState {
        self.state
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    #[inline]
    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn set_viewport(&mut self, rect: ViewportRect) {
        self.viewport = rect;
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
    }

    pub fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.state.blend = blend;
    }

    pub fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.state.program = program;
    }

    pub fn set_uniforms(&mut self, data: &[u8]) {
        let Some(program) = self.state.program else {
            self.push_error(error_codes::INVALID_OPERATION, "set_uniforms without a bound program");
            return;
        };
        let block = self.uniforms.entry(program).or_default();
        block.clear();
        block.extend_from_slice(data);
    }

    /// Uniform block of the bound program (empty when never set).
    pub fn uniforms(&self) -> &[u8] {
        self.state
            .program
            .and_then(|p| self.uniforms.get(&p))
            .map_or(&[], Vec::as_slice)
    }

    pub fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match self.textures.get_mut(unit as usize) {
            Some(slot) => *slot = texture,
            None => self.push_error(
                error_codes::INVALID_VALUE,
                format!("texture unit {unit} out of range"),
            ),
        }
    }

    #[inline]
    pub fn textures(&self) -> &[Option<TextureHandle>; MAX_TEXTURE_UNITS] {
        &self.textures
    }

    /// Drops every reference to a deleted program.
    pub fn forget_program(&mut self, program: ProgramHandle) {
        self.uniforms.remove(&program);
        if self.state.program == Some(program) {
            self.state.program = None;
        }
    }

    /// Unbinds a deleted texture from every unit.
    pub fn forget_texture(&mut self, texture: TextureHandle) {
        for slot in &mut self.textures {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
    }

    pub fn push_error(&mut self, code: u32, message: impl Into<String>) {
        let message = message.into();
        log::trace!("queued graphics error 0x{code:04X}: {message}");
        self.errors.push(GlError { code, message });
    }

    pub fn take_errors(&mut self) -> Vec<GlError> {
        std::mem::take(&mut self.errors)
    }

    /// Checks a draw against the bound program's layout.
    ///
    /// `layout` is the bound program's layout, `None` when the program is
    /// unknown or failed to link.
    pub fn validate_draw(
        &self,
        layout: Option<&ProgramLayout>,
        call: &DrawCall<'_>,
    ) -> Result<ProgramHandle, GlError> {
        let invalid = |message: String| GlError {
            code: error_codes::INVALID_OPERATION,
            message,
        };

        let Some(program) = self.state.program else {
            return Err(invalid(format!("draw `{}` without a bound program", call.label)));
        };
        let Some(layout) = layout else {
            return Err(invalid(format!("draw `{}` with an unlinked program", call.label)));
        };

        if call.vertices.len() != layout.attributes.len() {
            return Err(invalid(format!(
                "draw `{}` supplies {} attribute streams, program `{}` expects {}",
                call.label,
                call.vertices.len(),
                layout.label,
                layout.attributes.len()
            )));
        }

        for (location, (stream, expected)) in call.vertices.iter().zip(&layout.attributes).enumerate() {
            if stream.components() != *expected {
                return Err(invalid(format!(
                    "draw `{}` attribute {location}: {} components, expected {expected}",
                    call.label,
                    stream.components()
                )));
            }
            if let VertexStream::Client { data, components } = stream {
                if *components == 0 || data.len() % *components as usize != 0 {
                    return Err(GlError {
                        code: error_codes::INVALID_VALUE,
                        message: format!(
                            "draw `{}` attribute {location}: {} floats is not a multiple of {components}",
                            call.label,
                            data.len()
                        ),
                    });
                }
            }
        }

        if layout.uniform_size > 0 && self.uniforms().len() as u64 != layout.uniform_size {
            return Err(invalid(format!(
                "draw `{}`: uniform block is {} bytes, program `{}` expects {}",
                call.label,
                self.uniforms().len(),
                layout.label,
                layout.uniform_size
            )));
        }

        Ok(program)
    }
}
