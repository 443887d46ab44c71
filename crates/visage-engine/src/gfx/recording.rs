use std::collections::HashMap;

use super::state::{StateTracker, error_codes};
use super::{
    BlendFunc, BufferHandle, BufferUsage, ClearFlags, DrawCall, GlError, GpuState,
    GraphicsContext, PixelBuffer, ProgramHandle, ProgramLayout, ShaderHandle, ShaderStage,
    TextureDesc, TextureHandle, VertexStream, ViewportRect,
};

/// One captured context call.
#[derive(Debug, Clone, PartialEq)]
pub enum GfxEvent {
    Clear(ClearFlags),
    Viewport(ViewportRect),
    DepthTest(bool),
    DepthWrite(bool),
    Blend(Option<BlendFunc>),
    UseProgram(Option<ProgramHandle>),
    BindTexture { unit: u32, texture: Option<TextureHandle> },
    UploadTexture(TextureHandle),
    Draw(DrawRecord),
}

/// A draw as seen by the context, with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub label: String,
    pub program: ProgramHandle,
    pub state: GpuState,
    pub textures: Vec<Option<TextureHandle>>,
    pub vertex_count: u32,
    pub index_count: Option<u32>,
    /// True when at least one attribute came from a client-side array.
    pub streamed: bool,
    pub uniforms: Vec<u8>,
}

#[derive(Debug)]
struct RecordedShader {
    stage: ShaderStage,
    source: String,
    status: Result<(), String>,
}

#[derive(Debug)]
struct RecordedProgram {
    layout: ProgramLayout,
    status: Result<(), String>,
}

/// Headless [`GraphicsContext`] that validates and captures every call.
///
/// Handles are issued from a single monotonically increasing counter, so a
/// recreated resource never reuses an old id.
#[derive(Debug, Default)]
pub struct RecordingContext {
    tracker: StateTracker,
    next_id: u32,
    shaders: HashMap<ShaderHandle, RecordedShader>,
    programs: HashMap<ProgramHandle, RecordedProgram>,
    textures: HashMap<TextureHandle, TextureDesc>,
    buffers: HashMap<BufferHandle, (BufferUsage, usize)>,
    events: Vec<GfxEvent>,
    failing_markers: Vec<String>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every shader whose source contains `marker` fail to compile.
    pub fn fail_shaders_containing(&mut self, marker: impl Into<String>) {
        self.failing_markers.push(marker.into());
    }

    /// Queues an error as if a driver call had failed.
    pub fn inject_error(&mut self, code: u32, message: &str) {
        self.tracker.push_error(code, message);
    }

    pub fn events(&self) -> &[GfxEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.events.iter().filter_map(|e| match e {
            GfxEvent::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn draw_labels(&self) -> Vec<&str> {
        self.draws().map(|d| d.label.as_str()).collect()
    }

    /// Source text a shader was created from, after preprocessing.
    pub fn shader_source(&self, shader: ShaderHandle) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    pub fn program_layout(&self, program: ProgramHandle) -> Option<&ProgramLayout> {
        self.programs.get(&program).map(|p| &p.layout)
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_desc(&self, texture: TextureHandle) -> Option<&TextureDesc> {
        self.textures.get(&texture)
    }

    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer).map(|(_, len)| *len)
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.tracker.clear_color()
    }

    #[inline]
    pub fn viewport(&self) -> ViewportRect {
        self.tracker.viewport()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn compile(&self, source: &str) -> Result<(), String> {
        if source.trim().is_empty() {
            return Err("empty shader source".to_string());
        }
        match self.failing_markers.iter().find(|m| source.contains(m.as_str())) {
            Some(marker) => Err(format!("0:1: error: forced failure on `{marker}`")),
            None => Ok(()),
        }
    }
}

impl GraphicsContext for RecordingContext {
    fn create_shader(&mut self, stage: ShaderStage, _label: &str, source: &str) -> ShaderHandle {
        let handle = ShaderHandle(self.next());
        let status = self.compile(source);
        self.shaders.insert(
            handle,
            RecordedShader {
                stage,
                source: source.to_string(),
                status,
            },
        );
        handle
    }

    fn shader_compile_status(&self, shader: ShaderHandle) -> Result<(), String> {
        match self.shaders.get(&shader) {
            Some(s) => s.status.clone(),
            None => Err(format!("unknown shader {}", shader.0)),
        }
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_none() {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("delete of unknown shader {}", shader.0));
        }
    }

    fn link_program(
        &mut self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
        layout: &ProgramLayout,
    ) -> ProgramHandle {
        let handle = ProgramHandle(self.next());
        let stage_ok = |h: ShaderHandle, stage: ShaderStage| match self.shaders.get(&h) {
            Some(s) if s.stage != stage => Err(format!("shader {} is not a {stage:?} shader", h.0)),
            Some(s) => s.status.clone(),
            None => Err(format!("shader {} does not exist", h.0)),
        };
        let status = stage_ok(vertex, ShaderStage::Vertex)
            .and_then(|_| stage_ok(fragment, ShaderStage::Fragment));
        self.programs.insert(
            handle,
            RecordedProgram {
                layout: layout.clone(),
                status,
            },
        );
        handle
    }

    fn program_link_status(&self, program: ProgramHandle) -> Result<(), String> {
        match self.programs.get(&program) {
            Some(p) => p.status.clone(),
            None => Err(format!("unknown program {}", program.0)),
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            self.tracker.push_error(
                error_codes::INVALID_VALUE,
                format!("delete of unknown program {}", program.0),
            );
        }
        self.tracker.forget_program(program);
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        let handle = TextureHandle(self.next());
        self.textures.insert(handle, desc.clone());
        handle
    }

    fn upload_texture(&mut self, texture: TextureHandle, pixels: &PixelBuffer) {
        let Some(desc) = self.textures.get_mut(&texture) else {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("upload to unknown texture {}", texture.0));
            return;
        };
        if !pixels.is_consistent() || pixels.format != desc.format {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("malformed pixels for texture {}", texture.0));
            return;
        }
        desc.width = pixels.width;
        desc.height = pixels.height;
        self.events.push(GfxEvent::UploadTexture(texture));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_none() {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("delete of unknown texture {}", texture.0));
        }
        self.tracker.forget_texture(texture);
    }

    fn create_buffer(&mut self, usage: BufferUsage, _label: &str, contents: &[u8]) -> BufferHandle {
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, (usage, contents.len()));
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("delete of unknown buffer {}", buffer.0));
        }
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.tracker.set_clear_color(rgba);
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.events.push(GfxEvent::Clear(flags));
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.tracker.set_viewport(rect);
        self.events.push(GfxEvent::Viewport(rect));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.tracker.set_depth_test(enabled);
        self.events.push(GfxEvent::DepthTest(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.tracker.set_depth_write(enabled);
        self.events.push(GfxEvent::DepthWrite(enabled));
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.tracker.set_blend(blend);
        self.events.push(GfxEvent::Blend(blend));
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        if let Some(p) = program {
            if !self.programs.contains_key(&p) {
                self.tracker
                    .push_error(error_codes::INVALID_VALUE, format!("use of unknown program {}", p.0));
                return;
            }
        }
        self.tracker.use_program(program);
        self.events.push(GfxEvent::UseProgram(program));
    }

    fn set_uniforms(&mut self, data: &[u8]) {
        self.tracker.set_uniforms(data);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        self.tracker.bind_texture(unit, texture);
        self.events.push(GfxEvent::BindTexture { unit, texture });
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let layout = self
            .tracker
            .state()
            .program
            .and_then(|p| self.programs.get(&p))
            .filter(|p| p.status.is_ok())
            .map(|p| &p.layout);

        let program = match self.tracker.validate_draw(layout, call) {
            Ok(p) => p,
            Err(GlError { code, message }) => {
                self.tracker.push_error(code, message);
                return;
            }
        };

        for stream in call.vertices {
            if let VertexStream::Buffer { buffer, .. } = stream {
                if !self.buffers.contains_key(buffer) {
                    self.tracker.push_error(
                        error_codes::INVALID_OPERATION,
                        format!("draw `{}` reads deleted buffer {}", call.label, buffer.0),
                    );
                    return;
                }
            }
        }

        let units = layout.map_or(0, |l| l.texture_units as usize);
        let record = DrawRecord {
            label: call.label.to_string(),
            program,
            state: self.tracker.state(),
            textures: self.tracker.textures().iter().copied().take(units).collect(),
            vertex_count: call.vertex_count,
            index_count: call.indices.map(|i| i.count()),
            streamed: call
                .vertices
                .iter()
                .any(|s| matches!(s, VertexStream::Client { .. })),
            uniforms: self.tracker.uniforms().to_vec(),
        };
        self.events.push(GfxEvent::Draw(record));
    }

    fn state(&self) -> GpuState {
        self.tracker.state()
    }

    fn take_errors(&mut self) -> Vec<GlError> {
        self.tracker.take_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{Primitive, TextureFilter, TextureFormat};

    fn simple_program(ctx: &mut RecordingContext) -> ProgramHandle {
        let vs = ctx.create_shader(ShaderStage::Vertex, "vs", "void main() {}");
        let fs = ctx.create_shader(ShaderStage::Fragment, "fs", "void main() {}");
        ctx.link_program(
            vs,
            fs,
            &ProgramLayout {
                label: "p".into(),
                attributes: vec![2],
                uniform_size: 0,
                texture_units: 1,
            },
        )
    }

    #[test]
    fn handles_are_never_reused() {
        let mut ctx = RecordingContext::new();
        let a = simple_program(&mut ctx);
        ctx.delete_program(a);
        let b = simple_program(&mut ctx);
        assert_ne!(a, b);
    }

    #[test]
    fn forced_compile_failure_is_reported() {
        let mut ctx = RecordingContext::new();
        ctx.fail_shaders_containing("BROKEN");
        let s = ctx.create_shader(ShaderStage::Fragment, "fs", "BROKEN\nvoid main() {}");
        assert!(ctx.shader_compile_status(s).is_err());
    }

    #[test]
    fn link_rejects_swapped_stages() {
        let mut ctx = RecordingContext::new();
        let vs = ctx.create_shader(ShaderStage::Vertex, "vs", "void main() {}");
        let fs = ctx.create_shader(ShaderStage::Fragment, "fs", "void main() {}");
        let layout = ProgramLayout {
            label: "p".into(),
            attributes: vec![],
            uniform_size: 0,
            texture_units: 0,
        };
        let p = ctx.link_program(fs, vs, &layout);
        assert!(ctx.program_link_status(p).is_err());
    }

    #[test]
    fn draw_captures_state_and_textures() {
        let mut ctx = RecordingContext::new();
        let p = simple_program(&mut ctx);
        let tex = ctx.create_texture(&TextureDesc {
            label: "t".into(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Linear,
        });
        ctx.use_program(Some(p));
        ctx.bind_texture(0, Some(tex));
        ctx.set_depth_write(false);

        let quad = [0.0f32; 8];
        let streams = [VertexStream::Client { data: &quad, components: 2 }];
        ctx.draw(&DrawCall {
            label: "quad",
            primitive: Primitive::TriangleStrip,
            vertices: &streams,
            indices: None,
            vertex_count: 4,
        });

        let draws: Vec<_> = ctx.draws().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].textures, vec![Some(tex)]);
        assert!(!draws[0].state.depth_write);
        assert!(draws[0].streamed);
        assert!(ctx.take_errors().is_empty());
    }

    #[test]
    fn draw_without_program_is_dropped_with_error() {
        let mut ctx = RecordingContext::new();
        ctx.draw(&DrawCall {
            label: "orphan",
            primitive: Primitive::Triangles,
            vertices: &[],
            indices: None,
            vertex_count: 3,
        });
        assert_eq!(ctx.draws().count(), 0);
        assert_eq!(ctx.take_errors()[0].code, error_codes::INVALID_OPERATION);
    }
}
