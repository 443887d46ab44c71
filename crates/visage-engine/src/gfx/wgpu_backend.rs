use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::state::{StateTracker, error_codes};
use super::{
    BlendFactor, BlendFunc, BufferHandle, BufferUsage, ClearFlags, DrawCall, GlError, GpuState,
    GraphicsContext, IndexSource, PixelBuffer, Primitive, ProgramHandle, ProgramLayout,
    ShaderHandle, ShaderStage, TextureDesc, TextureFilter, TextureFormat, TextureHandle,
    VertexStream, ViewportRect,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}

struct ShaderEntry {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    status: Result<(), String>,
}

struct LinkedProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

struct ProgramEntry {
    layout: ProgramLayout,
    linked: Result<LinkedProgram, String>,
}

struct TextureEntry {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Fixed-function state baked into a pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    primitive: Primitive,
    blend: Option<BlendFunc>,
    depth_test: bool,
    depth_write: bool,
}

struct PendingDraw {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    vertex_buffers: Vec<(wgpu::Buffer, u64)>,
    index_buffer: Option<wgpu::Buffer>,
    count: u32,
    viewport: ViewportRect,
}

/// [`GraphicsContext`] backed by wgpu.
///
/// GL-style state is tracked on the CPU. Each draw resolves the current state
/// into a cached pipeline (keyed per program by blend/depth/topology) and is
/// queued; [`flush`](Self::flush) replays the queue into one render pass,
/// applying any pending clear as the pass load ops.
///
/// Shaders are GLSL 450 and go through wgpu's GLSL front-end.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    size: (u32, u32),
    depth_view: wgpu::TextureView,

    tracker: StateTracker,
    next_id: u32,
    shaders: HashMap<ShaderHandle, ShaderEntry>,
    programs: HashMap<ProgramHandle, ProgramEntry>,
    textures: HashMap<TextureHandle, TextureEntry>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    fallback_texture: TextureEntry,

    pending_clear: Option<ClearFlags>,
    pending: Vec<PendingDraw>,
}

impl WgpuContext {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let size = (width.max(1), height.max(1));
        let depth_view = create_depth_view(&device, size);

        let fallback_desc = TextureDesc {
            label: "visage fallback texture".into(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Nearest,
        };
        let fallback_texture = create_texture_entry(&device, &fallback_desc);
        write_pixels(&queue, &fallback_texture.texture, &PixelBuffer::rgba(1, 1, vec![255; 4]));

        let mut tracker = StateTracker::new();
        tracker.set_viewport(ViewportRect::full(size.0, size.1));

        Self {
            device,
            queue,
            color_format,
            size,
            depth_view,
            tracker,
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            fallback_texture,
            pending_clear: None,
            pending: Vec::new(),
        }
    }

    /// Recreates the depth attachment to match a new surface size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.depth_view = create_depth_view(&self.device, self.size);
    }

    /// Replays queued clears and draws into `target`.
    pub fn flush(&mut self, target: &mut RenderTarget<'_>) {
        let clear = self.pending_clear.take();
        let draws = std::mem::take(&mut self.pending);
        if draws.is_empty() && clear.is_none() {
            return;
        }

        let color_load = match clear {
            Some(ClearFlags { color: true, .. }) => {
                let [r, g, b, a] = self.tracker.clear_color();
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                })
            }
            _ => wgpu::LoadOp::Load,
        };
        let depth_load = match clear {
            Some(ClearFlags { depth: true, .. }) => wgpu::LoadOp::Clear(1.0),
            _ => wgpu::LoadOp::Load,
        };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("visage frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (max_w, max_h) = self.size;
        for draw in &draws {
            let vp = draw.viewport;
            let x = vp.x.min(max_w - 1);
            let y = vp.y.min(max_h - 1);
            let w = vp.width.min(max_w - x).max(1);
            let h = vp.height.min(max_h - y).max(1);
            rpass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);

            rpass.set_pipeline(&draw.pipeline);
            rpass.set_bind_group(0, &draw.bind_group, &[]);
            for (slot, (buffer, offset)) in draw.vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(*offset..));
            }
            match &draw.index_buffer {
                Some(ibo) => {
                    rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(0..draw.count, 0, 0..1);
                }
                None => rpass.draw(0..draw.count, 0..1),
            }
            log::trace!("flushed draw `{}`", draw.label);
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Runs `f` inside a validation error scope and returns its first error.
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<String>) {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let error = pollster::block_on(scope.pop());
        (value, error.map(|e| e.to_string()))
    }

    fn pipeline_for(&mut self, program: ProgramHandle, key: PipelineKey) -> Result<wgpu::RenderPipeline, GlError> {
        let color_format = self.color_format;
        let Some(ProgramEntry { layout, linked: Ok(linked) }) = self.programs.get(&program) else {
            return Err(GlError {
                code: error_codes::INVALID_OPERATION,
                message: format!("program {} is not linked", program.0),
            });
        };
        if let Some(p) = linked.pipelines.get(&key) {
            return Ok(p.clone());
        }

        let attrs: Vec<[wgpu::VertexAttribute; 1]> = layout
            .attributes
            .iter()
            .enumerate()
            .map(|(location, components)| {
                [wgpu::VertexAttribute {
                    format: vertex_format(*components),
                    offset: 0,
                    shader_location: location as u32,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = layout
            .attributes
            .iter()
            .zip(&attrs)
            .map(|(components, attributes)| wgpu::VertexBufferLayout {
                array_stride: (*components as u64) * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let label = format!("visage {} pipeline", layout.label);
        let (pipeline, error) = self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&linked.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &linked.vertex,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &linked.fragment,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: key.blend.map(blend_state),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: match key.primitive {
                        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
                        Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
                    },
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                // A disabled depth test also disables depth writes, as in GL.
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: key.depth_test && key.depth_write,
                    depth_compare: if key.depth_test {
                        wgpu::CompareFunction::LessEqual
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            })
        });

        if let Some(message) = error {
            return Err(GlError {
                code: error_codes::INVALID_OPERATION,
                message,
            });
        }

        if let Some(ProgramEntry { linked: Ok(linked), .. }) = self.programs.get_mut(&program) {
            linked.pipelines.insert(key, pipeline.clone());
        }
        Ok(pipeline)
    }

    fn bind_group_for(&self, program: ProgramHandle) -> Option<wgpu::BindGroup> {
        let Some(ProgramEntry { layout, linked: Ok(linked) }) = self.programs.get(&program) else {
            return None;
        };

        let uniform_buffer = (layout.uniform_size > 0).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("visage uniform block"),
                contents: self.tracker.uniforms(),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let units = self.tracker.textures();
        let bound: Vec<&TextureEntry> = (0..layout.texture_units as usize)
            .map(|unit| {
                units
                    .get(unit)
                    .copied()
                    .flatten()
                    .and_then(|t| self.textures.get(&t))
                    .unwrap_or(&self.fallback_texture)
            })
            .collect();

        let mut entries = Vec::with_capacity(1 + bound.len() * 2);
        if let Some(ubo) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            });
        }
        for (unit, tex) in bound.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * unit as u32,
                resource: wgpu::BindingResource::TextureView(&tex.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * unit as u32,
                resource: wgpu::BindingResource::Sampler(&tex.sampler),
            });
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("visage draw bind group"),
            layout: &linked.bind_group_layout,
            entries: &entries,
        }))
    }
}

impl GraphicsContext for WgpuContext {
    fn create_shader(&mut self, stage: ShaderStage, label: &str, source: &str) -> ShaderHandle {
        let handle = ShaderHandle(self.next());
        let naga_stage = match stage {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        };
        let (module, error) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Glsl {
                    shader: source.into(),
                    stage: naga_stage,
                    defines: Default::default(),
                },
            })
        });
        let status = match error {
            Some(message) => Err(message),
            None => Ok(()),
        };
        self.shaders.insert(handle, ShaderEntry { stage, module, status });
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

        let module = |h: ShaderHandle, stage: ShaderStage| -> Result<wgpu::ShaderModule, String> {
            match self.shaders.get(&h) {
                Some(s) if s.stage != stage => Err(format!("shader {} is not a {stage:?} shader", h.0)),
                Some(s) => s.status.clone().map(|_| s.module.clone()),
                None => Err(format!("shader {} does not exist", h.0)),
            }
        };

        let linked = module(vertex, ShaderStage::Vertex).and_then(|vs| {
            let fs = module(fragment, ShaderStage::Fragment)?;
            let entries = bind_group_layout_entries(layout);
            let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&layout.label),
                entries: &entries,
            });
            let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&layout.label),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });
            Ok(LinkedProgram {
                vertex: vs,
                fragment: fs,
                bind_group_layout,
                pipeline_layout,
                pipelines: HashMap::new(),
            })
        });

        self.programs.insert(
            handle,
            ProgramEntry {
                layout: layout.clone(),
                linked,
            },
        );
        handle
    }

    fn program_link_status(&self, program: ProgramHandle) -> Result<(), String> {
        match self.programs.get(&program) {
            Some(ProgramEntry { linked: Ok(_), .. }) => Ok(()),
            Some(ProgramEntry { linked: Err(e), .. }) => Err(e.clone()),
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
        let entry = create_texture_entry(&self.device, desc);
        self.textures.insert(handle, entry);
        handle
    }

    fn upload_texture(&mut self, texture: TextureHandle, pixels: &PixelBuffer) {
        let Some(entry) = self.textures.get_mut(&texture) else {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("upload to unknown texture {}", texture.0));
            return;
        };
        if !pixels.is_consistent() || pixels.format != entry.desc.format {
            self.tracker
                .push_error(error_codes::INVALID_VALUE, format!("malformed pixels for texture {}", texture.0));
            return;
        }

        // Uploading a different size reallocates storage, like glTexImage2D.
        if (entry.desc.width, entry.desc.height) != (pixels.width, pixels.height) {
            let mut desc = entry.desc.clone();
            desc.width = pixels.width;
            desc.height = pixels.height;
            *entry = create_texture_entry(&self.device, &desc);
        }
        write_pixels(&self.queue, &entry.texture, pixels);
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        match self.textures.remove(&texture) {
            Some(entry) => entry.texture.destroy(),
            None => self
                .tracker
                .push_error(error_codes::INVALID_VALUE, format!("delete of unknown texture {}", texture.0)),
        }
        self.tracker.forget_texture(texture);
    }

    fn create_buffer(&mut self, usage: BufferUsage, label: &str, contents: &[u8]) -> BufferHandle {
        let handle = BufferHandle(self.next());
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        self.buffers.insert(handle, buffer);
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        match self.buffers.remove(&buffer) {
            Some(b) => b.destroy(),
            None => self
                .tracker
                .push_error(error_codes::INVALID_VALUE, format!("delete of unknown buffer {}", buffer.0)),
        }
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.tracker.set_clear_color(rgba);
    }

    fn clear(&mut self, flags: ClearFlags) {
        // Draws queued before a clear would be overwritten by it; drop them.
        if !self.pending.is_empty() {
            log::trace!("clear discards {} queued draws", self.pending.len());
            self.pending.clear();
        }
        self.pending_clear = Some(flags);
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.tracker.set_viewport(rect);
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.tracker.set_depth_test(enabled);
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.tracker.set_depth_write(enabled);
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.tracker.set_blend(blend);
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
    }

    fn set_uniforms(&mut self, data: &[u8]) {
        self.tracker.set_uniforms(data);
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        self.tracker.bind_texture(unit, texture);
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let layout = self
            .tracker
            .state()
            .program
            .and_then(|p| self.programs.get(&p))
            .filter(|p| p.linked.is_ok())
            .map(|p| &p.layout);

        let program = match self.tracker.validate_draw(layout, call) {
            Ok(p) => p,
            Err(GlError { code, message }) => {
                self.tracker.push_error(code, message);
                return;
            }
        };

        let state = self.tracker.state();
        let key = PipelineKey {
            primitive: call.primitive,
            blend: state.blend,
            depth_test: state.depth_test,
            depth_write: state.depth_write,
        };
        let pipeline = match self.pipeline_for(program, key) {
            Ok(p) => p,
            Err(GlError { code, message }) => {
                self.tracker.push_error(code, message);
                return;
            }
        };

        let mut vertex_buffers = Vec::with_capacity(call.vertices.len());
        for stream in call.vertices {
            match stream {
                VertexStream::Buffer { buffer, offset, .. } => match self.buffers.get(buffer) {
                    Some(b) => vertex_buffers.push((b.clone(), *offset)),
                    None => {
                        self.tracker.push_error(
                            error_codes::INVALID_OPERATION,
                            format!("draw `{}` reads deleted buffer {}", call.label, buffer.0),
                        );
                        return;
                    }
                },
                VertexStream::Client { data, .. } => {
                    let b = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("visage streamed vertices"),
                        contents: bytemuck::cast_slice(data),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                    vertex_buffers.push((b, 0));
                }
            }
        }

        let index_buffer = match call.indices {
            None => None,
            Some(IndexSource::Buffer { buffer, .. }) => match self.buffers.get(&buffer) {
                Some(b) => Some(b.clone()),
                None => {
                    self.tracker.push_error(
                        error_codes::INVALID_OPERATION,
                        format!("draw `{}` reads deleted index buffer {}", call.label, buffer.0),
                    );
                    return;
                }
            },
            Some(IndexSource::Client(indices)) => {
                Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("visage streamed indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                }))
            }
        };

        let Some(bind_group) = self.bind_group_for(program) else {
            return;
        };
        self.pending.push(PendingDraw {
            label: call.label.to_string(),
            pipeline,
            bind_group,
            vertex_buffers,
            index_buffer,
            count: call.indices.map_or(call.vertex_count, |i| i.count()),
            viewport: self.tracker.viewport(),
        });
    }

    fn state(&self) -> GpuState {
        self.tracker.state()
    }

    fn take_errors(&mut self) -> Vec<GlError> {
        self.tracker.take_errors()
    }
}

fn create_depth_view(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("visage depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_texture_entry(device: &wgpu::Device, desc: &TextureDesc) -> TextureEntry {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&desc.label),
        size: wgpu::Extent3d {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: match desc.format {
            TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        },
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let filter = match desc.filter {
        TextureFilter::Linear => wgpu::FilterMode::Linear,
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&desc.label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    });
    TextureEntry {
        desc: desc.clone(),
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        texture,
        sampler,
    }
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, pixels: &PixelBuffer) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(pixels.width * pixels.format.bytes_per_pixel()),
            rows_per_image: Some(pixels.height),
        },
        wgpu::Extent3d {
            width: pixels.width,
            height: pixels.height,
            depth_or_array_layers: 1,
        },
    );
}

/// Uniform block at binding 0, then a (texture, sampler) pair per unit.
fn bind_group_layout_entries(layout: &ProgramLayout) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::new();
    if let Some(size) = std::num::NonZeroU64::new(layout.uniform_size) {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: Some(size),
            },
            count: None,
        });
    }
    for unit in 0..layout.texture_units {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + 2 * unit,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + 2 * unit,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn blend_state(func: BlendFunc) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(func.src),
        dst_factor: blend_factor(func.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}
