use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec4};

use crate::assets::AssetLoader;
use crate::error::RenderResult;
use crate::gfx::{
    BufferHandle, BufferUsage, DrawCall, GraphicsContext, IndexSource, Primitive, ProgramHandle,
    ProgramLayout, TextureDesc, TextureFilter, TextureFormat, TextureHandle, VertexStream,
};
use crate::math::{Transform4x4, direction_in_view, mat3_std140, model_matrix};
use crate::shader::{self, Defines, ProgramSources, check_gl_error};

use super::blend::BlendMode;
use super::material::MaterialProperties;
use super::mesh::{ObjMesh, PackedLayout, parse_obj};

const VERTEX_SHADER_NAME: &str = "shaders/ar_object.vert";
const FRAGMENT_SHADER_NAME: &str = "shaders/ar_object.frag";
const USE_DEPTH_FOR_OCCLUSION_SHADER_FLAG: &str = "USE_DEPTH_FOR_OCCLUSION";

/// Object color that keeps the texture as is.
pub const DEFAULT_COLOR: [f32; 4] = [0.0; 4];

/// World-space light direction. `w` must stay 0 so translation is ignored.
pub const LIGHT_DIRECTION: Vec4 = Vec4::new(0.250, 0.866, 0.433, 0.0);

/// Uniform block of `ar_object.{vert,frag}` (std140).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct ObjectUniforms {
    pub model_view: [[f32; 4]; 4],
    pub model_view_projection: [[f32; 4]; 4],
    pub lighting: [f32; 4],
    pub material: [f32; 4],
    pub color_correction: [f32; 4],
    pub obj_color: [f32; 4],
    pub depth_uv_transform: [[f32; 4]; 3],
    pub depth_aspect_ratio: f32,
    pub _pad: [f32; 3],
}

/// Static textured OBJ model placed by a model matrix.
#[derive(Debug)]
pub struct ObjectRenderer {
    label: String,
    program: Option<ProgramHandle>,
    texture: Option<TextureHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    layout: PackedLayout,
    index_count: u32,

    model_matrix: Transform4x4,
    material: MaterialProperties,
    blend_mode: BlendMode,

    use_depth_for_occlusion: bool,
    depth_texture: Option<TextureHandle>,
    depth_aspect_ratio: f32,
    uv_transform: Mat3,
}

impl ObjectRenderer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: None,
            texture: None,
            vertex_buffer: None,
            index_buffer: None,
            layout: PackedLayout {
                positions: 0,
                tex_coords: 0,
                normals: 0,
                total: 0,
            },
            index_count: 0,
            model_matrix: Transform4x4::IDENTITY,
            material: MaterialProperties::default(),
            blend_mode: BlendMode::None,
            use_depth_for_occlusion: false,
            depth_texture: None,
            depth_aspect_ratio: 0.0,
            uv_transform: Mat3::IDENTITY,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.program.is_some() && self.index_buffer.is_some()
    }

    #[inline]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    #[inline]
    pub fn model_matrix(&self) -> &Transform4x4 {
        &self.model_matrix
    }

    #[inline]
    pub fn material(&self) -> MaterialProperties {
        self.material
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    #[inline]
    pub fn uses_depth_for_occlusion(&self) -> bool {
        self.use_depth_for_occlusion
    }

    fn program_layout(&self) -> ProgramLayout {
        ProgramLayout {
            label: self.label.clone(),
            // position, uv, normal
            attributes: vec![3, 2, 3],
            uniform_size: std::mem::size_of::<ObjectUniforms>() as u64,
            texture_units: 2,
        }
    }

    fn compile_program(&self, ctx: &mut dyn GraphicsContext, assets: &dyn AssetLoader) -> RenderResult<ProgramHandle> {
        let mut fragment_defines = Defines::new();
        fragment_defines.insert(
            USE_DEPTH_FOR_OCCLUSION_SHADER_FLAG.to_string(),
            i32::from(self.use_depth_for_occlusion),
        );
        let sources = ProgramSources {
            fragment_defines,
            ..ProgramSources::new(VERTEX_SHADER_NAME, FRAGMENT_SHADER_NAME)
        };
        let program = shader::load_program(ctx, assets, &sources, &self.program_layout())?;
        if let Err(e) = check_gl_error(ctx, "Program creation") {
            ctx.delete_program(program);
            return Err(e);
        }
        Ok(program)
    }

    /// Compiles the program and uploads the mesh and its diffuse texture.
    ///
    /// Does nothing when already loaded. On failure every partially created
    /// resource is released.
    pub fn load_once(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        mesh_asset: &str,
        texture_asset: &str,
    ) -> RenderResult<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let result = self.load(ctx, assets, mesh_asset, texture_asset);
        if result.is_err() {
            self.release(ctx);
        }
        result
    }

    fn load(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        mesh_asset: &str,
        texture_asset: &str,
    ) -> RenderResult<()> {
        self.program = Some(self.compile_program(ctx, assets)?);

        let image = assets.load_image(texture_asset)?;
        let texture = ctx.create_texture(&TextureDesc {
            label: texture_asset.to_string(),
            width: image.width,
            height: image.height,
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Linear,
        });
        self.texture = Some(texture);
        ctx.upload_texture(texture, &image);
        check_gl_error(ctx, "Texture loading")?;

        let mesh = parse_obj(mesh_asset, &assets.read_binary(mesh_asset)?)?;
        self.upload_mesh(ctx, mesh_asset, &mesh)?;
        log::debug!("loaded object `{}` from {mesh_asset}", self.label);
        Ok(())
    }

    /// Like `load_once`, for an in-memory mesh without a texture. Unbound
    /// texture units sample white, so `obj_color` alone sets the color.
    pub fn load_mesh_once(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        mesh: &ObjMesh,
    ) -> RenderResult<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let result = self.compile_program(ctx, assets).and_then(|program| {
            self.program = Some(program);
            let name = self.label.clone();
            self.upload_mesh(ctx, &name, mesh)
        });
        if result.is_err() {
            self.release(ctx);
        }
        result
    }

    fn upload_mesh(&mut self, ctx: &mut dyn GraphicsContext, name: &str, mesh: &ObjMesh) -> RenderResult<()> {
        let (vertex_bytes, layout) = mesh.pack_vertices();
        self.vertex_buffer = Some(ctx.create_buffer(BufferUsage::Vertex, name, &vertex_bytes));
        self.index_buffer = Some(ctx.create_buffer(BufferUsage::Index, name, mesh.index_bytes()));
        self.layout = layout;
        self.index_count = mesh.indices.len() as u32;
        check_gl_error(ctx, "OBJ buffer load")?;

        self.model_matrix = Transform4x4::IDENTITY;
        Ok(())
    }

    pub fn set_material(&mut self, ambient: f32, diffuse: f32, specular: f32, specular_power: f32) {
        self.material = MaterialProperties::new(ambient, diffuse, specular, specular_power);
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    /// `model = pose * scale(scale_factor)`.
    pub fn update_model_matrix(&mut self, pose: &Transform4x4, scale_factor: f32) {
        self.model_matrix = model_matrix(pose, scale_factor);
    }

    /// Switches depth-based occlusion, rebuilding the program when loaded.
    ///
    /// Setting the current value does nothing. If the rebuild fails the
    /// previous program and mode stay active.
    pub fn set_use_depth_for_occlusion(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        enabled: bool,
    ) -> RenderResult<()> {
        if self.use_depth_for_occlusion == enabled {
            return Ok(());
        }
        self.use_depth_for_occlusion = enabled;

        let Some(old) = self.program else {
            return Ok(());
        };
        match self.compile_program(ctx, assets) {
            Ok(program) => {
                ctx.delete_program(old);
                self.program = Some(program);
                log::debug!("object `{}`: depth occlusion {}", self.label, enabled);
                Ok(())
            }
            Err(e) => {
                self.use_depth_for_occlusion = !enabled;
                Err(e)
            }
        }
    }

    /// Depth image used for occlusion; the aspect ratio is `width / height`.
    pub fn set_depth_texture(&mut self, texture: Option<TextureHandle>, width: u32, height: u32) {
        self.depth_texture = texture;
        self.depth_aspect_ratio = if height == 0 { 0.0 } else { width as f32 / height as f32 };
    }

    /// Maps screen UVs to depth-image UVs.
    pub fn set_uv_transform(&mut self, transform: Mat3) {
        self.uv_transform = transform;
    }

    /// Draws the model. Skipped silently when not loaded.
    pub fn draw(
        &self,
        ctx: &mut dyn GraphicsContext,
        view: &Transform4x4,
        projection: &Transform4x4,
        color_correction: [f32; 4],
        obj_color: [f32; 4],
    ) -> RenderResult<()> {
        check_gl_error(ctx, "Before draw")?;

        let (Some(program), Some(vbo), Some(ibo)) = (self.program, self.vertex_buffer, self.index_buffer) else {
            return Ok(());
        };

        let model_view = *view * self.model_matrix;
        let model_view_projection = *projection * model_view;
        let light = direction_in_view(&model_view, LIGHT_DIRECTION);

        let uniforms = ObjectUniforms {
            model_view: model_view.to_cols_array_2d(),
            model_view_projection: model_view_projection.to_cols_array_2d(),
            lighting: light.extend(1.0).to_array(),
            material: self.material.to_array(),
            color_correction,
            obj_color,
            depth_uv_transform: mat3_std140(&self.uv_transform),
            depth_aspect_ratio: self.depth_aspect_ratio,
            _pad: [0.0; 3],
        };

        ctx.use_program(Some(program));
        ctx.set_uniforms(bytemuck::bytes_of(&uniforms));
        ctx.bind_texture(0, self.texture);
        ctx.bind_texture(1, self.depth_texture.filter(|_| self.use_depth_for_occlusion));

        self.blend_mode.apply(ctx);
        ctx.draw(&DrawCall {
            label: &self.label,
            primitive: Primitive::Triangles,
            vertices: &[
                VertexStream::Buffer {
                    buffer: vbo,
                    offset: self.layout.positions,
                    components: 3,
                },
                VertexStream::Buffer {
                    buffer: vbo,
                    offset: self.layout.tex_coords,
                    components: 2,
                },
                VertexStream::Buffer {
                    buffer: vbo,
                    offset: self.layout.normals,
                    components: 3,
                },
            ],
            indices: Some(IndexSource::Buffer {
                buffer: ibo,
                count: self.index_count,
            }),
            vertex_count: 0,
        });
        BlendMode::restore(ctx);

        ctx.bind_texture(0, None);
        ctx.bind_texture(1, None);
        ctx.use_program(None);

        check_gl_error(ctx, "After draw")
    }

    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(p) = self.program.take() {
            ctx.delete_program(p);
        }
        if let Some(t) = self.texture.take() {
            ctx.delete_texture(t);
        }
        for b in [self.vertex_buffer.take(), self.index_buffer.take()].into_iter().flatten() {
            ctx.delete_buffer(b);
        }
        self.index_count = 0;
    }
}
