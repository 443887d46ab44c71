use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3, Vec4};

use crate::assets::AssetLoader;
use crate::error::{RenderError, RenderResult};
use crate::gfx::{
    BlendFunc, DrawCall, GraphicsContext, IndexSource, Primitive, ProgramHandle, ProgramLayout, TextureDesc,
    TextureFilter, TextureFormat, TextureHandle, VertexStream,
};
use crate::math::{Transform4x4, direction_in_view};
use crate::session::FaceMesh;
use crate::shader::{self, ProgramSources, check_gl_error};

use super::material::MaterialProperties;

const VERTEX_SHADER_NAME: &str = "shaders/object.vert";
const FRAGMENT_SHADER_NAME: &str = "shaders/object.frag";

const LIGHT_DIRECTION: Vec4 = Vec4::new(0.0, 1.0, 0.0, 0.0);
const TINT: [f32; 4] = [0.0; 4];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct FaceUniforms {
    pub model_view: [[f32; 4]; 4],
    pub model_view_projection: [[f32; 4]; 4],
    pub lighting: [f32; 4],
    pub material: [f32; 4],
    pub color_correction: [f32; 4],
    pub tint: [f32; 4],
}

/// What the face mesh is filled with.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FaceFill<'a> {
    /// Diffuse texture blended over the scene without depth writes.
    Texture(Option<TextureHandle>),
    /// Depth only; the color buffer is left untouched.
    Occluder,
    /// Camera image sampled at `tex_coords`, one uv pair per vertex.
    Video {
        texture: Option<TextureHandle>,
        tex_coords: &'a [f32],
    },
}

impl FaceFill<'_> {
    fn label(&self) -> &'static str {
        match self {
            FaceFill::Texture(_) => "augmented face",
            FaceFill::Occluder => "face occluder",
            FaceFill::Video { .. } => "video face",
        }
    }

    fn texture(&self) -> Option<TextureHandle> {
        match *self {
            FaceFill::Texture(t) | FaceFill::Video { texture: t, .. } => t,
            FaceFill::Occluder => None,
        }
    }
}

/// Draws the tracked face mesh with a texture painted onto it.
///
/// Geometry is streamed from the session on every draw; only the program and
/// the textures live on the GPU between frames.
#[derive(Debug, Default)]
pub struct AugmentedFaceRenderer {
    program: Option<ProgramHandle>,
    texture: Option<TextureHandle>,
    /// Every texture loaded so far by asset name, `None` for failed loads.
    textures: BTreeMap<String, Option<TextureHandle>>,
    material: MaterialProperties,
}

impl AugmentedFaceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.program.is_some()
    }

    #[inline]
    pub fn material(&self) -> MaterialProperties {
        self.material
    }

    /// Texture passed to `create_once`.
    #[inline]
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Compiles the face program and uploads the face texture. Does nothing
    /// when already created.
    pub fn create_once(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        texture_asset: &str,
    ) -> RenderResult<()> {
        if self.is_created() {
            return Ok(());
        }
        let result = self.create(ctx, assets, texture_asset);
        if result.is_err() {
            self.release(ctx);
        }
        result
    }

    fn create(&mut self, ctx: &mut dyn GraphicsContext, assets: &dyn AssetLoader, texture_asset: &str) -> RenderResult<()> {
        let texture = upload_texture(ctx, assets, texture_asset)?;
        self.texture = Some(texture);
        self.textures.insert(texture_asset.to_string(), Some(texture));

        let layout = ProgramLayout {
            label: "augmented face".into(),
            // position, uv, normal
            attributes: vec![3, 2, 3],
            uniform_size: std::mem::size_of::<FaceUniforms>() as u64,
            texture_units: 1,
        };
        let sources = ProgramSources::new(VERTEX_SHADER_NAME, FRAGMENT_SHADER_NAME);
        self.program = Some(shader::load_program(ctx, assets, &sources, &layout)?);
        check_gl_error(ctx, "Program creation")
    }

    /// Texture uploaded from asset `name`, loaded on first use.
    ///
    /// A failed load is logged once and remembered, so later calls return
    /// `None` without touching the assets again.
    pub fn texture_for(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        name: &str,
    ) -> Option<TextureHandle> {
        if let Some(texture) = self.textures.get(name) {
            return *texture;
        }
        let texture = match upload_texture(ctx, assets, name) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("face texture `{name}` unavailable: {e}");
                None
            }
        };
        self.textures.insert(name.to_string(), texture);
        texture
    }

    pub fn set_material(&mut self, ambient: f32, diffuse: f32, specular: f32, specular_power: f32) {
        self.material = MaterialProperties::new(ambient, diffuse, specular, specular_power);
    }

    /// Draws `mesh` placed by `model` with the face texture.
    ///
    /// Depth writes are off and blending is premultiplied alpha for the
    /// duration of the draw; both are restored before returning.
    pub fn draw(
        &self,
        ctx: &mut dyn GraphicsContext,
        projection: &Transform4x4,
        view: &Transform4x4,
        model: &Transform4x4,
        color_correction: [f32; 4],
        mesh: &FaceMesh,
    ) -> RenderResult<()> {
        self.draw_with(
            ctx,
            projection,
            view,
            model,
            color_correction,
            mesh,
            FaceFill::Texture(self.texture),
        )
    }

    /// Draws `mesh` placed by `model` with `fill`. Blend and depth-write
    /// state are restored before returning.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_with(
        &self,
        ctx: &mut dyn GraphicsContext,
        projection: &Transform4x4,
        view: &Transform4x4,
        model: &Transform4x4,
        color_correction: [f32; 4],
        mesh: &FaceMesh,
        fill: FaceFill<'_>,
    ) -> RenderResult<()> {
        let Some(program) = self.program else {
            return Ok(());
        };
        if !mesh.is_consistent() {
            return Err(RenderError::MeshFormat {
                name: "augmented face".into(),
                reason: format!(
                    "{} vertices, {} normals, {} uvs, {} indices",
                    mesh.vertices.len(),
                    mesh.normals.len(),
                    mesh.tex_coords.len(),
                    mesh.indices.len()
                ),
            });
        }
        let tex_coords = match fill {
            FaceFill::Video { tex_coords, .. } => tex_coords,
            _ => mesh.tex_coords.as_slice(),
        };
        if tex_coords.len() != mesh.tex_coords.len() {
            return Err(RenderError::MeshFormat {
                name: fill.label().into(),
                reason: format!("{} uvs for {} vertices", tex_coords.len() / 2, mesh.vertex_count()),
            });
        }
        if mesh.indices.is_empty() {
            return Ok(());
        }

        let model_view = *view * *model;
        let model_view_projection = *projection * model_view;
        let light = direction_in_view(&model_view, LIGHT_DIRECTION);

        let uniforms = FaceUniforms {
            model_view: model_view.to_cols_array_2d(),
            model_view_projection: model_view_projection.to_cols_array_2d(),
            lighting: light.extend(1.0).to_array(),
            material: self.material.to_array(),
            color_correction,
            tint: TINT,
        };

        ctx.use_program(Some(program));
        ctx.set_uniforms(bytemuck::bytes_of(&uniforms));
        ctx.bind_texture(0, fill.texture());

        match fill {
            FaceFill::Texture(_) => {
                ctx.set_depth_write(false);
                ctx.set_blend(Some(BlendFunc::PREMULTIPLIED_ALPHA));
            }
            FaceFill::Occluder => {
                ctx.set_depth_write(true);
                ctx.set_blend(Some(BlendFunc::DEPTH_ONLY));
            }
            FaceFill::Video { .. } => ctx.set_depth_write(true),
        }
        ctx.draw(&DrawCall {
            label: fill.label(),
            primitive: Primitive::Triangles,
            vertices: &[
                VertexStream::Client {
                    data: &mesh.vertices,
                    components: 3,
                },
                VertexStream::Client {
                    data: tex_coords,
                    components: 2,
                },
                VertexStream::Client {
                    data: &mesh.normals,
                    components: 3,
                },
            ],
            indices: Some(IndexSource::Client(&mesh.indices)),
            vertex_count: 0,
        });
        ctx.set_blend(None);
        ctx.set_depth_write(true);

        ctx.bind_texture(0, None);
        ctx.use_program(None);
        check_gl_error(ctx, "AugmentedFaceRendererDraw")
    }

    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(p) = self.program.take() {
            ctx.delete_program(p);
        }
        self.texture = None;
        for t in std::mem::take(&mut self.textures).into_values().flatten() {
            ctx.delete_texture(t);
        }
    }
}

fn upload_texture(ctx: &mut dyn GraphicsContext, assets: &dyn AssetLoader, name: &str) -> RenderResult<TextureHandle> {
    let image = assets.load_image(name)?;
    let texture = ctx.create_texture(&TextureDesc {
        label: name.to_string(),
        width: image.width,
        height: image.height,
        format: TextureFormat::Rgba8,
        filter: TextureFilter::Linear,
    });
    ctx.upload_texture(texture, &image);
    if let Err(e) = check_gl_error(ctx, "Texture loading") {
        ctx.delete_texture(texture);
        return Err(e);
    }
    Ok(texture)
}

/// Camera-image uv of every vertex of `mesh`: the vertex projected to NDC,
/// then mapped through `display_transform`.
pub fn screen_tex_coords(mesh: &FaceMesh, model_view_projection: &Transform4x4, display_transform: &Mat3) -> Vec<f32> {
    mesh.vertices
        .chunks_exact(3)
        .flat_map(|v| {
            let clip = *model_view_projection * Vec3::from_slice(v).extend(1.0);
            let w = if clip.w.abs() > f32::EPSILON { clip.w } else { 1.0 };
            let uv = display_transform.transform_point2(clip.truncate().truncate() / w);
            [uv.x, uv.y]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryAssets, builtin_shaders};
    use crate::gfx::RecordingContext;
    use crate::test_support::png_1x1;
    use glam::{Mat4, Vec3};

    fn assets() -> MemoryAssets {
        builtin_shaders().with("models/freckles.png", png_1x1())
    }

    fn triangle() -> FaceMesh {
        FaceMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            tex_coords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        }
    }

    fn created(ctx: &mut RecordingContext) -> AugmentedFaceRenderer {
        let mut r = AugmentedFaceRenderer::new();
        r.create_once(ctx, &assets(), "models/freckles.png").unwrap();
        r
    }

    #[test]
    fn uniform_block_size() {
        assert_eq!(std::mem::size_of::<FaceUniforms>(), 192);
    }

    #[test]
    fn draw_streams_mesh_with_forced_blend() {
        let mut ctx = RecordingContext::new();
        let r = created(&mut ctx);
        r.draw(&mut ctx, &Mat4::IDENTITY, &Mat4::IDENTITY, &Mat4::IDENTITY, [1.0; 4], &triangle())
            .unwrap();

        let draw = ctx.draws().next().unwrap();
        assert!(draw.streamed);
        assert!(!draw.state.depth_write);
        assert_eq!(draw.state.blend, Some(BlendFunc::PREMULTIPLIED_ALPHA));
        assert_eq!(draw.index_count, Some(3));
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn light_points_up_in_view_space_and_tint_is_zero() {
        let mut ctx = RecordingContext::new();
        let r = created(&mut ctx);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0));
        r.draw(&mut ctx, &Mat4::IDENTITY, &view, &Mat4::IDENTITY, [1.0; 4], &triangle())
            .unwrap();

        let u: FaceUniforms = *bytemuck::from_bytes(&ctx.draws().next().unwrap().uniforms);
        assert_eq!(u.lighting, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(u.tint, [0.0; 4]);
    }

    #[test]
    fn inconsistent_mesh_is_rejected_without_drawing() {
        let mut ctx = RecordingContext::new();
        let r = created(&mut ctx);
        let mut mesh = triangle();
        mesh.normals.pop();
        let err = r
            .draw(&mut ctx, &Mat4::IDENTITY, &Mat4::IDENTITY, &Mat4::IDENTITY, [1.0; 4], &mesh)
            .unwrap_err();
        assert_eq!(err.kind(), "mesh-format");
        assert_eq!(ctx.draws().count(), 0);
    }

    #[test]
    fn create_once_is_idempotent_and_release_frees() {
        let mut ctx = RecordingContext::new();
        let mut r = created(&mut ctx);
        r.create_once(&mut ctx, &assets(), "models/freckles.png").unwrap();
        assert_eq!(ctx.live_programs(), 1);
        assert_eq!(ctx.live_textures(), 1);
        r.release(&mut ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_textures(), 0);
    }

    #[test]
    fn occluder_writes_depth_and_keeps_color() {
        let mut ctx = RecordingContext::new();
        let r = created(&mut ctx);
        r.draw_with(
            &mut ctx,
            &Mat4::IDENTITY,
            &Mat4::IDENTITY,
            &Mat4::IDENTITY,
            [1.0; 4],
            &triangle(),
            FaceFill::Occluder,
        )
        .unwrap();

        let draw = ctx.draws().next().unwrap();
        assert_eq!(draw.label, "face occluder");
        assert!(draw.state.depth_write);
        assert_eq!(draw.state.blend, Some(BlendFunc::DEPTH_ONLY));
        assert_eq!(draw.textures[0], None);
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn video_fill_needs_one_uv_per_vertex() {
        let mut ctx = RecordingContext::new();
        let r = created(&mut ctx);
        let mesh = triangle();
        let fill = FaceFill::Video {
            texture: r.texture(),
            tex_coords: &[0.0, 0.0],
        };
        let err = r
            .draw_with(&mut ctx, &Mat4::IDENTITY, &Mat4::IDENTITY, &Mat4::IDENTITY, [1.0; 4], &mesh, fill)
            .unwrap_err();
        assert_eq!(err.kind(), "mesh-format");

        let uvs = screen_tex_coords(&mesh, &Mat4::IDENTITY, &Mat3::IDENTITY);
        let fill = FaceFill::Video {
            texture: r.texture(),
            tex_coords: &uvs,
        };
        r.draw_with(&mut ctx, &Mat4::IDENTITY, &Mat4::IDENTITY, &Mat4::IDENTITY, [1.0; 4], &mesh, fill)
            .unwrap();
        let draw = ctx.draws().next().unwrap();
        assert_eq!(draw.label, "video face");
        assert_eq!(draw.state.blend, None);
    }

    #[test]
    fn screen_tex_coords_follow_projection_and_display_transform() {
        let mesh = triangle();
        assert_eq!(
            screen_tex_coords(&mesh, &Mat4::IDENTITY, &Mat3::IDENTITY),
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]
        );

        // NDC -1..1 onto uv 0..1
        let to_uv = Mat3::from_cols_array(&[0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.5, 0.5, 1.0]);
        let shrink = Mat4::from_scale(Vec3::new(0.5, 0.5, 1.0));
        assert_eq!(
            screen_tex_coords(&mesh, &shrink, &to_uv),
            vec![0.5, 0.5, 0.75, 0.5, 0.5, 0.75]
        );
    }

    #[test]
    fn textures_load_lazily_once_and_are_released() {
        let mut ctx = RecordingContext::new();
        let mut r = created(&mut ctx);
        let a = assets().with("models/other.png", png_1x1());

        assert_eq!(r.texture_for(&mut ctx, &a, "models/freckles.png"), r.texture());
        let other = r.texture_for(&mut ctx, &a, "models/other.png");
        assert!(other.is_some());
        assert_eq!(r.texture_for(&mut ctx, &a, "models/other.png"), other);
        assert_eq!(r.texture_for(&mut ctx, &a, "models/missing.png"), None);
        assert_eq!(ctx.live_textures(), 2);

        r.release(&mut ctx);
        assert_eq!(ctx.live_textures(), 0);
    }

    #[test]
    fn missing_texture_leaves_renderer_absent() {
        let mut ctx = RecordingContext::new();
        let mut r = AugmentedFaceRenderer::new();
        assert!(r.create_once(&mut ctx, &builtin_shaders(), "models/freckles.png").is_err());
        assert!(!r.is_created());
        assert_eq!(ctx.live_textures(), 0);
    }
}
