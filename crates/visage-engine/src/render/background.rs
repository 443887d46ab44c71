use crate::assets::AssetLoader;
use crate::error::RenderResult;
use crate::gfx::{
    DrawCall, GraphicsContext, Primitive, ProgramHandle, ProgramLayout, TextureDesc,
    TextureFilter, TextureFormat, TextureHandle, VertexStream,
};
use crate::session::Frame;
use crate::shader::{self, ProgramSources, check_gl_error};

use super::uv::{QUAD_COORDS, center_crop_offsets, center_crop_tex_coords};

const CAMERA_VERTEX_SHADER_NAME: &str = "shaders/screenquad.vert";
const CAMERA_FRAGMENT_SHADER_NAME: &str = "shaders/screenquad.frag";
const DEPTH_VISUALIZER_VERTEX_SHADER_NAME: &str = "shaders/background_show_depth_color_visualization.vert";
const DEPTH_VISUALIZER_FRAGMENT_SHADER_NAME: &str =
    "shaders/background_show_depth_color_visualization.frag";

fn quad_layout(label: &str) -> ProgramLayout {
    ProgramLayout {
        label: label.to_string(),
        attributes: vec![2, 2],
        uniform_size: 0,
        texture_units: 1,
    }
}

/// Draws the camera image (or a depth visualization) behind everything else.
///
/// Must be drawn first each frame: it writes neither depth nor tests against it.
#[derive(Debug)]
pub struct BackgroundRenderer {
    camera_program: Option<ProgramHandle>,
    depth_program: Option<ProgramHandle>,
    camera_texture: Option<TextureHandle>,
    depth_texture: Option<TextureHandle>,
    quad_tex_coords: [f32; 8],
    suppress_timestamp_zero: bool,
}

impl Default for BackgroundRenderer {
    fn default() -> Self {
        Self {
            camera_program: None,
            depth_program: None,
            camera_texture: None,
            depth_texture: None,
            quad_tex_coords: [0.0; 8],
            suppress_timestamp_zero: true,
        }
    }
}

impl BackgroundRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn camera_texture(&self) -> Option<TextureHandle> {
        self.camera_texture
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.camera_program.is_some()
    }

    /// Current texture coordinates of the four quad corners.
    #[inline]
    pub fn quad_tex_coords(&self) -> &[f32; 8] {
        &self.quad_tex_coords
    }

    /// Allocates the camera texture and compiles both programs.
    ///
    /// `depth_texture` is sampled by the depth visualization; it is not owned.
    pub fn create_resources(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        assets: &dyn AssetLoader,
        depth_texture: Option<TextureHandle>,
    ) -> RenderResult<()> {
        self.release(ctx);

        let result = self.create_inner(ctx, assets);
        if result.is_err() {
            self.release(ctx);
        } else {
            self.depth_texture = depth_texture;
        }
        result
    }

    fn create_inner(&mut self, ctx: &mut dyn GraphicsContext, assets: &dyn AssetLoader) -> RenderResult<()> {
        self.camera_texture = Some(ctx.create_texture(&TextureDesc {
            label: "camera image".into(),
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8,
            filter: TextureFilter::Linear,
        }));

        self.camera_program = Some(shader::load_program(
            ctx,
            assets,
            &ProgramSources::new(CAMERA_VERTEX_SHADER_NAME, CAMERA_FRAGMENT_SHADER_NAME),
            &quad_layout("background camera"),
        )?);
        check_gl_error(ctx, "Program creation")?;

        self.depth_program = Some(shader::load_program(
            ctx,
            assets,
            &ProgramSources::new(DEPTH_VISUALIZER_VERTEX_SHADER_NAME, DEPTH_VISUALIZER_FRAGMENT_SHADER_NAME),
            &quad_layout("background depth"),
        )?);
        check_gl_error(ctx, "Program creation")
    }

    pub fn suppress_timestamp_zero_rendering(&mut self, suppress: bool) {
        self.suppress_timestamp_zero = suppress;
    }

    /// Recomputes the quad's texture coordinates when the display geometry changed.
    pub fn update_geometry(&mut self, display_changed: bool, transform: impl FnOnce(&[f32; 8]) -> [f32; 8]) {
        if display_changed {
            self.quad_tex_coords = transform(&QUAD_COORDS);
        }
    }

    /// Draws the background for `frame`.
    ///
    /// Nothing is drawn while the camera has not produced its first frame
    /// (timestamp 0), unless suppression is turned off.
    pub fn draw(&mut self, ctx: &mut dyn GraphicsContext, frame: &Frame, show_depth: bool) -> RenderResult<()> {
        self.update_geometry(frame.display_geometry_changed, |quad| {
            frame.transform_coordinates_2d(quad)
        });

        if let (Some(texture), Some(image)) = (self.camera_texture, &frame.camera_image) {
            ctx.upload_texture(texture, image);
        }

        if frame.timestamp_ns == 0 && self.suppress_timestamp_zero {
            return Ok(());
        }

        self.draw_quad(ctx, show_depth)
    }

    /// Draws the camera image center-cropped to `screen_aspect`.
    ///
    /// `rotation` is the camera-to-display rotation in degrees; anything other
    /// than 0, 90, 180 or 270 is rejected.
    pub fn draw_center_crop(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        image_width: u32,
        image_height: u32,
        screen_aspect: f32,
        rotation: i32,
    ) -> RenderResult<()> {
        let (u, v) = center_crop_offsets(image_width, image_height, screen_aspect);
        self.quad_tex_coords = center_crop_tex_coords(u, v, rotation)?;
        self.draw_quad(ctx, false)
    }

    fn draw_quad(&self, ctx: &mut dyn GraphicsContext, show_depth: bool) -> RenderResult<()> {
        let (program, texture, label) = if show_depth {
            (self.depth_program, self.depth_texture, "background depth")
        } else {
            (self.camera_program, self.camera_texture, "background camera")
        };
        let Some(program) = program else {
            return Ok(());
        };

        // The quad has arbitrary depth.
        ctx.set_depth_test(false);
        ctx.set_depth_write(false);

        ctx.bind_texture(0, texture);
        ctx.use_program(Some(program));
        ctx.draw(&DrawCall {
            label,
            primitive: Primitive::TriangleStrip,
            vertices: &[
                VertexStream::Client {
                    data: &QUAD_COORDS,
                    components: 2,
                },
                VertexStream::Client {
                    data: &self.quad_tex_coords,
                    components: 2,
                },
            ],
            indices: None,
            vertex_count: 4,
        });

        ctx.set_depth_write(true);
        ctx.set_depth_test(true);
        ctx.bind_texture(0, None);

        check_gl_error(ctx, "BackgroundRendererDraw")
    }

    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        for program in [self.camera_program.take(), self.depth_program.take()].into_iter().flatten() {
            ctx.delete_program(program);
        }
        if let Some(texture) = self.camera_texture.take() {
            ctx.delete_texture(texture);
        }
        self.depth_texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::builtin_shaders;
    use crate::gfx::{GfxEvent, PixelBuffer, RecordingContext};
    use crate::render::uv::DisplayTransform;
    use crate::session::Frame;

    fn created() -> (RecordingContext, BackgroundRenderer) {
        let mut ctx = RecordingContext::new();
        let mut bg = BackgroundRenderer::new();
        bg.create_resources(&mut ctx, &builtin_shaders(), None).unwrap();
        ctx.clear_events();
        (ctx, bg)
    }

    fn frame(timestamp_ns: i64) -> Frame {
        Frame {
            timestamp_ns,
            display_geometry_changed: true,
            display_transform: DisplayTransform::center_crop(640, 480, 1.0, 0).unwrap(),
            ..Frame::default()
        }
    }

    #[test]
    fn draw_restores_depth_state() {
        let (mut ctx, mut bg) = created();
        bg.draw(&mut ctx, &frame(1), false).unwrap();

        let draw = ctx.draws().next().unwrap();
        assert_eq!(draw.label, "background camera");
        assert!(!draw.state.depth_test);
        assert!(!draw.state.depth_write);
        assert!(draw.streamed);
        assert_eq!(draw.vertex_count, 4);
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn timestamp_zero_is_suppressed_by_default() {
        let (mut ctx, mut bg) = created();
        bg.draw(&mut ctx, &frame(0), false).unwrap();
        assert_eq!(ctx.draws().count(), 0);
        // Geometry is still refreshed.
        assert_eq!(bg.quad_tex_coords(), &center_crop_tex_coords(0.125, 0.0, 0).unwrap());

        bg.suppress_timestamp_zero_rendering(false);
        bg.draw(&mut ctx, &frame(0), false).unwrap();
        assert_eq!(ctx.draws().count(), 1);
    }

    #[test]
    fn geometry_is_kept_until_display_changes() {
        let (mut ctx, mut bg) = created();
        bg.draw(&mut ctx, &frame(1), false).unwrap();
        let before = *bg.quad_tex_coords();

        let unchanged = Frame {
            timestamp_ns: 2,
            display_geometry_changed: false,
            display_transform: DisplayTransform::center_crop(640, 480, 1.0, 180).unwrap(),
            ..Frame::default()
        };
        bg.draw(&mut ctx, &unchanged, false).unwrap();
        assert_eq!(bg.quad_tex_coords(), &before);
    }

    #[test]
    fn camera_image_is_uploaded() {
        let (mut ctx, mut bg) = created();
        let f = Frame {
            camera_image: Some(PixelBuffer::rgba(2, 2, vec![255; 16])),
            ..frame(5)
        };
        bg.draw(&mut ctx, &f, false).unwrap();
        let texture = bg.camera_texture().unwrap();
        assert!(ctx.events().contains(&GfxEvent::UploadTexture(texture)));
        assert_eq!(ctx.texture_desc(texture).unwrap().width, 2);
    }

    #[test]
    fn depth_view_uses_depth_program_and_texture() {
        let mut ctx = RecordingContext::new();
        let depth = ctx.create_texture(&TextureDesc {
            label: "d".into(),
            width: 1,
            height: 1,
            format: TextureFormat::Rg8,
            filter: TextureFilter::Linear,
        });
        let mut bg = BackgroundRenderer::new();
        bg.create_resources(&mut ctx, &builtin_shaders(), Some(depth)).unwrap();

        bg.draw(&mut ctx, &frame(1), true).unwrap();
        let draw = ctx.draws().last().unwrap();
        assert_eq!(draw.label, "background depth");
        assert_eq!(draw.textures, vec![Some(depth)]);
    }

    #[test]
    fn center_crop_rejects_odd_rotation_without_drawing() {
        let (mut ctx, mut bg) = created();
        assert!(bg.draw_center_crop(&mut ctx, 640, 480, 0.5, 45).is_err());
        assert_eq!(ctx.draws().count(), 0);

        bg.draw_center_crop(&mut ctx, 640, 480, 0.5, 270).unwrap();
        assert_eq!(ctx.draws().count(), 1);
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn release_frees_owned_resources() {
        let (mut ctx, mut bg) = created();
        bg.release(&mut ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_textures(), 0);
        assert!(!bg.is_created());
    }

    #[test]
    fn missing_shader_leaves_renderer_absent() {
        let mut ctx = RecordingContext::new();
        let mut assets = builtin_shaders();
        assets.remove(DEPTH_VISUALIZER_FRAGMENT_SHADER_NAME);
        let mut bg = BackgroundRenderer::new();
        assert!(bg.create_resources(&mut ctx, &assets, None).is_err());
        assert!(!bg.is_created());
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_textures(), 0);
    }
}
