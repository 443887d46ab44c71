//! Per-frame orchestration: the three host callbacks and the fixed draw order.

use std::collections::HashSet;

use glam::{Mat3, Mat4, Vec3};

use crate::assets::AssetLoader;
use crate::content::{AnchorUpdate, ContentCoordinator, NodeKind, VirtualContentType};
use crate::error::{RenderError, RenderResult};
use crate::gfx::{ClearFlags, GraphicsContext, ViewportRect};
use crate::math::Transform4x4;
use crate::render::{
    AugmentedFaceRenderer, BackgroundRenderer, BlendMode, DEFAULT_COLOR, DepthTexture, FaceFill, MaterialProperties,
    ObjMesh, ObjectRenderer, screen_tex_coords,
};
use crate::session::{
    ArSession, DisplayRotation, DisplayRotationHelper, Frame, RegionType, TrackingState, TrackingStateHelper,
    tracking_failure_reason_string,
};

/// Material shared by the face mesh and the bundled overlays.
pub const FACE_MATERIAL: MaterialProperties = MaterialProperties::new(0.0, 1.0, 0.1, 6.0);

/// One anchored overlay model.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectConfig {
    pub label: String,
    pub mesh: String,
    pub texture: String,
    pub material: MaterialProperties,
    pub blend_mode: BlendMode,
}

impl ObjectConfig {
    pub fn new(label: impl Into<String>, mesh: impl Into<String>, texture: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            mesh: mesh.into(),
            texture: texture.into(),
            material: FACE_MATERIAL,
            blend_mode: BlendMode::AlphaBlending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub clear_color: [f32; 4],
    pub near: f32,
    pub far: f32,

    pub face_texture: String,
    pub face_material: MaterialProperties,
    pub forehead_right: ObjectConfig,
    pub forehead_left: ObjectConfig,
    pub nose: ObjectConfig,
    /// Uniform scale applied to every region overlay.
    pub region_scale: f32,

    pub show_depth_map: bool,
    pub use_depth_for_occlusion: bool,
    pub suppress_timestamp_zero: bool,
    pub content: VirtualContentType,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.1, 0.1, 0.1, 1.0],
            near: 0.1,
            far: 100.0,
            face_texture: "models/freckles.png".into(),
            face_material: FACE_MATERIAL,
            forehead_right: ObjectConfig::new("forehead right", "models/forehead_right.obj", "models/ear_fur.png"),
            forehead_left: ObjectConfig::new("forehead left", "models/forehead_left.obj", "models/ear_fur.png"),
            nose: ObjectConfig::new("nose", "models/nose.obj", "models/nose_fur.png"),
            region_scale: 1.0,
            show_depth_map: false,
            use_depth_for_occlusion: false,
            suppress_timestamp_zero: true,
            content: VirtualContentType::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OrchestratorState {
    Uninitialized,
    SurfaceCreated,
    Tracking,
}

/// Logs swallowed errors: the first occurrence of each kind at `warn`,
/// repeats at `debug`.
#[derive(Debug, Default)]
struct ErrorLog {
    seen: HashSet<&'static str>,
}

impl ErrorLog {
    fn report(&mut self, context: &str, err: &RenderError) {
        if self.seen.insert(err.kind()) {
            log::warn!("{context}: {err}");
        } else {
            log::debug!("{context}: {err}");
        }
    }
}

/// Maps screen UV `0..1` onto NDC `-1..1`.
const UV_TO_NDC: Mat3 = Mat3::from_cols_array(&[2.0, 0.0, 0.0, 0.0, 2.0, 0.0, -1.0, -1.0, 1.0]);

/// Label of the primitive used for spheres and axis arms.
const SPHERE_LABEL: &str = "sphere";

const AXIS_COLORS: [(Vec3, [f32; 4]); 3] = [
    (Vec3::X, [1.0, 0.0, 0.0, 1.0]),
    (Vec3::Y, [0.0, 1.0, 0.0, 1.0]),
    (Vec3::Z, [0.0, 0.0, 1.0, 1.0]),
];

/// Stretched sphere covering `0..length` along `axis`.
fn axis_arm(axis: Vec3, length: f32) -> Mat4 {
    let half = length * 0.5;
    let thickness = length * 0.04;
    Mat4::from_translation(axis * half) * Mat4::from_scale(Vec3::splat(thickness) + axis * (half - thickness))
}

/// `obj_color` recoloring the white primitive with `color`.
fn primitive_color(color: [f32; 4]) -> [f32; 4] {
    [color[0] * 255.0, color[1] * 255.0, color[2] * 255.0, 255.0]
}

/// Drives the renderers from the host's surface callbacks.
///
/// ```text
/// Uninitialized -> SurfaceCreated -> Tracking (loops)
///                        ^                |
///                        +-- surface recreated
/// ```
pub struct FrameOrchestrator {
    config: SceneConfig,
    assets: Box<dyn AssetLoader>,
    state: OrchestratorState,

    session: Option<Box<dyn ArSession>>,
    display: DisplayRotationHelper,
    tracking: TrackingStateHelper,
    keep_screen_on: Option<Box<dyn FnMut(bool)>>,

    background: Option<BackgroundRenderer>,
    face: Option<AugmentedFaceRenderer>,
    forehead_right: Option<ObjectRenderer>,
    forehead_left: Option<ObjectRenderer>,
    nose: Option<ObjectRenderer>,
    sphere: Option<ObjectRenderer>,
    depth: DepthTexture,

    content: ContentCoordinator,
    errors: ErrorLog,
}

impl FrameOrchestrator {
    pub fn new(config: SceneConfig, assets: Box<dyn AssetLoader>) -> Self {
        let content = ContentCoordinator::new(config.content).with_face_texture(config.face_texture.clone());
        Self {
            config,
            assets,
            state: OrchestratorState::Uninitialized,
            session: None,
            display: DisplayRotationHelper::default(),
            tracking: TrackingStateHelper::new(),
            keep_screen_on: None,
            background: None,
            face: None,
            forehead_right: None,
            forehead_left: None,
            nose: None,
            sphere: None,
            depth: DepthTexture::new(),
            content,
            errors: ErrorLog::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    #[inline]
    pub fn content(&self) -> &ContentCoordinator {
        &self.content
    }

    pub fn select_content(&mut self, content: VirtualContentType) {
        self.config.content = content;
        self.content.select(content);
    }

    /// Called with `true` when the screen should stay on, `false` when it may
    /// sleep. Only changes are reported.
    pub fn on_keep_screen_on(&mut self, callback: impl FnMut(bool) + 'static) {
        self.keep_screen_on = Some(Box::new(callback));
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn attach_session(&mut self, session: Box<dyn ArSession>) {
        self.session = Some(session);
        self.content.clear();
        // Resend the current geometry to the new session.
        self.display.on_display_changed(self.display.rotation());
    }

    pub fn detach_session(&mut self) -> Option<Box<dyn ArSession>> {
        self.content.clear();
        self.session.take()
    }

    /// Creates every renderer for a new surface.
    ///
    /// Failures are logged and the affected renderer stays absent; it is then
    /// skipped on every frame. A previous generation is released first.
    pub fn on_surface_created(&mut self, ctx: &mut dyn GraphicsContext) {
        if self.state != OrchestratorState::Uninitialized {
            log::debug!("surface recreated; releasing previous renderers");
            self.release(ctx);
        }

        ctx.set_clear_color(self.config.clear_color);
        let depth_texture = self.depth.create(ctx);
        let assets = self.assets.as_ref();

        let mut background = BackgroundRenderer::new();
        background.suppress_timestamp_zero_rendering(self.config.suppress_timestamp_zero);
        self.background = match background.create_resources(ctx, assets, Some(depth_texture)) {
            Ok(()) => Some(background),
            Err(e) => {
                log::warn!("background renderer disabled: {e}");
                None
            }
        };

        let mut face = AugmentedFaceRenderer::new();
        self.face = match face.create_once(ctx, assets, &self.config.face_texture) {
            Ok(()) => {
                let m = self.config.face_material;
                face.set_material(m.ambient, m.diffuse, m.specular, m.specular_power);
                Some(face)
            }
            Err(e) => {
                log::warn!("face renderer disabled: {e}");
                None
            }
        };

        let occlusion = self.config.use_depth_for_occlusion;
        self.forehead_right = load_object(ctx, assets, &self.config.forehead_right, occlusion);
        self.forehead_left = load_object(ctx, assets, &self.config.forehead_left, occlusion);
        self.nose = load_object(ctx, assets, &self.config.nose, occlusion);

        let mut sphere = ObjectRenderer::new(SPHERE_LABEL);
        self.sphere = match sphere.load_mesh_once(ctx, assets, &ObjMesh::uv_sphere(12, 16)) {
            Ok(()) => {
                let m = FACE_MATERIAL;
                sphere.set_material(m.ambient, m.diffuse, m.specular, m.specular_power);
                Some(sphere)
            }
            Err(e) => {
                log::warn!("sphere primitive disabled: {e}");
                None
            }
        };

        self.state = OrchestratorState::SurfaceCreated;
        log::info!(
            "surface created: background={} face={} objects={}",
            self.background.is_some(),
            self.face.is_some(),
            [&self.forehead_right, &self.forehead_left, &self.nose, &self.sphere]
                .iter()
                .filter(|o| o.is_some())
                .count()
        );
    }

    pub fn on_surface_changed(&mut self, ctx: &mut dyn GraphicsContext, width: u32, height: u32) {
        self.display.on_surface_changed(width, height);
        ctx.set_viewport(ViewportRect::full(width, height));
    }

    pub fn on_display_changed(&mut self, rotation: DisplayRotation) {
        self.display.on_display_changed(rotation);
    }

    /// Renders one frame. Never fails: errors are logged and the frame is
    /// dropped, and depth writes are re-enabled before returning.
    pub fn on_draw_frame(&mut self, ctx: &mut dyn GraphicsContext) {
        ctx.clear(ClearFlags::COLOR_AND_DEPTH);

        let Some(mut session) = self.session.take() else {
            return;
        };
        self.display.update_session_if_needed(session.as_mut());

        let result = self.draw_tracked(ctx, session.as_mut());
        ctx.set_depth_write(true);
        self.session = Some(session);

        if let Err(e) = result {
            self.errors.report("frame dropped", &e);
        }
    }

    fn draw_tracked(&mut self, ctx: &mut dyn GraphicsContext, session: &mut dyn ArSession) -> RenderResult<()> {
        let frame = session.update()?;
        if self.state == OrchestratorState::SurfaceCreated {
            self.state = OrchestratorState::Tracking;
        }

        let camera = &frame.camera;
        let projection = camera.projection_matrix(self.config.near, self.config.far);
        let view = camera.view_matrix;
        let color_correction = frame.light_estimate.color_correction;

        self.update_depth(ctx, &frame);

        if let Some(background) = &mut self.background {
            background.draw(ctx, &frame, self.config.show_depth_map)?;
        }

        if let Some(keep_on) = self.tracking.update_keep_screen_on_flag(camera.tracking_state) {
            if !keep_on {
                log::info!("tracking {:?}: {}", camera.tracking_state, tracking_failure_reason_string(camera));
            }
            if let Some(callback) = &mut self.keep_screen_on {
                callback(keep_on);
            }
        }

        self.sync_content(session, &frame);

        let scale = self.config.region_scale;
        let camera_texture = self.background.as_ref().and_then(BackgroundRenderer::camera_texture);
        let assets = self.assets.as_ref();
        for &id in &frame.faces {
            let Some(face) = session.face(id) else {
                log::debug!("frame lists unknown face {id:?}");
                continue;
            };
            if face.tracking_state != TrackingState::Tracking {
                continue;
            }
            let Some(content) = self.content.node(id) else {
                continue;
            };

            // Overlays are transparent: draw back to front without depth writes.
            ctx.set_depth_write(false);

            for (model, kind) in content.flatten(&Transform4x4::IDENTITY) {
                match kind {
                    NodeKind::Empty => {}
                    NodeKind::TexturedMesh { texture } => {
                        if let Some(renderer) = &mut self.face {
                            let texture = renderer.texture_for(ctx, assets, texture);
                            let fill = FaceFill::Texture(texture);
                            renderer.draw_with(ctx, &projection, &view, &model, color_correction, &face.mesh, fill)?;
                        }
                    }
                    NodeKind::OcclusionMesh => {
                        if let Some(renderer) = &self.face {
                            let fill = FaceFill::Occluder;
                            renderer.draw_with(ctx, &projection, &view, &model, color_correction, &face.mesh, fill)?;
                        }
                    }
                    NodeKind::VideoTexturedMesh { display_transform } => {
                        if let Some(renderer) = &self.face {
                            let uvs = screen_tex_coords(&face.mesh, &(projection * view * model), display_transform);
                            let fill = FaceFill::Video {
                                texture: camera_texture,
                                tex_coords: &uvs,
                            };
                            renderer.draw_with(ctx, &projection, &view, &model, color_correction, &face.mesh, fill)?;
                        }
                    }
                    NodeKind::RegionModel { region } => {
                        let object = match region {
                            RegionType::ForeheadRight => &mut self.forehead_right,
                            RegionType::ForeheadLeft => &mut self.forehead_left,
                            RegionType::NoseTip => &mut self.nose,
                        };
                        if let Some(object) = object {
                            object.update_model_matrix(&model, scale);
                            object.draw(ctx, &view, &projection, color_correction, DEFAULT_COLOR)?;
                        }
                    }
                    NodeKind::Sphere { color } => {
                        if let Some(sphere) = &mut self.sphere {
                            sphere.update_model_matrix(&model, 1.0);
                            sphere.draw(ctx, &view, &projection, color_correction, primitive_color(*color))?;
                        }
                    }
                    NodeKind::Axes { length } => {
                        if let Some(sphere) = &mut self.sphere {
                            for (axis, color) in AXIS_COLORS {
                                sphere.update_model_matrix(&(model * axis_arm(axis, *length)), 1.0);
                                sphere.draw(ctx, &view, &projection, color_correction, primitive_color(color))?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn update_depth(&mut self, ctx: &mut dyn GraphicsContext, frame: &Frame) {
        let Some(image) = &frame.depth_image else {
            return;
        };
        if !self.depth.update(ctx, image) {
            return;
        }
        let (width, height) = self.depth.size();
        let uv_transform = frame.display_transform.matrix() * UV_TO_NDC;
        for object in [&mut self.forehead_right, &mut self.forehead_left, &mut self.nose]
            .into_iter()
            .flatten()
        {
            object.set_depth_texture(self.depth.texture(), width, height);
            object.set_uv_transform(uv_transform);
        }
    }

    /// Mirrors the frame's tracked faces into the content coordinator.
    fn sync_content(&mut self, session: &dyn ArSession, frame: &Frame) {
        let tracked: Vec<_> = frame
            .faces
            .iter()
            .filter_map(|&id| session.face(id))
            .filter(|f| f.tracking_state == TrackingState::Tracking)
            .collect();

        let gone: Vec<_> = self
            .content
            .ids()
            .filter(|id| !tracked.iter().any(|f| f.id == *id))
            .collect();
        for id in gone {
            self.content.did_remove(id);
        }

        for face in tracked {
            let update = AnchorUpdate::from_face(face, frame.display_transform);
            if self.content.contains(face.id) {
                self.content.did_update(&update);
            } else {
                self.content.did_add(&update);
            }
        }
    }

    /// Frees every GPU resource. The orchestrator can be reused with a new
    /// surface afterwards.
    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(mut b) = self.background.take() {
            b.release(ctx);
        }
        if let Some(mut f) = self.face.take() {
            f.release(ctx);
        }
        for mut object in [
            self.forehead_right.take(),
            self.forehead_left.take(),
            self.nose.take(),
            self.sphere.take(),
        ]
        .into_iter()
            .flatten()
        {
            object.release(ctx);
        }
        self.depth.release(ctx);
        self.content.clear();
        self.state = OrchestratorState::Uninitialized;
    }
}

fn load_object(
    ctx: &mut dyn GraphicsContext,
    assets: &dyn AssetLoader,
    config: &ObjectConfig,
    use_depth_for_occlusion: bool,
) -> Option<ObjectRenderer> {
    let mut object = ObjectRenderer::new(config.label.clone());
    if let Err(e) = object.load_once(ctx, assets, &config.mesh, &config.texture) {
        log::warn!("object `{}` disabled: {e}", config.label);
        return None;
    }
    let m = config.material;
    object.set_material(m.ambient, m.diffuse, m.specular, m.specular_power);
    object.set_blend_mode(config.blend_mode);
    if let Err(e) = object.set_use_depth_for_occlusion(ctx, assets, use_depth_for_occlusion) {
        log::warn!("object `{}` drawn without occlusion: {e}", config.label);
    }
    Some(object)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::gfx::{GfxEvent, RecordingContext};
    use crate::math::Pose;
    use crate::session::{
        AugmentedFace, Camera, FaceId, FaceMesh, SimulatedSession, SimulatedSessionConfig,
    };
    use crate::test_support::scene_assets;
    use glam::Vec3;

    const OVERLAY_ORDER: [&str; 4] = ["augmented face", "forehead right", "forehead left", "nose"];

    fn simulated(faces: u32) -> SimulatedSession {
        SimulatedSession::new(SimulatedSessionConfig {
            faces,
            camera_width: 4,
            camera_height: 4,
            mesh_resolution: 2,
            fixed_step: Some(Duration::from_millis(33)),
            ..SimulatedSessionConfig::default()
        })
    }

    fn ready(ctx: &mut RecordingContext) -> FrameOrchestrator {
        let mut o = FrameOrchestrator::new(SceneConfig::default(), Box::new(scene_assets()));
        o.on_surface_created(ctx);
        o.on_surface_changed(ctx, 320, 240);
        o
    }

    type GeometryLog = Rc<RefCell<Vec<(DisplayRotation, u32, u32)>>>;

    /// Replays prepared frames against a fixed set of faces.
    struct ScriptedSession {
        faces: Vec<AugmentedFace>,
        frames: VecDeque<RenderResult<Frame>>,
        geometry: GeometryLog,
    }

    impl ScriptedSession {
        fn new(faces: Vec<AugmentedFace>) -> Self {
            Self {
                faces,
                frames: VecDeque::new(),
                geometry: GeometryLog::default(),
            }
        }

        fn tracking_frame(&self) -> Frame {
            Frame {
                timestamp_ns: 1,
                camera: Camera {
                    tracking_state: TrackingState::Tracking,
                    ..Camera::default()
                },
                faces: self.faces.iter().map(|f| f.id).collect(),
                ..Frame::default()
            }
        }
    }

    impl ArSession for ScriptedSession {
        fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
            self.geometry.borrow_mut().push((rotation, width, height));
        }

        fn update(&mut self) -> RenderResult<Frame> {
            self.frames.pop_front().unwrap_or_else(|| Ok(self.tracking_frame()))
        }

        fn face(&self, id: FaceId) -> Option<&AugmentedFace> {
            self.faces.iter().find(|f| f.id == id)
        }
    }

    fn triangle_face(id: u32) -> AugmentedFace {
        let mesh = FaceMesh {
            vertices: vec![0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.1, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            tex_coords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        };
        AugmentedFace::new(FaceId(id), Pose::from_translation(Vec3::new(0.0, 0.0, -0.5)), mesh)
    }

    // ── lifecycle ──────────────────────────────────────────────────────────

    #[test]
    fn surface_created_sets_clear_color_and_builds_renderers() {
        let mut ctx = RecordingContext::new();
        let o = ready(&mut ctx);
        assert_eq!(o.state(), OrchestratorState::SurfaceCreated);
        assert_eq!(ctx.clear_color(), [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(ctx.viewport(), ViewportRect::full(320, 240));
        // background x2, face, three objects, sphere
        assert_eq!(ctx.live_programs(), 7);
    }

    #[test]
    fn missing_assets_disable_only_their_renderer() {
        let mut ctx = RecordingContext::new();
        let mut assets = scene_assets();
        assets.remove("models/nose.obj");
        let mut o = FrameOrchestrator::new(SceneConfig::default(), Box::new(assets));
        o.on_surface_created(&mut ctx);
        o.attach_session(Box::new(ScriptedSession::new(vec![triangle_face(0)])));

        o.on_draw_frame(&mut ctx);
        let labels = ctx.draw_labels();
        assert!(!labels.contains(&"nose"));
        assert!(labels.contains(&"forehead left"));
    }

    #[test]
    fn surface_recreation_releases_previous_generation() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let programs = ctx.live_programs();
        let textures = ctx.live_textures();
        let buffers = ctx.live_buffers();

        o.on_surface_created(&mut ctx);
        assert_eq!(ctx.live_programs(), programs);
        assert_eq!(ctx.live_textures(), textures);
        assert_eq!(ctx.live_buffers(), buffers);

        o.release(&mut ctx);
        assert_eq!(o.state(), OrchestratorState::Uninitialized);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.live_buffers(), 0);
    }

    // ── frame loop ─────────────────────────────────────────────────────────

    #[test]
    fn without_session_only_clears() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        ctx.clear_events();
        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.events(), &[GfxEvent::Clear(ClearFlags::COLOR_AND_DEPTH)]);
    }

    #[test]
    fn overlays_follow_fixed_order() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.attach_session(Box::new(simulated(1)));

        // First camera frame has timestamp 0: no background yet.
        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draw_labels(), OVERLAY_ORDER);
        assert_eq!(o.state(), OrchestratorState::Tracking);

        ctx.clear_events();
        o.on_draw_frame(&mut ctx);
        let labels = ctx.draw_labels();
        assert_eq!(labels[0], "background camera");
        assert_eq!(&labels[1..], OVERLAY_ORDER);
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn face_overlays_draw_without_depth_writes() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.attach_session(Box::new(ScriptedSession::new(vec![triangle_face(0)])));
        o.on_draw_frame(&mut ctx);

        let face = ctx.draws().find(|d| d.label == "augmented face").unwrap();
        assert!(!face.state.depth_write);
        assert!(ctx.state().depth_write);
    }

    #[test]
    fn non_tracking_face_is_skipped() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let mut session = simulated(2);
        session.set_face_tracking_state(FaceId(0), TrackingState::Paused);
        o.attach_session(Box::new(session));

        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draw_labels(), OVERLAY_ORDER);
        assert_eq!(o.content().ids().collect::<Vec<_>>(), vec![FaceId(1)]);
    }

    #[test]
    fn every_tracked_face_gets_the_full_group() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.attach_session(Box::new(simulated(2)));
        o.on_draw_frame(&mut ctx);

        let labels = ctx.draw_labels();
        assert_eq!(labels.len(), 8);
        assert_eq!(&labels[..4], OVERLAY_ORDER);
        assert_eq!(&labels[4..], OVERLAY_ORDER);
    }

    #[test]
    fn session_failure_is_swallowed() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let mut session = simulated(1);
        session.fail_next_update("camera disconnected");
        o.attach_session(Box::new(session));

        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draws().count(), 0);
        assert!(ctx.state().depth_write);

        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draw_labels(), OVERLAY_ORDER);
    }

    #[test]
    fn mid_frame_failure_restores_depth_write() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let mut broken = triangle_face(0);
        broken.mesh.normals.clear();
        o.attach_session(Box::new(ScriptedSession::new(vec![broken])));

        ctx.clear_events();
        o.on_draw_frame(&mut ctx);
        // The bad mesh aborts the face group after the background.
        assert_eq!(ctx.draw_labels(), ["background camera"]);
        assert_eq!(ctx.events().last(), Some(&GfxEvent::DepthWrite(true)));
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn surface_change_reaches_session_once() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let session = ScriptedSession::new(Vec::new());
        let geometry = session.geometry.clone();
        o.attach_session(Box::new(session));

        o.on_surface_changed(&mut ctx, 640, 480);
        o.on_draw_frame(&mut ctx);
        o.on_draw_frame(&mut ctx);
        assert_eq!(*geometry.borrow(), vec![(DisplayRotation::Rotation0, 640, 480)]);

        o.on_display_changed(DisplayRotation::Rotation90);
        o.on_draw_frame(&mut ctx);
        assert_eq!(geometry.borrow().last(), Some(&(DisplayRotation::Rotation90, 640, 480)));
    }

    #[test]
    fn keep_screen_on_follows_tracking_changes() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        o.on_keep_screen_on(move |on| sink.borrow_mut().push(on));

        let mut session = ScriptedSession::new(Vec::new());
        let paused = Frame {
            timestamp_ns: 2,
            ..Frame::default()
        };
        let tracking = session.tracking_frame();
        session.frames.extend([Ok(tracking.clone()), Ok(tracking), Ok(paused)]);
        o.attach_session(Box::new(session));

        for _ in 0..3 {
            o.on_draw_frame(&mut ctx);
        }
        assert_eq!(*calls.borrow(), vec![true, false]);
    }

    #[test]
    fn detached_session_stops_drawing() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.attach_session(Box::new(simulated(1)));
        o.on_draw_frame(&mut ctx);
        assert!(o.detach_session().is_some());
        assert!(o.content().is_empty());

        ctx.clear_events();
        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draws().count(), 0);
    }

    // ── virtual content ────────────────────────────────────────────────────

    fn first_frame_labels(content: VirtualContentType) -> Vec<String> {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.select_content(content);
        o.attach_session(Box::new(simulated(1)));
        o.on_draw_frame(&mut ctx);
        ctx.draw_labels().into_iter().map(String::from).collect()
    }

    #[test]
    fn selected_content_decides_what_is_drawn() {
        assert_eq!(first_frame_labels(VirtualContentType::Texture), OVERLAY_ORDER);
        // four axis triads: face center and three regions
        assert_eq!(first_frame_labels(VirtualContentType::Transforms), vec![SPHERE_LABEL; 12]);
        assert_eq!(first_frame_labels(VirtualContentType::Geometry), ["face occluder", SPHERE_LABEL]);
        assert_eq!(first_frame_labels(VirtualContentType::VideoTexture), ["video face"]);
        // head, two eyes, jaw
        assert_eq!(first_frame_labels(VirtualContentType::BlendShape), vec![SPHERE_LABEL; 4]);
    }

    #[test]
    fn switching_content_changes_the_next_frame() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.attach_session(Box::new(simulated(1)));
        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draw_labels(), OVERLAY_ORDER);

        o.select_content(VirtualContentType::Geometry);
        ctx.clear_events();
        o.on_draw_frame(&mut ctx);
        assert_eq!(ctx.draw_labels(), ["background camera", "face occluder", SPHERE_LABEL]);
        assert!(ctx.state().is_default_fixed_function());
    }

    #[test]
    fn video_face_samples_the_camera_texture() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.select_content(VirtualContentType::VideoTexture);
        o.attach_session(Box::new(ScriptedSession::new(vec![triangle_face(0)])));
        o.on_draw_frame(&mut ctx);

        let background = ctx.draws().find(|d| d.label == "background camera").unwrap();
        let video = ctx.draws().find(|d| d.label == "video face").unwrap();
        assert!(video.textures[0].is_some());
        assert_eq!(video.textures[0], background.textures[0]);
        assert!(video.state.depth_write);
        assert!(video.streamed);
    }

    #[test]
    fn blend_shape_character_follows_session_expression() {
        let mut ctx = RecordingContext::new();
        let mut o = ready(&mut ctx);
        o.select_content(VirtualContentType::BlendShape);
        let mut open = triangle_face(0);
        open.blend_shapes.jaw_open = 1.0;
        o.attach_session(Box::new(ScriptedSession::new(vec![open])));
        o.on_draw_frame(&mut ctx);

        let jaw = o.content().node(FaceId(0)).unwrap().find("jaw").unwrap();
        let closed_jaw_y = -0.045;
        assert!(jaw.transform.w_axis.y < closed_jaw_y);
    }

    #[test]
    fn configured_face_texture_is_painted() {
        let mut ctx = RecordingContext::new();
        let config = SceneConfig {
            face_texture: "models/ear_fur.png".into(),
            ..SceneConfig::default()
        };
        let mut o = FrameOrchestrator::new(config, Box::new(scene_assets()));
        o.on_surface_created(&mut ctx);
        o.attach_session(Box::new(ScriptedSession::new(vec![triangle_face(0)])));
        let textures = ctx.live_textures();
        o.on_draw_frame(&mut ctx);

        assert_eq!(ctx.live_textures(), textures);
        assert!(ctx.draws().any(|d| d.label == "augmented face"));
    }

    #[test]
    fn axis_arm_spans_its_axis() {
        let arm = axis_arm(Vec3::Y, 0.2);
        let tip = arm.transform_point3(Vec3::Y);
        let base = arm.transform_point3(-Vec3::Y);
        assert!(tip.abs_diff_eq(Vec3::new(0.0, 0.2, 0.0), 1e-6));
        assert!(base.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert_eq!(primitive_color([1.0, 0.5, 0.0, 0.3]), [255.0, 127.5, 0.0, 255.0]);
    }

    // ── occlusion ──────────────────────────────────────────────────────────

    #[test]
    fn depth_images_feed_object_occlusion() {
        let mut ctx = RecordingContext::new();
        let config = SceneConfig {
            use_depth_for_occlusion: true,
            ..SceneConfig::default()
        };
        let mut o = FrameOrchestrator::new(config, Box::new(scene_assets()));
        o.on_surface_created(&mut ctx);
        o.attach_session(Box::new(SimulatedSession::new(SimulatedSessionConfig {
            camera_width: 8,
            camera_height: 8,
            mesh_resolution: 2,
            depth: true,
            fixed_step: Some(Duration::from_millis(33)),
            ..SimulatedSessionConfig::default()
        })));
        o.on_draw_frame(&mut ctx);

        let nose = ctx.draws().find(|d| d.label == "nose").unwrap();
        assert!(nose.textures[1].is_some());
        let face = ctx.draws().find(|d| d.label == "augmented face").unwrap();
        assert_eq!(face.textures.len(), 1);
    }

    #[test]
    fn uv_to_ndc_maps_corners() {
        let p = UV_TO_NDC.transform_point2(glam::Vec2::ZERO);
        assert_eq!(p, glam::Vec2::new(-1.0, -1.0));
        let p = UV_TO_NDC.transform_point2(glam::Vec2::ONE);
        assert_eq!(p, glam::Vec2::ONE);
    }
}
