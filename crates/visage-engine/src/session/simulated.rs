use std::collections::VecDeque;
use std::time::Duration;

use glam::{Quat, Vec3};

use crate::error::{RenderError, RenderResult};
use crate::gfx::{PixelBuffer, TextureFormat};
use crate::math::Pose;
use crate::render::uv::DisplayTransform;
use crate::time::FrameClock;

use super::{
    ArSession, AugmentedFace, BlendShapes, Camera, DisplayRotation, FaceId, FaceMesh, Frame, LightEstimate, RegionType,
    TrackingFailureReason, TrackingState,
};

// Half extents of the synthetic face ellipsoid, in meters.
const FACE_A: f32 = 0.07;
const FACE_B: f32 = 0.10;
const FACE_C: f32 = 0.06;

/// Largest mesh resolution whose vertex grid still fits 16-bit indices.
pub const MAX_MESH_RESOLUTION: u16 = 255;

#[derive(Debug, Clone)]
pub struct SimulatedSessionConfig {
    pub faces: u32,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Sensor orientation of the simulated camera, in degrees.
    pub sensor_orientation: i32,
    pub fov_y: f32,
    /// Grid resolution of the generated face mesh, clamped to
    /// `1..=MAX_MESH_RESOLUTION`.
    pub mesh_resolution: u16,
    /// Advance by a fixed step per update instead of wall-clock time.
    pub fixed_step: Option<Duration>,
    pub depth: bool,
}

impl Default for SimulatedSessionConfig {
    fn default() -> Self {
        Self {
            faces: 1,
            camera_width: 640,
            camera_height: 480,
            sensor_orientation: 0,
            fov_y: 60f32.to_radians(),
            mesh_resolution: 16,
            fixed_step: None,
            depth: false,
        }
    }
}

/// Deterministic synthetic face tracker.
///
/// Produces swaying heads in front of a static camera, a generated face mesh,
/// region poses, a procedural camera image, and optionally a depth image.
/// Failures can be queued to exercise the orchestrator's error paths.
#[derive(Debug)]
pub struct SimulatedSession {
    config: SimulatedSessionConfig,
    clock: FrameClock,
    frame_index: u64,
    faces: Vec<AugmentedFace>,
    base_mesh: FaceMesh,

    rotation: DisplayRotation,
    viewport: (u32, u32),
    geometry_dirty: bool,
    display_transform: DisplayTransform,

    tracking_state: TrackingState,
    failure_reason: TrackingFailureReason,
    pending_failures: VecDeque<String>,
}

impl SimulatedSession {
    pub fn new(mut config: SimulatedSessionConfig) -> Self {
        let resolution = config.mesh_resolution.clamp(1, MAX_MESH_RESOLUTION);
        if resolution != config.mesh_resolution {
            log::warn!("mesh resolution {} clamped to {resolution}", config.mesh_resolution);
            config.mesh_resolution = resolution;
        }
        let base_mesh = face_mesh(resolution);
        let faces = (0..config.faces)
            .map(|i| AugmentedFace::new(FaceId(i), Pose::IDENTITY, base_mesh.clone()))
            .collect();
        Self {
            config,
            clock: FrameClock::new(),
            frame_index: 0,
            faces,
            base_mesh,
            rotation: DisplayRotation::default(),
            viewport: (0, 0),
            geometry_dirty: false,
            display_transform: DisplayTransform::IDENTITY,
            tracking_state: TrackingState::Tracking,
            failure_reason: TrackingFailureReason::None,
            pending_failures: VecDeque::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SimulatedSessionConfig {
        &self.config
    }

    #[inline]
    pub fn display_geometry(&self) -> (DisplayRotation, u32, u32) {
        (self.rotation, self.viewport.0, self.viewport.1)
    }

    /// The next `update()` fails with `message`.
    pub fn fail_next_update(&mut self, message: impl Into<String>) {
        self.pending_failures.push_back(message.into());
    }

    pub fn set_camera_tracking(&mut self, state: TrackingState, reason: TrackingFailureReason) {
        self.tracking_state = state;
        self.failure_reason = reason;
    }

    pub fn set_face_tracking_state(&mut self, id: FaceId, state: TrackingState) {
        if let Some(face) = self.faces.iter_mut().find(|f| f.id == id) {
            face.tracking_state = state;
        }
    }

    fn timestamp_ns(&mut self) -> i64 {
        match self.config.fixed_step {
            Some(step) => {
                let ns = step.as_nanos().saturating_mul(u128::from(self.frame_index));
                i64::try_from(ns).unwrap_or(i64::MAX)
            }
            None => self.clock.tick().timestamp_ns,
        }
    }

    fn move_faces(&mut self, seconds: f32) {
        let count = self.faces.len().max(1) as f32;
        for (i, face) in self.faces.iter_mut().enumerate() {
            let phase = seconds + i as f32 * 0.9;
            let x = (i as f32 - (count - 1.0) * 0.5) * 0.25 + 0.03 * (phase * 0.5).sin();
            let yaw = 0.35 * (phase * 0.8).sin();
            let pitch = 0.1 * (phase * 1.3).sin();
            let center = Pose::new(Vec3::new(x, 0.0, -0.5), Quat::from_euler(glam::EulerRot::YXZ, yaw, pitch, 0.0));

            face.center_pose = center;
            face.set_region_pose(RegionType::NoseTip, center.compose(&Pose::from_translation(Vec3::new(0.0, -0.01, FACE_C + 0.015))));
            face.set_region_pose(
                RegionType::ForeheadLeft,
                center.compose(&Pose::from_translation(Vec3::new(-0.045, 0.075, 0.035))),
            );
            face.set_region_pose(
                RegionType::ForeheadRight,
                center.compose(&Pose::from_translation(Vec3::new(0.045, 0.075, 0.035))),
            );

            face.blend_shapes = BlendShapes {
                eye_blink_left: blink(phase),
                eye_blink_right: blink(phase + 0.15),
                jaw_open: 0.5 + 0.5 * (phase * 0.7).sin(),
            };

            // Slight breathing so the streamed mesh actually changes per frame.
            let s = 1.0 + 0.01 * (phase * 2.0).sin();
            face.mesh.vertices.clear();
            face.mesh
                .vertices
                .extend(self.base_mesh.vertices.iter().map(|v| v * s));
        }
    }

    fn refresh_display_transform(&mut self) {
        let (w, h) = self.viewport;
        if w == 0 || h == 0 {
            return;
        }
        let rotation = (self.config.sensor_orientation - self.rotation.degrees() + 360).rem_euclid(360);
        match DisplayTransform::center_crop(
            self.config.camera_width,
            self.config.camera_height,
            w as f32 / h as f32,
            rotation,
        ) {
            Ok(t) => self.display_transform = t,
            Err(e) => log::warn!("simulated session keeps previous display transform: {e}"),
        }
    }
}

impl ArSession for SimulatedSession {
    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
        self.rotation = rotation;
        self.viewport = (width, height);
        self.geometry_dirty = true;
    }

    fn update(&mut self) -> RenderResult<Frame> {
        if let Some(message) = self.pending_failures.pop_front() {
            return Err(RenderError::Session(message));
        }

        let timestamp_ns = self.timestamp_ns();
        let seconds = timestamp_ns as f32 * 1e-9;
        self.move_faces(seconds);

        let display_geometry_changed = std::mem::take(&mut self.geometry_dirty);
        if display_geometry_changed {
            self.refresh_display_transform();
        }

        let (w, h) = self.viewport;
        let camera = Camera {
            fov_y: self.config.fov_y,
            aspect: if w == 0 || h == 0 { 1.0 } else { w as f32 / h as f32 },
            tracking_state: self.tracking_state,
            failure_reason: self.failure_reason,
            ..Camera::default()
        };

        let intensity = 0.8 + 0.2 * (seconds * 0.3).sin();
        let frame = Frame {
            timestamp_ns,
            camera,
            light_estimate: LightEstimate {
                color_correction: [1.0, 0.97, 0.94, intensity],
            },
            display_geometry_changed,
            display_transform: self.display_transform,
            camera_image: Some(camera_image(self.config.camera_width, self.config.camera_height, self.frame_index)),
            depth_image: self
                .config
                .depth
                .then(|| depth_image(self.config.camera_width / 4, self.config.camera_height / 4)),
            faces: self.faces.iter().map(|f| f.id).collect(),
        };

        self.frame_index += 1;
        Ok(frame)
    }

    fn face(&self, id: FaceId) -> Option<&AugmentedFace> {
        self.faces.iter().find(|f| f.id == id)
    }
}

/// Eyes close for a fifth of every 3 s cycle.
fn blink(seconds: f32) -> f32 {
    let t = seconds.rem_euclid(3.0) / 0.6;
    if t < 1.0 { (t * std::f32::consts::PI).sin() } else { 0.0 }
}

/// Front half of an ellipsoid, `resolution` quads per side.
fn face_mesh(resolution: u16) -> FaceMesh {
    debug_assert!(resolution <= MAX_MESH_RESOLUTION);
    let n = resolution as usize;
    let mut mesh = FaceMesh::default();

    for row in 0..=n {
        for col in 0..=n {
            let u = col as f32 / n as f32;
            let v = row as f32 / n as f32;
            let x = (u * 2.0 - 1.0) * FACE_A;
            let y = (v * 2.0 - 1.0) * FACE_B;
            let r = 1.0 - (x / FACE_A).powi(2) - (y / FACE_B).powi(2);
            let z = FACE_C * r.max(0.0).sqrt();
            let normal = Vec3::new(x / (FACE_A * FACE_A), y / (FACE_B * FACE_B), z / (FACE_C * FACE_C))
                .try_normalize()
                .unwrap_or(Vec3::Z);

            mesh.vertices.extend_from_slice(&[x, y, z]);
            mesh.normals.extend_from_slice(&normal.to_array());
            mesh.tex_coords.extend_from_slice(&[u, 1.0 - v]);
        }
    }

    let stride = resolution + 1;
    for row in 0..resolution {
        for col in 0..resolution {
            let i = row * stride + col;
            mesh.indices.extend_from_slice(&[i, i + 1, i + stride, i + 1, i + stride + 1, i + stride]);
        }
    }
    mesh
}

/// Gray gradient with a band that scrolls one row per frame.
fn camera_image(width: u32, height: u32, frame_index: u64) -> PixelBuffer {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    let band = (frame_index % u64::from(height.max(1))) as u32;
    for y in 0..height {
        for x in 0..width {
            let base = (40 + x * 80 / width.max(1) + y * 60 / height.max(1)) as u8;
            let lum = if y.abs_diff(band) < 4 { base.saturating_add(60) } else { base };
            data.extend_from_slice(&[lum, lum, lum.saturating_add(10), 255]);
        }
    }
    PixelBuffer::rgba(width, height, data)
}

/// Depth ramp from 0.3 m (top) to 3 m (bottom), little-endian millimeters.
fn depth_image(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity(width as usize * height as usize * 2);
    for y in 0..height {
        let mm = 300 + (y * 2700 / height.max(1)) as u16;
        for _ in 0..width {
            data.extend_from_slice(&mm.to_le_bytes());
        }
    }
    PixelBuffer {
        width,
        height,
        format: TextureFormat::Rg8,
        data,
    }
}
