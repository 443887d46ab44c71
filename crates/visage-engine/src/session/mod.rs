//! Tracking session interface.
//!
//! The renderers never talk to a tracker directly. The orchestrator pulls one
//! [`Frame`] per draw from an [`ArSession`] and resolves face ids against the
//! session's arena.

mod display;
mod simulated;
mod tracking;

pub use display::DisplayRotationHelper;
pub use simulated::{MAX_MESH_RESOLUTION, SimulatedSession, SimulatedSessionConfig};
pub use tracking::{TrackingStateHelper, tracking_failure_reason_string};

use glam::Mat4;

use crate::error::{RenderError, RenderResult};
use crate::gfx::PixelBuffer;
use crate::math::{Pose, Transform4x4};
use crate::render::uv::DisplayTransform;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TrackingState {
    Tracking,
    #[default]
    Paused,
    Stopped,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TrackingFailureReason {
    #[default]
    None,
    BadState,
    InsufficientLight,
    ExcessiveMotion,
    InsufficientFeatures,
    CameraUnavailable,
}

/// Display orientation relative to the device's natural orientation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    #[inline]
    pub fn degrees(self) -> i32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }

    pub fn from_degrees(degrees: i32) -> RenderResult<Self> {
        match degrees {
            0 => Ok(Self::Rotation0),
            90 => Ok(Self::Rotation90),
            180 => Ok(Self::Rotation180),
            270 => Ok(Self::Rotation270),
            other => Err(RenderError::UnsupportedRotation(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// World to camera.
    pub view_matrix: Transform4x4,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub tracking_state: TrackingState,
    pub failure_reason: TrackingFailureReason,
}

impl Camera {
    /// Right-handed perspective projection with a `0..1` depth range.
    pub fn projection_matrix(&self, near: f32, far: f32) -> Transform4x4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, near, far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view_matrix: Transform4x4::IDENTITY,
            fov_y: 60f32.to_radians(),
            aspect: 1.0,
            tracking_state: TrackingState::default(),
            failure_reason: TrackingFailureReason::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightEstimate {
    /// RGB scale plus average pixel intensity.
    pub color_correction: [f32; 4],
}

impl Default for LightEstimate {
    fn default() -> Self {
        Self {
            color_correction: [1.0; 4],
        }
    }
}

/// Handle into the session's face arena. Only valid for the frame that
/// listed it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// Anchored regions of a tracked face.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegionType {
    NoseTip,
    ForeheadLeft,
    ForeheadRight,
}

impl RegionType {
    pub const ALL: [Self; 3] = [Self::NoseTip, Self::ForeheadLeft, Self::ForeheadRight];

    #[inline]
    fn index(self) -> usize {
        match self {
            Self::NoseTip => 0,
            Self::ForeheadLeft => 1,
            Self::ForeheadRight => 2,
        }
    }
}

/// Face geometry in face-local space, replaced wholesale every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceMesh {
    /// xyz per vertex.
    pub vertices: Vec<f32>,
    /// xyz per vertex.
    pub normals: Vec<f32>,
    /// uv per vertex.
    pub tex_coords: Vec<f32>,
    pub indices: Vec<u16>,
}

impl FaceMesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when the parallel arrays agree and every index is in range.
    pub fn is_consistent(&self) -> bool {
        let n = self.vertex_count();
        self.vertices.len() == n * 3
            && self.normals.len() == n * 3
            && self.tex_coords.len() == n * 2
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < n)
    }
}

/// Expression coefficients in `0..=1`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct BlendShapes {
    pub eye_blink_left: f32,
    pub eye_blink_right: f32,
    pub jaw_open: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedFace {
    pub id: FaceId,
    pub tracking_state: TrackingState,
    pub center_pose: Pose,
    pub mesh: FaceMesh,
    pub blend_shapes: BlendShapes,
    region_poses: [Pose; 3],
}

impl AugmentedFace {
    pub fn new(id: FaceId, center_pose: Pose, mesh: FaceMesh) -> Self {
        Self {
            id,
            tracking_state: TrackingState::Tracking,
            center_pose,
            mesh,
            blend_shapes: BlendShapes::default(),
            region_poses: [center_pose; 3],
        }
    }

    /// World pose of an anchored region.
    #[inline]
    pub fn region_pose(&self, region: RegionType) -> Pose {
        self.region_poses[region.index()]
    }

    pub fn set_region_pose(&mut self, region: RegionType, pose: Pose) {
        self.region_poses[region.index()] = pose;
    }
}

/// Everything the renderers need from one tracker update.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// 0 until the camera produced its first image.
    pub timestamp_ns: i64,
    pub camera: Camera,
    pub light_estimate: LightEstimate,
    pub display_geometry_changed: bool,
    pub display_transform: DisplayTransform,
    pub camera_image: Option<PixelBuffer>,
    /// Packed 16-bit depth (RG8), when available.
    pub depth_image: Option<PixelBuffer>,
    pub faces: Vec<FaceId>,
}

impl Frame {
    /// Maps four NDC points to camera-image texture coordinates.
    #[inline]
    pub fn transform_coordinates_2d(&self, ndc: &[f32; 8]) -> [f32; 8] {
        self.display_transform.transform_coordinates_2d(ndc)
    }
}

/// Source of per-frame tracking data.
pub trait ArSession {
    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32);

    /// Advances the session. May block until the next camera frame.
    fn update(&mut self) -> RenderResult<Frame>;

    fn face(&self, id: FaceId) -> Option<&AugmentedFace>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn rotation_degrees_round_trip() {
        for d in [0, 90, 180, 270] {
            assert_eq!(DisplayRotation::from_degrees(d).unwrap().degrees(), d);
        }
        assert!(matches!(
            DisplayRotation::from_degrees(45),
            Err(RenderError::UnsupportedRotation(45))
        ));
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let cam = Camera::default();
        let p = cam.projection_matrix(0.1, 100.0) * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert!((p.z / p.w).abs() < 1e-5);
        let p = cam.projection_matrix(0.1, 100.0) * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert!((p.z / p.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn region_poses_default_to_center() {
        let center = Pose::from_translation(Vec3::new(0.0, 0.0, -0.4));
        let mut face = AugmentedFace::new(FaceId(0), center, FaceMesh::default());
        assert_eq!(face.region_pose(RegionType::NoseTip), center);

        let nose = Pose::from_translation(Vec3::new(0.0, -0.01, -0.35));
        face.set_region_pose(RegionType::NoseTip, nose);
        assert_eq!(face.region_pose(RegionType::NoseTip), nose);
        assert_eq!(face.region_pose(RegionType::ForeheadLeft), center);
    }

    #[test]
    fn mesh_consistency_checks_indices() {
        let mut mesh = FaceMesh {
            vertices: vec![0.0; 9],
            normals: vec![0.0; 9],
            tex_coords: vec![0.0; 6],
            indices: vec![0, 1, 2],
        };
        assert!(mesh.is_consistent());
        mesh.indices = vec![0, 1, 3];
        assert!(!mesh.is_consistent());
    }

    #[test]
    fn frame_forwards_display_transform() {
        let frame = Frame::default();
        let quad = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        assert_eq!(frame.transform_coordinates_2d(&quad), quad);
    }
}
