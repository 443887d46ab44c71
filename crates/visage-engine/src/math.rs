//! Transform and pose types shared by the session and the renderers.

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// 4x4 column-major transform.
pub type Transform4x4 = Mat4;

/// Position and orientation of a tracked anchor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY)
    }

    /// Rotation followed by translation.
    #[inline]
    pub fn to_matrix(&self) -> Transform4x4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// `self` applied after `local`.
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose::new(
            self.translation + self.rotation * local.translation,
            self.rotation * local.rotation,
        )
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `pose * scale(s)`: uniform scale in the anchor's local frame.
#[inline]
pub fn model_matrix(pose: &Transform4x4, scale: f32) -> Transform4x4 {
    *pose * Mat4::from_scale(Vec3::splat(scale))
}

/// Transforms a direction (w = 0) by `model_view` and renormalizes it.
pub fn direction_in_view(model_view: &Transform4x4, direction: Vec4) -> Vec3 {
    (*model_view * direction).truncate().normalize_or_zero()
}

/// Column-major 3x3 packed as three `vec4` columns, the std140 layout of a `mat3`.
#[inline]
pub fn mat3_std140(m: &Mat3) -> [[f32; 4]; 3] {
    [
        m.x_axis.extend(0.0).to_array(),
        m.y_axis.extend(0.0).to_array(),
        m.z_axis.extend(0.0).to_array(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_pose_is_identity_matrix() {
        assert_eq!(Pose::IDENTITY.to_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn model_matrix_scales_diagonal_only() {
        let pose = Pose::from_translation(Vec3::new(1.0, 2.0, 3.0)).to_matrix();
        let m = model_matrix(&pose, 2.0);
        assert_eq!(m.x_axis.x, 2.0);
        assert_eq!(m.y_axis.y, 2.0);
        assert_eq!(m.z_axis.z, 2.0);
        assert_eq!(m.w_axis, Vec4::new(1.0, 2.0, 3.0, 1.0));
    }

    #[test]
    fn compose_matches_matrix_product() {
        let parent = Pose::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_y(0.5));
        let child = Pose::from_translation(Vec3::new(0.2, 0.0, 0.0));
        let composed = parent.compose(&child).to_matrix();
        let product = parent.to_matrix() * child.to_matrix();
        assert!(composed.abs_diff_eq(product, 1e-6));
    }

    #[test]
    fn view_direction_is_unit_length() {
        let model_view = Mat4::from_scale_rotation_translation(
            Vec3::splat(3.0),
            Quat::from_rotation_z(0.3),
            Vec3::new(5.0, 0.0, 0.0),
        );
        let d = direction_in_view(&model_view, Vec4::new(0.250, 0.866, 0.433, 0.0));
        assert!((d.length() - 1.0).abs() < 1e-5);
    }
}
