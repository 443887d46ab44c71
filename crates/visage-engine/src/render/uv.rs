//! Screen-quad texture coordinates.

use glam::{Mat3, Vec2};

use crate::error::{RenderError, RenderResult};

/// Full-screen quad in normalized device coordinates, drawn as a triangle
/// strip: v0 v1 v2, then v2 v1 v3.
///
/// ```text
/// (-1, 1) ------- (1, 1)
///   |    \           |
///   |       \        |
///   |          \     |
/// (-1,-1) ------- (1,-1)
/// ```
pub const QUAD_COORDS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Crop offsets `(u, v)` that center-crop an image to `screen_aspect`.
///
/// Each offset is the fraction trimmed from one side along that axis.
pub fn center_crop_offsets(image_width: u32, image_height: u32, screen_aspect: f32) -> (f32, f32) {
    let (w, h) = (image_width as f32, image_height as f32);
    let image_aspect = w / h;
    let (cropped_w, cropped_h) = if screen_aspect < image_aspect {
        (h * screen_aspect, h)
    } else {
        (w, w / screen_aspect)
    };
    let u = (w - cropped_w) / w * 0.5;
    let v = (h - cropped_h) / h * 0.5;
    (u, v)
}

/// Texture coordinates of the four quad corners for crop offsets `(u, v)` and
/// the camera-to-display rotation in degrees.
pub fn center_crop_tex_coords(u: f32, v: f32, rotation: i32) -> RenderResult<[f32; 8]> {
    let coords = match rotation {
        0 => [u, 1.0 - v, 1.0 - u, 1.0 - v, u, v, 1.0 - u, v],
        90 => [1.0 - u, 1.0 - v, 1.0 - u, v, u, 1.0 - v, u, v],
        180 => [1.0 - u, v, u, v, 1.0 - u, 1.0 - v, u, 1.0 - v],
        270 => [u, v, u, 1.0 - v, 1.0 - u, v, 1.0 - u, 1.0 - v],
        other => return Err(RenderError::UnsupportedRotation(other)),
    };
    Ok(coords)
}

/// Affine map from normalized device coordinates to normalized texture
/// coordinates of the camera image.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DisplayTransform {
    matrix: Mat3,
}

impl DisplayTransform {
    pub const IDENTITY: Self = Self { matrix: Mat3::IDENTITY };

    /// Map sending NDC `(-1,-1)`, `(1,-1)` and `(-1,1)` to `c0`, `c1` and `c2`.
    pub fn from_corners(c0: Vec2, c1: Vec2, c2: Vec2) -> Self {
        // p' = c0 + (p.x + 1)/2 * (c1 - c0) + (p.y + 1)/2 * (c2 - c0)
        let ex = (c1 - c0) * 0.5;
        let ey = (c2 - c0) * 0.5;
        let origin = c0 + ex + ey;
        Self {
            matrix: Mat3::from_cols(ex.extend(0.0), ey.extend(0.0), origin.extend(1.0)),
        }
    }

    /// Center-crop of a `image_width` x `image_height` camera image onto a
    /// screen with aspect `screen_aspect`, rotated by `rotation` degrees.
    pub fn center_crop(
        image_width: u32,
        image_height: u32,
        screen_aspect: f32,
        rotation: i32,
    ) -> RenderResult<Self> {
        let (u, v) = center_crop_offsets(image_width, image_height, screen_aspect);
        let t = center_crop_tex_coords(u, v, rotation)?;
        Ok(Self::from_corners(
            Vec2::new(t[0], t[1]),
            Vec2::new(t[2], t[3]),
            Vec2::new(t[4], t[5]),
        ))
    }

    #[inline]
    pub fn matrix(&self) -> Mat3 {
        self.matrix
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.matrix.transform_point2(p)
    }

    /// Transforms four interleaved `(x, y)` points.
    pub fn transform_coordinates_2d(&self, points: &[f32; 8]) -> [f32; 8] {
        let mut out = [0.0; 8];
        for (src, dst) in points.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
            let p = self.apply(Vec2::new(src[0], src[1]));
            dst[0] = p.x;
            dst[1] = p.y;
        }
        out
    }
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32; 8], b: &[f32; 8]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn rotation_0_table() {
        let t = center_crop_tex_coords(0.1, 0.2, 0).unwrap();
        assert_close(&t, &[0.1, 0.8, 0.9, 0.8, 0.1, 0.2, 0.9, 0.2]);
    }

    #[test]
    fn rotation_90_table() {
        let t = center_crop_tex_coords(0.1, 0.2, 90).unwrap();
        assert_close(&t, &[0.9, 0.8, 0.9, 0.2, 0.1, 0.8, 0.1, 0.2]);
    }

    #[test]
    fn rotation_180_table() {
        let t = center_crop_tex_coords(0.1, 0.2, 180).unwrap();
        assert_close(&t, &[0.9, 0.2, 0.1, 0.2, 0.9, 0.8, 0.1, 0.8]);
    }

    #[test]
    fn rotation_270_table() {
        let t = center_crop_tex_coords(0.1, 0.2, 270).unwrap();
        assert_close(&t, &[0.1, 0.2, 0.1, 0.8, 0.9, 0.2, 0.9, 0.8]);
    }

    #[test]
    fn other_rotations_are_rejected() {
        for r in [-90, 45, 360] {
            assert!(matches!(
                center_crop_tex_coords(0.0, 0.0, r),
                Err(RenderError::UnsupportedRotation(x)) if x == r
            ));
        }
    }

    #[test]
    fn wide_image_on_narrow_screen_crops_horizontally() {
        // 640x480 (4:3) onto a 1:1 screen trims 80px from each side.
        let (u, v) = center_crop_offsets(640, 480, 1.0);
        assert!((u - 0.125).abs() < 1e-6);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn tall_screen_crops_vertically() {
        let (u, v) = center_crop_offsets(400, 400, 2.0);
        assert_eq!(u, 0.0);
        assert!((v - 0.25).abs() < 1e-6);
    }

    #[test]
    fn transform_maps_quad_onto_table() {
        let t = DisplayTransform::center_crop(640, 480, 1.0, 90).unwrap();
        let expected = center_crop_tex_coords(0.125, 0.0, 90).unwrap();
        assert_close(&t.transform_coordinates_2d(&QUAD_COORDS), &expected);
    }

    #[test]
    fn identity_transform_is_passthrough() {
        assert_eq!(DisplayTransform::IDENTITY.transform_coordinates_2d(&QUAD_COORDS), QUAD_COORDS);
    }
}
