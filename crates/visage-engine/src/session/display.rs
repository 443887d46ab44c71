use crate::error::{RenderError, RenderResult};

use super::{ArSession, DisplayRotation};

/// Tracks viewport size and display rotation and forwards changes to the
/// session before its next update.
#[derive(Debug, Default)]
pub struct DisplayRotationHelper {
    viewport_changed: bool,
    viewport_width: u32,
    viewport_height: u32,
    rotation: DisplayRotation,
}

impl DisplayRotationHelper {
    pub fn new(rotation: DisplayRotation) -> Self {
        Self {
            rotation,
            ..Self::default()
        }
    }

    #[inline]
    pub fn viewport_changed(&self) -> bool {
        self.viewport_changed
    }

    #[inline]
    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    #[inline]
    pub fn rotation(&self) -> DisplayRotation {
        self.rotation
    }

    pub fn on_surface_changed(&mut self, width: u32, height: u32) {
        self.viewport_width = width;
        self.viewport_height = height;
        self.viewport_changed = true;
    }

    /// The display was rotated or reconfigured.
    pub fn on_display_changed(&mut self, rotation: DisplayRotation) {
        self.rotation = rotation;
        self.viewport_changed = true;
    }

    /// Pushes pending display geometry to `session` and clears the flag.
    pub fn update_session_if_needed(&mut self, session: &mut dyn ArSession) {
        if !self.viewport_changed {
            return;
        }
        log::debug!(
            "display geometry: {}° {}x{}",
            self.rotation.degrees(),
            self.viewport_width,
            self.viewport_height
        );
        session.set_display_geometry(self.rotation, self.viewport_width, self.viewport_height);
        self.viewport_changed = false;
    }

    /// Rotation from the camera sensor to the display, one of 0/90/180/270.
    pub fn camera_sensor_to_display_rotation(&self, sensor_orientation: i32) -> i32 {
        (sensor_orientation - self.rotation.degrees() + 360).rem_euclid(360)
    }

    /// Viewport aspect ratio in the camera sensor's frame.
    pub fn camera_sensor_relative_viewport_aspect_ratio(&self, sensor_orientation: i32) -> RenderResult<f32> {
        let w = self.viewport_width as f32;
        let h = self.viewport_height as f32;
        match self.camera_sensor_to_display_rotation(sensor_orientation) {
            90 | 270 => Ok(h / w),
            0 | 180 => Ok(w / h),
            other => Err(RenderError::UnsupportedRotation(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AugmentedFace, FaceId, Frame};

    #[derive(Default)]
    struct GeometrySink {
        calls: Vec<(DisplayRotation, u32, u32)>,
    }

    impl ArSession for GeometrySink {
        fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
            self.calls.push((rotation, width, height));
        }

        fn update(&mut self) -> RenderResult<Frame> {
            Ok(Frame::default())
        }

        fn face(&self, _id: FaceId) -> Option<&AugmentedFace> {
            None
        }
    }

    #[test]
    fn geometry_is_pushed_once_per_change() {
        let mut helper = DisplayRotationHelper::default();
        let mut session = GeometrySink::default();

        helper.update_session_if_needed(&mut session);
        assert!(session.calls.is_empty());

        helper.on_surface_changed(1080, 1920);
        helper.update_session_if_needed(&mut session);
        helper.update_session_if_needed(&mut session);
        assert_eq!(session.calls, vec![(DisplayRotation::Rotation0, 1080, 1920)]);
        assert!(!helper.viewport_changed());
    }

    #[test]
    fn display_change_resends_current_size() {
        let mut helper = DisplayRotationHelper::default();
        let mut session = GeometrySink::default();
        helper.on_surface_changed(800, 600);
        helper.update_session_if_needed(&mut session);

        helper.on_display_changed(DisplayRotation::Rotation90);
        helper.update_session_if_needed(&mut session);
        assert_eq!(session.calls.last(), Some(&(DisplayRotation::Rotation90, 800, 600)));
    }

    #[test]
    fn sensor_to_display_rotation_wraps() {
        let mut helper = DisplayRotationHelper::new(DisplayRotation::Rotation270);
        assert_eq!(helper.camera_sensor_to_display_rotation(90), 180);
        helper.on_display_changed(DisplayRotation::Rotation0);
        assert_eq!(helper.camera_sensor_to_display_rotation(270), 270);
    }

    #[test]
    fn relative_aspect_swaps_for_quarter_turns() {
        let mut helper = DisplayRotationHelper::default();
        helper.on_surface_changed(1000, 500);
        assert_eq!(helper.camera_sensor_relative_viewport_aspect_ratio(90).unwrap(), 0.5);
        assert_eq!(helper.camera_sensor_relative_viewport_aspect_ratio(0).unwrap(), 2.0);
        assert!(matches!(
            helper.camera_sensor_relative_viewport_aspect_ratio(45),
            Err(RenderError::UnsupportedRotation(45))
        ));
    }
}
