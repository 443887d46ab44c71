use super::{Camera, TrackingFailureReason, TrackingState};

/// Turns tracking-state changes into keep-screen-on decisions.
///
/// The screen stays on while tracking and may sleep once tracking is paused
/// or stopped. Only changes are reported.
#[derive(Debug, Default)]
pub struct TrackingStateHelper {
    previous: Option<TrackingState>,
}

impl TrackingStateHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(keep_screen_on)` when `state` differs from the last
    /// observed state, `None` otherwise.
    pub fn update_keep_screen_on_flag(&mut self, state: TrackingState) -> Option<bool> {
        if self.previous == Some(state) {
            return None;
        }
        self.previous = Some(state);
        Some(!matches!(state, TrackingState::Paused | TrackingState::Stopped))
    }
}

/// User-facing explanation of why `camera` is not tracking.
pub fn tracking_failure_reason_string(camera: &Camera) -> &'static str {
    match camera.failure_reason {
        TrackingFailureReason::None => "",
        TrackingFailureReason::BadState => "Tracking lost due to bad internal state. Please try restarting the session.",
        TrackingFailureReason::InsufficientLight => "Too dark. Try moving to a well-lit area.",
        TrackingFailureReason::ExcessiveMotion => "Moving too fast. Slow down.",
        TrackingFailureReason::InsufficientFeatures => "Can't find anything. Aim device at a surface with more texture or color.",
        TrackingFailureReason::CameraUnavailable => "Another app is using the camera. Tap on this app or try closing the other one.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_transitions() {
        let mut h = TrackingStateHelper::new();
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Tracking), Some(true));
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Tracking), None);
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Paused), Some(false));
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Stopped), Some(false));
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Tracking), Some(true));
    }

    #[test]
    fn first_observation_is_always_reported() {
        let mut h = TrackingStateHelper::new();
        assert_eq!(h.update_keep_screen_on_flag(TrackingState::Paused), Some(false));
    }

    #[test]
    fn failure_reason_messages() {
        let mut camera = Camera::default();
        assert_eq!(tracking_failure_reason_string(&camera), "");
        camera.failure_reason = TrackingFailureReason::InsufficientLight;
        assert!(tracking_failure_reason_string(&camera).contains("dark"));
    }
}
