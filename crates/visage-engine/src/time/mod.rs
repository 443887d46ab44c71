//! Time subsystem.
//!
//! One `FrameClock` per session; call `tick()` once per camera frame.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
