use winit::event::WindowEvent;

use super::ctx::{FrameCtx, SurfaceCtx};

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Host-surface contract: the three render callbacks plus teardown.
///
/// All callbacks run on the thread that owns the event loop, in the order
/// created -> changed -> draw (repeating). A surface may be destroyed and
/// created again, e.g. on suspend/resume.
pub trait SurfaceApp {
    /// A GPU surface exists. Create GPU resources here.
    fn on_surface_created(&mut self, surface: &mut SurfaceCtx<'_, '_>);

    /// The drawable size changed (physical pixels, never zero).
    fn on_surface_changed(&mut self, surface: &mut SurfaceCtx<'_, '_>, width: u32, height: u32);

    /// Called once per presented frame.
    fn on_draw_frame(&mut self, frame: &mut FrameCtx<'_, '_>) -> AppControl;

    /// The surface is about to go away. Release GPU resources here.
    fn on_surface_destroyed(&mut self, surface: &mut SurfaceCtx<'_, '_>) {
        let _ = surface;
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }
}
