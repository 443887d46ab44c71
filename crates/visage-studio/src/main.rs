//! Desktop host for the face-tracking renderer.
//!
//! Drives a [`FrameOrchestrator`] from a winit window with a simulated
//! tracking session. Usage: `visage-studio [ASSET_DIR]`.
//!
//! Keys: `1`..`5` pick the virtual content, `Esc` quits.

mod assets;

use anyhow::Result;
use visage_engine::content::VirtualContentType;
use visage_engine::core::{AppControl, FrameCtx, SurfaceApp, SurfaceCtx};
use visage_engine::device::GpuInit;
use visage_engine::gfx::WgpuContext;
use visage_engine::logging::{LoggingConfig, init_logging};
use visage_engine::session::{SimulatedSession, SimulatedSessionConfig};
use visage_engine::window::{Runtime, RuntimeConfig};
use visage_engine::{FrameOrchestrator, SceneConfig};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use assets::StudioAssets;

struct StudioApp {
    orchestrator: FrameOrchestrator,
    gfx: Option<WgpuContext>,
}

impl StudioApp {
    fn new(assets: StudioAssets) -> Self {
        let mut orchestrator = FrameOrchestrator::new(SceneConfig::default(), Box::new(assets));
        orchestrator.on_keep_screen_on(|keep_on| log::info!("keep screen on: {keep_on}"));
        orchestrator.attach_session(Box::new(SimulatedSession::new(SimulatedSessionConfig {
            depth: true,
            ..SimulatedSessionConfig::default()
        })));
        Self {
            orchestrator,
            gfx: None,
        }
    }
}

impl SurfaceApp for StudioApp {
    fn on_surface_created(&mut self, surface: &mut SurfaceCtx<'_, '_>) {
        let mut gfx = surface.gpu.graphics_context();
        self.orchestrator.on_surface_created(&mut gfx);
        self.gfx = Some(gfx);
    }

    fn on_surface_changed(&mut self, _surface: &mut SurfaceCtx<'_, '_>, width: u32, height: u32) {
        if let Some(gfx) = &mut self.gfx {
            gfx.resize(width, height);
            self.orchestrator.on_surface_changed(gfx, width, height);
        }
    }

    fn on_draw_frame(&mut self, frame: &mut FrameCtx<'_, '_>) -> AppControl {
        let (orchestrator, Some(gfx)) = (&mut self.orchestrator, self.gfx.as_mut()) else {
            return AppControl::Continue;
        };
        frame.render(|target| {
            orchestrator.on_draw_frame(&mut *gfx);
            gfx.flush(target);
        })
    }

    fn on_surface_destroyed(&mut self, _surface: &mut SurfaceCtx<'_, '_>) {
        if let Some(mut gfx) = self.gfx.take() {
            self.orchestrator.release(&mut gfx);
        }
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return AppControl::Continue;
        };

        let content = match code {
            KeyCode::Escape => return AppControl::Exit,
            KeyCode::Digit1 => VirtualContentType::Transforms,
            KeyCode::Digit2 => VirtualContentType::Texture,
            KeyCode::Digit3 => VirtualContentType::Geometry,
            KeyCode::Digit4 => VirtualContentType::VideoTexture,
            KeyCode::Digit5 => VirtualContentType::BlendShape,
            _ => return AppControl::Continue,
        };
        log::info!("content: {content:?}");
        self.orchestrator.select_content(content);
        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let asset_dir = std::env::args_os().nth(1).map(Into::into);
    let app = StudioApp::new(StudioAssets::new(asset_dir)?);

    Runtime::run(
        RuntimeConfig {
            title: "Visage Studio".to_string(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        app,
    )
}
