use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::gfx::WgpuContext;

use super::surface;
use super::{GpuFrame, GpuInit, SurfaceErrorAction};

/// The window's presentation surface plus the device that renders into it.
///
/// Renderers never see this type; the host turns it into a
/// [`WgpuContext`] with [`graphics_context`](Self::graphics_context) and
/// brackets every frame with [`begin_frame`](Self::begin_frame) /
/// [`submit`](Self::submit).
pub struct Gpu<'w> {
    /// Presentation surface, borrowing the window it was created from.
    surface: wgpu::Surface<'w>,

    /// Kept for diagnostics; the adapter itself is not needed after device creation.
    adapter_info: wgpu::AdapterInfo,

    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Surface configuration; width/height are never zero.
    config: wgpu::SurfaceConfiguration,

    /// Last size reported by the window, possibly zero while minimized.
    size: PhysicalSize<u32>,
}

impl<'w> Gpu<'w> {
    /// Opens a device able to present to `window` and configures its surface.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a GPU adapter that can present to the window")?;
        let adapter_info = adapter.get_info();
        log::info!("using adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("visage device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let config = surface::initial_config(&surface.get_capabilities(&adapter), &init, size)
            .context("surface reports no supported formats")?;
        log::debug!("surface {:?} {}x{} {:?}", config.format, config.width, config.height, config.present_mode);
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            adapter_info,
            device,
            queue,
            config,
            size,
        })
    }

    /// Graphics context drawing into this surface's format at its current size.
    pub fn graphics_context(&self) -> WgpuContext {
        WgpuContext::new(
            self.device.clone(),
            self.queue.clone(),
            self.config.format,
            self.config.width,
            self.config.height,
        )
    }

    #[inline]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current drawable size (physical pixels).
    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Reconfigures the surface after a resize. Zero sizes are recorded but
    /// leave the surface untouched.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        surface::apply_resize(&self.surface, &self.device, &mut self.config, &mut self.size, new_size);
    }

    /// Acquires the next surface texture and creates an encoder.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("visage frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
        })
    }

    /// Submits the recorded commands and presents the frame.
    pub fn submit(&self, frame: GpuFrame) {
        let GpuFrame {
            surface_texture,
            view,
            encoder,
        } = frame;
        self.queue.submit(std::iter::once(encoder.finish()));
        drop(view);
        surface_texture.present();
    }

    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        surface::map_surface_error(&self.surface, &self.device, &self.config, self.size, err)
    }
}
