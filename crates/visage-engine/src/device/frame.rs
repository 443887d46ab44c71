/// One acquired surface frame.
///
/// Holding it blocks acquisition of the next frame; submit it promptly.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}
