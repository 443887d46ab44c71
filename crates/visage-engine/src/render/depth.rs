use crate::gfx::{GraphicsContext, PixelBuffer, TextureDesc, TextureFilter, TextureFormat, TextureHandle};

/// GPU copy of the latest 16-bit depth image (packed into RG8).
#[derive(Debug, Default)]
pub struct DepthTexture {
    texture: Option<TextureHandle>,
    width: u32,
    height: u32,
}

impl DepthTexture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, ctx: &mut dyn GraphicsContext) -> TextureHandle {
        if let Some(t) = self.texture {
            return t;
        }
        let t = ctx.create_texture(&TextureDesc {
            label: "depth image".into(),
            width: 1,
            height: 1,
            format: TextureFormat::Rg8,
            filter: TextureFilter::Linear,
        });
        self.texture = Some(t);
        t
    }

    #[inline]
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Uploads `image`. Returns false when there is no texture yet.
    pub fn update(&mut self, ctx: &mut dyn GraphicsContext, image: &PixelBuffer) -> bool {
        let Some(t) = self.texture else {
            return false;
        };
        ctx.upload_texture(t, image);
        self.width = image.width;
        self.height = image.height;
        true
    }

    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(t) = self.texture.take() {
            ctx.delete_texture(t);
        }
        self.width = 0;
        self.height = 0;
    }
}
