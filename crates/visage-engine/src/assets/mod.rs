//! Asset access.
//!
//! Renderers read shaders, textures and models by name through an
//! [`AssetLoader`]. Names are `/`-separated relative paths such as
//! `shaders/screenquad.vert` or `models/nose.obj`.

mod dir;
mod memory;

pub use dir::DirAssets;
pub use memory::{MemoryAssets, builtin_shaders};

use crate::error::{RenderError, RenderResult};
use crate::gfx::PixelBuffer;

/// Source of raw asset bytes.
pub trait AssetLoader {
    fn read_binary(&self, name: &str) -> RenderResult<Vec<u8>>;

    fn read_text(&self, name: &str) -> RenderResult<String> {
        let bytes = self.read_binary(name)?;
        String::from_utf8(bytes).map_err(|e| RenderError::asset(name, e))
    }

    /// Decodes a PNG/JPEG image into premultiplied RGBA8.
    fn decode_image(&self, name: &str, bytes: &[u8]) -> RenderResult<PixelBuffer> {
        let img = image::load_from_memory(bytes).map_err(|e| RenderError::asset(name, e))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut pixels = PixelBuffer::rgba(width, height, rgba.into_raw());
        pixels.premultiply();
        Ok(pixels)
    }

    /// Reads and decodes the named image.
    fn load_image(&self, name: &str) -> RenderResult<PixelBuffer> {
        let bytes = self.read_binary(name)?;
        self.decode_image(name, &bytes)
    }
}

impl<T: AssetLoader + ?Sized> AssetLoader for &T {
    fn read_binary(&self, name: &str) -> RenderResult<Vec<u8>> {
        (**self).read_binary(name)
    }

    fn read_text(&self, name: &str) -> RenderResult<String> {
        (**self).read_text(name)
    }

    fn decode_image(&self, name: &str, bytes: &[u8]) -> RenderResult<PixelBuffer> {
        (**self).decode_image(name, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decoded_images_are_premultiplied() {
        let assets = MemoryAssets::new().with("t.png", png(2, 3, [200, 100, 50, 0]));
        let px = assets.load_image("t.png").unwrap();
        assert_eq!((px.width, px.height), (2, 3));
        assert!(px.is_consistent());
        assert!(px.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn garbage_image_is_asset_error() {
        let assets = MemoryAssets::new().with("bad.png", b"not a png".to_vec());
        let err = assets.load_image("bad.png").unwrap_err();
        assert_eq!(err.kind(), "asset-load");
    }

    #[test]
    fn invalid_utf8_text_is_asset_error() {
        let assets = MemoryAssets::new().with("x.vert", vec![0xff, 0xfe]);
        assert!(matches!(
            assets.read_text("x.vert"),
            Err(RenderError::AssetLoad { .. })
        ));
    }
}
