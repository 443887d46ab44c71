//! Fixtures shared by unit tests.

use crate::assets::{MemoryAssets, builtin_shaders};

pub(crate) const TRIANGLE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

pub(crate) fn png_1x1() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Built-in shaders plus every model and texture the default scene names.
pub(crate) fn scene_assets() -> MemoryAssets {
    let mut assets = builtin_shaders();
    for obj in ["models/nose.obj", "models/forehead_left.obj", "models/forehead_right.obj"] {
        assets.insert(obj, TRIANGLE_OBJ);
    }
    for png in ["models/freckles.png", "models/nose_fur.png", "models/ear_fur.png"] {
        assets.insert(png, png_1x1());
    }
    assets
}
