//! Assets for the studio: an optional directory on disk, backed by the
//! bundled shaders and procedurally generated overlay models.

use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use visage_engine::assets::{AssetLoader, DirAssets, MemoryAssets, builtin_shaders};
use visage_engine::error::RenderResult;

/// Reads from the asset directory first, then from the bundled set.
pub struct StudioAssets {
    dir: Option<DirAssets>,
    bundled: MemoryAssets,
}

impl StudioAssets {
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &dir {
            log::info!("loading assets from {}", dir.display());
        }
        Ok(Self {
            dir: dir.map(DirAssets::new),
            bundled: bundled_scene()?,
        })
    }
}

impl AssetLoader for StudioAssets {
    fn read_binary(&self, name: &str) -> RenderResult<Vec<u8>> {
        if let Some(dir) = &self.dir {
            match dir.read_binary(name) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => log::debug!("{e}; using bundled `{name}`"),
            }
        }
        self.bundled.read_binary(name)
    }
}

fn bundled_scene() -> Result<MemoryAssets> {
    let mut assets = builtin_shaders();

    assets.insert("models/nose.obj", box_obj([0.012, 0.012, 0.012], [0.0, 0.0, 0.01]));
    assets.insert("models/forehead_left.obj", box_obj([0.02, 0.03, 0.01], [0.0, 0.03, 0.0]));
    assets.insert("models/forehead_right.obj", box_obj([0.02, 0.03, 0.01], [0.0, 0.03, 0.0]));

    assets.insert("models/freckles.png", encode_png(&freckles(256))?);
    assets.insert("models/nose_fur.png", encode_png(&fur(64, [200, 120, 60]))?);
    assets.insert("models/ear_fur.png", encode_png(&fur(64, [150, 90, 50]))?);
    Ok(assets)
}

/// Axis-aligned box as an OBJ with per-face normals and UVs.
fn box_obj(half: [f32; 3], center: [f32; 3]) -> String {
    use std::fmt::Write;

    let [hx, hy, hz] = half;
    let [cx, cy, cz] = center;
    // (normal, u axis, v axis)
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut out = String::from("o box\n");
    for (n, u, v) in faces {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = |i: usize| n[i] + su * u[i] + sv * v[i];
            let _ = writeln!(out, "v {} {} {}", cx + p(0) * hx, cy + p(1) * hy, cz + p(2) * hz);
        }
    }
    for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        let _ = writeln!(out, "vt {u} {v}");
    }
    for (n, _, _) in faces {
        let _ = writeln!(out, "vn {} {} {}", n[0], n[1], n[2]);
    }
    for f in 0..6 {
        let base = f * 4 + 1;
        let normal = f + 1;
        for tri in [[0, 1, 2], [0, 2, 3]] {
            let _ = write!(out, "f");
            for corner in tri {
                let _ = write!(out, " {}/{}/{normal}", base + corner, corner + 1);
            }
            out.push('\n');
        }
    }
    out
}

/// Sparse brown dots on a transparent background.
fn freckles(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let h = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663);
        if h % 97 == 0 {
            Rgba([120, 70, 40, 200])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn fur(size: u32, base: [u8; 3]) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let streak = ((x * 7 + y * 3) % 16) as u8 * 4;
        Rgba([
            base[0].saturating_add(streak),
            base[1].saturating_add(streak),
            base[2].saturating_add(streak),
            255,
        ])
    })
}

fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .context("failed to encode bundled texture")?;
    Ok(out.into_inner())
}
