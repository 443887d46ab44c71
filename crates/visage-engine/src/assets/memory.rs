use std::collections::HashMap;

use super::AssetLoader;
use crate::error::{RenderError, RenderResult};

/// In-memory asset map.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.files.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

impl AssetLoader for MemoryAssets {
    fn read_binary(&self, name: &str) -> RenderResult<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| RenderError::asset(name, "not found"))
    }
}

macro_rules! bundled {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!("../../assets/", $name)))),*]
    };
}

const BUILTIN_SHADERS: &[(&str, &str)] = bundled![
    "shaders/screenquad.vert",
    "shaders/screenquad.frag",
    "shaders/background_show_depth_color_visualization.vert",
    "shaders/background_show_depth_color_visualization.frag",
    "shaders/ar_object.vert",
    "shaders/ar_object.frag",
    "shaders/ar_object_uniforms.glsl",
    "shaders/object.vert",
    "shaders/object.frag",
    "shaders/face_uniforms.glsl",
    "shaders/lighting.glsl",
    "shaders/depth.glsl",
];

/// Asset map preloaded with the bundled GLSL sources.
pub fn builtin_shaders() -> MemoryAssets {
    let mut assets = MemoryAssets::new();
    for (name, source) in BUILTIN_SHADERS {
        assets.insert(*name, source.as_bytes());
    }
    assets
}
