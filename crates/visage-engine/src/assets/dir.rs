use std::path::{Component, Path, PathBuf};

use super::AssetLoader;
use crate::error::{RenderError, RenderResult};

/// Assets rooted at a filesystem directory.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `name` below the root; names escaping the root are rejected.
    fn resolve(&self, name: &str) -> RenderResult<PathBuf> {
        let rel = Path::new(name);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RenderError::asset(name, "asset names must be relative to the asset root"));
        }
        Ok(self.root.join(rel))
    }
}

impl AssetLoader for DirAssets {
    fn read_binary(&self, name: &str) -> RenderResult<Vec<u8>> {
        let path = self.resolve(name)?;
        log::trace!("reading asset {}", path.display());
        std::fs::read(&path).map_err(|e| RenderError::asset(name, e))
    }
}
