use thiserror::Error;

use crate::gfx::ShaderStage;

/// Errors produced by the rendering pipeline.
///
/// Setup-time variants (`ShaderCompile`, `ProgramLink`, `AssetLoad`,
/// `MeshFormat`) are caught one layer up by the orchestrator, which skips the
/// affected renderer. Per-frame variants are discarded at the top of the frame
/// loop.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("error compiling {stage:?} shader `{label}`: {log}")]
    ShaderCompile {
        stage: ShaderStage,
        label: String,
        log: String,
    },

    #[error("error linking program `{label}`: {log}")]
    ProgramLink { label: String, log: String },

    #[error("failed to load asset `{name}`: {reason}")]
    AssetLoad { name: String, reason: String },

    #[error("unhandled rotation: {0}")]
    UnsupportedRotation(i32),

    #[error("{label}: graphics error {code}")]
    GraphicsState { label: String, code: u32 },

    #[error("mesh `{name}` is not renderable: {reason}")]
    MeshFormat { name: String, reason: String },

    #[error("session error: {0}")]
    Session(String),
}

impl RenderError {
    pub(crate) fn asset(name: &str, reason: impl ToString) -> Self {
        Self::AssetLoad {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short stable tag used to de-duplicate repeated per-frame log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShaderCompile { .. } => "shader-compile",
            Self::ProgramLink { .. } => "program-link",
            Self::AssetLoad { .. } => "asset-load",
            Self::UnsupportedRotation(_) => "unsupported-rotation",
            Self::GraphicsState { .. } => "graphics-state",
            Self::MeshFormat { .. } => "mesh-format",
            Self::Session(_) => "session",
        }
    }
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
