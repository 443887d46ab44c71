use crate::assets::AssetLoader;
use crate::error::{RenderError, RenderResult};
use crate::gfx::{GraphicsContext, ProgramHandle, ProgramLayout, ShaderHandle, ShaderStage};

use super::preprocess::{Defines, load_source};

/// Compiles `source`. A failed shader is deleted before the error is returned.
pub fn compile(
    ctx: &mut dyn GraphicsContext,
    stage: ShaderStage,
    label: &str,
    source: &str,
) -> RenderResult<ShaderHandle> {
    let shader = ctx.create_shader(stage, label, source);
    if let Err(log) = ctx.shader_compile_status(shader) {
        ctx.delete_shader(shader);
        return Err(RenderError::ShaderCompile {
            stage,
            label: label.to_string(),
            log,
        });
    }
    log::debug!("compiled {stage:?} shader `{label}`");
    Ok(shader)
}

/// Links two compiled stages. A failed program is deleted before the error is returned.
pub fn link(
    ctx: &mut dyn GraphicsContext,
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    layout: &ProgramLayout,
) -> RenderResult<ProgramHandle> {
    let program = ctx.link_program(vertex, fragment, layout);
    if let Err(log) = ctx.program_link_status(program) {
        ctx.delete_program(program);
        return Err(RenderError::ProgramLink {
            label: layout.label.clone(),
            log,
        });
    }
    Ok(program)
}

/// Reads, preprocesses and compiles one shader asset.
pub fn load_shader(
    ctx: &mut dyn GraphicsContext,
    assets: &dyn AssetLoader,
    stage: ShaderStage,
    name: &str,
    defines: &Defines,
) -> RenderResult<ShaderHandle> {
    let source = load_source(assets, name, defines)?;
    compile(ctx, stage, name, &source)
}

/// Asset names and per-stage defines of a program.
#[derive(Debug, Clone, Default)]
pub struct ProgramSources<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub vertex_defines: Defines,
    pub fragment_defines: Defines,
}

impl<'a> ProgramSources<'a> {
    pub fn new(vertex: &'a str, fragment: &'a str) -> Self {
        Self {
            vertex,
            fragment,
            ..Default::default()
        }
    }
}

/// Loads both stages and links them. Stage objects are released once the
/// program exists (or on any failure).
pub fn load_program(
    ctx: &mut dyn GraphicsContext,
    assets: &dyn AssetLoader,
    sources: &ProgramSources<'_>,
    layout: &ProgramLayout,
) -> RenderResult<ProgramHandle> {
    let vertex = load_shader(ctx, assets, ShaderStage::Vertex, sources.vertex, &sources.vertex_defines)?;
    let fragment = match load_shader(
        ctx,
        assets,
        ShaderStage::Fragment,
        sources.fragment,
        &sources.fragment_defines,
    ) {
        Ok(f) => f,
        Err(e) => {
            ctx.delete_shader(vertex);
            return Err(e);
        }
    };

    let program = link(ctx, vertex, fragment, layout);
    ctx.delete_shader(vertex);
    ctx.delete_shader(fragment);
    program
}

/// Drains every pending graphics error, logging each one.
///
/// Returns `GraphicsState` carrying the most recent error code when any was
/// pending.
pub fn check_gl_error(ctx: &mut dyn GraphicsContext, label: &str) -> RenderResult<()> {
    let mut last = None;
    for error in ctx.take_errors() {
        log::error!("{label}: glError {error}");
        last = Some(error.code);
    }
    match last {
        Some(code) => Err(RenderError::GraphicsState {
            label: label.to_string(),
            code,
        }),
        None => Ok(()),
    }
}
