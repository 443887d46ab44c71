use std::collections::BTreeMap;

use crate::assets::AssetLoader;
use crate::error::{RenderError, RenderResult};

/// Preprocessor defines, rendered as `#define NAME VALUE` in name order.
pub type Defines = BTreeMap<String, i32>;

/// Nesting limit for `#include`. Only direct self-inclusion is detected as a
/// cycle; longer cycles stop here.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Reads `name`, expands includes and inserts `defines`.
pub fn load_source(assets: &dyn AssetLoader, name: &str, defines: &Defines) -> RenderResult<String> {
    let body = resolve_includes(assets, name)?;
    Ok(insert_defines(&body, defines))
}

/// Reads `name` and recursively replaces each `#include "other"` line with the
/// contents of `other`.
pub fn resolve_includes(assets: &dyn AssetLoader, name: &str) -> RenderResult<String> {
    let source = assets.read_text(name)?;
    expand(assets, name, &source, 0)
}

fn expand(assets: &dyn AssetLoader, name: &str, source: &str, depth: usize) -> RenderResult<String> {
    let mut out = String::with_capacity(source.len());

    for line in source.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("#include") {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let target = tokens
            .next()
            .map(|t| t.replace('"', ""))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RenderError::asset(name, "#include without a file name"))?;

        if target == name {
            return Err(RenderError::asset(name, "shader includes itself"));
        }
        if depth + 1 >= MAX_INCLUDE_DEPTH {
            return Err(RenderError::asset(
                name,
                format!("#include nesting exceeds {MAX_INCLUDE_DEPTH} levels at `{target}`"),
            ));
        }

        let included = assets.read_text(&target)?;
        out.push_str(&expand(assets, &target, &included, depth + 1)?);
    }

    Ok(out)
}

/// Inserts one `#define` per entry. The block goes right after a leading
/// `#version` line when there is one, else at the very top.
pub fn insert_defines(source: &str, defines: &Defines) -> String {
    if defines.is_empty() {
        return source.to_string();
    }

    let block: String = defines
        .iter()
        .map(|(name, value)| format!("#define {name} {value}\n"))
        .collect();

    let first_code = source
        .lines()
        .map(str::trim_start)
        .find(|l| !l.is_empty());

    match first_code {
        Some(l) if l.starts_with("#version") => {
            let version_end = source
                .find("#version")
                .and_then(|at| source[at..].find('\n').map(|nl| at + nl + 1))
                .unwrap_or(source.len());
            let mut out = String::with_capacity(source.len() + block.len() + 1);
            out.push_str(&source[..version_end]);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out.push_str(&source[version_end..]);
            out
        }
        _ => block + source,
    }
}
