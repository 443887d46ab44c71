use crate::gfx::{BlendFunc, GraphicsContext};

/// How an object is composited over what is already drawn.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BlendMode {
    /// Leave blend and depth state alone.
    #[default]
    None,
    /// Multiplicative darkening. Depth writes are off for the draw so stacked
    /// shadows don't occlude each other.
    Shadow,
    /// Premultiplied-alpha over, depth writes on.
    AlphaBlending,
}

impl BlendMode {
    /// Applies the mode for one draw.
    pub fn apply(self, ctx: &mut dyn GraphicsContext) {
        match self {
            BlendMode::None => {}
            BlendMode::Shadow => {
                ctx.set_depth_write(false);
                ctx.set_blend(Some(BlendFunc::MULTIPLICATIVE));
            }
            BlendMode::AlphaBlending => {
                ctx.set_depth_write(true);
                ctx.set_blend(Some(BlendFunc::PREMULTIPLIED_ALPHA));
            }
        }
    }

    /// Returns blend and depth-write to their defaults.
    pub fn restore(ctx: &mut dyn GraphicsContext) {
        ctx.set_blend(None);
        ctx.set_depth_write(true);
    }
}
