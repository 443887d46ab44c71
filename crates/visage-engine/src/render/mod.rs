//! Renderers for the camera background, static anchored objects and the
//! tracked face mesh.
//!
//! Every renderer owns its GPU resources and frees them in `release(ctx)`.
//! All GPU access goes through the `GraphicsContext` passed to each call, and
//! every draw leaves the context in its default fixed-function state (depth
//! test and write on, blending off).

mod background;
mod blend;
mod depth;
mod face;
mod material;
mod mesh;
mod object;
pub mod uv;

pub use background::BackgroundRenderer;
pub use blend::BlendMode;
pub use depth::DepthTexture;
pub use face::{AugmentedFaceRenderer, FaceFill, screen_tex_coords};
pub use material::MaterialProperties;
pub use mesh::{MAX_VERTICES, ObjMesh, PackedLayout, parse_obj};
pub use object::{DEFAULT_COLOR, LIGHT_DIRECTION, ObjectRenderer};
pub use uv::DisplayTransform;
