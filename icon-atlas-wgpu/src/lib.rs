// wgpu implementation of the icon-atlas graphics-context seam.
mod context;
// Blit-based mipmap chain regeneration.
mod mipmap;

pub use context::{AtlasTexture, WgpuContext};
pub use mipmap::MipmapGenerator;
