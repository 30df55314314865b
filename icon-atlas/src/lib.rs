// Icon model and extraction from data records.
pub mod icon;
// Pure shelf/row packer producing the icon -> sub-rectangle mapping.
pub mod pack;
// Graphics-context seam the manager drives (texture create / upload / mipmaps).
pub mod gpu;
// Asynchronous image-loading seam and a filesystem-backed loader.
pub mod loader;
// Stateful orchestrator: change detection, rebuilds, streaming uploads.
pub mod manager;

pub use gpu::{GraphicsContext, GraphicsError, ImageData, MagFilter, MinFilter, Region, UploadParams};
pub use icon::{GetIcon, Icon, IconError, IconSet};
pub use loader::{FsImageLoader, ImageLoadError, ImageLoader};
pub use manager::{
    DEFAULT_MAX_CANVAS_HEIGHT, DEFAULT_MAX_CANVAS_WIDTH, IconAtlasError, IconAtlasManager,
    IconAtlasOptions, TextureUpdateCallback,
};
pub use pack::{IconMapping, PackError, PackedIcon, Packing, pack_icons};
