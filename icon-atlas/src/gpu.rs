use thiserror::Error;

/// Tightly packed RGBA8 pixel data for one icon image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub const BYTES_PER_PIXEL: u32 = 4;

    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL as usize
    }
}

/// A sub-rectangle of an atlas texture, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagFilter {
    Nearest,
    Linear,
}

/// Filtering and unpack parameters applied with each streaming upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadParams {
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
    /// Flip rows vertically on upload, matching the GL convention of
    /// bottom-left-origin texture data.
    pub flip_y: bool,
}

impl Default for UploadParams {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::LinearMipmapLinear,
            mag_filter: MagFilter::Linear,
            flip_y: true,
        }
    }
}

/// The graphics collaborator the manager drives.
///
/// Implementations own the texture representation; the manager only ever
/// creates whole textures, writes sub-regions, and asks for the mipmap chain
/// to be rebuilt.
pub trait GraphicsContext: Send + Sync + 'static {
    type Texture: Send + Sync + 'static;

    fn create_texture(&self, width: u32, height: u32) -> Result<Self::Texture, GraphicsError>;

    fn upload_sub_image(
        &self,
        texture: &Self::Texture,
        region: Region,
        data: &ImageData,
        params: &UploadParams,
    ) -> Result<(), GraphicsError>;

    fn regenerate_mipmaps(&self, texture: &Self::Texture) -> Result<(), GraphicsError>;
}

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("texture creation failed: {0}")]
    CreationFailed(String),
    #[error(
        "upload region {x},{y} {width}x{height} lies outside the {texture_width}x{texture_height} texture"
    )]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        texture_width: u32,
        texture_height: u32,
    },
    #[error("pixel data ({actual} bytes) does not match the upload region ({expected} bytes)")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("graphics backend error: {0}")]
    Backend(String),
}
