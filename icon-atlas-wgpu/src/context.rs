use std::sync::Arc;

use icon_atlas::{
    GraphicsContext, GraphicsError, ImageData, MagFilter, MinFilter, Region, UploadParams,
};
use log::trace;
use parking_lot::Mutex;

use crate::mipmap::MipmapGenerator;

/// An atlas texture with its full mip chain.
///
/// The sampler reflects the filter parameters of the most recent upload;
/// renderers bind `view` and `sampler` together.
pub struct AtlasTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: Mutex<wgpu::Sampler>,
    width: u32,
    height: u32,
    mip_level_count: u32,
}

impl AtlasTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> wgpu::Sampler {
        self.sampler.lock().clone()
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }
}

/// `wgpu`-backed graphics context for the icon atlas manager.
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    format: wgpu::TextureFormat,
    mip_gen: MipmapGenerator,
}

impl WgpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self::with_format(device, queue, wgpu::TextureFormat::Rgba8UnormSrgb)
    }

    pub fn with_format(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let mip_gen = MipmapGenerator::new(&device, format);
        Self {
            device,
            queue,
            format,
            mip_gen,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_sampler(device: &wgpu::Device, params: &UploadParams) -> wgpu::Sampler {
        let (min_filter, mipmap_filter) = match params.min_filter {
            MinFilter::Nearest => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
            MinFilter::Linear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
            MinFilter::LinearMipmapLinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
        };
        let mag_filter = match params.mag_filter {
            MagFilter::Nearest => wgpu::FilterMode::Nearest,
            MagFilter::Linear => wgpu::FilterMode::Linear,
        };

        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("icon_atlas_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter,
            min_filter,
            mipmap_filter,
            ..Default::default()
        })
    }
}

/// Mip levels needed to reach 1x1 from the largest dimension.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Reverses row order so bottom-left-origin pixel data lands upright.
fn flip_rows(data: &ImageData) -> Vec<u8> {
    let bytes_per_row = (data.width * ImageData::BYTES_PER_PIXEL) as usize;
    let mut flipped = Vec::with_capacity(data.pixels.len());
    for row in data.pixels.chunks_exact(bytes_per_row).rev() {
        flipped.extend_from_slice(row);
    }
    flipped
}

impl GraphicsContext for WgpuContext {
    type Texture = AtlasTexture;

    fn create_texture(&self, width: u32, height: u32) -> Result<AtlasTexture, GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::CreationFailed(format!(
                "atlas texture dimensions must be nonzero, got {width}x{height}"
            )));
        }

        let mip_level_count = mip_level_count(width, height);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("icon_atlas_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("icon_atlas_texture_view"),
            ..Default::default()
        });
        let sampler = Self::create_sampler(&self.device, &UploadParams::default());

        trace!("WgpuContext::create_texture: {width}x{height} with {mip_level_count} mip levels");

        Ok(AtlasTexture {
            texture,
            view,
            sampler: Mutex::new(sampler),
            width,
            height,
            mip_level_count,
        })
    }

    fn upload_sub_image(
        &self,
        texture: &AtlasTexture,
        region: Region,
        data: &ImageData,
        params: &UploadParams,
    ) -> Result<(), GraphicsError> {
        if region.x + region.width > texture.width || region.y + region.height > texture.height {
            return Err(GraphicsError::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                texture_width: texture.width,
                texture_height: texture.height,
            });
        }
        let expected = ImageData::expected_len(region.width, region.height);
        if data.width != region.width || data.height != region.height || data.pixels.len() != expected
        {
            return Err(GraphicsError::SizeMismatch {
                expected,
                actual: data.pixels.len(),
            });
        }

        let flipped;
        let pixels: &[u8] = if params.flip_y {
            flipped = flip_rows(data);
            &flipped
        } else {
            &data.pixels
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * ImageData::BYTES_PER_PIXEL),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );

        *texture.sampler.lock() = Self::create_sampler(&self.device, params);
        Ok(())
    }

    fn regenerate_mipmaps(&self, texture: &AtlasTexture) -> Result<(), GraphicsError> {
        self.mip_gen.generate(
            &self.device,
            &self.queue,
            &texture.texture,
            texture.mip_level_count,
        );
        Ok(())
    }
}
