use async_trait::async_trait;
use thiserror::Error;

use crate::gpu::ImageData;

/// The image-loading collaborator: resolves an icon identity to pixel data.
///
/// Each load is independent; a failure for one icon must not affect others,
/// so errors are reported per icon.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<ImageData, ImageLoadError>;
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read image {url:?}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {url:?}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
}

/// Loads icons whose urls are filesystem paths, decoding to RGBA8.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, url: &str) -> Result<ImageData, ImageLoadError> {
        let bytes = tokio::fs::read(url).await.map_err(|source| ImageLoadError::Io {
            url: url.to_owned(),
            source,
        })?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|source| ImageLoadError::Decode {
                url: url.to_owned(),
                source,
            })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(ImageData {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Tests that a missing file surfaces as a per-icon io error.
    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = FsImageLoader.load("/nonexistent/icon.png").await;
        assert!(matches!(result, Err(ImageLoadError::Io { .. })));
    }

    /// Tests that unreadable bytes surface as a decode error.
    #[tokio::test]
    async fn test_garbage_bytes_is_decode_error() {
        let dir = std::env::temp_dir().join("icon_atlas_loader_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("not_an_image.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = FsImageLoader.load(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(ImageLoadError::Decode { .. })));
    }
}
