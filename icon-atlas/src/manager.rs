use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use log::{debug, error, trace, warn};
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    gpu::{GraphicsContext, GraphicsError, Region, UploadParams},
    icon::{GetIcon, Icon, IconError, IconSet},
    loader::ImageLoader,
    pack::{IconMapping, PackError, pack_icons},
};

pub const DEFAULT_MAX_CANVAS_WIDTH: u32 = 256;
pub const DEFAULT_MAX_CANVAS_HEIGHT: u32 = 768;

/// Invoked with the atlas texture after each successful streaming upload.
pub type TextureUpdateCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Configuration for [`IconAtlasManager::new`].
pub struct IconAtlasOptions<R, T> {
    /// Initial data records, if any. Without data the manager starts empty
    /// and builds its first atlas on the first `set_data`.
    pub data: Option<Vec<R>>,
    pub get_icon: GetIcon<R>,
    pub on_texture_update: TextureUpdateCallback<T>,
    pub max_width: u32,
    pub max_height: u32,
}

impl<R, T> IconAtlasOptions<R, T> {
    pub fn new(get_icon: impl Fn(&R) -> Icon + Send + Sync + 'static) -> Self {
        Self {
            data: None,
            get_icon: Arc::new(get_icon),
            on_texture_update: Arc::new(|_| {}),
            max_width: DEFAULT_MAX_CANVAS_WIDTH,
            max_height: DEFAULT_MAX_CANVAS_HEIGHT,
        }
    }

    pub fn with_data(mut self, data: Vec<R>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_texture_update(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_texture_update = Arc::new(callback);
        self
    }

    pub fn with_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }
}

/// One atlas generation: icon set, mapping, and texture published together.
/// Streaming tasks hold an `Arc` to the generation they were spawned for, so
/// a superseded texture stays allocated until its last task finishes.
struct Generation<T> {
    id: u64,
    icons: IconSet,
    mapping: Arc<IconMapping>,
    texture: Arc<T>,
    atlas_height: u32,
}

/// Orchestrates the icon atlas for a stream of data updates.
///
/// Extraction, packing, and texture allocation are synchronous; pixel content
/// arrives through per-icon tasks spawned on the given runtime. The mapping
/// and texture accessors always observe a consistent pair.
pub struct IconAtlasManager<R, G: GraphicsContext> {
    context: Arc<G>,
    loader: Arc<dyn ImageLoader>,
    runtime: tokio::runtime::Handle,
    get_icon: GetIcon<R>,
    on_texture_update: TextureUpdateCallback<G::Texture>,
    max_width: u32,
    max_height: u32,

    current: Arc<RwLock<Option<Arc<Generation<G::Texture>>>>>,
    next_generation: AtomicU64,
}

impl<R, G: GraphicsContext> IconAtlasManager<R, G> {
    pub fn new(
        context: Arc<G>,
        loader: Arc<dyn ImageLoader>,
        runtime: tokio::runtime::Handle,
        options: IconAtlasOptions<R, G::Texture>,
    ) -> Result<Self, IconAtlasError> {
        let manager = Self {
            context,
            loader,
            runtime,
            get_icon: options.get_icon,
            on_texture_update: options.on_texture_update,
            max_width: options.max_width,
            max_height: options.max_height,
            current: Arc::new(RwLock::new(None)),
            next_generation: AtomicU64::new(0),
        };

        if let Some(data) = options.data {
            let icons = IconSet::from_records(&data, &manager.get_icon)?;
            manager.rebuild(icons)?;
        }

        Ok(manager)
    }

    /// Re-extracts the icon set and rebuilds the atlas if it changed.
    /// Returns whether a rebuild ran.
    ///
    /// Change detection is asymmetric: only a previously-unseen identity
    /// triggers a rebuild. A collection whose identities are a subset of the
    /// current set leaves the atlas, mapping, and texture untouched, so
    /// removed icons keep their (now unused) atlas slots until an addition
    /// forces a repack.
    pub fn set_data(&self, data: &[R]) -> Result<bool, IconAtlasError> {
        let next_icons = IconSet::from_records(data, &self.get_icon)?;

        let changed = match self.current.read().as_ref() {
            Some(generation) => next_icons.introduces_new_urls(&generation.icons),
            None => true,
        };
        if !changed {
            trace!("IconAtlasManager::set_data: no new icon identities, keeping current atlas");
            return Ok(false);
        }

        self.rebuild(next_icons)?;
        Ok(true)
    }

    /// The current identity -> sub-rectangle mapping, frozen for this
    /// generation. Replaced wholesale on rebuild, never mutated in place.
    pub fn mapping(&self) -> Option<Arc<IconMapping>> {
        self.current.read().as_ref().map(|g| g.mapping.clone())
    }

    /// The current atlas texture. Changes together with `mapping`, never
    /// independently.
    pub fn texture(&self) -> Option<Arc<G::Texture>> {
        self.current.read().as_ref().map(|g| g.texture.clone())
    }

    pub fn atlas_height(&self) -> Option<u32> {
        self.current.read().as_ref().map(|g| g.atlas_height)
    }

    pub fn atlas_width(&self) -> u32 {
        self.max_width
    }

    /// Packs the icon set, allocates the new texture, publishes the new
    /// generation atomically, and spawns the streaming loads.
    fn rebuild(&self, icons: IconSet) -> Result<(), IconAtlasError> {
        let packing = pack_icons(&icons, self.max_width, self.max_height)?;
        let texture = self
            .context
            .create_texture(self.max_width, packing.atlas_height)?;

        let generation = Arc::new(Generation {
            id: self.next_generation.fetch_add(1, Ordering::Relaxed),
            icons,
            mapping: Arc::new(packing.mapping),
            texture: Arc::new(texture),
            atlas_height: packing.atlas_height,
        });
        *self.current.write() = Some(generation.clone());

        debug!(
            "IconAtlasManager::rebuild: generation {} with {} icons, atlas {}x{}",
            generation.id,
            generation.icons.len(),
            self.max_width,
            generation.atlas_height
        );

        self.spawn_loads(&generation);
        Ok(())
    }

    /// Spawns one independent load task per icon. A slow load never blocks
    /// the others, and completions carry their generation so stale ones are
    /// discarded instead of written into a replaced atlas.
    fn spawn_loads(&self, generation: &Arc<Generation<G::Texture>>) {
        for icon in generation.icons.iter() {
            if icon.url.is_empty() {
                continue;
            }

            let url = icon.url.clone();
            let generation = generation.clone();
            let current = self.current.clone();
            let context = self.context.clone();
            let loader = self.loader.clone();
            let on_texture_update = self.on_texture_update.clone();

            self.runtime.spawn(async move {
                let image = match loader.load(&url).await {
                    Ok(image) => image,
                    Err(e) => {
                        error!("IconAtlasManager: failed to load icon {url:?}: {e}");
                        return;
                    }
                };

                let is_current = current
                    .read()
                    .as_ref()
                    .is_some_and(|g| g.id == generation.id);
                if !is_current {
                    warn!(
                        "IconAtlasManager: discarding load of {url:?} for superseded generation {}",
                        generation.id
                    );
                    return;
                }

                let Some(packed) = generation.mapping.get(&url).copied() else {
                    // The mapping was built from the same icon set, so every
                    // spawned url has an entry.
                    return;
                };
                let region = Region {
                    x: packed.x,
                    y: packed.y,
                    width: packed.width,
                    height: packed.height,
                };

                if let Err(e) = context.upload_sub_image(
                    &generation.texture,
                    region,
                    &image,
                    &UploadParams::default(),
                ) {
                    error!("IconAtlasManager: failed to upload icon {url:?}: {e}");
                    return;
                }
                if let Err(e) = context.regenerate_mipmaps(&generation.texture) {
                    error!("IconAtlasManager: failed to regenerate mipmaps after {url:?}: {e}");
                    return;
                }

                trace!("IconAtlasManager: streamed icon {url:?} into {region:?}");
                on_texture_update(&generation.texture);
            });
        }
    }
}

#[derive(Debug, Error)]
pub enum IconAtlasError {
    #[error("icon extraction failed")]
    Icon(#[from] IconError),
    #[error("atlas packing failed")]
    Pack(#[from] PackError),
    #[error("graphics context error")]
    Graphics(#[from] GraphicsError),
}
