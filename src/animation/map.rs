//! An animated image map: one URL-sourced animation spread over a tile grid.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use super::builder::TableBuilder;
use super::cache::AnimationCache;
use super::store::{CacheStore, LoadError, SaveError};
use crate::compute::{DecodeError, EncodeError, Palette, Timeline};
use crate::fetch::{FetchError, Fetcher};
use crate::schema::{CacheManifest, ConfigError, ManifestKind, MapData, PipelineConfig, TileGrid};

/// Errors raised by [`AnimatedImageMap::update`]. The published table is
/// left untouched whenever one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("An update is already running for this map")]
    InProgress,
}

/// Identity and layout of an image map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapMetadata {
    /// Instance id; also the name of the map's directory.
    pub index: i32,
    pub url: String,
    pub grid: TileGrid,
    pub creator: String,
    /// Epoch milliseconds.
    pub creation_time: u64,
    /// Host surface id for each tile, row-major.
    pub surface_ids: Vec<i32>,
}

impl MapMetadata {
    /// Metadata stamped with the current time.
    pub fn new(
        index: i32,
        url: impl Into<String>,
        grid: TileGrid,
        creator: impl Into<String>,
        surface_ids: Vec<i32>,
    ) -> Self {
        Self {
            index,
            url: url.into(),
            grid,
            creator: creator.into(),
            creation_time: now_millis(),
            surface_ids,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Owns the animation cache for one URL-sourced animated image.
///
/// Updates fetch and build a complete table without touching shared state
/// and publish it in one swap, so renders keep reading the previous table
/// while an update runs.
pub struct AnimatedImageMap {
    meta: MapMetadata,
    config: PipelineConfig,
    builder: TableBuilder,
    cache: AnimationCache,
    fetcher: Arc<dyn Fetcher>,
    updating: AtomicBool,
}

impl AnimatedImageMap {
    /// Create a map with an empty cache. Call [`update`](Self::update) to fill it.
    pub fn new(
        meta: MapMetadata,
        config: PipelineConfig,
        palette: Arc<dyn Palette>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = TileGrid::new(meta.grid.width, meta.grid.height)?;
        grid.checked_pixel_size(config.tile_pixels)?;
        if meta.surface_ids.len() != grid.tile_count() {
            return Err(ConfigError::SurfaceCount {
                expected: grid.tile_count(),
                found: meta.surface_ids.len(),
            });
        }

        Ok(Self {
            builder: TableBuilder::new(grid, &config, palette),
            cache: AnimationCache::new(config.tile_pixels, config.empty_index),
            meta,
            config,
            fetcher,
            updating: AtomicBool::new(false),
        })
    }

    /// Create a map and run the first update.
    pub fn create(
        meta: MapMetadata,
        config: PipelineConfig,
        palette: Arc<dyn Palette>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CreateError> {
        let map = Self::new(meta, config, palette, fetcher)?;
        map.update()?;
        Ok(map)
    }

    /// Reconstruct a saved map from its directory.
    ///
    /// `config.tile_pixels` is taken from the manifest; the other settings
    /// apply to future updates.
    pub fn load<P: AsRef<Path>>(
        dir: P,
        config: PipelineConfig,
        palette: Arc<dyn Palette>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, LoadError> {
        let loaded = CacheStore::new(dir).load()?;
        let manifest = loaded.manifest;
        let config = PipelineConfig {
            tile_pixels: manifest.tile_pixels,
            ..config
        };
        let meta = MapMetadata {
            index: manifest.index,
            url: manifest.url,
            grid: loaded.grid,
            creator: manifest.creator,
            creation_time: manifest.creation_time,
            surface_ids: manifest.mapdata.iter().map(|d| d.mapid).collect(),
        };

        let map = Self::new(meta, config, palette, fetcher)?;
        if loaded.tiles.iter().any(|frames| !frames.is_empty()) {
            let table = map.builder.from_tile_images(loaded.tiles)?;
            map.cache.publish(table);
        }
        Ok(map)
    }

    /// Fetch, decode and rebuild the cache, then publish it.
    ///
    /// Returns the new cache generation. On failure the previous table stays
    /// published. No retry is attempted.
    pub fn update(&self) -> Result<u64, UpdateError> {
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UpdateError::InProgress);
        }
        let result = {
            let _guard = UpdateGuard(&self.updating);
            self.fetch_and_rebuild()
        };

        match &result {
            Ok(generation) => log::info!(
                "Map {} updated to generation {} ({} frames per tile)",
                self.meta.index,
                generation,
                self.cache.frame_count()
            ),
            Err(e) => log::warn!("Map {} update from {} failed: {}", self.meta.index, self.meta.url, e),
        }
        result
    }

    fn fetch_and_rebuild(&self) -> Result<u64, UpdateError> {
        let bytes = self.fetcher.download(&self.meta.url)?;
        let timeline = Timeline::decode(&bytes)?;
        Ok(self.cache.rebuild(&timeline, &self.builder)?)
    }

    /// Run [`update`](Self::update) on a background thread.
    pub fn spawn_update(self: &Arc<Self>) -> io::Result<JoinHandle<Result<u64, UpdateError>>> {
        let map = Arc::clone(self);
        thread::Builder::new()
            .name(format!("animap-update-{}", self.meta.index))
            .spawn(move || map.update())
    }

    /// Palette buffer for `tile` at `tick`. Never fails; empty until built.
    pub fn raw_animation_colors(&self, tick: u64, tile: usize) -> Arc<[u8]> {
        self.cache.lookup(tile, tick)
    }

    /// Animated maps need the host to deliver ticks.
    pub fn requires_periodic_animation_service(&self) -> bool {
        true
    }

    /// Write the map to `data_folder/<index>/`. Returns that directory.
    pub fn save<P: AsRef<Path>>(&self, data_folder: P) -> Result<PathBuf, SaveError> {
        let dir = data_folder.as_ref().join(self.meta.index.to_string());
        let store = CacheStore::new(&dir);
        let table = self.cache.snapshot();
        store.save(self.manifest(), table.as_deref())?;
        Ok(dir)
    }

    /// Manifest header for this map, with empty image lists.
    pub fn manifest(&self) -> CacheManifest {
        CacheManifest {
            kind: ManifestKind::UrlAnimatedV1,
            index: self.meta.index,
            url: self.meta.url.clone(),
            width: self.meta.grid.width,
            height: self.meta.grid.height,
            creator: self.meta.creator.clone(),
            creation_time: self.meta.creation_time,
            tile_pixels: self.config.tile_pixels,
            mapdata: self
                .meta
                .surface_ids
                .iter()
                .map(|&mapid| MapData {
                    mapid,
                    images: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn metadata(&self) -> &MapMetadata {
        &self.meta
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnimationCache {
        &self.cache
    }

    pub fn palette(&self) -> &Arc<dyn Palette> {
        self.builder.encoder().palette()
    }
}

impl std::fmt::Debug for AnimatedImageMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedImageMap")
            .field("meta", &self.meta)
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Clears the update flag when dropped, including during unwinding.
struct UpdateGuard<'a>(&'a AtomicBool);

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Errors raised by [`AnimatedImageMap::create`].
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}
