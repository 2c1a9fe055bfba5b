//! Render-time dispatch from host surfaces to tile buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use super::cache::AnimationCache;
use super::map::AnimatedImageMap;

/// Shared animation clock supplied by the host.
pub trait AnimationClock: Send + Sync {
    fn current_tick(&self) -> u64;
}

/// Counter-backed clock, advanced by whoever drives the animation service.
#[derive(Debug, Default)]
pub struct TickClock {
    tick: AtomicU64,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward one tick. Returns the new tick.
    pub fn advance(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn set(&self, tick: u64) {
        self.tick.store(tick, Ordering::Relaxed);
    }
}

impl AnimationClock for TickClock {
    fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }
}

/// Anything that answers tile buffer queries.
pub trait TileSource: Send + Sync {
    fn tile_colors(&self, tile: usize, tick: u64) -> Arc<[u8]>;

    /// Side length of a tile; buffers are rows of this many pixels.
    fn tile_pixels(&self) -> u32;
}

impl TileSource for AnimatedImageMap {
    fn tile_colors(&self, tile: usize, tick: u64) -> Arc<[u8]> {
        self.raw_animation_colors(tick, tile)
    }

    fn tile_pixels(&self) -> u32 {
        self.config().tile_pixels
    }
}

impl TileSource for AnimationCache {
    fn tile_colors(&self, tile: usize, tick: u64) -> Arc<[u8]> {
        self.lookup(tile, tick)
    }

    fn tile_pixels(&self) -> u32 {
        AnimationCache::tile_pixels(self)
    }
}

/// Pixel sink of a host display surface.
pub trait RenderSurface {
    fn set_pixel(&mut self, x: u32, y: u32, color: u8);
}

struct Route {
    source: Arc<dyn TileSource>,
    tile: usize,
}

/// Routes render requests for host surface ids to their tile's buffer.
///
/// Holds no buffers of its own; every request reads the clock and asks the
/// owning source.
pub struct TileRenderDispatcher {
    clock: Arc<dyn AnimationClock>,
    routes: FxHashMap<i32, Route>,
}

impl TileRenderDispatcher {
    pub fn new(clock: Arc<dyn AnimationClock>) -> Self {
        Self {
            clock,
            routes: FxHashMap::default(),
        }
    }

    /// Route `surface_id` to `tile` of `source`, replacing any previous route.
    pub fn register(&mut self, surface_id: i32, source: Arc<dyn TileSource>, tile: usize) {
        self.routes.insert(surface_id, Route { source, tile });
    }

    /// Register every tile surface of `map`.
    pub fn register_map(&mut self, map: Arc<AnimatedImageMap>) {
        let ids = map.metadata().surface_ids.clone();
        let source: Arc<dyn TileSource> = map;
        for (tile, id) in ids.into_iter().enumerate() {
            self.register(id, Arc::clone(&source), tile);
        }
    }

    pub fn unregister(&mut self, surface_id: i32) -> bool {
        self.routes.remove(&surface_id).is_some()
    }

    pub fn is_registered(&self, surface_id: i32) -> bool {
        self.routes.contains_key(&surface_id)
    }

    /// Buffer to show on `surface_id` at the current tick.
    pub fn colors(&self, surface_id: i32) -> Option<Arc<[u8]>> {
        let route = self.routes.get(&surface_id)?;
        Some(route.source.tile_colors(route.tile, self.clock.current_tick()))
    }

    /// Blit the current buffer onto `surface`. Returns false for unknown surfaces.
    pub fn render<S: RenderSurface + ?Sized>(&self, surface_id: i32, surface: &mut S) -> bool {
        let Some(route) = self.routes.get(&surface_id) else {
            return false;
        };
        let width = route.source.tile_pixels().max(1) as usize;
        let colors = route.source.tile_colors(route.tile, self.clock.current_tick());
        for (i, &color) in colors.iter().enumerate() {
            surface.set_pixel((i % width) as u32, (i / width) as u32, color);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::MapMetadata;
    use crate::compute::MapPalette;
    use crate::compute::testing::solid_animation;
    use crate::fetch::FetchError;
    use crate::schema::{PipelineConfig, TileGrid};

    struct Canvas {
        width: u32,
        pixels: Vec<u8>,
    }

    impl RenderSurface for Canvas {
        fn set_pixel(&mut self, x: u32, y: u32, color: u8) {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    fn built_map() -> Arc<AnimatedImageMap> {
        let bytes = solid_animation(8, 4, &[5, 5, 5]);
        let fetcher = move |_: &str| -> Result<Vec<u8>, FetchError> { Ok(bytes.clone()) };
        let config = PipelineConfig {
            tile_pixels: 4,
            sample_step: 50,
            empty_index: 0,
        };
        let meta = MapMetadata::new(1, "mem://a", TileGrid::new(2, 1).unwrap(), "c", vec![40, 41]);
        let map =
            AnimatedImageMap::new(meta, config, Arc::new(MapPalette::new()), Arc::new(fetcher))
                .unwrap();
        map.update().unwrap();
        Arc::new(map)
    }

    #[test]
    fn test_dispatch_follows_clock() {
        let map = built_map();
        let clock = Arc::new(TickClock::new());
        let mut dispatcher = TileRenderDispatcher::new(clock.clone());
        dispatcher.register_map(Arc::clone(&map));

        assert!(dispatcher.is_registered(41));
        for _ in 0..7 {
            let tick = clock.current_tick();
            assert_eq!(
                dispatcher.colors(41).unwrap(),
                map.raw_animation_colors(tick, 1)
            );
            clock.advance();
        }
        assert!(dispatcher.colors(99).is_none());
    }

    #[test]
    fn test_render_writes_row_major() {
        let map = built_map();
        let clock = Arc::new(TickClock::new());
        clock.set(1);
        let mut dispatcher = TileRenderDispatcher::new(clock);
        dispatcher.register_map(Arc::clone(&map));

        let mut canvas = Canvas {
            width: 4,
            pixels: vec![255; 16],
        };
        assert!(dispatcher.render(40, &mut canvas));
        assert_eq!(&canvas.pixels[..], &*map.raw_animation_colors(1, 0));
        assert!(!dispatcher.render(7, &mut canvas));
    }

    #[test]
    fn test_cache_as_source_before_build() {
        let cache = Arc::new(AnimationCache::new(8, 0));
        assert_eq!(TileSource::tile_pixels(&*cache), 8);

        let mut dispatcher = TileRenderDispatcher::new(Arc::new(TickClock::new()));
        dispatcher.register(3, cache, 0);
        let colors = dispatcher.colors(3).unwrap();
        assert_eq!(colors.len(), 64);
        assert!(dispatcher.unregister(3));
        assert!(!dispatcher.is_registered(3));
    }
}
