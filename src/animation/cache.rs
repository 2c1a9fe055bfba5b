//! Published per-tile frame tables and tick lookup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use parking_lot::RwLock;

use super::builder::TableBuilder;
use crate::compute::{EncodeError, Timeline};

/// One tile's frames in tick order.
#[derive(Debug, Clone)]
pub struct TileFrameSet {
    /// Resized RGBA tile images, kept for persistence.
    images: Vec<RgbaImage>,
    /// Palette buffers, one per image.
    colors: Vec<Arc<[u8]>>,
}

impl TileFrameSet {
    pub(crate) fn new(images: Vec<RgbaImage>, colors: Vec<Arc<[u8]>>) -> Self {
        debug_assert_eq!(images.len(), colors.len());
        Self { images, colors }
    }

    pub fn images(&self) -> &[RgbaImage] {
        &self.images
    }

    pub fn colors(&self) -> &[Arc<[u8]>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Immutable table of every tile's frames. All tiles share one frame count.
#[derive(Debug, Clone)]
pub struct FrameTable {
    tiles: Vec<TileFrameSet>,
    frame_count: usize,
}

impl FrameTable {
    /// Assemble a table, rejecting tiles whose frame count differs from tile 0.
    pub fn new(tiles: Vec<TileFrameSet>) -> Result<Self, EncodeError> {
        let frame_count = tiles.first().map_or(0, TileFrameSet::len);
        if let Some((tile, set)) = tiles
            .iter()
            .enumerate()
            .find(|(_, set)| set.len() != frame_count)
        {
            return Err(EncodeError::RaggedFrames {
                tile,
                expected: frame_count,
                found: set.len(),
            });
        }
        Ok(Self { tiles, frame_count })
    }

    pub fn tiles(&self) -> &[TileFrameSet] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Frames per tile.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Buffer for `tile` at `tick`, wrapping the frame index.
    pub fn get(&self, tile: usize, tick: u64) -> Option<&Arc<[u8]>> {
        if self.frame_count == 0 {
            return None;
        }
        let frame = (tick % self.frame_count as u64) as usize;
        self.tiles.get(tile)?.colors.get(frame)
    }
}

/// Tile-indexed animation cache.
///
/// A rebuild produces a complete [`FrameTable`] before it is published, and
/// publishing replaces the current table pointer in one step. Readers clone
/// the `Arc` and keep using their table, so a lookup never mixes tiles from
/// two generations.
pub struct AnimationCache {
    current: RwLock<Option<Arc<FrameTable>>>,
    empty: Arc<[u8]>,
    tile_pixels: u32,
    generation: AtomicU64,
}

impl AnimationCache {
    /// Create an unbuilt cache whose empty buffer is `tile_pixels²` bytes of `empty_index`.
    pub fn new(tile_pixels: u32, empty_index: u8) -> Self {
        let len = tile_pixels as usize * tile_pixels as usize;
        Self {
            current: RwLock::new(None),
            empty: vec![empty_index; len].into(),
            tile_pixels,
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the current table. Returns the new generation number.
    pub fn publish(&self, table: FrameTable) -> u64 {
        let table = Arc::new(table);
        let mut current = self.current.write();
        *current = Some(table);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Build a table from `timeline` and publish it.
    ///
    /// On failure the previously published table stays in place.
    pub fn rebuild(&self, timeline: &Timeline, builder: &TableBuilder) -> Result<u64, EncodeError> {
        let table = builder.build(timeline)?;
        Ok(self.publish(table))
    }

    /// Current table, if any rebuild has succeeded.
    pub fn snapshot(&self) -> Option<Arc<FrameTable>> {
        self.current.read().clone()
    }

    /// Buffer for `tile` at `tick`.
    ///
    /// Returns the empty buffer when nothing is built yet or the tile is out
    /// of range.
    pub fn lookup(&self, tile: usize, tick: u64) -> Arc<[u8]> {
        let Some(table) = self.snapshot() else {
            return Arc::clone(&self.empty);
        };
        table
            .get(tile, tick)
            .map_or_else(|| Arc::clone(&self.empty), Arc::clone)
    }

    pub fn tile_pixels(&self) -> u32 {
        self.tile_pixels
    }

    /// The all-empty buffer returned before the first rebuild.
    pub fn empty_buffer(&self) -> &Arc<[u8]> {
        &self.empty
    }

    /// Frames per tile, 0 until a table is published.
    pub fn frame_count(&self) -> usize {
        self.snapshot().map_or(0, |t| t.frame_count())
    }

    pub fn is_built(&self) -> bool {
        self.current.read().is_some()
    }

    /// Number of tables published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AnimationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationCache")
            .field("frame_count", &self.frame_count())
            .field("generation", &self.generation())
            .finish()
    }
}
