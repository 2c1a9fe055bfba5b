//! Pipeline from a decoded timeline (or persisted tiles) to a [`FrameTable`].

use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::cache::{FrameTable, TileFrameSet};
use crate::compute::{EncodeError, Palette, PaletteEncoder, Timeline, resample, split_tiles};
use crate::schema::{PipelineConfig, TileGrid};

/// Tiles and buffers for one resized source frame.
type EncodedFrame = (Vec<RgbaImage>, Vec<Arc<[u8]>>);

/// Builds frame tables for one tile grid.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    grid: TileGrid,
    sample_step: u32,
    encoder: PaletteEncoder,
}

impl TableBuilder {
    pub fn new(grid: TileGrid, config: &PipelineConfig, palette: Arc<dyn Palette>) -> Self {
        Self {
            grid,
            sample_step: config.sample_step,
            encoder: PaletteEncoder::new(palette, config.tile_pixels),
        }
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn encoder(&self) -> &PaletteEncoder {
        &self.encoder
    }

    /// Sample `timeline`, then resize, tile and encode every sampled frame.
    ///
    /// Source frames that are sampled several times are processed once and
    /// their buffers shared between ticks.
    pub fn build(&self, timeline: &Timeline) -> Result<FrameTable, EncodeError> {
        let samples = timeline.sample(self.sample_step);
        let tile_pixels = self.encoder.tile_pixels();
        let (width, height) = self.grid.pixel_size(tile_pixels);

        // Sample indices never decrease, so adjacent dedup is enough.
        let mut distinct = samples.clone();
        distinct.dedup();

        let encoded: FxHashMap<usize, EncodedFrame> = distinct
            .par_iter()
            .map(|&index| -> Result<(usize, EncodedFrame), EncodeError> {
                let resized = resample(&timeline.frames()[index].image, width, height);
                let tiles = split_tiles(&resized, self.grid, tile_pixels);
                let colors = tiles
                    .iter()
                    .map(|tile| self.encoder.encode(tile))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((index, (tiles, colors)))
            })
            .collect::<Result<_, EncodeError>>()?;

        let mut sets: Vec<(Vec<RgbaImage>, Vec<Arc<[u8]>>)> = (0..self.grid.tile_count())
            .map(|_| {
                (
                    Vec::with_capacity(samples.len()),
                    Vec::with_capacity(samples.len()),
                )
            })
            .collect();

        for index in &samples {
            let (tiles, colors) = &encoded[index];
            for (tile, (images, buffers)) in sets.iter_mut().enumerate() {
                images.push(tiles[tile].clone());
                buffers.push(Arc::clone(&colors[tile]));
            }
        }

        log::debug!(
            "Built frame table: {} tiles x {} frames ({} distinct source frames)",
            self.grid.tile_count(),
            samples.len(),
            distinct.len()
        );

        FrameTable::new(
            sets.into_iter()
                .map(|(images, colors)| TileFrameSet::new(images, colors))
                .collect(),
        )
    }

    /// Re-derive palette buffers from persisted per-tile images.
    pub fn from_tile_images(&self, tiles: Vec<Vec<RgbaImage>>) -> Result<FrameTable, EncodeError> {
        let sets = tiles
            .into_par_iter()
            .map(|images| -> Result<TileFrameSet, EncodeError> {
                let colors = images
                    .iter()
                    .map(|image| self.encoder.encode(image))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TileFrameSet::new(images, colors))
            })
            .collect::<Result<Vec<_>, EncodeError>>()?;
        FrameTable::new(sets)
    }
}
