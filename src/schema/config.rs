//! Configuration types for the tile animation pipeline.

use serde::{Deserialize, Serialize};

/// Side length of one display tile in pixels.
pub const TILE_PIXELS: u32 = 128;

/// Length of one encoded tile buffer (one palette index per pixel).
pub const PALETTE_BUFFER_LENGTH: usize = (TILE_PIXELS * TILE_PIXELS) as usize;

/// Sampling step in milliseconds, one host animation tick.
pub const DEFAULT_SAMPLE_STEP: u32 = 50;

/// Palette index used for pixels with no data.
pub const EMPTY_INDEX: u8 = 0;

fn default_tile_pixels() -> u32 {
    TILE_PIXELS
}

fn default_sample_step() -> u32 {
    DEFAULT_SAMPLE_STEP
}

/// Pipeline parameters shared by every image map instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tile side length in pixels.
    #[serde(default = "default_tile_pixels")]
    pub tile_pixels: u32,
    /// Timeline sampling step in milliseconds.
    #[serde(default = "default_sample_step")]
    pub sample_step: u32,
    /// Palette index returned for tiles that have no data yet.
    #[serde(default)]
    pub empty_index: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_pixels: TILE_PIXELS,
            sample_step: DEFAULT_SAMPLE_STEP,
            empty_index: EMPTY_INDEX,
        }
    }
}

impl PipelineConfig {
    /// Number of bytes in one encoded tile buffer.
    #[inline]
    pub fn buffer_length(&self) -> usize {
        self.tile_pixels as usize * self.tile_pixels as usize
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_pixels == 0 {
            return Err(ConfigError::InvalidTilePixels);
        }
        if self.sample_step == 0 {
            return Err(ConfigError::InvalidSampleStep);
        }
        Ok(())
    }
}

/// Size of an image map measured in tiles, not pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of tiles (display surfaces) in the grid.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Full image size in pixels for the given tile size.
    ///
    /// Sizes are expected to have passed [`checked_pixel_size`](Self::checked_pixel_size).
    #[inline]
    pub fn pixel_size(&self, tile_pixels: u32) -> (u32, u32) {
        (
            self.width.saturating_mul(tile_pixels),
            self.height.saturating_mul(tile_pixels),
        )
    }

    /// Full image size in pixels, or an error if it does not fit in `u32`.
    pub fn checked_pixel_size(&self, tile_pixels: u32) -> Result<(u32, u32), ConfigError> {
        let overflow = || ConfigError::PixelSizeOverflow {
            width: self.width,
            height: self.height,
            tile_pixels,
        };
        let width = self.width.checked_mul(tile_pixels).ok_or_else(overflow)?;
        let height = self.height.checked_mul(tile_pixels).ok_or_else(overflow)?;
        Ok((width, height))
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Tile size must be non-zero")]
    InvalidTilePixels,
    #[error("Sample step must be non-zero")]
    InvalidSampleStep,
    #[error("Tile grid {width}x{height} must be at least 1x1")]
    InvalidGrid { width: u32, height: u32 },
    #[error("Tile grid {width}x{height} at {tile_pixels}px per tile is too large")]
    PixelSizeOverflow {
        width: u32,
        height: u32,
        tile_pixels: u32,
    },
    #[error("Expected {expected} surface ids for the tile grid, got {found}")]
    SurfaceCount { expected: usize, found: usize },
}
