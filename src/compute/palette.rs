//! Palette quantization of tiles into fixed-length index buffers.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rustc_hash::FxHashMap;

/// A fixed color table that pixels are reduced to.
pub trait Palette: Send + Sync {
    /// Nearest palette index for a pixel. Must be total and deterministic.
    fn quantize(&self, pixel: Rgba<u8>) -> u8;

    /// Color shown for an index. Transparent indices have zero alpha.
    fn color(&self, index: u8) -> Rgba<u8>;

    /// Index used where there is no data.
    fn empty_index(&self) -> u8 {
        0
    }
}

/// Base colors of the map palette. Index 0 is the transparent base.
const BASE_COLORS: [[u8; 3]; 62] = [
    [0, 0, 0],
    [127, 178, 56],
    [247, 233, 163],
    [199, 199, 199],
    [255, 0, 0],
    [160, 160, 255],
    [167, 167, 167],
    [0, 124, 0],
    [255, 255, 255],
    [164, 168, 184],
    [151, 109, 77],
    [112, 112, 112],
    [64, 64, 255],
    [143, 119, 72],
    [255, 252, 245],
    [216, 127, 51],
    [178, 76, 216],
    [102, 153, 216],
    [229, 229, 51],
    [127, 204, 25],
    [242, 127, 165],
    [76, 76, 76],
    [153, 153, 153],
    [76, 127, 153],
    [127, 63, 178],
    [51, 76, 178],
    [102, 76, 51],
    [102, 127, 51],
    [153, 51, 51],
    [25, 25, 25],
    [250, 238, 77],
    [92, 219, 213],
    [74, 128, 255],
    [0, 217, 58],
    [129, 86, 49],
    [112, 2, 0],
    [209, 177, 161],
    [159, 82, 36],
    [149, 87, 108],
    [112, 108, 138],
    [186, 133, 36],
    [103, 117, 53],
    [160, 77, 78],
    [57, 41, 35],
    [135, 107, 98],
    [87, 92, 92],
    [122, 73, 88],
    [76, 62, 92],
    [76, 50, 35],
    [76, 82, 42],
    [142, 60, 46],
    [37, 22, 16],
    [189, 48, 49],
    [148, 63, 97],
    [92, 25, 29],
    [22, 126, 134],
    [58, 142, 140],
    [86, 44, 62],
    [20, 180, 133],
    [100, 100, 100],
    [216, 175, 147],
    [127, 167, 150],
];

/// Brightness multipliers (out of 255) applied to each base color.
const SHADES: [u32; 4] = [180, 220, 255, 135];

/// Indices below this are transparent.
const FIRST_OPAQUE_INDEX: usize = 4;

/// Alpha below this maps to the transparent index.
const ALPHA_THRESHOLD: u8 = 128;

/// The map display palette: 62 base colors in 4 shades each.
///
/// Nearest match uses a red-mean weighted RGB distance; ties resolve to the
/// lowest index.
#[derive(Debug, Clone)]
pub struct MapPalette {
    colors: Vec<[u8; 3]>,
}

impl MapPalette {
    pub fn new() -> Self {
        let colors = BASE_COLORS
            .iter()
            .flat_map(|base| {
                SHADES.iter().map(move |&shade| {
                    [
                        (u32::from(base[0]) * shade / 255) as u8,
                        (u32::from(base[1]) * shade / 255) as u8,
                        (u32::from(base[2]) * shade / 255) as u8,
                    ]
                })
            })
            .collect();
        Self { colors }
    }

    /// Number of palette entries, transparent ones included.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    fn distance(a: [u8; 3], b: [u8; 3]) -> f64 {
        let rmean = (f64::from(a[0]) + f64::from(b[0])) / 2.0;
        let r = f64::from(a[0]) - f64::from(b[0]);
        let g = f64::from(a[1]) - f64::from(b[1]);
        let bl = f64::from(a[2]) - f64::from(b[2]);
        let weight_r = 2.0 + rmean / 256.0;
        let weight_g = 4.0;
        let weight_b = 2.0 + (255.0 - rmean) / 256.0;
        weight_r * r * r + weight_g * g * g + weight_b * bl * bl
    }
}

impl Default for MapPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette for MapPalette {
    fn quantize(&self, pixel: Rgba<u8>) -> u8 {
        if pixel[3] < ALPHA_THRESHOLD {
            return 0;
        }
        let rgb = [pixel[0], pixel[1], pixel[2]];
        let mut best = FIRST_OPAQUE_INDEX;
        let mut best_distance = f64::MAX;
        for (i, &color) in self.colors.iter().enumerate().skip(FIRST_OPAQUE_INDEX) {
            let d = Self::distance(rgb, color);
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        best as u8
    }

    fn color(&self, index: u8) -> Rgba<u8> {
        match self.colors.get(usize::from(index)) {
            Some(&[r, g, b]) if usize::from(index) >= FIRST_OPAQUE_INDEX => Rgba([r, g, b, 255]),
            _ => Rgba([0, 0, 0, 0]),
        }
    }
}

/// Errors produced while encoding tiles.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Tile is {width}x{height}, expected {expected}x{expected}")]
    TileSize {
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("Tile {tile} has {found} frames, expected {expected}")]
    RaggedFrames {
        tile: usize,
        expected: usize,
        found: usize,
    },
}

/// Converts square tiles into `tile_pixels²` palette index buffers.
#[derive(Clone)]
pub struct PaletteEncoder {
    palette: Arc<dyn Palette>,
    tile_pixels: u32,
}

impl PaletteEncoder {
    pub fn new(palette: Arc<dyn Palette>, tile_pixels: u32) -> Self {
        Self {
            palette,
            tile_pixels,
        }
    }

    pub fn palette(&self) -> &Arc<dyn Palette> {
        &self.palette
    }

    pub fn tile_pixels(&self) -> u32 {
        self.tile_pixels
    }

    /// Length of every buffer this encoder produces.
    pub fn buffer_length(&self) -> usize {
        self.tile_pixels as usize * self.tile_pixels as usize
    }

    /// Buffer filled with the palette's empty index.
    pub fn empty_buffer(&self) -> Arc<[u8]> {
        vec![self.palette.empty_index(); self.buffer_length()].into()
    }

    /// Encode one tile, row-major, one index per pixel.
    pub fn encode(&self, tile: &RgbaImage) -> Result<Arc<[u8]>, EncodeError> {
        let (width, height) = tile.dimensions();
        if width != self.tile_pixels || height != self.tile_pixels {
            return Err(EncodeError::TileSize {
                width,
                height,
                expected: self.tile_pixels,
            });
        }

        let mut memo: FxHashMap<[u8; 4], u8> = FxHashMap::default();
        let bytes: Vec<u8> = tile
            .pixels()
            .map(|px| {
                *memo
                    .entry(px.0)
                    .or_insert_with(|| self.palette.quantize(*px))
            })
            .collect();
        Ok(bytes.into())
    }
}

impl std::fmt::Debug for PaletteEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteEncoder")
            .field("tile_pixels", &self.tile_pixels)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(tile_pixels: u32) -> PaletteEncoder {
        PaletteEncoder::new(Arc::new(MapPalette::new()), tile_pixels)
    }

    #[test]
    fn test_palette_size() {
        let palette = MapPalette::new();
        assert_eq!(palette.len(), 62 * 4);
    }

    #[test]
    fn test_exact_colors_map_to_themselves() {
        let palette = MapPalette::new();
        for index in FIRST_OPAQUE_INDEX..palette.len() {
            let color = palette.color(index as u8);
            let back = palette.quantize(color);
            // Several shades collide (e.g. dark shades of near-black bases); the
            // result must at least reproduce the same color.
            assert_eq!(palette.color(back), color, "index {}", index);
        }
    }

    #[test]
    fn test_transparent_pixels_map_to_zero() {
        let palette = MapPalette::new();
        assert_eq!(palette.quantize(Rgba([255, 255, 255, 0])), 0);
        assert_eq!(palette.quantize(Rgba([255, 255, 255, 127])), 0);
        assert_ne!(palette.quantize(Rgba([255, 255, 255, 128])), 0);
        assert_eq!(palette.color(0)[3], 0);
        assert_eq!(palette.color(3)[3], 0);
    }

    #[test]
    fn test_pure_white_is_snow() {
        let palette = MapPalette::new();
        // Base 8 (snow) at full brightness.
        assert_eq!(palette.quantize(Rgba([255, 255, 255, 255])), 8 * 4 + 2);
    }

    #[test]
    fn test_encode_length_and_order() {
        let encoder = encoder(4);
        let mut tile = RgbaImage::new(4, 4);
        tile.put_pixel(1, 0, Rgba([255, 255, 255, 255]));

        let bytes = encoder.encode(&tile).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 34);
        assert!(bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_rejects_wrong_size() {
        let encoder = encoder(4);
        assert!(matches!(
            encoder.encode(&RgbaImage::new(4, 5)),
            Err(EncodeError::TileSize { width: 4, height: 5, expected: 4 })
        ));
    }

    #[test]
    fn test_empty_buffer() {
        let encoder = encoder(8);
        let empty = encoder.empty_buffer();
        assert_eq!(empty.len(), 64);
        assert!(empty.iter().all(|&b| b == 0));
    }
}
