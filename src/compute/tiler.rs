//! Splitting a grid-sized image into square tiles and back.

use image::RgbaImage;
use image::imageops;

use crate::schema::TileGrid;

/// Split `image` into `grid.tile_count()` tiles of `tile_pixels` square.
///
/// Tiles are returned row-major with x varying fastest. The image is
/// expected to be exactly `grid.pixel_size(tile_pixels)`; areas outside
/// the image come out transparent.
pub fn split_tiles(image: &RgbaImage, grid: TileGrid, tile_pixels: u32) -> Vec<RgbaImage> {
    let mut tiles = Vec::with_capacity(grid.tile_count());
    for ty in 0..grid.height {
        for tx in 0..grid.width {
            let x = tx * tile_pixels;
            let y = ty * tile_pixels;
            let tile = imageops::crop_imm(image, x, y, tile_pixels, tile_pixels).to_image();
            if tile.dimensions() == (tile_pixels, tile_pixels) {
                tiles.push(tile);
            } else {
                let mut padded = RgbaImage::new(tile_pixels, tile_pixels);
                imageops::replace(&mut padded, &tile, 0, 0);
                tiles.push(padded);
            }
        }
    }
    tiles
}

/// Reassemble row-major tiles into one image. Inverse of [`split_tiles`].
pub fn assemble_tiles(tiles: &[RgbaImage], grid: TileGrid, tile_pixels: u32) -> RgbaImage {
    let (width, height) = grid.pixel_size(tile_pixels);
    let mut image = RgbaImage::new(width, height);
    for (i, tile) in tiles.iter().take(grid.tile_count()).enumerate() {
        let tx = (i % grid.width as usize) as u32;
        let ty = (i / grid.width as usize) as u32;
        imageops::replace(
            &mut image,
            tile,
            i64::from(tx * tile_pixels),
            i64::from(ty * tile_pixels),
        );
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn numbered(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, (x / 256) as u8, 255])
        })
    }

    #[test]
    fn test_row_major_order() {
        let grid = TileGrid::new(3, 2).unwrap();
        let image = numbered(12, 8);
        let tiles = split_tiles(&image, grid, 4);

        assert_eq!(tiles.len(), 6);
        // Tile 1 is the second tile of the first row.
        assert_eq!(*tiles[1].get_pixel(0, 0), Rgba([4, 0, 0, 255]));
        // Tile 3 starts the second row.
        assert_eq!(*tiles[3].get_pixel(0, 0), Rgba([0, 4, 0, 255]));
        assert_eq!(*tiles[5].get_pixel(3, 3), Rgba([11, 7, 0, 255]));
    }

    #[test]
    fn test_undersized_image_pads_transparent() {
        let grid = TileGrid::new(2, 1).unwrap();
        let tiles = split_tiles(&numbered(6, 4), grid, 4);
        assert_eq!(tiles[1].dimensions(), (4, 4));
        assert_eq!(tiles[1].get_pixel(3, 0)[3], 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_split_then_assemble_is_identity(
            w in 1u32..5,
            h in 1u32..5,
            t in 1u32..9,
        ) {
            let grid = TileGrid::new(w, h).unwrap();
            let (pw, ph) = grid.pixel_size(t);
            let image = numbered(pw, ph);
            let tiles = split_tiles(&image, grid, t);

            prop_assert_eq!(tiles.len(), (w * h) as usize);
            for tile in &tiles {
                prop_assert_eq!(tile.dimensions(), (t, t));
            }
            prop_assert_eq!(assemble_tiles(&tiles, grid, t), image);
        }
    }
}
