//! Persisted manifest (`data.json`) describing a saved image map.

use serde::{Deserialize, Serialize};

use super::TILE_PIXELS;

/// File name of the manifest inside a map directory.
pub const MANIFEST_FILE: &str = "data.json";

/// Extension of the per-frame tile images.
pub const IMAGE_EXTENSION: &str = "png";

fn default_tile_pixels() -> u32 {
    TILE_PIXELS
}

/// Discriminator stored in the manifest's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestKind {
    /// Animated URL-sourced image map, layout version 1.
    #[serde(rename = "url-animated-v1")]
    UrlAnimatedV1,
    /// Any tag this build does not understand.
    #[serde(other)]
    Unknown,
}

/// One tile entry: the host surface id and its frame files in tick order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    pub mapid: i32,
    pub images: Vec<String>,
}

/// Top-level manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    #[serde(rename = "type")]
    pub kind: ManifestKind,
    pub index: i32,
    pub url: String,
    /// Tile grid width in tiles.
    pub width: u32,
    /// Tile grid height in tiles.
    pub height: u32,
    pub creator: String,
    /// Creation time in epoch milliseconds.
    #[serde(rename = "creationTime")]
    pub creation_time: u64,
    #[serde(rename = "tilePixels", default = "default_tile_pixels")]
    pub tile_pixels: u32,
    pub mapdata: Vec<MapData>,
}

impl CacheManifest {
    /// Name of the image file with the given running index.
    pub fn image_name(n: usize) -> String {
        format!("{}.{}", n, IMAGE_EXTENSION)
    }

    /// Number of frames recorded for the first tile (0 when empty).
    pub fn frames_per_tile(&self) -> usize {
        self.mapdata.first().map_or(0, |d| d.images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_field_names() {
        let manifest = CacheManifest {
            kind: ManifestKind::UrlAnimatedV1,
            index: 7,
            url: "https://example.com/a.gif".into(),
            width: 2,
            height: 1,
            creator: "00000000-0000-0000-0000-000000000000".into(),
            creation_time: 1_700_000_000_000,
            tile_pixels: 128,
            mapdata: vec![
                MapData {
                    mapid: 10,
                    images: vec!["0.png".into()],
                },
                MapData {
                    mapid: 11,
                    images: vec!["1.png".into()],
                },
            ],
        };

        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["type"], "url-animated-v1");
        assert_eq!(value["creationTime"], 1_700_000_000_000u64);
        assert_eq!(value["mapdata"][1]["mapid"], 11);
        assert_eq!(value["mapdata"][1]["images"][0], "1.png");
    }

    #[test]
    fn test_unknown_kind_and_default_tile_pixels() {
        let json = r#"{
            "type": "com.example.SomethingElse",
            "index": 1,
            "url": "u",
            "width": 1,
            "height": 1,
            "creator": "c",
            "creationTime": 0,
            "mapdata": []
        }"#;
        let manifest: CacheManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.kind, ManifestKind::Unknown);
        assert_eq!(manifest.tile_pixels, TILE_PIXELS);
        assert_eq!(manifest.frames_per_tile(), 0);
    }

    #[test]
    fn test_image_name() {
        assert_eq!(CacheManifest::image_name(42), "42.png");
    }
}
