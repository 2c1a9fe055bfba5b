//! On-disk persistence of frame tables.
//!
//! A map directory holds `data.json` plus one PNG per (tile, frame) pair,
//! named `0.png`, `1.png`, ... in tile order then frame order. The manifest
//! lists each tile's files in tick order; that order is what reload uses.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;

use super::cache::FrameTable;
use crate::compute::EncodeError;
use crate::schema::{
    CacheManifest, ConfigError, MANIFEST_FILE, ManifestKind, TileGrid,
};

/// Errors raised while writing a map directory.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Manifest lists {found} tiles but the frame table has {expected}")]
    TileCount { expected: usize, found: usize },
}

/// Errors raised while reading a map directory. Nothing is published on failure.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Manifest type {0:?} is not an animated image map")]
    WrongType(ManifestKind),

    #[error("Invalid grid in manifest: {0}")]
    Config(#[from] ConfigError),

    #[error("Manifest lists {found} tiles, grid needs {expected}")]
    TileCount { expected: usize, found: usize },

    #[error("Tile {tile} lists {found} frames, expected {expected}")]
    InconsistentFrames {
        tile: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid image file name {0:?}")]
    InvalidFileName(String),

    #[error("Missing frame image {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Image {path} is {width}x{height}, expected {expected}x{expected}")]
    ImageSize {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },

    #[error("Failed to encode persisted tiles: {0}")]
    Encode(#[from] EncodeError),
}

/// Manifest plus the per-tile images it references, in recorded order.
#[derive(Debug, Clone)]
pub struct LoadedCache {
    pub manifest: CacheManifest,
    pub grid: TileGrid,
    /// `tiles[tile][frame]`.
    pub tiles: Vec<Vec<RgbaImage>>,
}

/// Reads and writes one map directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Write all frame images and the manifest, replacing any earlier save.
    ///
    /// Everything is written to a staging directory next to the map
    /// directory, which is then renamed into place. An interrupted save
    /// leaves the previous map untouched.
    ///
    /// `manifest.mapdata` supplies the surface id of every tile; its image
    /// lists are replaced with the files written here. Returns the manifest
    /// as written.
    pub fn save(
        &self,
        mut manifest: CacheManifest,
        table: Option<&FrameTable>,
    ) -> Result<CacheManifest, SaveError> {
        let staging = self.sibling("saving")?;
        let previous = self.sibling("previous")?;

        let mut writes: Vec<(PathBuf, &RgbaImage)> = Vec::new();
        match table {
            Some(table) => {
                if table.tile_count() != manifest.mapdata.len() {
                    return Err(SaveError::TileCount {
                        expected: table.tile_count(),
                        found: manifest.mapdata.len(),
                    });
                }
                for (data, set) in manifest.mapdata.iter_mut().zip(table.tiles()) {
                    data.images.clear();
                    for image in set.images() {
                        let name = CacheManifest::image_name(writes.len());
                        writes.push((staging.join(&name), image));
                        data.images.push(name);
                    }
                }
            }
            None => manifest.mapdata.iter_mut().for_each(|d| d.images.clear()),
        }

        remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&staging).map_err(|source| SaveError::Io {
            path: staging.clone(),
            source,
        })?;

        writes.par_iter().try_for_each(|(path, image)| {
            image
                .save_with_format(path, ImageFormat::Png)
                .map_err(|source| SaveError::Image {
                    path: path.clone(),
                    source,
                })
        })?;

        let path = staging.join(MANIFEST_FILE);
        let file = File::create(&path).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &manifest)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .and_then(|_| writer.get_ref().sync_all())
            .map_err(|source| SaveError::Io { path, source })?;

        self.swap_in(&staging, &previous)?;

        log::info!(
            "Saved {} frame images ({} tiles) to {}",
            writes.len(),
            manifest.mapdata.len(),
            self.dir.display()
        );
        Ok(manifest)
    }

    /// Hidden path next to the map directory, e.g. `.7.saving` for `7`.
    fn sibling(&self, suffix: &str) -> Result<PathBuf, SaveError> {
        let Some(name) = self.dir.file_name() else {
            return Err(SaveError::Io {
                path: self.dir.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "map directory has no name"),
            });
        };
        Ok(self
            .dir
            .with_file_name(format!(".{}.{}", name.to_string_lossy(), suffix)))
    }

    /// Move `staging` into place. Between the two renames only `previous`
    /// holds a complete map.
    fn swap_in(&self, staging: &Path, previous: &Path) -> Result<(), SaveError> {
        if !self.dir.exists() {
            return rename(staging, &self.dir);
        }
        remove_dir_if_exists(previous)?;
        rename(&self.dir, previous)?;
        rename(staging, &self.dir)?;
        if let Err(e) = fs::remove_dir_all(previous) {
            log::warn!("Failed to remove old map {}: {}", previous.display(), e);
        }
        Ok(())
    }

    /// Read and parse `data.json` without touching the images.
    pub fn read_manifest(&self) -> Result<CacheManifest, LoadError> {
        let path = self.manifest_path();
        let file = File::open(&path).map_err(|source| LoadError::Io { path, source })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Read the manifest and every image it references.
    pub fn load(&self) -> Result<LoadedCache, LoadError> {
        let manifest = self.read_manifest()?;
        if manifest.kind != ManifestKind::UrlAnimatedV1 {
            return Err(LoadError::WrongType(manifest.kind));
        }

        let grid = TileGrid::new(manifest.width, manifest.height)?;
        if manifest.tile_pixels == 0 {
            return Err(ConfigError::InvalidTilePixels.into());
        }
        grid.checked_pixel_size(manifest.tile_pixels)?;
        if manifest.mapdata.len() != grid.tile_count() {
            return Err(LoadError::TileCount {
                expected: grid.tile_count(),
                found: manifest.mapdata.len(),
            });
        }

        let frames = manifest.frames_per_tile();
        let mut paths = Vec::with_capacity(grid.tile_count() * frames);
        for (tile, data) in manifest.mapdata.iter().enumerate() {
            if data.images.len() != frames {
                return Err(LoadError::InconsistentFrames {
                    tile,
                    expected: frames,
                    found: data.images.len(),
                });
            }
            for name in &data.images {
                paths.push(self.resolve(name)?);
            }
        }

        let tile_pixels = manifest.tile_pixels;
        let images = paths
            .par_iter()
            .map(|path| load_image(path, tile_pixels))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tiles = Vec::with_capacity(grid.tile_count());
        let mut images = images.into_iter();
        for _ in 0..grid.tile_count() {
            tiles.push(images.by_ref().take(frames).collect());
        }

        log::info!(
            "Loaded {} tiles x {} frames from {}",
            grid.tile_count(),
            frames,
            self.dir.display()
        );
        Ok(LoadedCache {
            manifest,
            grid,
            tiles,
        })
    }

    /// Resolve a manifest file name, which must be a plain name inside the directory.
    fn resolve(&self, name: &str) -> Result<PathBuf, LoadError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(name)),
            _ => Err(LoadError::InvalidFileName(name.to_string())),
        }
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), SaveError> {
    fs::rename(from, to).map_err(|source| SaveError::Io {
        path: to.to_path_buf(),
        source,
    })
}

fn remove_dir_if_exists(path: &Path) -> Result<(), SaveError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(SaveError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}

fn load_image(path: &Path, tile_pixels: u32) -> Result<RgbaImage, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    let image = image::open(path)
        .map_err(|source| LoadError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgba8();
    let (width, height) = image.dimensions();
    if width != tile_pixels || height != tile_pixels {
        return Err(LoadError::ImageSize {
            path: path.to_path_buf(),
            width,
            height,
            expected: tile_pixels,
        });
    }
    Ok(image)
}
