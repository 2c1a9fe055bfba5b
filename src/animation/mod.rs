//! Tile animation caching, persistence and playback.
//!
//! An [`AnimatedImageMap`] turns an animated GIF into one palette-encoded
//! frame sequence per tile. Frames are sampled once per host tick, so
//! playback is `tick mod frame_count`.
//!
//! # Directory Layout
//!
//! ```text
//! <data_folder>/<index>/
//!   data.json      manifest: type tag, index, url, grid size, creator,
//!                  creationTime, tilePixels, mapdata[{ mapid, images }]
//!   0.png .. N-1.png
//!                  one lossless RGBA tile image per (tile, frame),
//!                  tile-major, N = tiles * frames per tile
//! ```
//!
//! Palette buffers are not stored; loading re-encodes the PNG tiles.

mod builder;
mod cache;
mod dispatch;
mod map;
mod store;

pub use builder::TableBuilder;
pub use cache::{AnimationCache, FrameTable, TileFrameSet};
pub use dispatch::{AnimationClock, RenderSurface, TickClock, TileRenderDispatcher, TileSource};
pub use map::{AnimatedImageMap, CreateError, MapMetadata, UpdateError};
pub use store::{CacheStore, LoadError, LoadedCache, SaveError};
