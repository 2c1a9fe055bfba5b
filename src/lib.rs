//! Animap - Tiled palette animation cache for animated GIF sources.
//!
//! A remotely hosted animated GIF is decoded, sampled on the host's tick
//! grid, resized to a grid of square tiles and encoded into fixed-length
//! palette index buffers, one sequence per tile. The result can be saved
//! to and reloaded from a directory, and played back by asking for the
//! buffer of a tile at a given tick.
//!
//! # Architecture
//!
//! - `schema`: Pipeline configuration, tile grid and manifest types
//! - `compute`: GIF timeline decoding, resampling, tiling, palette encoding
//! - `animation`: Frame tables, cache publishing, persistence, dispatch
//! - `fetch`: Source download capability
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use animap::{
//!     animation::{AnimatedImageMap, MapMetadata},
//!     compute::MapPalette,
//!     fetch::SourceFetcher,
//!     schema::{PipelineConfig, TileGrid},
//! };
//!
//! let grid = TileGrid::new(2, 1).unwrap();
//! let meta = MapMetadata::new(0, "https://example.com/cat.gif", grid, "me", vec![10, 11]);
//! let map = AnimatedImageMap::create(
//!     meta,
//!     PipelineConfig::default(),
//!     Arc::new(MapPalette::new()),
//!     Arc::new(SourceFetcher),
//! )
//! .unwrap();
//!
//! let colors = map.raw_animation_colors(42, 1);
//! assert_eq!(colors.len(), 128 * 128);
//! map.save("maps").unwrap();
//! ```

pub mod animation;
pub mod compute;
pub mod fetch;
pub mod schema;

// Re-export commonly used types
pub use animation::{AnimatedImageMap, AnimationCache, CacheStore, MapMetadata, TileRenderDispatcher};
pub use compute::{MapPalette, Palette, Timeline};
pub use schema::{PipelineConfig, TileGrid};
