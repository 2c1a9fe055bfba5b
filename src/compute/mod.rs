//! Compute module - Decoding, resampling, tiling and palette encoding.

mod palette;
mod resample;
mod tiler;
mod timeline;

pub use palette::*;
pub use resample::*;
pub use tiler::*;
pub use timeline::*;

#[cfg(test)]
pub(crate) use timeline::testing;
