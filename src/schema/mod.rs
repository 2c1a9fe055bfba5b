//! Schema module - Configuration and persisted manifest types.

mod config;
mod manifest;

pub use config::*;
pub use manifest::*;
