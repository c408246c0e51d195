//! Procedural terrain: density field and its configuration

pub mod config;
pub mod density;

pub use config::TerrainConfig;
pub use density::{DensityField, FnDensity, NoiseDensity};
