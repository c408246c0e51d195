//! Terrain generation configuration.

use serde::{Deserialize, Serialize};

use crate::meshing::ExtractorKind;

/// Iso-surface and density parameters shared by every chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Lattice samples per world unit (voxel resolution).
    pub dots_per_unit: u32,
    /// Iso level; densities above it are solid.
    pub threshold: f32,
    /// Multiplier applied to world positions before noise lookup.
    pub noise_scale: f32,
    /// fBm octaves.
    pub octaves: u32,
    /// Place surface vertices by value-weighted interpolation instead of edge midpoints.
    pub interpolate: bool,
    /// Bias density by height so the column settles into a floor.
    pub squish: bool,
    /// Strength of the height bias when `squish` is on.
    pub squish_strength: f32,
    /// Force chunk boundary samples to open water, sealing every chunk.
    pub close_boundary: bool,
    /// Surface extraction strategy.
    pub extractor: ExtractorKind,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            dots_per_unit: 1,
            threshold: 0.5,
            noise_scale: 0.26,
            octaves: 3,
            interpolate: true,
            squish: true,
            squish_strength: 1.0,
            close_boundary: false,
            extractor: ExtractorKind::Cpu,
        }
    }
}
