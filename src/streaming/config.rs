//! Streaming and vegetation placement configuration.

use serde::{Deserialize, Serialize};

/// Chunk grid and loading circle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Horizontal chunk edge length in world units.
    pub chunk_size: f32,
    /// Vertical extent of every chunk column.
    pub column_height: f32,
    /// Loading circle radius, in chunks.
    pub loading_radius: u32,
    /// Mark chunk meshes collidable (usable by raycasts and the host's physics).
    pub build_collision: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10.0,
            column_height: 30.0,
            loading_radius: 2,
            build_collision: true,
        }
    }
}

/// Plant and treasure placement around the reference point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    /// Vegetation circle radius, in chunks.
    pub radius: u32,
    pub min_plants: u32,
    pub max_plants: u32,
    /// Chance of one treasure per vegetated chunk.
    pub treasure_probability: f32,
    /// Downward rays tried per item before giving up.
    pub placement_attempts: u32,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            radius: 1,
            min_plants: 1,
            max_plants: 1,
            treasure_probability: 0.3,
            placement_attempts: 3,
        }
    }
}
