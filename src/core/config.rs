//! World configuration, loaded from and saved to JSON
//!
//! Every section defaults independently, so a file only needs the fields it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::generation::PlantParams;
use crate::streaming::{StreamingConfig, VegetationConfig};
use crate::terrain::TerrainConfig;
use crate::verlet::{LineStyle, VerletParams};

/// All tunables of a streamed seafloor world
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seeds the terrain noise and every vegetation random stream
    pub seed: u64,
    pub terrain: TerrainConfig,
    pub streaming: StreamingConfig,
    pub vegetation: VegetationConfig,
    pub plant: PlantParams,
    pub verlet: VerletParams,
    pub line: LineStyle,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            terrain: TerrainConfig::default(),
            streaming: StreamingConfig::default(),
            vegetation: VegetationConfig::default(),
            plant: PlantParams::default(),
            verlet: VerletParams::default(),
            line: LineStyle::default(),
        }
    }
}

impl WorldConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded world config from {}", path.display());
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the streamer or solver cannot run with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Config(msg.to_string()));

        let t = &self.terrain;
        if t.dots_per_unit == 0 {
            return fail("terrain.dots_per_unit must be at least 1");
        }
        if !(t.noise_scale > 0.0) {
            return fail("terrain.noise_scale must be positive");
        }
        if !t.threshold.is_finite() {
            return fail("terrain.threshold must be finite");
        }

        let s = &self.streaming;
        if !(s.chunk_size > 0.0) || !(s.column_height > 0.0) {
            return fail("streaming.chunk_size and streaming.column_height must be positive");
        }

        let v = &self.vegetation;
        if v.min_plants > v.max_plants {
            return fail("vegetation.min_plants exceeds vegetation.max_plants");
        }
        if !(0.0..=1.0).contains(&v.treasure_probability) {
            return fail("vegetation.treasure_probability must be within [0, 1]");
        }
        if v.placement_attempts == 0 {
            return fail("vegetation.placement_attempts must be at least 1");
        }

        let p = &self.plant;
        if p.main_branch_points < 2 {
            return fail("plant.main_branch_points must be at least 2");
        }
        if !(p.point_halving_ratio > 1.0) {
            return fail("plant.point_halving_ratio must be greater than 1");
        }
        if !(0.0..=1.0).contains(&p.branching_probability) {
            return fail("plant.branching_probability must be within [0, 1]");
        }
        if !(p.point_distance > 0.0) {
            return fail("plant.point_distance must be positive");
        }

        if self.verlet.iterations == 0 {
            return fail("verlet.iterations must be at least 1");
        }
        if !self.verlet.gravity.is_finite() {
            return fail("verlet.gravity must be finite");
        }

        Ok(())
    }
}
