//! Plant and treasure placement on loaded chunks
//!
//! Placement casts rays straight down from above a chunk, at jittered x/z
//! positions inside its footprint, and keeps the first usable hit.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::generation::PlantGenerator;
use crate::math::ray::nearest;
use crate::math::{HitTag, Ray, RayHit, Raycaster};
use crate::verlet::{LineStyle, Plant, VerletParams};

use super::chunk::{ChunkCoord, Treasure, Vegetation};
use super::config::{StreamingConfig, VegetationConfig};
use super::store::ChunkStore;

/// Loaded collidable terrain plus an optional host scene
pub struct SceneRaycaster<'a> {
    pub store: &'a ChunkStore,
    pub host: Option<&'a dyn Raycaster>,
}

impl Raycaster for SceneRaycaster<'_> {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let terrain = self
            .store
            .iter()
            .filter_map(|(_, chunk)| chunk.raycast(ray, max_distance))
            .fold(None, |best, hit| nearest(best, Some(hit)));
        let host = self.host.and_then(|h| h.raycast(ray, max_distance));
        nearest(terrain, host)
    }
}

/// Spawns vegetation for chunks entering the vegetation circle
pub struct VegetationPlacer {
    rng: ChaCha8Rng,
    generator: PlantGenerator,
    verlet: VerletParams,
    style: LineStyle,
    config: VegetationConfig,
}

impl VegetationPlacer {
    pub fn new(
        seed: u64,
        config: VegetationConfig,
        generator: PlantGenerator,
        verlet: VerletParams,
        style: LineStyle,
    ) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            generator,
            verlet,
            style,
            config,
        }
    }

    pub fn config(&self) -> &VegetationConfig {
        &self.config
    }

    /// Roll plant and treasure counts for `coord` and find a surface for each
    ///
    /// Items whose attempts all miss are skipped.
    pub fn place(&mut self, coord: ChunkCoord, streaming: &StreamingConfig, scene: &dyn Raycaster) -> Vegetation {
        let min = self.config.min_plants.min(self.config.max_plants);
        let plant_count = self.rng.gen_range(min..=self.config.max_plants);
        let probability = self.config.treasure_probability.clamp(0.0, 1.0) as f64;
        let treasure_count = usize::from(self.rng.gen_bool(probability));

        let mut vegetation = Vegetation::default();
        for _ in 0..plant_count {
            let Some(hit) = self.find_surface(coord, streaming, scene) else {
                continue;
            };
            let topology = self.generator.generate(hit.point, self.rng.r#gen());
            vegetation.plants.push(Plant::new(topology, self.verlet.clone(), &self.style, self.rng.r#gen()));
        }
        for _ in 0..treasure_count {
            if let Some(hit) = self.find_surface(coord, streaming, scene) {
                vegetation.treasures.push(Treasure {
                    position: hit.point,
                    normal: hit.normal,
                });
            }
        }

        log::trace!(
            "Vegetated {:?}: {}/{} plants, {} treasures",
            coord,
            vegetation.plants.len(),
            plant_count,
            vegetation.treasures.len()
        );
        vegetation
    }

    /// First surface under up to `placement_attempts` downward rays;
    /// player hits are passed through
    fn find_surface(&mut self, coord: ChunkCoord, streaming: &StreamingConfig, scene: &dyn Raycaster) -> Option<RayHit> {
        let half = streaming.chunk_size * 0.5;
        let center = coord.world_xz(streaming.chunk_size);
        for _ in 0..self.config.placement_attempts {
            let origin = Vec3::new(
                center.x + self.rng.gen_range(-half..=half),
                streaming.column_height + 0.5,
                center.y + self.rng.gen_range(-half..=half),
            );
            let ray = Ray::new(origin, Vec3::NEG_Y);
            let hit = scene.raycast_filtered(&ray, streaming.column_height + 1.0, &|tag| tag != HitTag::Player);
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}
