//! World driver: one streaming manager plus its two ticks
//!
//! `update` runs once per rendered frame and streams terrain and vegetation
//! around the reference position. `fixed_update` runs on the physics step and
//! advances every plant, then pushes plants out of nearby colliders.

use glam::Vec3;

use crate::core::config::WorldConfig;
use crate::core::types::Result;
use crate::math::{Ray, RayHit, Raycaster};
use crate::streaming::{ChunkCoord, ChunkStreamer, MeshSink, StreamReport};
use crate::terrain::DensityField;
use crate::verlet::Collider;

/// Snapshot of world counters, for logging and tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub loaded_chunks: usize,
    pub pooled_chunks: usize,
    pub created_chunks: u32,
    pub vertices: usize,
    pub plants: usize,
    pub treasures: usize,
}

pub struct World {
    config: WorldConfig,
    streamer: ChunkStreamer,
    fixed_steps: u64,
}

impl World {
    /// Build a world over noise terrain. Fails if the config does not validate.
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let streamer = ChunkStreamer::new(&config);
        log::info!(
            "World created: seed {}, chunk size {}, loading radius {}",
            config.seed,
            config.streaming.chunk_size,
            config.streaming.loading_radius
        );
        Ok(Self { config, streamer, fixed_steps: 0 })
    }

    /// Build a world over a caller-supplied density field
    pub fn with_density(config: WorldConfig, density: Box<dyn DensityField>) -> Result<Self> {
        config.validate()?;
        let streamer = ChunkStreamer::with_density(&config, density);
        Ok(Self { config, streamer, fixed_steps: 0 })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    pub fn streamer_mut(&mut self) -> &mut ChunkStreamer {
        &mut self.streamer
    }

    /// Fixed steps taken so far
    pub fn fixed_steps(&self) -> u64 {
        self.fixed_steps
    }

    /// Variable-step tick: stream chunks and vegetation around `reference`
    pub fn update(
        &mut self,
        reference: Vec3,
        host: Option<&dyn Raycaster>,
        sink: &mut dyn MeshSink,
    ) -> StreamReport {
        self.streamer.update(reference, host, sink)
    }

    /// Fixed-step tick: simulate every plant once, then resolve collisions
    /// against each collider whose bounds overlap the plant's.
    ///
    /// Returns the number of points pushed out of colliders.
    pub fn fixed_update(&mut self, colliders: &[&dyn Collider]) -> usize {
        self.fixed_steps += 1;
        let mut pushed = 0;
        for plant in self.streamer.plants_mut() {
            plant.step();
            for collider in colliders {
                if collider.bounds().intersects(&plant.bounds()) {
                    pushed += plant.resolve_collision(*collider);
                }
            }
        }
        if pushed > 0 {
            log::trace!("Fixed step {}: {} plant points pushed", self.fixed_steps, pushed);
        }
        pushed
    }

    /// Reload every chunk on the next `update`
    pub fn request_refresh(&mut self) {
        self.streamer.request_refresh();
    }

    /// Whether the chunk under `position` is loaded
    pub fn is_loaded_at(&self, position: Vec3) -> bool {
        let coord = ChunkCoord::from_world(position, self.config.streaming.chunk_size);
        self.streamer.chunk(coord).is_some()
    }

    pub fn stats(&self) -> WorldStats {
        let store = self.streamer.store();
        let treasures = store
            .iter()
            .filter_map(|(_, c)| c.vegetation.as_ref())
            .map(|v| v.treasures.len())
            .sum();
        WorldStats {
            loaded_chunks: store.len(),
            pooled_chunks: store.pooled(),
            created_chunks: store.created(),
            vertices: self.streamer.total_vertex_count(),
            plants: self.streamer.plant_count(),
            treasures,
        }
    }
}

impl Raycaster for World {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        self.streamer.raycast(ray, max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::HitTag;
    use crate::streaming::NullSink;
    use crate::terrain::FnDensity;
    use crate::verlet::SphereCollider;

    /// Solid below y = 5 in world space
    fn flat_floor() -> Box<dyn DensityField> {
        Box::new(FnDensity::new(|p: Vec3| if p.y < 5.0 { 1.0 } else { 0.0 }))
    }

    fn config() -> WorldConfig {
        let mut config = WorldConfig::default();
        config.streaming.loading_radius = 1;
        config.vegetation.radius = 0;
        config.vegetation.treasure_probability = 0.0;
        config.vegetation.placement_attempts = 8;
        config.plant.main_branch_points = 4;
        config.plant.max_branch_order = 1;
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = WorldConfig::default();
        config.verlet.iterations = 0;
        assert!(World::new(config).is_err());
    }

    #[test]
    fn test_update_streams_and_stats() {
        let mut world = World::with_density(config(), flat_floor()).unwrap();
        let report = world.update(Vec3::ZERO, None, &mut NullSink);
        assert_eq!(report.loaded.len(), 5);

        let stats = world.stats();
        assert_eq!(stats.loaded_chunks, 5);
        assert_eq!(stats.pooled_chunks, 0);
        assert_eq!(stats.created_chunks, 5);
        assert!(stats.vertices > 0);
        assert_eq!(stats.plants, 1);
        assert!(world.is_loaded_at(Vec3::new(3.0, 0.0, -3.0)));
        assert!(!world.is_loaded_at(Vec3::new(40.0, 0.0, 0.0)));
    }

    #[test]
    fn test_raycast_hits_floor() {
        let mut world = World::with_density(config(), flat_floor()).unwrap();
        world.update(Vec3::ZERO, None, &mut NullSink);
        let hit = world.raycast(&Ray::new(Vec3::new(0.3, 20.0, 0.3), Vec3::NEG_Y), 40.0).unwrap();
        assert_eq!(hit.tag, HitTag::Terrain);
        assert!((hit.point.y - 5.0).abs() < 0.6, "{}", hit.point);
    }

    #[test]
    fn test_fixed_update_moves_plants_and_counts_steps() {
        let mut world = World::with_density(config(), flat_floor()).unwrap();
        world.update(Vec3::ZERO, None, &mut NullSink);
        assert_eq!(world.stats().plants, 1);

        let before: Vec<Vec3> = world.streamer_mut().plants_mut().flat_map(|p| {
            p.solver().points().iter().map(|pt| pt.pos).collect::<Vec<_>>()
        }).collect();
        for _ in 0..10 {
            world.fixed_update(&[]);
        }
        let after: Vec<Vec3> = world.streamer_mut().plants_mut().flat_map(|p| {
            p.solver().points().iter().map(|pt| pt.pos).collect::<Vec<_>>()
        }).collect();

        assert_eq!(world.fixed_steps(), 10);
        assert_eq!(before.len(), after.len());
        // Root base is locked, the rest drifts
        assert_eq!(before[0], after[0]);
        assert!(before.iter().zip(&after).skip(1).any(|(a, b)| a != b));
    }

    #[test]
    fn test_fixed_update_skips_distant_colliders() {
        let mut world = World::with_density(config(), flat_floor()).unwrap();
        world.update(Vec3::ZERO, None, &mut NullSink);
        let far = SphereCollider::new(Vec3::new(500.0, 5.0, 500.0), 1.0, HitTag::Player);
        let colliders: [&dyn Collider; 1] = [&far];
        assert_eq!(world.fixed_update(&colliders), 0);
    }
}
