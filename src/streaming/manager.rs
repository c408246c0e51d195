//! Chunk streaming around a moving reference point
//!
//! Every tick runs three passes in a fixed order:
//! 1. unload chunks that left the loading circle (vegetation first, then the
//!    object goes back to the pool),
//! 2. load every coordinate inside the circle that is not loaded yet,
//! 3. clear vegetation outside the vegetation circle and place it inside.

use glam::Vec3;

use crate::core::config::WorldConfig;
use crate::core::types::Result;
use crate::generation::PlantGenerator;
use crate::math::{Ray, RayHit, Raycaster};
use crate::math::ray::nearest;
use crate::meshing::{
    create_extractor, CpuExtractor, DensityGrid, ExtractSettings, GridLayout, Mesh, MeshAssembler,
    SurfaceExtractor,
};
use crate::terrain::{DensityField, NoiseDensity, TerrainConfig};
use crate::verlet::Plant;

use super::chunk::{Chunk, ChunkCoord};
use super::config::StreamingConfig;
use super::sink::MeshSink;
use super::store::ChunkStore;
use super::vegetation::{SceneRaycaster, VegetationPlacer};

/// Keeps vegetation randomness independent of the terrain seed
const VEGETATION_SEED_SALT: u64 = 0x5eab_ed00_0000_0001;

/// What one tick changed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamReport {
    /// Chunk containing the reference point
    pub center: ChunkCoord,
    pub unloaded: Vec<ChunkCoord>,
    pub loaded: Vec<ChunkCoord>,
    pub vegetated: Vec<ChunkCoord>,
    /// Chunks that lost vegetation but stay loaded
    pub cleared: Vec<ChunkCoord>,
    /// Chunk objects constructed because the pool was empty
    pub created: usize,
}

impl StreamReport {
    pub fn is_idle(&self) -> bool {
        self.unloaded.is_empty() && self.loaded.is_empty() && self.vegetated.is_empty() && self.cleared.is_empty()
    }
}

/// Owns every loaded chunk and the pool of recycled chunk objects
pub struct ChunkStreamer {
    streaming: StreamingConfig,
    terrain: TerrainConfig,
    density: Box<dyn DensityField>,
    extractor: Box<dyn SurfaceExtractor + Send>,
    assembler: MeshAssembler,
    store: ChunkStore,
    placer: VegetationPlacer,
    refresh: bool,
}

impl ChunkStreamer {
    /// Streamer over the configured noise terrain
    pub fn new(config: &WorldConfig) -> Self {
        let density = NoiseDensity::new(config.seed as u32, &config.terrain, config.streaming.column_height);
        Self::with_density(config, Box::new(density))
    }

    /// Streamer over a caller-supplied density field
    pub fn with_density(config: &WorldConfig, density: Box<dyn DensityField>) -> Self {
        let placer = VegetationPlacer::new(
            config.seed ^ VEGETATION_SEED_SALT,
            config.vegetation.clone(),
            PlantGenerator::new(config.plant.clone()),
            config.verlet.clone(),
            config.line.clone(),
        );
        Self {
            streaming: config.streaming.clone(),
            terrain: config.terrain.clone(),
            density,
            extractor: create_extractor(config.terrain.extractor),
            assembler: MeshAssembler::new(),
            store: ChunkStore::new(),
            placer,
            refresh: false,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn streaming_config(&self) -> &StreamingConfig {
        &self.streaming
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.store.get(coord)
    }

    /// Loaded coordinates, sorted
    pub fn loaded_coords(&self) -> Vec<ChunkCoord> {
        self.store.coords()
    }

    /// Unload and reload everything on the next tick
    pub fn request_refresh(&mut self) {
        self.refresh = true;
    }

    /// Vertices across all loaded chunk meshes
    pub fn total_vertex_count(&self) -> usize {
        self.store.iter().map(|(_, c)| c.mesh.vertex_count()).sum()
    }

    /// Every plant on a vegetated chunk
    pub fn plants_mut(&mut self) -> impl Iterator<Item = &mut Plant> {
        self.store
            .iter_mut()
            .filter_map(|(_, c)| c.vegetation.as_mut())
            .flat_map(|v| v.plants.iter_mut())
    }

    pub fn plant_count(&self) -> usize {
        self.store
            .iter()
            .filter_map(|(_, c)| c.vegetation.as_ref())
            .map(|v| v.plants.len())
            .sum()
    }

    /// Whether the grid position of `coord` lies within `radius` chunks of `reference`
    ///
    /// Grid positions sit on y = 0, so a raised reference shrinks the loaded disc.
    pub fn in_radius(&self, coord: ChunkCoord, reference: Vec3, radius: u32) -> bool {
        let size = self.streaming.chunk_size;
        coord.distance(reference, size) <= radius as f32 * size
    }

    /// Coordinates within `radius`, scanning `center ± radius`
    fn circle(&self, reference: Vec3, radius: u32) -> Vec<ChunkCoord> {
        let center = ChunkCoord::from_world(reference, self.streaming.chunk_size);
        let r = radius as i32;
        let mut coords = Vec::new();
        for dx in -r..=r {
            for dz in -r..=r {
                let coord = ChunkCoord::new(center.x + dx, 0, center.z + dz);
                if self.in_radius(coord, reference, radius) {
                    coords.push(coord);
                }
            }
        }
        coords
    }

    /// Variable-step tick
    pub fn update(
        &mut self,
        reference: Vec3,
        host: Option<&dyn Raycaster>,
        sink: &mut dyn MeshSink,
    ) -> StreamReport {
        let mut report = StreamReport {
            center: ChunkCoord::from_world(reference, self.streaming.chunk_size),
            ..Default::default()
        };

        // Unload before load so freed objects are reused this tick
        let refresh = std::mem::take(&mut self.refresh);
        for coord in self.store.coords() {
            if !refresh && self.in_radius(coord, reference, self.streaming.loading_radius) {
                continue;
            }
            if let Some(id) = self.store.release(coord) {
                sink.release(id);
                report.unloaded.push(coord);
            }
        }

        for coord in self.circle(reference, self.streaming.loading_radius) {
            if self.store.contains(coord) {
                continue;
            }
            let (mut chunk, created) = self.store.acquire();
            if created {
                report.created += 1;
            }
            chunk.origin = coord.origin(self.streaming.chunk_size, self.streaming.column_height);
            chunk.collidable = self.streaming.build_collision;
            if let Err(e) = self.build_mesh(chunk.origin, &mut chunk.mesh) {
                log::error!("Meshing chunk {:?} failed: {}", coord, e);
                chunk.mesh.clear();
            }
            sink.upload(chunk.id, chunk.origin, &chunk.mesh, chunk.collidable);
            log::trace!("Loaded chunk {:?} ({} vertices)", coord, chunk.mesh.vertex_count());
            self.store.insert(coord, chunk);
            report.loaded.push(coord);
        }

        self.update_vegetation(reference, host, &mut report);

        if !report.is_idle() {
            log::debug!(
                "Stream tick at {:?}: +{} -{} chunks, {} vegetated, {} cleared, {} pooled",
                report.center,
                report.loaded.len(),
                report.unloaded.len(),
                report.vegetated.len(),
                report.cleared.len(),
                self.store.pooled()
            );
        }
        report
    }

    fn update_vegetation(&mut self, reference: Vec3, host: Option<&dyn Raycaster>, report: &mut StreamReport) {
        let radius = self.placer.config().radius;
        for coord in self.store.coords() {
            let inside = self.in_radius(coord, reference, radius);
            let vegetated = self.store.get(coord).is_some_and(Chunk::is_vegetated);

            if !inside && vegetated {
                if let Some(chunk) = self.store.get_mut(coord) {
                    chunk.clear_vegetation();
                    report.cleared.push(coord);
                }
            } else if inside && !vegetated {
                let scene = SceneRaycaster { store: &self.store, host };
                let vegetation = self.placer.place(coord, &self.streaming, &scene);
                if let Some(chunk) = self.store.get_mut(coord) {
                    chunk.vegetation = Some(vegetation);
                    report.vegetated.push(coord);
                }
            }
        }
    }

    /// Sample, march and assemble the chunk centred on `origin` into `mesh`
    ///
    /// A failing GPU extractor is replaced by the CPU one and the chunk retried.
    pub fn build_mesh(&mut self, origin: Vec3, mesh: &mut Mesh) -> Result<()> {
        let scale = Vec3::new(
            self.streaming.chunk_size,
            self.streaming.column_height,
            self.streaming.chunk_size,
        );
        let layout = GridLayout::for_chunk(origin, scale, self.terrain.dots_per_unit);
        let grid = DensityGrid::sample(
            self.density.as_ref(),
            layout,
            self.terrain.threshold,
            self.terrain.close_boundary,
        );
        let settings = ExtractSettings {
            threshold: self.terrain.threshold,
            interpolate: self.terrain.interpolate,
        };

        let triangles = match self.extractor.extract(&grid, &settings) {
            Ok(triangles) => triangles,
            Err(e) if self.extractor.name() != "cpu" => {
                log::warn!("{} extraction failed ({}), switching to CPU", self.extractor.name(), e);
                self.extractor = Box::new(CpuExtractor::new());
                self.extractor.extract(&grid, &settings)?
            }
            Err(e) => return Err(e),
        };
        self.assembler.assemble_into(&triangles, mesh);
        Ok(())
    }
}

impl Raycaster for ChunkStreamer {
    /// Nearest hit on loaded collidable terrain
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        self.store
            .iter()
            .filter_map(|(_, chunk)| chunk.raycast(ray, max_distance))
            .fold(None, |best, hit| nearest(best, Some(hit)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::math::HitTag;
    use crate::streaming::chunk::ChunkObjectId;
    use crate::streaming::sink::NullSink;
    use crate::terrain::FnDensity;

    fn config(radius: u32) -> WorldConfig {
        let mut config = WorldConfig::default();
        config.streaming.loading_radius = radius;
        config.vegetation.radius = 0;
        config.vegetation.treasure_probability = 0.0;
        config.plant.main_branch_points = 4;
        config
    }

    fn empty_world(radius: u32) -> ChunkStreamer {
        ChunkStreamer::with_density(&config(radius), Box::new(FnDensity::new(|_| 0.0)))
    }

    /// Solid below y = 9.8
    fn seabed(config: &WorldConfig) -> ChunkStreamer {
        ChunkStreamer::with_density(config, Box::new(FnDensity::new(|p: Vec3| 10.3 - p.y)))
    }

    fn set(coords: &[ChunkCoord]) -> BTreeSet<ChunkCoord> {
        coords.iter().copied().collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        uploads: Vec<ChunkObjectId>,
        releases: Vec<ChunkObjectId>,
    }

    impl MeshSink for RecordingSink {
        fn upload(&mut self, object: ChunkObjectId, _origin: Vec3, _mesh: &Mesh, _collidable: bool) {
            self.uploads.push(object);
        }

        fn release(&mut self, object: ChunkObjectId) {
            self.releases.push(object);
        }
    }

    #[test]
    fn test_radius_one_at_origin() {
        let mut streamer = empty_world(1);
        let report = streamer.update(Vec3::ZERO, None, &mut NullSink);
        let expected = [
            ChunkCoord::new(0, 0, 0),
            ChunkCoord::new(1, 0, 0),
            ChunkCoord::new(-1, 0, 0),
            ChunkCoord::new(0, 0, 1),
            ChunkCoord::new(0, 0, -1),
        ];
        assert_eq!(set(&streamer.loaded_coords()), set(&expected));
        assert_eq!(report.loaded.len(), 5);
        assert_eq!(report.created, 5);
    }

    #[test]
    fn test_reference_height_counts_toward_distance() {
        let mut streamer = empty_world(2);
        streamer.update(Vec3::new(0.0, 12.0, 0.0), None, &mut NullSink);
        let mut expected = Vec::new();
        for x in -1..=1 {
            for z in -1..=1 {
                expected.push(ChunkCoord::new(x, 0, z));
            }
        }
        assert_eq!(set(&streamer.loaded_coords()), set(&expected));
        assert!(!streamer.in_radius(ChunkCoord::new(2, 0, 0), Vec3::new(0.0, 12.0, 0.0), 2));
        assert!(streamer.in_radius(ChunkCoord::new(2, 0, 0), Vec3::ZERO, 2));

        // Descending to the floor widens the disc
        let report = streamer.update(Vec3::ZERO, None, &mut NullSink);
        assert_eq!(streamer.store().len(), 13);
        assert_eq!(report.loaded.len(), 4);
    }

    #[test]
    fn test_random_walk_keeps_exact_circle() {
        let mut streamer = empty_world(2);
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut pos = Vec3::new(3.0, 12.0, -4.0);
        for _ in 0..60 {
            pos += Vec3::new(rng.gen_range(-8.0..8.0), 0.0, rng.gen_range(-8.0..8.0));
            streamer.update(pos, None, &mut NullSink);

            let center = ChunkCoord::from_world(pos, 10.0);
            let mut expected = BTreeSet::new();
            for x in center.x - 4..=center.x + 4 {
                for z in center.z - 4..=center.z + 4 {
                    let coord = ChunkCoord::new(x, 0, z);
                    if coord.distance(pos, 10.0) <= 20.0 {
                        expected.insert(coord);
                    }
                }
            }
            let loaded = streamer.loaded_coords();
            assert_eq!(loaded.len(), streamer.store().len());
            assert_eq!(set(&loaded), expected, "at {pos}");
        }
        // Objects are recycled rather than piling up
        let peak = streamer.store().len() + streamer.store().pooled();
        assert_eq!(streamer.store().created() as usize, peak);
        assert!(peak < 40);
    }

    #[test]
    fn test_unload_reload_round_trip() {
        let mut config = config(0);
        config.streaming.build_collision = false;
        // A solid ball well inside chunk (0, 0, 0)
        let ball = FnDensity::new(|p: Vec3| 3.5 - p.distance(Vec3::new(0.3, 12.0, -0.4)));
        let mut streamer = ChunkStreamer::with_density(&config, Box::new(ball));
        let home = Vec3::ZERO;
        let coord = ChunkCoord::new(0, 0, 0);

        streamer.update(home, None, &mut NullSink);
        let first = streamer.chunk(coord).unwrap().mesh.clone();
        assert!(first.vertex_count() > 0);

        let report = streamer.update(Vec3::new(500.0, 0.0, 500.0), None, &mut NullSink);
        assert_eq!(report.unloaded, vec![coord]);
        streamer.update(home, None, &mut NullSink);

        let again = &streamer.chunk(coord).unwrap().mesh;
        assert_eq!(again.vertex_count(), first.vertex_count());
        assert_eq!(again.bounds, first.bounds);
    }

    #[test]
    fn test_refresh_reloads_everything() {
        let mut streamer = empty_world(1);
        let mut sink = RecordingSink::default();
        streamer.update(Vec3::ZERO, None, &mut sink);
        assert!(streamer.update(Vec3::ZERO, None, &mut sink).is_idle());

        streamer.request_refresh();
        let report = streamer.update(Vec3::ZERO, None, &mut sink);
        assert_eq!(report.unloaded.len(), 5);
        assert_eq!(report.loaded.len(), 5);
        assert_eq!(report.created, 0);
        assert_eq!(sink.releases.len(), 5);
        assert_eq!(sink.uploads.len(), 10);
        assert!(streamer.update(Vec3::ZERO, None, &mut sink).is_idle());
    }

    #[test]
    fn test_mesh_is_chunk_local() {
        let config = config(0);
        let mut streamer = seabed(&config);
        streamer.update(Vec3::new(10.0, 0.0, 0.0), None, &mut NullSink);
        let chunk = streamer.chunk(ChunkCoord::new(1, 0, 0)).unwrap();
        assert_eq!(chunk.origin, Vec3::new(10.0, 15.0, 0.0));
        let bounds = chunk.mesh.bounds;
        assert!(bounds.min.x >= -5.0 && bounds.max.x <= 5.0);
        // World y 9.8 is local y -5.2
        assert!((bounds.min.y + 5.2).abs() < 1e-4 && (bounds.max.y + 5.2).abs() < 1e-4);
    }

    #[test]
    fn test_boundary_closing_seals_mesh() {
        let open_edges = |mesh: &Mesh| {
            let mut edges: HashMap<(u32, u32), u32> = HashMap::new();
            for t in mesh.indices.chunks_exact(3) {
                for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                    *edges.entry((a.min(b), a.max(b))).or_default() += 1;
                }
            }
            edges.values().filter(|&&n| n != 2).count()
        };

        let mut config = config(0);
        let mut streamer = seabed(&config);
        streamer.update(Vec3::ZERO, None, &mut NullSink);
        let mesh = &streamer.chunk(ChunkCoord::new(0, 0, 0)).unwrap().mesh;
        assert!(open_edges(mesh) > 0);

        config.terrain.close_boundary = true;
        let mut streamer = seabed(&config);
        streamer.update(Vec3::ZERO, None, &mut NullSink);
        let mesh = &streamer.chunk(ChunkCoord::new(0, 0, 0)).unwrap().mesh;
        assert!(!mesh.is_empty());
        assert_eq!(open_edges(mesh), 0);
    }

    #[test]
    fn test_vegetation_lands_on_terrain_and_clears() {
        let mut config = config(1);
        config.vegetation.min_plants = 2;
        config.vegetation.max_plants = 2;
        let mut streamer = seabed(&config);

        let report = streamer.update(Vec3::ZERO, None, &mut NullSink);
        assert_eq!(report.vegetated, vec![ChunkCoord::new(0, 0, 0)]);
        assert_eq!(streamer.plant_count(), 2);
        for plant in streamer.plants_mut() {
            assert!((plant.base().y - 9.8).abs() < 1e-3, "{}", plant.base());
        }

        // Still loaded, but outside the vegetation circle
        let report = streamer.update(Vec3::new(10.0, 0.0, 0.0), None, &mut NullSink);
        assert!(report.cleared.contains(&ChunkCoord::new(0, 0, 0)));
        assert!(streamer.chunk(ChunkCoord::new(0, 0, 0)).is_some());
        assert!(!streamer.chunk(ChunkCoord::new(0, 0, 0)).unwrap().is_vegetated());
        assert_eq!(report.vegetated, vec![ChunkCoord::new(1, 0, 0)]);
    }

    #[test]
    fn test_vegetation_passes_through_hovering_player() {
        /// Vehicle hull spanning the whole chunk at y = 20
        struct Hull;
        impl Raycaster for Hull {
            fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
                let t = (20.0 - ray.origin.y) / ray.direction.y;
                (t.is_finite() && t >= 0.0 && t <= max_distance).then(|| RayHit {
                    point: ray.at(t),
                    normal: Vec3::Y,
                    distance: t,
                    tag: HitTag::Player,
                })
            }
        }

        let config = config(0);
        let mut streamer = seabed(&config);
        let host: &dyn Raycaster = &Hull;
        let report = streamer.update(Vec3::ZERO, Some(host), &mut NullSink);
        assert_eq!(report.vegetated.len(), 1);
        assert_eq!(streamer.plant_count(), 1);
        for plant in streamer.plants_mut() {
            assert!((plant.base().y - 9.8).abs() < 1e-3, "{}", plant.base());
        }
    }

    #[test]
    fn test_terrain_raycast() {
        let config = config(1);
        let mut streamer = seabed(&config);
        streamer.update(Vec3::ZERO, None, &mut NullSink);
        let hit = streamer.raycast(&Ray::new(Vec3::new(2.2, 40.0, -3.1), Vec3::NEG_Y), 100.0).unwrap();
        assert!((hit.point.y - 9.8).abs() < 1e-3);
        assert_eq!(hit.tag, HitTag::Terrain);
        assert!(hit.normal.y > 0.99);
        assert!(streamer.total_vertex_count() > 0);
    }
}
