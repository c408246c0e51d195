//! Chunk coordinates and pooled chunk objects

use glam::{Vec2, Vec3};

use crate::math::{HitTag, Ray, RayHit};
use crate::meshing::Mesh;
use crate::verlet::Plant;

/// Integer grid coordinate of a chunk column; `y` is always 0
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Column containing `pos` (floor division on x and z)
    pub fn from_world(pos: Vec3, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).floor() as i32,
            y: 0,
            z: (pos.z / chunk_size).floor() as i32,
        }
    }

    /// Grid position scaled to world units on the x/z plane
    pub fn world_xz(&self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32, self.z as f32) * chunk_size
    }

    /// Scaled grid position, on the y = 0 plane
    pub fn grid_position(&self, chunk_size: f32) -> Vec3 {
        let xz = self.world_xz(chunk_size);
        Vec3::new(xz.x, 0.0, xz.y)
    }

    /// Distance from the scaled grid position to `reference`, height included
    pub fn distance(&self, reference: Vec3, chunk_size: f32) -> f32 {
        self.grid_position(chunk_size).distance(reference)
    }

    /// World position of the chunk object: column centre at half height
    pub fn origin(&self, chunk_size: f32, column_height: f32) -> Vec3 {
        let xz = self.world_xz(chunk_size);
        Vec3::new(xz.x, column_height * 0.5, xz.y)
    }
}

/// Stable handle of a pooled chunk object, kept across recycling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkObjectId(pub u32);

/// A treasure placed on the seabed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Treasure {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Plants and treasures spawned on a chunk
#[derive(Default)]
pub struct Vegetation {
    pub plants: Vec<Plant>,
    pub treasures: Vec<Treasure>,
}

/// Pooled chunk object: render/collision mesh bound to a coordinate while loaded
pub struct Chunk {
    pub id: ChunkObjectId,
    /// `None` while parked in the pool
    pub coord: Option<ChunkCoord>,
    /// World position the mesh is relative to
    pub origin: Vec3,
    pub mesh: Mesh,
    pub collidable: bool,
    pub active: bool,
    /// `Some` once vegetation placement has run, even if nothing was placed
    pub vegetation: Option<Vegetation>,
}

impl Chunk {
    pub fn new(id: ChunkObjectId) -> Self {
        Self {
            id,
            coord: None,
            origin: Vec3::ZERO,
            mesh: Mesh::new(),
            collidable: false,
            active: false,
            vegetation: None,
        }
    }

    pub fn is_vegetated(&self) -> bool {
        self.vegetation.is_some()
    }

    /// Drop plants and treasures; the chunk may be vegetated again later
    pub fn clear_vegetation(&mut self) -> bool {
        self.vegetation.take().is_some()
    }

    /// Raycast against the mesh if the chunk is active and collidable
    pub fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        if !self.active || !self.collidable {
            return None;
        }
        let local = ray.translated(-self.origin);
        let (distance, normal) = self.mesh.raycast_local(&local, max_distance)?;
        Some(RayHit {
            point: ray.at(distance),
            normal,
            distance,
            tag: HitTag::Terrain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_floors() {
        assert_eq!(ChunkCoord::from_world(Vec3::new(4.9, 100.0, 0.0), 10.0), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_world(Vec3::new(-0.1, 0.0, -10.0), 10.0), ChunkCoord::new(-1, 0, -1));
        assert_eq!(ChunkCoord::from_world(Vec3::new(25.0, 0.0, -25.0), 10.0), ChunkCoord::new(2, 0, -3));
    }

    #[test]
    fn test_origin_and_distance() {
        let c = ChunkCoord::new(2, 0, -1);
        assert_eq!(c.origin(10.0, 30.0), Vec3::new(20.0, 15.0, -10.0));
        assert_eq!(c.grid_position(10.0), Vec3::new(20.0, 0.0, -10.0));
        assert_eq!(c.distance(Vec3::new(23.0, 0.0, -6.0), 10.0), 5.0);
        // Height of the reference counts
        assert_eq!(c.distance(Vec3::new(20.0, 12.0, -10.0), 10.0), 12.0);
        assert_eq!(c.distance(Vec3::new(23.0, 12.0, -6.0), 10.0), 13.0);
    }

    #[test]
    fn test_raycast_respects_flags_and_origin() {
        let mut chunk = Chunk::new(ChunkObjectId(0));
        chunk.mesh = Mesh {
            vertices: vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        };
        chunk.mesh.recalculate_normals();
        chunk.mesh.recalculate_bounds();
        chunk.origin = Vec3::new(10.0, 5.0, 10.0);

        let ray = Ray::new(Vec3::new(10.5, 9.0, 10.0), Vec3::NEG_Y);
        assert!(chunk.raycast(&ray, 10.0).is_none());

        chunk.active = true;
        chunk.collidable = true;
        let hit = chunk.raycast(&ray, 10.0).unwrap();
        assert!((hit.point - Vec3::new(10.5, 5.0, 10.0)).length() < 1e-5);
        assert!((hit.distance - 4.0).abs() < 1e-5);
        assert_eq!(hit.tag, HitTag::Terrain);
    }
}
